use std::sync::{Arc, Mutex, Weak};

use tracing::warn;

use crate::message::{MessageSource, ReceivedMessage};

/// Anything that can claim a received message.
///
/// `handle` returns true to claim the message and stop the dispatch walk.
/// The root-address methods exist for address scoping: a parent stamps its
/// own fragment onto a child with [`Handler::prepend_root_address`] at
/// attach time, and the child checks incoming addresses against the
/// result. The defaults store nothing, for handlers that do their own
/// matching.
pub trait Handler: Send {
    fn root_address(&self) -> &str {
        ""
    }

    fn set_root_address(&mut self, _address: String) {}

    /// Joins `prefix` in front of the current root address. Called once
    /// when the handler is attached under a prefixing parent; the result
    /// is not recomputed if the handler is later moved.
    fn prepend_root_address(&mut self, prefix: &str) {
        let joined = format!("{}{}", prefix, self.root_address());
        self.set_root_address(joined);
    }

    /// Examines one message. Return true to claim it and stop the walk.
    fn handle(&mut self, message: &ReceivedMessage, source: &MessageSource) -> bool;
}

/// An ordered tree of handlers sharing one inbound message stream.
///
/// Children are observed through weak references: the application keeps
/// its handlers alive in `Arc<Mutex<_>>` and the tree never extends their
/// lifetime. When a handler is dropped its entry goes stale and the next
/// dispatch discards it and moves on, so tearing down a handler never
/// requires detaching it first.
///
/// Dispatch offers a message to the children in attachment order, then to
/// this node's own hook. The walk is depth first, since a child may
/// itself be a `DispatchNode`, and stops at the first handler that
/// returns true. Handlers are called with the tree lock held and must not
/// call back into the receiver that is dispatching to them.
pub struct DispatchNode {
    root_address: String,
    children: Vec<Weak<Mutex<dyn Handler>>>,
    hook: Option<Box<dyn FnMut(&ReceivedMessage, &MessageSource) -> bool + Send>>,
}

impl DispatchNode {
    pub fn new(root_address: impl Into<String>) -> Self {
        DispatchNode {
            root_address: root_address.into(),
            children: Vec::new(),
            hook: None,
        }
    }

    /// Attaches a handler after the current children.
    pub fn add_child<H>(&mut self, child: &Arc<Mutex<H>>)
    where
        H: Handler + 'static,
    {
        let weak = Arc::downgrade(child);
        self.children.push(weak as Weak<Mutex<dyn Handler>>);
    }

    /// Attaches a handler after stamping this node's root address onto
    /// it.
    pub fn add_child_prefixed<H>(&mut self, child: &Arc<Mutex<H>>)
    where
        H: Handler + 'static,
    {
        child
            .lock()
            .unwrap()
            .prepend_root_address(&self.root_address);
        self.add_child(child);
    }

    /// Detaches a handler by identity. Detaching one that was never
    /// attached does nothing.
    pub fn remove_child<H>(&mut self, child: &Arc<Mutex<H>>)
    where
        H: Handler + 'static,
    {
        let target = Arc::as_ptr(child) as *const ();
        self.children.retain(|weak| match weak.upgrade() {
            Some(live) => Arc::as_ptr(&live) as *const () != target,
            None => false,
        });
    }

    pub fn remove_all_children(&mut self) {
        self.children.clear();
    }

    /// Attached children still alive.
    pub fn child_count(&self) -> usize {
        self.children
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Installs the hook that runs when no child claims a message.
    /// Replaces any previous hook.
    pub fn on_message<F>(&mut self, hook: F)
    where
        F: FnMut(&ReceivedMessage, &MessageSource) -> bool + Send + 'static,
    {
        self.hook = Some(Box::new(hook));
    }

    /// Offers a message to the children in order, then to the hook.
    /// Returns true as soon as someone claims it.
    pub fn dispatch(&mut self, message: &ReceivedMessage, source: &MessageSource) -> bool {
        let mut at = 0;
        while at < self.children.len() {
            match self.children[at].upgrade() {
                Some(child) => {
                    if child.lock().unwrap().handle(message, source) {
                        return true;
                    }
                    at += 1;
                }
                None => {
                    warn!(
                        "removing dropped handler under {:?}",
                        self.root_address
                    );
                    self.children.remove(at);
                }
            }
        }
        match &mut self.hook {
            Some(hook) => hook(message, source),
            None => false,
        }
    }
}

impl Default for DispatchNode {
    fn default() -> Self {
        Self::new("")
    }
}

impl Handler for DispatchNode {
    fn root_address(&self) -> &str {
        &self.root_address
    }

    fn set_root_address(&mut self, address: String) {
        self.root_address = address;
    }

    fn handle(&mut self, message: &ReceivedMessage, source: &MessageSource) -> bool {
        self.dispatch(message, source)
    }
}
