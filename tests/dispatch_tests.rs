// Integration tests for the handler tree
//
// These tests drive DispatchNode directly, without a socket: handlers
// are offered messages in attachment order, the first claim stops the
// walk, the node hook runs when every child declines, and entries for
// dropped handlers are discarded on the next dispatch.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use assert2::{assert, check};
use crossbeam_channel::{Sender, unbounded};

use osckit::{DispatchNode, Handler, MessageSource, ReceivedMessage, TimeTag, Value};

fn probe(address: &str) -> ReceivedMessage {
    ReceivedMessage::new(address, vec![], TimeTag::immediate())
}

fn float_probe(address: &str, x: f32) -> ReceivedMessage {
    ReceivedMessage::new(address, vec![Value::Float(x)], TimeTag::immediate())
}

fn source() -> MessageSource {
    MessageSource::new("10.0.0.5", 8000)
}

/// Logs its name on every offer and claims or declines as configured.
struct Recorder {
    name: &'static str,
    claims: bool,
    log: Sender<&'static str>,
}

impl Handler for Recorder {
    fn handle(&mut self, _message: &ReceivedMessage, _source: &MessageSource) -> bool {
        self.log.send(self.name).unwrap();
        self.claims
    }
}

fn recorder(name: &'static str, claims: bool, log: &Sender<&'static str>) -> Arc<Mutex<Recorder>> {
    Arc::new(Mutex::new(Recorder {
        name,
        claims,
        log: log.clone(),
    }))
}

/// A scoped handler in the usual shape: it matches one address under its
/// root and extracts one argument.
struct ChannelVolume {
    root_address: String,
    seen: Sender<f32>,
}

impl Handler for ChannelVolume {
    fn root_address(&self) -> &str {
        &self.root_address
    }

    fn set_root_address(&mut self, address: String) {
        self.root_address = address;
    }

    fn handle(&mut self, message: &ReceivedMessage, _source: &MessageSource) -> bool {
        let volume = format!("{}/volume", self.root_address);
        if !message.check_address_and_types(&volume, "f") {
            return false;
        }
        if let Some(x) = message.try_float(0) {
            self.seen.send(x).unwrap();
        }
        true
    }
}

#[test]
fn children_are_offered_in_attachment_order() {
    let (log, seen) = unbounded();
    let mut node = DispatchNode::new("");
    let first = recorder("first", false, &log);
    let second = recorder("second", false, &log);
    let third = recorder("third", false, &log);
    node.add_child(&first);
    node.add_child(&second);
    node.add_child(&third);

    assert!(!node.dispatch(&probe("/anything"), &source()));
    check!(seen.try_recv() == Ok("first"));
    check!(seen.try_recv() == Ok("second"));
    check!(seen.try_recv() == Ok("third"));
    check!(seen.try_recv().is_err());
}

#[test]
fn first_claim_stops_the_walk() {
    let (log, seen) = unbounded();
    let mut node = DispatchNode::new("");
    let first = recorder("first", false, &log);
    let second = recorder("second", true, &log);
    let third = recorder("third", false, &log);
    node.add_child(&first);
    node.add_child(&second);
    node.add_child(&third);

    assert!(node.dispatch(&probe("/anything"), &source()));
    check!(seen.try_recv() == Ok("first"));
    check!(seen.try_recv() == Ok("second"));
    check!(seen.try_recv().is_err());
}

#[test]
fn hook_runs_when_every_child_declines() {
    let (log, seen) = unbounded();
    let mut node = DispatchNode::new("");
    let child = recorder("child", false, &log);
    node.add_child(&child);
    let hook_log = log.clone();
    node.on_message(move |_message, _source| {
        hook_log.send("hook").unwrap();
        true
    });

    assert!(node.dispatch(&probe("/anything"), &source()));
    check!(seen.try_recv() == Ok("child"));
    check!(seen.try_recv() == Ok("hook"));
}

#[test]
fn claiming_child_suppresses_the_hook() {
    let (log, seen) = unbounded();
    let mut node = DispatchNode::new("");
    let child = recorder("child", true, &log);
    node.add_child(&child);
    let hook_log = log.clone();
    node.on_message(move |_message, _source| {
        hook_log.send("hook").unwrap();
        true
    });

    assert!(node.dispatch(&probe("/anything"), &source()));
    check!(seen.try_recv() == Ok("child"));
    check!(seen.try_recv().is_err());
}

#[test]
fn dropped_handlers_heal_on_the_next_dispatch() {
    let (log, seen) = unbounded();
    let mut node = DispatchNode::new("");
    let keep = recorder("keep", false, &log);
    {
        let transient = recorder("gone", true, &log);
        node.add_child(&transient);
        node.add_child(&keep);
        check!(node.child_count() == 2);
    }
    check!(node.child_count() == 1);

    assert!(!node.dispatch(&probe("/anything"), &source()));
    check!(seen.try_recv() == Ok("keep"));
    check!(seen.try_recv().is_err());
    check!(node.child_count() == 1);
}

#[test]
fn remove_child_detaches_by_identity() {
    let (log, seen) = unbounded();
    let mut node = DispatchNode::new("");
    let left = recorder("left", false, &log);
    let right = recorder("right", false, &log);
    node.add_child(&left);
    node.add_child(&right);

    node.remove_child(&left);
    check!(node.child_count() == 1);
    node.remove_child(&left);
    check!(node.child_count() == 1);

    assert!(!node.dispatch(&probe("/anything"), &source()));
    check!(seen.try_recv() == Ok("right"));
    check!(seen.try_recv().is_err());
}

#[test]
fn remove_all_children_leaves_the_hook() {
    let (log, seen) = unbounded();
    let mut node = DispatchNode::new("");
    let first = recorder("first", true, &log);
    let second = recorder("second", true, &log);
    node.add_child(&first);
    node.add_child(&second);
    let hook_log = log.clone();
    node.on_message(move |_message, _source| {
        hook_log.send("hook").unwrap();
        true
    });

    node.remove_all_children();
    check!(node.child_count() == 0);
    assert!(node.dispatch(&probe("/anything"), &source()));
    check!(seen.try_recv() == Ok("hook"));
    check!(seen.try_recv().is_err());
}

#[test]
fn nodes_nest_depth_first() {
    let (log, seen) = unbounded();
    let mut root = DispatchNode::new("");
    let inner = Arc::new(Mutex::new(DispatchNode::new("")));
    let leaf = recorder("leaf", true, &log);
    inner.lock().unwrap().add_child(&leaf);
    let after = recorder("after", false, &log);
    root.add_child(&inner);
    root.add_child(&after);

    assert!(root.dispatch(&probe("/anything"), &source()));
    check!(seen.try_recv() == Ok("leaf"));
    check!(seen.try_recv().is_err());
}

#[test]
fn prefix_is_stamped_once_at_attach() {
    let (tx, seen) = unbounded();
    let mut node = DispatchNode::new("/studio");
    let volume = Arc::new(Mutex::new(ChannelVolume {
        root_address: "/channel/1".to_string(),
        seen: tx,
    }));
    node.add_child_prefixed(&volume);
    check!(volume.lock().unwrap().root_address() == "/studio/channel/1");

    assert!(node.dispatch(&float_probe("/studio/channel/1/volume", 0.8), &source()));
    check!(seen.try_recv() == Ok(0.8));

    // Renaming the node later does not restamp already-attached children.
    node.set_root_address("/renamed".to_string());
    assert!(node.dispatch(&float_probe("/studio/channel/1/volume", 0.2), &source()));
    check!(seen.try_recv() == Ok(0.2));
    check!(!node.dispatch(&float_probe("/renamed/channel/1/volume", 0.5), &source()));
}

#[test]
fn hook_state_accumulates_across_dispatches() {
    let count = Arc::new(AtomicUsize::new(0));
    let mut node = DispatchNode::new("");
    let hook_count = Arc::clone(&count);
    node.on_message(move |_message, _source| {
        hook_count.fetch_add(1, Ordering::SeqCst);
        false
    });

    check!(!node.dispatch(&probe("/one"), &source()));
    check!(!node.dispatch(&probe("/two"), &source()));
    assert!(count.load(Ordering::SeqCst) == 2);
}

#[test]
fn source_reaches_the_handlers() {
    let (tx, seen) = unbounded();
    let mut node = DispatchNode::new("");
    node.on_message(move |_message, source| {
        tx.send(source.url()).unwrap();
        true
    });

    assert!(node.dispatch(&probe("/anything"), &source()));
    check!(seen.try_recv().as_deref() == Ok("osc.udp://10.0.0.5:8000/"));
}
