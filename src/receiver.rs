use std::io;
use std::net::{Ipv4Addr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rosc::{OscPacket, decoder};
use tracing::{error, warn};

use crate::dispatch::{DispatchNode, Handler};
use crate::error::TransportError;
use crate::message::{MessageSource, ReceivedMessage};
use crate::time::TimeTag;

/// How long the background loop blocks in one receive before rechecking
/// its stop flag.
const LOOP_TIMEOUT: Duration = Duration::from_millis(200);

/// Listens for OSC over UDP and feeds a dispatch tree.
///
/// After [`OscReceiver::setup`] (or [`OscReceiver::setup_multicast`]) the
/// receiver drains its socket in one of two mutually exclusive ways: a
/// background thread started with [`OscReceiver::start`], or manual polls
/// of [`OscReceiver::handle_messages`]. Polling while the thread runs is
/// refused with a warning rather than an error, since the messages are
/// being handled either way.
///
/// Incoming bundles are flattened: every contained message is dispatched
/// in order, stamped with its innermost enclosing bundle's time tag. A
/// bare message carries the immediate tag.
pub struct OscReceiver {
    root: Arc<Mutex<DispatchNode>>,
    socket: Option<Arc<UdpSocket>>,
    multicast_group: Option<Ipv4Addr>,
    running: Arc<AtomicBool>,
    ignore: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    last_error: Arc<Mutex<Option<TransportError>>>,
}

impl OscReceiver {
    /// A receiver with no socket yet. `root_address` scopes every handler
    /// attached later; pass `""` for none.
    pub fn new(root_address: impl Into<String>) -> Self {
        OscReceiver {
            root: Arc::new(Mutex::new(DispatchNode::new(root_address))),
            socket: None,
            multicast_group: None,
            running: Arc::new(AtomicBool::new(false)),
            ignore: Arc::new(AtomicBool::new(false)),
            thread: None,
            last_error: Arc::new(Mutex::new(None)),
        }
    }

    /// A receiver already bound to `port`. Port 0 picks an ephemeral
    /// port, readable back through [`OscReceiver::port`].
    pub fn bind(port: u16) -> Result<Self, TransportError> {
        let mut receiver = Self::new("");
        receiver.setup(port)?;
        Ok(receiver)
    }

    /// A receiver already subscribed to a multicast group.
    pub fn bind_multicast(group: &str, port: u16) -> Result<Self, TransportError> {
        let mut receiver = Self::new("");
        receiver.setup_multicast(group, port)?;
        Ok(receiver)
    }

    /// Binds the receive socket. Stops any running thread and replaces a
    /// previous socket.
    pub fn setup(&mut self, port: u16) -> Result<(), TransportError> {
        self.stop();
        let addr = format!("0.0.0.0:{port}");
        let socket = UdpSocket::bind(&addr).map_err(|source| TransportError::Bind {
            addr: addr.clone(),
            source,
        })?;
        self.socket = Some(Arc::new(socket));
        self.multicast_group = None;
        Ok(())
    }

    /// Binds the receive socket and joins a multicast group.
    pub fn setup_multicast(&mut self, group: &str, port: u16) -> Result<(), TransportError> {
        let group: Ipv4Addr = group
            .parse()
            .map_err(|_| TransportError::BadAddress(group.to_string()))?;
        if !group.is_multicast() {
            return Err(TransportError::BadAddress(format!(
                "{group} is not a multicast group"
            )));
        }
        self.setup(port)?;
        let socket = self.socket.as_ref().unwrap();
        socket
            .join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED)
            .map_err(|source| TransportError::Bind {
                addr: format!("{group}:{port}"),
                source,
            })?;
        self.multicast_group = Some(group);
        Ok(())
    }

    /// Stops listening and releases the socket.
    pub fn clear(&mut self) {
        self.stop();
        self.socket = None;
        self.multicast_group = None;
    }

    /// Spawns the background listening thread. A second call while it
    /// runs is a warned no-op.
    pub fn start(&mut self) -> Result<(), TransportError> {
        let socket = self.socket.as_ref().ok_or(TransportError::NotSetUp)?;
        if self.running.load(Ordering::SeqCst) {
            warn!("receiver is already listening");
            return Ok(());
        }
        socket
            .set_nonblocking(false)
            .and_then(|_| socket.set_read_timeout(Some(LOOP_TIMEOUT)))
            .map_err(TransportError::Recv)?;
        self.running.store(true, Ordering::SeqCst);
        let socket = Arc::clone(socket);
        let root = Arc::clone(&self.root);
        let running = Arc::clone(&self.running);
        let ignore = Arc::clone(&self.ignore);
        let last_error = Arc::clone(&self.last_error);
        self.thread = Some(thread::spawn(move || {
            run_loop(&socket, &root, &running, &ignore, &last_error);
        }));
        Ok(())
    }

    /// Stops the background thread if it is running and resets the
    /// ignore flag. Safe to call from inside a handler; the join is then
    /// skipped and the loop winds down on its own.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.ignore.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread.take() {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            let _ = handle.join();
        }
    }

    pub fn is_listening(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Receives and dispatches at most one datagram, blocking up to
    /// `timeout_ms` (0 polls without blocking). Returns the datagram's
    /// size in bytes, or 0 when nothing arrived in time. Malformed
    /// packets are logged and count as handled.
    pub fn handle_messages(&mut self, timeout_ms: u32) -> Result<usize, TransportError> {
        let socket = self.socket.as_ref().ok_or(TransportError::NotSetUp)?;
        if self.running.load(Ordering::SeqCst) {
            warn!("background thread is listening; handle_messages does nothing");
            return Ok(0);
        }
        if timeout_ms == 0 {
            socket.set_nonblocking(true).map_err(TransportError::Recv)?;
        } else {
            socket
                .set_nonblocking(false)
                .and_then(|_| {
                    socket.set_read_timeout(Some(Duration::from_millis(u64::from(timeout_ms))))
                })
                .map_err(TransportError::Recv)?;
        }
        let mut buf = [0u8; decoder::MTU];
        let (size, from) = match socket.recv_from(&mut buf) {
            Ok(received) => received,
            Err(err) if would_block(&err) => return Ok(0),
            Err(err) => return Err(TransportError::Recv(err)),
        };
        match decoder::decode_udp(&buf[..size]) {
            Ok((_, packet)) => {
                if !self.ignore.load(Ordering::SeqCst) {
                    let source = MessageSource::from(from);
                    dispatch_packet(&self.root, packet, &source, TimeTag::immediate());
                }
            }
            Err(err) => warn!("dropping malformed packet from {from}: {err:?}"),
        }
        Ok(size)
    }

    /// While set, decoded packets are dropped without dispatch.
    /// [`OscReceiver::stop`] resets it.
    pub fn ignore_messages(&mut self, ignore: bool) {
        self.ignore.store(ignore, Ordering::SeqCst);
    }

    pub fn is_ignoring(&self) -> bool {
        self.ignore.load(Ordering::SeqCst)
    }

    pub fn root_address(&self) -> String {
        self.root.lock().unwrap().root_address().to_string()
    }

    pub fn set_root_address(&mut self, address: impl Into<String>) {
        self.root.lock().unwrap().set_root_address(address.into());
    }

    /// Attaches a handler to the back of the dispatch order, stamping
    /// this receiver's root address onto it.
    pub fn add_handler<H>(&mut self, handler: &Arc<Mutex<H>>)
    where
        H: Handler + 'static,
    {
        self.root.lock().unwrap().add_child_prefixed(handler);
    }

    pub fn remove_handler<H>(&mut self, handler: &Arc<Mutex<H>>)
    where
        H: Handler + 'static,
    {
        self.root.lock().unwrap().remove_child(handler);
    }

    pub fn remove_all_handlers(&mut self) {
        self.root.lock().unwrap().remove_all_children();
    }

    pub fn handler_count(&self) -> usize {
        self.root.lock().unwrap().child_count()
    }

    /// Installs the receiver-level hook, offered a message only after
    /// every attached handler has declined it.
    pub fn on_message<F>(&mut self, hook: F)
    where
        F: FnMut(&ReceivedMessage, &MessageSource) -> bool + Send + 'static,
    {
        self.root.lock().unwrap().on_message(hook);
    }

    pub fn hostname(&self) -> Option<String> {
        self.local_addr().map(|addr| addr.ip().to_string())
    }

    pub fn port(&self) -> Option<u16> {
        self.local_addr().map(|addr| addr.port())
    }

    pub fn url(&self) -> Option<String> {
        self.local_addr()
            .map(|addr| format!("osc.udp://{}:{}/", addr.ip(), addr.port()))
    }

    pub fn is_multicast(&self) -> bool {
        self.multicast_group.is_some()
    }

    /// The error that killed the background loop, if one did.
    pub fn take_last_error(&mut self) -> Option<TransportError> {
        self.last_error.lock().unwrap().take()
    }

    fn local_addr(&self) -> Option<std::net::SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }
}

impl Drop for OscReceiver {
    fn drop(&mut self) {
        self.stop();
    }
}

fn would_block(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

fn run_loop(
    socket: &UdpSocket,
    root: &Mutex<DispatchNode>,
    running: &AtomicBool,
    ignore: &AtomicBool,
    last_error: &Mutex<Option<TransportError>>,
) {
    let mut buf = [0u8; decoder::MTU];
    while running.load(Ordering::SeqCst) {
        let (size, from) = match socket.recv_from(&mut buf) {
            Ok(received) => received,
            Err(err) if would_block(&err) => continue,
            Err(err) => {
                error!("receive loop died: {err}");
                *last_error.lock().unwrap() = Some(TransportError::Recv(err));
                running.store(false, Ordering::SeqCst);
                break;
            }
        };
        match decoder::decode_udp(&buf[..size]) {
            Ok((_, packet)) => {
                if ignore.load(Ordering::SeqCst) {
                    continue;
                }
                let source = MessageSource::from(from);
                dispatch_packet(root, packet, &source, TimeTag::immediate());
            }
            Err(err) => warn!("dropping malformed packet from {from}: {err:?}"),
        }
    }
}

/// Recursively dispatches a decoded packet, stamping each message with
/// the innermost enclosing bundle's time tag.
fn dispatch_packet(
    root: &Mutex<DispatchNode>,
    packet: OscPacket,
    source: &MessageSource,
    time_tag: TimeTag,
) {
    match packet {
        OscPacket::Message(message) => match ReceivedMessage::from_wire(message, time_tag) {
            Ok(received) => {
                root.lock().unwrap().dispatch(&received, source);
            }
            Err(err) => warn!("skipping message: {err}"),
        },
        OscPacket::Bundle(bundle) => {
            let tag = TimeTag::from(bundle.timetag);
            for inner in bundle.content {
                dispatch_packet(root, inner, source, tag);
            }
        }
    }
}
