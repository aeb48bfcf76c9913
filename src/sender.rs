use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

use rosc::{OscPacket, encoder};
use tracing::debug;

use crate::builder::{MessageBuilder, Packet};
use crate::error::{Error, ProtocolStateError, TransportError};
use crate::time::TimeTag;
use crate::types::Value;

struct Destination {
    hostname: String,
    port: u16,
    resolved: SocketAddr,
}

/// Builds OSC messages and bundles and sends them to one UDP endpoint.
///
/// Wraps a [`MessageBuilder`] together with a destination, so the
/// assembly calls chain straight into [`OscSender::send`]. The
/// destination can be re-targeted at any time with [`OscSender::setup`];
/// multicast group addresses are accepted like any other. Sending is fire
/// and forget: the completed unit is consumed whether or not the datagram
/// goes out.
pub struct OscSender {
    builder: MessageBuilder,
    socket: Option<UdpSocket>,
    destination: Option<Destination>,
}

impl OscSender {
    pub fn new() -> Self {
        OscSender {
            builder: MessageBuilder::new(),
            socket: None,
            destination: None,
        }
    }

    pub fn with_destination(host: &str, port: u16) -> Result<Self, TransportError> {
        let mut sender = Self::new();
        sender.setup(host, port)?;
        Ok(sender)
    }

    /// Points the sender at `host:port`, binding a fresh local socket of
    /// the matching address family.
    pub fn setup(&mut self, host: &str, port: u16) -> Result<(), TransportError> {
        let resolved = (host, port)
            .to_socket_addrs()
            .map_err(|err| TransportError::BadAddress(format!("{host}:{port} ({err})")))?
            .next()
            .ok_or_else(|| TransportError::BadAddress(format!("{host}:{port}")))?;
        let local = if resolved.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };
        let socket = UdpSocket::bind(local).map_err(|source| TransportError::Bind {
            addr: local.to_string(),
            source,
        })?;
        self.socket = Some(socket);
        self.destination = Some(Destination {
            hostname: host.to_string(),
            port,
            resolved,
        });
        Ok(())
    }

    pub fn hostname(&self) -> Option<&str> {
        self.destination.as_ref().map(|d| d.hostname.as_str())
    }

    pub fn port(&self) -> Option<u16> {
        self.destination.as_ref().map(|d| d.port)
    }

    pub fn url(&self) -> Option<String> {
        self.destination
            .as_ref()
            .map(|d| format!("osc.udp://{}:{}/", d.hostname, d.port))
    }

    pub fn begin_message(
        &mut self,
        address: impl Into<String>,
    ) -> Result<&mut Self, ProtocolStateError> {
        self.builder.begin_message(address)?;
        Ok(self)
    }

    pub fn add(&mut self, value: impl Into<Value>) -> Result<&mut Self, ProtocolStateError> {
        self.builder.add(value)?;
        Ok(self)
    }

    pub fn end_message(&mut self) -> Result<&mut Self, ProtocolStateError> {
        self.builder.end_message()?;
        Ok(self)
    }

    pub fn begin_bundle(&mut self) -> Result<&mut Self, ProtocolStateError> {
        self.builder.begin_bundle()?;
        Ok(self)
    }

    pub fn begin_bundle_at(&mut self, time_tag: TimeTag) -> Result<&mut Self, ProtocolStateError> {
        self.builder.begin_bundle_at(time_tag)?;
        Ok(self)
    }

    pub fn end_bundle(&mut self) -> Result<&mut Self, ProtocolStateError> {
        self.builder.end_bundle()?;
        Ok(self)
    }

    pub fn is_message_in_progress(&self) -> bool {
        self.builder.is_message_in_progress()
    }

    pub fn is_bundle_in_progress(&self) -> bool {
        self.builder.is_bundle_in_progress()
    }

    pub fn bundle_depth(&self) -> usize {
        self.builder.bundle_depth()
    }

    pub fn pending(&self) -> Option<&Packet> {
        self.builder.pending()
    }

    /// Discards whatever has been assembled. Always legal.
    pub fn clear(&mut self) {
        self.builder.clear();
    }

    /// Encodes the completed unit and sends it as one datagram. Returns
    /// the number of bytes sent.
    ///
    /// The destination is checked before the unit is taken, so a sender
    /// that was never set up keeps its work. Once taken the unit is gone
    /// even if the datagram cannot be encoded or sent.
    pub fn send(&mut self) -> Result<usize, Error> {
        let (socket, target) = match (&self.socket, &self.destination) {
            (Some(socket), Some(destination)) => (socket, destination.resolved),
            _ => return Err(ProtocolStateError::DestinationNotSet.into()),
        };
        let packet = self.builder.finish()?;
        let bytes = encoder::encode(&OscPacket::from(packet)).map_err(TransportError::Codec)?;
        let sent = socket.send_to(&bytes, target).map_err(TransportError::Send)?;
        debug!("sent {sent} bytes to {target}");
        Ok(sent)
    }
}

impl Default for OscSender {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OscSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.builder.pending() {
            Some(packet) => write!(f, "{packet}"),
            None => write!(f, "nothing pending"),
        }
    }
}
