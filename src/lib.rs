//! An object model for Open Sound Control over UDP.
//!
//! Outbound, [`MessageBuilder`] assembles messages and arbitrarily nested
//! bundles under a strict begin/end discipline and [`OscSender`] carries
//! them to an endpoint. Inbound, [`OscReceiver`] drains a socket on a
//! background thread or under manual polling and walks a tree of
//! [`Handler`]s with each decoded [`ReceivedMessage`], first claim wins.
//! Wire framing is delegated to the `rosc` codec; this crate is the typed
//! surface above it.

pub mod builder;
pub mod dispatch;
pub mod error;
pub mod message;
pub mod receiver;
pub mod sender;
pub mod time;
pub mod types;

pub use builder::{MessageBuilder, Packet, PendingBundle, PendingMessage};
pub use dispatch::{DispatchNode, Handler};
pub use error::{ArgumentError, Error, ProtocolStateError, Result, TransportError};
pub use message::{MessageSource, ReceivedMessage};
pub use receiver::OscReceiver;
pub use sender::OscSender;
pub use time::TimeTag;
pub use types::{MidiMessage, Value};
