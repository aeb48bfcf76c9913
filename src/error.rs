use std::io;

use thiserror::Error;

/// Builder or transport lifecycle misuse.
///
/// These indicate a sequencing bug in the caller, not a runtime fault:
/// the operation is rejected and the object is left exactly as it was.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolStateError {
    #[error("a message is already in progress")]
    MessageInProgress,
    #[error("no message is in progress")]
    NoMessageInProgress,
    #[error("a bundle is still in progress")]
    BundleInProgress,
    #[error("no bundle is in progress")]
    NoBundleInProgress,
    #[error("nothing has been completed to send")]
    NothingToSend,
    #[error("no destination has been set")]
    DestinationNotSet,
}

/// A strict accessor asked a received message for something it does not hold.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentError {
    #[error("argument {at}: expected type '{expected}', found '{found}'")]
    TypeMismatch {
        at: usize,
        expected: char,
        found: char,
    },
    #[error("argument index {at} out of range for {len} arguments")]
    OutOfRange { at: usize, len: usize },
}

/// Socket and codec failures at the wire boundary.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("could not bind {addr}: {source}")]
    Bind { addr: String, source: io::Error },
    #[error("could not resolve address: {0}")]
    BadAddress(String),
    #[error("send failed: {0}")]
    Send(io::Error),
    #[error("receive failed: {0}")]
    Recv(io::Error),
    #[error("malformed packet: {0:?}")]
    Codec(rosc::OscError),
    #[error("unsupported argument type: {0}")]
    Unsupported(String),
    #[error("socket has not been set up")]
    NotSetUp,
}

/// Any failure this crate can produce.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    State(#[from] ProtocolStateError),
    #[error(transparent)]
    Argument(#[from] ArgumentError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

pub type Result<T> = std::result::Result<T, Error>;
