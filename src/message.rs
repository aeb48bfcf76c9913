use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::error::{ArgumentError, TransportError};
use crate::time::TimeTag;
use crate::types::{MidiMessage, Value};

/// The remote endpoint a message arrived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageSource {
    hostname: String,
    port: u16,
}

impl MessageSource {
    pub fn new(hostname: impl Into<String>, port: u16) -> Self {
        MessageSource {
            hostname: hostname.into(),
            port,
        }
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn url(&self) -> String {
        format!("osc.udp://{}:{}/", self.hostname, self.port)
    }
}

impl From<SocketAddr> for MessageSource {
    fn from(addr: SocketAddr) -> Self {
        MessageSource {
            hostname: addr.ip().to_string(),
            port: addr.port(),
        }
    }
}

impl fmt::Display for MessageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url())
    }
}

/// An immutable view over one decoded OSC message.
///
/// Carries the address pattern, the type-tag string, the typed arguments
/// and the time tag the transport stamped on arrival (the innermost
/// enclosing bundle's tag, or immediate for a bare message). Clones share
/// the decoded argument buffer.
///
/// Three accessor families cover routing and extraction: `is_*` probes
/// never fail, `as_*` demands the exact tag and errors otherwise, `try_*`
/// coerces between compatible tags and returns `None` when it cannot.
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    address: String,
    type_tags: String,
    args: Arc<[Value]>,
    time_tag: TimeTag,
}

impl ReceivedMessage {
    pub fn new(address: impl Into<String>, args: Vec<Value>, time_tag: TimeTag) -> Self {
        let type_tags = args.iter().map(Value::type_tag).collect();
        ReceivedMessage {
            address: address.into(),
            type_tags,
            args: args.into(),
            time_tag,
        }
    }

    pub(crate) fn from_wire(
        message: rosc::OscMessage,
        time_tag: TimeTag,
    ) -> Result<Self, TransportError> {
        let mut args = Vec::with_capacity(message.args.len());
        for arg in message.args {
            args.push(Value::try_from(arg)?);
        }
        Ok(Self::new(message.addr, args, time_tag))
    }

    pub fn address_pattern(&self) -> &str {
        &self.address
    }

    /// One tag character per argument, in argument order.
    pub fn type_tags(&self) -> &str {
        &self.type_tags
    }

    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn time_tag(&self) -> TimeTag {
        self.time_tag
    }

    /// The tag character at `at`, or `'*'` when out of range.
    pub fn type_tag_at(&self, at: usize) -> char {
        self.args.get(at).map_or('*', Value::type_tag)
    }

    /// True when both the address pattern and the full type-tag string
    /// match exactly. The usual first line of a handler.
    pub fn check_address_and_types(&self, address: &str, type_tags: &str) -> bool {
        self.address == address && self.type_tags == type_tags
    }

    fn arg(&self, at: usize) -> Option<&Value> {
        self.args.get(at)
    }

    fn checked(&self, at: usize) -> Result<&Value, ArgumentError> {
        self.args.get(at).ok_or(ArgumentError::OutOfRange {
            at,
            len: self.args.len(),
        })
    }

    pub fn is_bool(&self, at: usize) -> bool {
        matches!(self.arg(at), Some(Value::Bool(_)))
    }

    pub fn is_char(&self, at: usize) -> bool {
        matches!(self.arg(at), Some(Value::Char(_)))
    }

    pub fn is_nil(&self, at: usize) -> bool {
        matches!(self.arg(at), Some(Value::Nil))
    }

    pub fn is_infinitum(&self, at: usize) -> bool {
        matches!(self.arg(at), Some(Value::Infinitum))
    }

    pub fn is_int32(&self, at: usize) -> bool {
        matches!(self.arg(at), Some(Value::Int32(_)))
    }

    pub fn is_int64(&self, at: usize) -> bool {
        matches!(self.arg(at), Some(Value::Int64(_)))
    }

    /// Either integer width.
    pub fn is_int(&self, at: usize) -> bool {
        self.is_int32(at) || self.is_int64(at)
    }

    pub fn is_float(&self, at: usize) -> bool {
        matches!(self.arg(at), Some(Value::Float(_)))
    }

    pub fn is_double(&self, at: usize) -> bool {
        matches!(self.arg(at), Some(Value::Double(_)))
    }

    pub fn is_string(&self, at: usize) -> bool {
        matches!(self.arg(at), Some(Value::String(_)))
    }

    pub fn is_symbol(&self, at: usize) -> bool {
        matches!(self.arg(at), Some(Value::Symbol(_)))
    }

    /// String or symbol.
    pub fn is_text(&self, at: usize) -> bool {
        self.is_string(at) || self.is_symbol(at)
    }

    pub fn is_midi(&self, at: usize) -> bool {
        matches!(self.arg(at), Some(Value::Midi(_)))
    }

    pub fn is_time_tag(&self, at: usize) -> bool {
        matches!(self.arg(at), Some(Value::Time(_)))
    }

    pub fn is_blob(&self, at: usize) -> bool {
        matches!(self.arg(at), Some(Value::Blob(_)))
    }

    pub fn as_bool(&self, at: usize) -> Result<bool, ArgumentError> {
        match self.checked(at)? {
            Value::Bool(b) => Ok(*b),
            other => Err(self.mismatch(at, 'T', other)),
        }
    }

    pub fn as_char(&self, at: usize) -> Result<char, ArgumentError> {
        match self.checked(at)? {
            Value::Char(c) => Ok(*c),
            other => Err(self.mismatch(at, 'c', other)),
        }
    }

    pub fn as_nil(&self, at: usize) -> Result<(), ArgumentError> {
        match self.checked(at)? {
            Value::Nil => Ok(()),
            other => Err(self.mismatch(at, 'N', other)),
        }
    }

    pub fn as_infinitum(&self, at: usize) -> Result<(), ArgumentError> {
        match self.checked(at)? {
            Value::Infinitum => Ok(()),
            other => Err(self.mismatch(at, 'I', other)),
        }
    }

    pub fn as_int32(&self, at: usize) -> Result<i32, ArgumentError> {
        match self.checked(at)? {
            Value::Int32(i) => Ok(*i),
            other => Err(self.mismatch(at, 'i', other)),
        }
    }

    pub fn as_int64(&self, at: usize) -> Result<i64, ArgumentError> {
        match self.checked(at)? {
            Value::Int64(i) => Ok(*i),
            other => Err(self.mismatch(at, 'h', other)),
        }
    }

    pub fn as_float(&self, at: usize) -> Result<f32, ArgumentError> {
        match self.checked(at)? {
            Value::Float(x) => Ok(*x),
            other => Err(self.mismatch(at, 'f', other)),
        }
    }

    pub fn as_double(&self, at: usize) -> Result<f64, ArgumentError> {
        match self.checked(at)? {
            Value::Double(x) => Ok(*x),
            other => Err(self.mismatch(at, 'd', other)),
        }
    }

    pub fn as_string(&self, at: usize) -> Result<&str, ArgumentError> {
        match self.checked(at)? {
            Value::String(s) => Ok(s),
            other => Err(self.mismatch(at, 's', other)),
        }
    }

    pub fn as_symbol(&self, at: usize) -> Result<&str, ArgumentError> {
        match self.checked(at)? {
            Value::Symbol(s) => Ok(s),
            other => Err(self.mismatch(at, 'S', other)),
        }
    }

    pub fn as_midi(&self, at: usize) -> Result<MidiMessage, ArgumentError> {
        match self.checked(at)? {
            Value::Midi(m) => Ok(*m),
            other => Err(self.mismatch(at, 'm', other)),
        }
    }

    pub fn as_time_tag(&self, at: usize) -> Result<TimeTag, ArgumentError> {
        match self.checked(at)? {
            Value::Time(t) => Ok(*t),
            other => Err(self.mismatch(at, 't', other)),
        }
    }

    pub fn as_blob(&self, at: usize) -> Result<&[u8], ArgumentError> {
        match self.checked(at)? {
            Value::Blob(v) => Ok(v),
            other => Err(self.mismatch(at, 'b', other)),
        }
    }

    /// Reads any of T, F, i, h, f, d as a truth value. Numerics are true
    /// when nonzero.
    pub fn try_bool(&self, at: usize) -> Option<bool> {
        match self.arg(at)? {
            Value::Bool(b) => Some(*b),
            Value::Int32(i) => Some(*i != 0),
            Value::Int64(i) => Some(*i != 0),
            Value::Float(x) => Some(*x != 0.0),
            Value::Double(x) => Some(*x != 0.0),
            _ => None,
        }
    }

    /// Reads c directly, or the low byte of an integer argument.
    pub fn try_char(&self, at: usize) -> Option<char> {
        match self.arg(at)? {
            Value::Char(c) => Some(*c),
            Value::Int32(i) => Some(*i as u8 as char),
            Value::Int64(i) => Some(*i as u8 as char),
            _ => None,
        }
    }

    pub fn try_int32(&self, at: usize) -> Option<i32> {
        match self.arg(at)? {
            Value::Bool(b) => Some(i32::from(*b)),
            Value::Int32(i) => Some(*i),
            Value::Int64(i) => Some(*i as i32),
            Value::Float(x) => Some(*x as i32),
            Value::Double(x) => Some(*x as i32),
            _ => None,
        }
    }

    pub fn try_int64(&self, at: usize) -> Option<i64> {
        match self.arg(at)? {
            Value::Bool(b) => Some(i64::from(*b)),
            Value::Int32(i) => Some(i64::from(*i)),
            Value::Int64(i) => Some(*i),
            Value::Float(x) => Some(*x as i64),
            Value::Double(x) => Some(*x as i64),
            _ => None,
        }
    }

    pub fn try_float(&self, at: usize) -> Option<f32> {
        match self.arg(at)? {
            Value::Bool(b) => Some(f32::from(*b)),
            Value::Int32(i) => Some(*i as f32),
            Value::Int64(i) => Some(*i as f32),
            Value::Float(x) => Some(*x),
            Value::Double(x) => Some(*x as f32),
            _ => None,
        }
    }

    pub fn try_double(&self, at: usize) -> Option<f64> {
        match self.arg(at)? {
            Value::Bool(b) => Some(f64::from(*b)),
            Value::Int32(i) => Some(f64::from(*i)),
            Value::Int64(i) => Some(*i as f64),
            Value::Float(x) => Some(f64::from(*x)),
            Value::Double(x) => Some(*x),
            _ => None,
        }
    }

    /// Reads either text tag, s or S.
    pub fn try_string(&self, at: usize) -> Option<&str> {
        match self.arg(at)? {
            Value::String(s) | Value::Symbol(s) => Some(s),
            _ => None,
        }
    }

    fn mismatch(&self, at: usize, expected: char, found: &Value) -> ArgumentError {
        ArgumentError::TypeMismatch {
            at,
            expected,
            found: found.type_tag(),
        }
    }
}

impl fmt::Display for ReceivedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} \"{}\"", self.address, self.type_tags)?;
        if !self.time_tag.is_immediate() {
            write!(f, " at {}", self.time_tag)?;
        }
        for (at, arg) in self.args.iter().enumerate() {
            write!(f, "\n  [{at}] {arg}")?;
        }
        Ok(())
    }
}
