use std::fmt;

use rosc::{OscMidiMessage, OscType};

use crate::error::TransportError;
use crate::time::TimeTag;

/// A four-byte MIDI event carried as an OSC argument.
///
/// Bytes are kept in wire order (port id, status, data1, data2). The
/// numeric view is fixed to big-endian so it reads the same on every
/// platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MidiMessage {
    pub bytes: [u8; 4],
}

impl MidiMessage {
    pub fn new(bytes: [u8; 4]) -> Self {
        MidiMessage { bytes }
    }

    /// The same event with its bytes in the opposite order.
    pub fn reversed(self) -> Self {
        let mut bytes = self.bytes;
        bytes.reverse();
        MidiMessage { bytes }
    }

    /// The wire bytes packed big-endian.
    pub fn as_u32(self) -> u32 {
        u32::from_be_bytes(self.bytes)
    }
}

impl From<[u8; 4]> for MidiMessage {
    fn from(bytes: [u8; 4]) -> Self {
        MidiMessage { bytes }
    }
}

impl From<u32> for MidiMessage {
    fn from(word: u32) -> Self {
        MidiMessage {
            bytes: word.to_be_bytes(),
        }
    }
}

impl fmt::Display for MidiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.bytes;
        write!(f, "[{a:02x} {b:02x} {c:02x} {d:02x}]")
    }
}

impl From<MidiMessage> for OscMidiMessage {
    fn from(midi: MidiMessage) -> Self {
        OscMidiMessage {
            port: midi.bytes[0],
            status: midi.bytes[1],
            data1: midi.bytes[2],
            data2: midi.bytes[3],
        }
    }
}

impl From<OscMidiMessage> for MidiMessage {
    fn from(midi: OscMidiMessage) -> Self {
        MidiMessage {
            bytes: [midi.port, midi.status, midi.data1, midi.data2],
        }
    }
}

/// One OSC argument.
///
/// The variant fully determines the type-tag character and which strict
/// accessor on a received message succeeds. Text and blob payloads are
/// owned. `Symbol` carries the same payload as `String` under a distinct
/// tag; the wire codec has no symbol representation, so a `Symbol` sent
/// over UDP arrives as a plain string.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Char(char),
    Nil,
    Infinitum,
    Int32(i32),
    Int64(i64),
    Float(f32),
    Double(f64),
    String(String),
    Symbol(String),
    Midi(MidiMessage),
    Time(TimeTag),
    Blob(Vec<u8>),
}

impl Value {
    /// Builds a `Symbol`; plain `From<&str>` builds a `String`.
    pub fn symbol(text: impl Into<String>) -> Self {
        Value::Symbol(text.into())
    }

    /// The type-tag character for this argument.
    pub fn type_tag(&self) -> char {
        match self {
            Value::Bool(true) => 'T',
            Value::Bool(false) => 'F',
            Value::Char(_) => 'c',
            Value::Nil => 'N',
            Value::Infinitum => 'I',
            Value::Int32(_) => 'i',
            Value::Int64(_) => 'h',
            Value::Float(_) => 'f',
            Value::Double(_) => 'd',
            Value::String(_) => 's',
            Value::Symbol(_) => 'S',
            Value::Midi(_) => 'm',
            Value::Time(_) => 't',
            Value::Blob(_) => 'b',
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Char(c) => write!(f, "'{c}'"),
            Value::Nil => write!(f, "nil"),
            Value::Infinitum => write!(f, "infinitum"),
            Value::Int32(i) => write!(f, "{i}"),
            Value::Int64(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Double(x) => write!(f, "{x}"),
            Value::String(s) => write!(f, "\"{s}\""),
            Value::Symbol(s) => write!(f, "{s}"),
            Value::Midi(m) => write!(f, "{m}"),
            Value::Time(t) => write!(f, "{t}"),
            Value::Blob(v) => write!(f, "blob({} bytes)", v.len()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<char> for Value {
    fn from(c: char) -> Self {
        Value::Char(c)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int32(i)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int64(i)
    }
}

impl From<f32> for Value {
    fn from(x: f32) -> Self {
        Value::Float(x)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Double(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Value::Blob(bytes)
    }
}

impl From<MidiMessage> for Value {
    fn from(midi: MidiMessage) -> Self {
        Value::Midi(midi)
    }
}

impl From<TimeTag> for Value {
    fn from(tag: TimeTag) -> Self {
        Value::Time(tag)
    }
}

impl From<Value> for OscType {
    fn from(value: Value) -> Self {
        match value {
            Value::Bool(b) => OscType::Bool(b),
            Value::Char(c) => OscType::Char(c),
            Value::Nil => OscType::Nil,
            Value::Infinitum => OscType::Inf,
            Value::Int32(i) => OscType::Int(i),
            Value::Int64(i) => OscType::Long(i),
            Value::Float(x) => OscType::Float(x),
            Value::Double(x) => OscType::Double(x),
            Value::String(s) => OscType::String(s),
            // No 'S' tag in the codec; the text survives, the tag does not.
            Value::Symbol(s) => OscType::String(s),
            Value::Midi(m) => OscType::Midi(m.into()),
            Value::Time(t) => OscType::Time(t.into()),
            Value::Blob(v) => OscType::Blob(v),
        }
    }
}

impl TryFrom<OscType> for Value {
    type Error = TransportError;

    fn try_from(arg: OscType) -> Result<Self, TransportError> {
        match arg {
            OscType::Bool(b) => Ok(Value::Bool(b)),
            OscType::Char(c) => Ok(Value::Char(c)),
            OscType::Nil => Ok(Value::Nil),
            OscType::Inf => Ok(Value::Infinitum),
            OscType::Int(i) => Ok(Value::Int32(i)),
            OscType::Long(i) => Ok(Value::Int64(i)),
            OscType::Float(x) => Ok(Value::Float(x)),
            OscType::Double(x) => Ok(Value::Double(x)),
            OscType::String(s) => Ok(Value::String(s)),
            OscType::Midi(m) => Ok(Value::Midi(m.into())),
            OscType::Time(t) => Ok(Value::Time(t.into())),
            OscType::Blob(v) => Ok(Value::Blob(v)),
            other => Err(TransportError::Unsupported(format!("{other:?}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert2::check;

    use super::*;

    #[test]
    fn type_tags_cover_the_vocabulary() {
        let args = [
            Value::Bool(true),
            Value::Bool(false),
            Value::Char('x'),
            Value::Nil,
            Value::Infinitum,
            Value::Int32(1),
            Value::Int64(1),
            Value::Float(1.0),
            Value::Double(1.0),
            Value::from("text"),
            Value::symbol("text"),
            Value::Midi(MidiMessage::new([0, 0x90, 0x3E, 0x60])),
            Value::Time(TimeTag::immediate()),
            Value::Blob(vec![1, 2, 3]),
        ];
        let tags: String = args.iter().map(Value::type_tag).collect();
        check!(tags == "TFcNIihfdsSmtb");
    }

    #[test]
    fn midi_numeric_view_is_big_endian() {
        let midi = MidiMessage::new([0x7F, 0x90, 0x3E, 0x60]);
        check!(midi.as_u32() == 0x7F90_3E60);
        check!(MidiMessage::from(0x7F90_3E60u32) == midi);
        check!(midi.reversed().bytes == [0x60, 0x3E, 0x90, 0x7F]);
    }

    #[test]
    fn midi_wire_fields_map_positionally() {
        let wire = OscMidiMessage::from(MidiMessage::new([1, 2, 3, 4]));
        check!(wire.port == 1);
        check!(wire.status == 2);
        check!(wire.data1 == 3);
        check!(wire.data2 == 4);
        check!(MidiMessage::from(wire).bytes == [1, 2, 3, 4]);
    }

    #[test]
    fn symbol_degrades_to_a_wire_string() {
        let arg = OscType::from(Value::symbol("free"));
        check!(arg == OscType::String("free".to_string()));
    }

    #[test]
    fn unmodeled_wire_arguments_are_rejected() {
        let colored = OscType::Color(rosc::OscColor {
            red: 1,
            green: 2,
            blue: 3,
            alpha: 4,
        });
        check!(Value::try_from(colored).is_err());
    }
}
