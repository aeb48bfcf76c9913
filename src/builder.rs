use std::fmt;

use rosc::{OscBundle, OscMessage, OscPacket, OscType};

use crate::error::ProtocolStateError;
use crate::time::TimeTag;
use crate::types::Value;

/// A message assembled by the builder: address pattern plus arguments in
/// wire order.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingMessage {
    pub address: String,
    pub args: Vec<Value>,
}

/// A bundle assembled by the builder: time tag plus ordered contents.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingBundle {
    pub time_tag: TimeTag,
    pub contents: Vec<Packet>,
}

/// One completed transmission unit, a message or a bundle tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Message(PendingMessage),
    Bundle(PendingBundle),
}

impl From<Packet> for OscPacket {
    fn from(packet: Packet) -> Self {
        match packet {
            Packet::Message(message) => OscPacket::Message(OscMessage {
                addr: message.address,
                args: message.args.into_iter().map(OscType::from).collect(),
            }),
            Packet::Bundle(bundle) => OscPacket::Bundle(OscBundle {
                timetag: bundle.time_tag.into(),
                content: bundle.contents.into_iter().map(OscPacket::from).collect(),
            }),
        }
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Packet::Message(message) => {
                let tags: String = message.args.iter().map(Value::type_tag).collect();
                write!(f, "{} \"{}\"", message.address, tags)?;
                for (at, arg) in message.args.iter().enumerate() {
                    write!(f, "\n  [{at}] {arg}")?;
                }
                Ok(())
            }
            Packet::Bundle(bundle) => {
                write!(
                    f,
                    "#bundle {} [{} items]",
                    bundle.time_tag,
                    bundle.contents.len()
                )?;
                for item in &bundle.contents {
                    write!(f, "\n  {item}")?;
                }
                Ok(())
            }
        }
    }
}

/// Incremental assembly of one message or one arbitrarily nested bundle.
///
/// Every begin has exactly one matching end. A completed standalone unit
/// parks in the builder until [`MessageBuilder::finish`] hands it over;
/// completing another standalone unit replaces the parked one. Rejected
/// operations leave the builder exactly as it was, so a sequencing error
/// can be recovered with [`MessageBuilder::clear`] or by completing the
/// open work.
///
/// Operations return `&mut Self` on success and chain with `?`:
///
/// ```
/// # use osckit::MessageBuilder;
/// # fn demo() -> Result<(), osckit::ProtocolStateError> {
/// let mut builder = MessageBuilder::new();
/// builder
///     .begin_message("/mixer/volume")?
///     .add(3i32)?
///     .add(0.8f32)?
///     .end_message()?;
/// let packet = builder.finish()?;
/// # let _ = packet;
/// # Ok(())
/// # }
/// # demo().unwrap();
/// ```
#[derive(Debug, Default)]
pub struct MessageBuilder {
    bundles: Vec<PendingBundle>,
    message: Option<PendingMessage>,
    completed: Option<Packet>,
}

impl MessageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a message addressed to `address`.
    pub fn begin_message(
        &mut self,
        address: impl Into<String>,
    ) -> Result<&mut Self, ProtocolStateError> {
        if self.message.is_some() {
            return Err(ProtocolStateError::MessageInProgress);
        }
        self.message = Some(PendingMessage {
            address: address.into(),
            args: Vec::new(),
        });
        Ok(self)
    }

    /// Appends one argument to the open message. Append order is wire
    /// order.
    pub fn add(&mut self, value: impl Into<Value>) -> Result<&mut Self, ProtocolStateError> {
        let message = self
            .message
            .as_mut()
            .ok_or(ProtocolStateError::NoMessageInProgress)?;
        message.args.push(value.into());
        Ok(self)
    }

    /// Closes the open message into the innermost open bundle, or parks
    /// it as the unit to send.
    pub fn end_message(&mut self) -> Result<&mut Self, ProtocolStateError> {
        let message = self
            .message
            .take()
            .ok_or(ProtocolStateError::NoMessageInProgress)?;
        self.attach(Packet::Message(message));
        Ok(self)
    }

    /// Opens a bundle with the immediate time tag.
    pub fn begin_bundle(&mut self) -> Result<&mut Self, ProtocolStateError> {
        self.begin_bundle_at(TimeTag::immediate())
    }

    /// Opens a bundle with an explicit time tag. Bundles nest without
    /// limit.
    pub fn begin_bundle_at(&mut self, time_tag: TimeTag) -> Result<&mut Self, ProtocolStateError> {
        if self.message.is_some() {
            return Err(ProtocolStateError::MessageInProgress);
        }
        self.bundles.push(PendingBundle {
            time_tag,
            contents: Vec::new(),
        });
        Ok(self)
    }

    /// Closes the innermost open bundle into its parent, or parks it as
    /// the unit to send.
    pub fn end_bundle(&mut self) -> Result<&mut Self, ProtocolStateError> {
        if self.message.is_some() {
            return Err(ProtocolStateError::MessageInProgress);
        }
        let bundle = self
            .bundles
            .pop()
            .ok_or(ProtocolStateError::NoBundleInProgress)?;
        self.attach(Packet::Bundle(bundle));
        Ok(self)
    }

    /// Hands over the completed unit and returns the builder to its
    /// pristine state. Fails while a message or bundle is still open, or
    /// when nothing has been completed.
    pub fn finish(&mut self) -> Result<Packet, ProtocolStateError> {
        if self.message.is_some() {
            return Err(ProtocolStateError::MessageInProgress);
        }
        if !self.bundles.is_empty() {
            return Err(ProtocolStateError::BundleInProgress);
        }
        self.completed
            .take()
            .ok_or(ProtocolStateError::NothingToSend)
    }

    /// Discards everything, open or completed. Always legal.
    pub fn clear(&mut self) {
        self.bundles.clear();
        self.message = None;
        self.completed = None;
    }

    pub fn is_message_in_progress(&self) -> bool {
        self.message.is_some()
    }

    pub fn is_bundle_in_progress(&self) -> bool {
        !self.bundles.is_empty()
    }

    pub fn bundle_depth(&self) -> usize {
        self.bundles.len()
    }

    /// The completed unit waiting for [`MessageBuilder::finish`], if any.
    pub fn pending(&self) -> Option<&Packet> {
        self.completed.as_ref()
    }

    fn attach(&mut self, packet: Packet) {
        match self.bundles.last_mut() {
            Some(bundle) => bundle.contents.push(packet),
            None => self.completed = Some(packet),
        }
    }
}
