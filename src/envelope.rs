//! The `{ "Type": ..., "Data": ... }` envelope wrapping every frame.
//!
//! Decoding is two-phase. [`Envelope::decode`] parses only the outer object
//! and keeps `Data` as an untyped [`serde_json::Value`]; the payload is
//! decoded into a concrete type later with [`Envelope::payload`], once the
//! router has looked the tag up.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{GameLinkError, Result};
use crate::protocol::Message;

/// One framed message. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "Type")]
    message_type: String,
    #[serde(rename = "Data", default = "empty_object")]
    data: Value,
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

impl Envelope {
    /// Wrap a typed payload.
    ///
    /// # Errors
    ///
    /// Returns [`GameLinkError::Serialization`] if the payload cannot be
    /// represented as JSON.
    pub fn new<M: Message>(payload: &M) -> Result<Self> {
        Ok(Self {
            message_type: M::TYPE.as_str().to_owned(),
            data: serde_json::to_value(payload)?,
        })
    }

    /// Parse the outer envelope of an inbound text frame.
    ///
    /// `Data` may be absent or `null`; both decode as an empty object so
    /// payload-less tags such as `Heartbeat` work either way.
    ///
    /// # Errors
    ///
    /// Returns [`GameLinkError::MalformedEnvelope`] if the text is not a JSON
    /// object or has no string `Type`.
    pub fn decode(text: &str) -> Result<Self> {
        let mut envelope: Envelope = serde_json::from_str(text)
            .map_err(|e| GameLinkError::MalformedEnvelope(e.to_string()))?;
        if envelope.message_type.is_empty() {
            return Err(GameLinkError::MalformedEnvelope("empty Type".into()));
        }
        if envelope.data.is_null() {
            envelope.data = empty_object();
        }
        Ok(envelope)
    }

    /// Serialize as a single text frame.
    ///
    /// # Errors
    ///
    /// Returns [`GameLinkError::Serialization`] on JSON failure.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// The raw tag string.
    pub fn message_type(&self) -> &str {
        &self.message_type
    }

    /// The untyped payload.
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Split into tag and payload without cloning.
    pub fn into_parts(self) -> (String, Value) {
        (self.message_type, self.data)
    }

    /// Second decode phase: interpret `Data` as `M`.
    ///
    /// # Errors
    ///
    /// Returns [`GameLinkError::PayloadDecode`] if `Data` does not match the
    /// schema of `M`.
    pub fn payload<M: Message>(&self) -> Result<M> {
        decode_payload(&self.message_type, self.data.clone())
    }
}

/// Decode an already-extracted `Data` value as `M`.
pub(crate) fn decode_payload<M: Message>(tag: &str, data: Value) -> Result<M> {
    serde_json::from_value(data).map_err(|source| GameLinkError::PayloadDecode {
        tag: tag.to_owned(),
        source,
    })
}

/// Wrap `payload` with its tag and serialize the whole envelope as one frame.
///
/// # Errors
///
/// Returns [`GameLinkError::Serialization`] on JSON failure.
pub fn encode_envelope<M: Message>(payload: &M) -> Result<String> {
    Envelope::new(payload)?.encode()
}
