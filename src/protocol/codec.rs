//! Envelope encoding and decoding.
//!
//! Pure functions, no I/O. The name/number compatibility shim for
//! [`MessageKind`] lives here and nowhere else.

use serde::de::{self, DeserializeOwned, Deserializer, Unexpected, Visitor};
use serde::{Deserialize, Serialize, Serializer};

use super::{Envelope, Header, MessageKind};
use crate::error::BridgeError;

/// A message kind as a caller may supply it to [`encode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindRef<'a> {
    /// Already canonical.
    Kind(MessageKind),
    /// Wire name, matched case-insensitively.
    Name(&'a str),
    /// Numeric code.
    Code(u64),
}

impl KindRef<'_> {
    /// Resolve to the canonical kind.
    pub fn normalize(self) -> Result<MessageKind, BridgeError> {
        match self {
            Self::Kind(kind) => Ok(kind),
            Self::Name(name) => MessageKind::from_name(&name.to_ascii_uppercase())
                .ok_or_else(|| BridgeError::malformed(format!("unknown message type {name:?}"))),
            Self::Code(code) => MessageKind::from_code(code)
                .ok_or_else(|| BridgeError::malformed(format!("unknown message type code {code}"))),
        }
    }
}

impl From<MessageKind> for KindRef<'_> {
    fn from(kind: MessageKind) -> Self {
        Self::Kind(kind)
    }
}

impl<'a> From<&'a str> for KindRef<'a> {
    fn from(name: &'a str) -> Self {
        Self::Name(name)
    }
}

impl From<u64> for KindRef<'_> {
    fn from(code: u64) -> Self {
        Self::Code(code)
    }
}

impl Serialize for MessageKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for MessageKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(KindVisitor)
    }
}

/// Accepts `"MESSAGE"` as well as `1`.
struct KindVisitor;

impl Visitor<'_> for KindVisitor {
    type Value = MessageKind;

    fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("a message type name or numeric code")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<MessageKind, E> {
        MessageKind::from_name(value).ok_or_else(|| E::invalid_value(Unexpected::Str(value), &self))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<MessageKind, E> {
        MessageKind::from_code(value)
            .ok_or_else(|| E::invalid_value(Unexpected::Unsigned(value), &self))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<MessageKind, E> {
        u64::try_from(value)
            .ok()
            .and_then(MessageKind::from_code)
            .ok_or_else(|| E::invalid_value(Unexpected::Signed(value), &self))
    }
}

/// Borrowing twin of [`Envelope`] used on the encode path.
#[derive(Serialize)]
struct OutboundEnvelope<'a, B: ?Sized> {
    #[serde(rename = "type")]
    kind: MessageKind,
    header: &'a Header,
    body: &'a B,
}

/// Encode one envelope to wire text.
///
/// The body is not checked against the kind beyond what serialization needs.
pub fn encode<'k, B>(
    kind: impl Into<KindRef<'k>>,
    body: &B,
    header: &Header,
) -> Result<String, BridgeError>
where
    B: Serialize + ?Sized,
{
    let envelope = OutboundEnvelope {
        kind: kind.into().normalize()?,
        header,
        body,
    };
    serde_json::to_string(&envelope).map_err(BridgeError::malformed)
}

/// Decode wire text into an [`Envelope`] with a canonical kind.
pub fn decode(text: &str) -> Result<Envelope, BridgeError> {
    serde_json::from_str(text).map_err(BridgeError::malformed)
}

impl Envelope {
    /// Build an envelope from a typed body.
    pub fn new<B: Serialize + ?Sized>(
        kind: MessageKind,
        body: &B,
        header: Header,
    ) -> Result<Self, BridgeError> {
        Ok(Self {
            kind,
            header,
            body: serde_json::to_value(body).map_err(BridgeError::malformed)?,
        })
    }

    /// Deserialize the body into the shape its kind requires.
    pub fn body<T: DeserializeOwned>(&self) -> Result<T, BridgeError> {
        T::deserialize(&self.body)
            .map_err(|e| BridgeError::malformed(format!("{} body: {e}", self.kind)))
    }

    /// Encode back to wire text.
    pub fn encode(&self) -> Result<String, BridgeError> {
        encode(self.kind, &self.body, &self.header)
    }
}
