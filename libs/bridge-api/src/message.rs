use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

/// Opaque bus payload tagged with its message type.
///
/// Neither the bus nor the forwarders interpret `data`. Only the frame-tree
/// path decodes it (as JSON, see [`Message::decode_json`]).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    msg_type: String,
    data: Bytes,
}

impl Message {
    pub fn new(msg_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            msg_type: msg_type.into(),
            data: data.into(),
        }
    }

    /// Encode `value` as a JSON payload.
    pub fn from_json<T: Serialize>(
        msg_type: impl Into<String>,
        value: &T,
    ) -> Result<Self, serde_json::Error> {
        let bytes = serde_json::to_vec(value)?;
        Ok(Self::new(msg_type, bytes))
    }

    pub fn msg_type(&self) -> &str {
        &self.msg_type
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn decode_json<'a, T: Deserialize<'a>>(&'a self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.data)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Serialize for Message {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("Message", 3)?;
        s.serialize_field("msg_type", &self.msg_type)?;
        // JSON payloads go out as the original text, not a re-encoded value.
        match serde_json::from_slice::<&RawValue>(&self.data) {
            Ok(raw) => {
                s.serialize_field("encoding", "json")?;
                s.serialize_field("data", raw)?;
            }
            Err(_) => {
                let encoded = base64::engine::general_purpose::STANDARD.encode(&self.data);
                s.serialize_field("encoding", "base64")?;
                s.serialize_field("data", &encoded)?;
            }
        }
        s.end()
    }
}
