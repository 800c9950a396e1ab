use crate::protocol::frame::encode_frame;
use crate::protocol::CorrelationId;
use crate::{Result, RpcError};
use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A request as it travels from client to server.
///
/// All four fields are required; a frame missing any of them is dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestMessage {
    /// Address the server writes the response to. Opaque to the protocol.
    pub response_path: String,
    pub id: CorrelationId,
    pub op: String,
    pub payload: Value,
}

/// A response as it travels from server to client.
///
/// `payload: None` means the server produced no value, either because the
/// handler returned nothing or because no handler was registered for the
/// operation. It is omitted from the wire entirely; an explicit `null` is a
/// value and decodes to `Some(Value::Null)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMessage {
    pub id: CorrelationId,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present"
    )]
    pub payload: Option<Value>,
}

// A present field is always Some, even when it holds null.
fn present<'de, D>(deserializer: D) -> std::result::Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl RequestMessage {
    /// Encode into a terminated frame.
    pub fn encode(&self) -> Result<Bytes> {
        // ---
        Ok(encode_frame(serde_json::to_vec(self)?))
    }

    /// Decode a frame body (terminator already stripped).
    pub fn decode(body: &[u8]) -> Result<Self> {
        // ---
        serde_json::from_slice(body).map_err(|err| RpcError::Malformed(err.to_string()))
    }
}

impl ResponseMessage {
    /// Encode into a terminated frame.
    pub fn encode(&self) -> Result<Bytes> {
        // ---
        Ok(encode_frame(serde_json::to_vec(self)?))
    }

    /// Decode a frame body (terminator already stripped).
    pub fn decode(body: &[u8]) -> Result<Self> {
        // ---
        serde_json::from_slice(body).map_err(|err| RpcError::Malformed(err.to_string()))
    }
}
