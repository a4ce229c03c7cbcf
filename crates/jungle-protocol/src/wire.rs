use rmp_serde::{decode, encode};
use thiserror::Error;

use crate::{ClientMessage, ServerMessage};

#[derive(Debug, Error)]
pub enum WireError {
    #[error("encode error: {0}")]
    Encode(#[from] encode::Error),
    #[error("decode error: {0}")]
    Decode(#[from] decode::Error),
}

// Messages are encoded with field names so internally tagged variants decode
// regardless of field order.

/// Serialize a client message for network transmission
pub fn serialize_client_message(msg: &ClientMessage) -> Result<Vec<u8>, WireError> {
    Ok(encode::to_vec_named(msg)?)
}

/// Deserialize a client message from network data
pub fn deserialize_client_message(data: &[u8]) -> Result<ClientMessage, WireError> {
    Ok(decode::from_slice(data)?)
}

/// Serialize a server message for network transmission
pub fn serialize_server_message(msg: &ServerMessage) -> Result<Vec<u8>, WireError> {
    Ok(encode::to_vec_named(msg)?)
}

/// Deserialize a server message from network data
pub fn deserialize_server_message(data: &[u8]) -> Result<ServerMessage, WireError> {
    Ok(decode::from_slice(data)?)
}
