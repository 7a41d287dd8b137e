//! Event envelope serializer

use serde::Serialize;
use thiserror::Error;

/// The wire shape of every published event
#[derive(Debug, Serialize)]
pub struct EventEnvelope<'a, T: Serialize + ?Sized> {
    #[serde(rename = "type")]
    pub event_type: &'a str,
    pub shard_id: u32,
    pub data: &'a T,
}

/// The payload of an event could not be encoded
#[derive(Debug, Error)]
#[error("failed to serialize {event_type} event: {source}")]
pub struct SerializeError {
    pub event_type: String,
    #[source]
    pub source: serde_json::Error,
}

/// Wrap a payload in an [`EventEnvelope`] and encode it as JSON
pub fn serialize<T>(event_type: &str, shard_id: u32, payload: &T) -> Result<Vec<u8>, SerializeError>
where
    T: Serialize + ?Sized,
{
    let envelope = EventEnvelope {
        event_type,
        shard_id,
        data: payload,
    };
    serde_json::to_vec(&envelope).map_err(|source| SerializeError {
        event_type: event_type.to_string(),
        source,
    })
}
