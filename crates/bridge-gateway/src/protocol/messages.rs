//! Gateway message format
//!
//! Outgoing messages are built as [`GatewayMessage`]. Incoming frames are
//! decoded as [`InboundMessage`], which keeps the `d` field as raw JSON so
//! that payloads the bridge does not recognise reach the router untouched.

use super::{HelloPayload, IdentifyPayload, OpCode, ReadyPayload, ResumePayload};
use bridge_core::{GatewayEventType, GatewayNotification};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::Value;

/// A message sent to the gateway
#[derive(Debug, Clone, Serialize)]
pub struct GatewayMessage {
    pub op: OpCode,
    pub d: Value,
}

impl GatewayMessage {
    /// Heartbeat (op=1) carrying the last sequence number seen
    #[must_use]
    pub fn heartbeat(last_sequence: Option<u64>) -> Self {
        Self {
            op: OpCode::Heartbeat,
            d: last_sequence.map_or(Value::Null, |s| Value::Number(s.into())),
        }
    }

    /// Identify (op=2)
    pub fn identify(payload: &IdentifyPayload) -> Result<Self, serde_json::Error> {
        Ok(Self {
            op: OpCode::Identify,
            d: serde_json::to_value(payload)?,
        })
    }

    /// Resume (op=6)
    pub fn resume(payload: &ResumePayload) -> Result<Self, serde_json::Error> {
        Ok(Self {
            op: OpCode::Resume,
            d: serde_json::to_value(payload)?,
        })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// A frame received from the gateway
#[derive(Debug, Deserialize)]
pub struct InboundMessage {
    pub op: u8,
    #[serde(default)]
    pub t: Option<String>,
    #[serde(default)]
    pub s: Option<u64>,
    #[serde(default)]
    pub d: Option<Box<RawValue>>,
}

impl InboundMessage {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Known op code, if any
    pub fn opcode(&self) -> Option<OpCode> {
        OpCode::from_u8(self.op)
    }

    fn decode_d<T: for<'de> Deserialize<'de>>(&self) -> Option<T> {
        self.d
            .as_ref()
            .and_then(|raw| serde_json::from_str(raw.get()).ok())
    }

    /// Parse the Hello payload (op=10)
    pub fn as_hello(&self) -> Option<HelloPayload> {
        if self.opcode() != Some(OpCode::Hello) {
            return None;
        }
        self.decode_d()
    }

    /// Parse READY's resume information
    pub fn as_ready(&self) -> Option<ReadyPayload> {
        if self.opcode() != Some(OpCode::Dispatch) || self.t.as_deref() != Some("READY") {
            return None;
        }
        self.decode_d()
    }

    /// Whether an Invalid Session (op=9) says the session may be resumed
    pub fn invalid_session_resumable(&self) -> bool {
        self.decode_d::<bool>().unwrap_or(false)
    }

    /// Turn a dispatch frame into a notification
    ///
    /// Payloads of catalogued events are decoded here; anything else keeps
    /// its raw text and is decoded later by whoever consumes it.
    pub fn into_notification(self) -> GatewayNotification {
        let known = self
            .t
            .as_deref()
            .and_then(GatewayEventType::from_str)
            .is_some();

        let (payload, raw) = match self.d {
            Some(raw) if known => match serde_json::from_str::<Value>(raw.get()) {
                Ok(value) => (Some(value), None),
                Err(_) => (None, Some(raw.get().to_string())),
            },
            Some(raw) => (None, Some(raw.get().to_string())),
            None => (None, None),
        };

        GatewayNotification {
            op: self.op,
            event_type: self.t,
            sequence: self.s,
            payload,
            raw,
        }
    }
}

impl std::fmt::Display for InboundMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.t, self.s) {
            (Some(t), Some(s)) => write!(f, "InboundMessage(op={}, t={t}, s={s})", self.op),
            (Some(t), None) => write!(f, "InboundMessage(op={}, t={t})", self.op),
            _ => write!(f, "InboundMessage(op={})", self.op),
        }
    }
}
