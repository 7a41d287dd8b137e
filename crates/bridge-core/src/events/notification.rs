//! Gateway notifications
//!
//! A notification is one frame received from the gateway, reduced to the
//! fields the bridge cares about.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Op code of a dispatch frame. Only dispatch frames carry business events.
pub const DISPATCH_OP: u8 = 0;

/// Shard identity of a gateway session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShardInfo {
    /// Zero-based shard id of this session
    pub id: u32,
    /// Total number of shards
    pub count: u32,
}

impl ShardInfo {
    /// Create a shard identity. A count of zero is treated as a single shard.
    #[must_use]
    pub fn new(id: u32, count: u32) -> Self {
        Self {
            id,
            count: count.max(1),
        }
    }

    /// Identity of an unsharded session
    #[must_use]
    pub fn single() -> Self {
        Self::new(0, 1)
    }

    /// The `[id, count]` pair sent during Identify
    #[must_use]
    pub fn as_pair(&self) -> [u32; 2] {
        [self.id, self.count]
    }
}

impl Default for ShardInfo {
    fn default() -> Self {
        Self::single()
    }
}

impl fmt::Display for ShardInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.id, self.count)
    }
}

/// A single notification yielded by a gateway session
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayNotification {
    /// Operation code of the frame
    pub op: u8,
    /// Event name (only for dispatch frames)
    pub event_type: Option<String>,
    /// Sequence number (only for dispatch frames)
    pub sequence: Option<u64>,
    /// Structured payload, when the session already decoded it
    pub payload: Option<Value>,
    /// Raw payload text, kept for sessions that do not decode payloads
    pub raw: Option<String>,
}

impl GatewayNotification {
    /// Create a dispatch notification with a structured payload
    #[must_use]
    pub fn dispatch(event_type: impl Into<String>, sequence: u64, payload: Value) -> Self {
        Self {
            op: DISPATCH_OP,
            event_type: Some(event_type.into()),
            sequence: Some(sequence),
            payload: Some(payload),
            raw: None,
        }
    }

    /// Create a dispatch notification that only carries raw payload text
    #[must_use]
    pub fn dispatch_raw(event_type: impl Into<String>, sequence: u64, raw: impl Into<String>) -> Self {
        Self {
            op: DISPATCH_OP,
            event_type: Some(event_type.into()),
            sequence: Some(sequence),
            payload: None,
            raw: Some(raw.into()),
        }
    }

    /// Create a non-dispatch notification (heartbeat ack, hello, ...)
    #[must_use]
    pub fn control(op: u8) -> Self {
        Self {
            op,
            event_type: None,
            sequence: None,
            payload: None,
            raw: None,
        }
    }

    /// Event name, if this notification carries a business event
    ///
    /// Returns `None` for non-dispatch frames and for dispatch frames with an
    /// empty type.
    #[must_use]
    pub fn business_event(&self) -> Option<&str> {
        if self.op != DISPATCH_OP {
            return None;
        }
        self.event_type.as_deref().filter(|t| !t.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_shard_info_defaults_count() {
        let shard = ShardInfo::new(3, 0);
        assert_eq!(shard.count, 1);
        assert_eq!(shard.as_pair(), [3, 1]);
        assert_eq!(ShardInfo::default(), ShardInfo::new(0, 1));
    }

    #[test]
    fn test_shard_info_display() {
        assert_eq!(ShardInfo::new(2, 8).to_string(), "2/8");
    }

    #[test]
    fn test_business_event() {
        let n = GatewayNotification::dispatch("MESSAGE_CREATE", 1, json!({}));
        assert_eq!(n.business_event(), Some("MESSAGE_CREATE"));

        let empty = GatewayNotification::dispatch("", 2, json!({}));
        assert_eq!(empty.business_event(), None);

        let ack = GatewayNotification::control(11);
        assert_eq!(ack.business_event(), None);
    }

    #[test]
    fn test_non_dispatch_with_type_is_not_business() {
        let mut n = GatewayNotification::dispatch("READY", 1, json!({}));
        n.op = 1;
        assert_eq!(n.business_event(), None);
    }
}
