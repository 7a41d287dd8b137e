//! Gateway event router
//!
//! Filters each notification, picks the extraction for its event type,
//! then hands the envelope to the dispatcher.

use crate::dispatcher::{Ack, Dispatcher};
use crate::serializer;
use bridge_core::{BrokerConnection, GatewayEventType, GatewayNotification, IgnoreSet, ShardInfo};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, warn};

/// Extraction applied to a payload before it is serialized
pub type Extract = fn(Value) -> Value;

/// Route for a catalog event
pub fn route(event: GatewayEventType) -> Extract {
    use GatewayEventType as E;

    match event {
        E::Ready | E::Resumed => strip_trace,
        E::ApplicationCommandPermissionsUpdate
        | E::AutoModerationRuleCreate
        | E::AutoModerationRuleUpdate
        | E::AutoModerationRuleDelete
        | E::AutoModerationActionExecution
        | E::ChannelCreate
        | E::ChannelUpdate
        | E::ChannelDelete
        | E::ChannelPinsUpdate
        | E::ThreadCreate
        | E::ThreadUpdate
        | E::ThreadDelete
        | E::ThreadListSync
        | E::ThreadMemberUpdate
        | E::ThreadMembersUpdate
        | E::GuildCreate
        | E::GuildUpdate
        | E::GuildDelete
        | E::GuildAuditLogEntryCreate
        | E::GuildBanAdd
        | E::GuildBanRemove
        | E::GuildEmojisUpdate
        | E::GuildStickersUpdate
        | E::GuildIntegrationsUpdate
        | E::GuildMemberAdd
        | E::GuildMemberRemove
        | E::GuildMemberUpdate
        | E::GuildMembersChunk
        | E::GuildRoleCreate
        | E::GuildRoleUpdate
        | E::GuildRoleDelete
        | E::GuildScheduledEventCreate
        | E::GuildScheduledEventUpdate
        | E::GuildScheduledEventDelete
        | E::GuildScheduledEventUserAdd
        | E::GuildScheduledEventUserRemove
        | E::IntegrationCreate
        | E::IntegrationUpdate
        | E::IntegrationDelete
        | E::InteractionCreate
        | E::InviteCreate
        | E::InviteDelete
        | E::MessageCreate
        | E::MessageUpdate
        | E::MessageDelete
        | E::MessageDeleteBulk
        | E::MessageReactionAdd
        | E::MessageReactionRemove
        | E::MessageReactionRemoveAll
        | E::MessageReactionRemoveEmoji
        | E::PresenceUpdate
        | E::TypingStart
        | E::StageInstanceCreate
        | E::StageInstanceUpdate
        | E::StageInstanceDelete
        | E::UserUpdate
        | E::UserSettingsUpdate
        | E::VoiceStateUpdate
        | E::VoiceServerUpdate
        | E::WebhooksUpdate => passthrough,
    }
}

fn passthrough(payload: Value) -> Value {
    payload
}

/// Drop the gateway's `_trace` debugging field
fn strip_trace(mut payload: Value) -> Value {
    if let Value::Object(map) = &mut payload {
        map.remove("_trace");
    }
    payload
}

/// What happened to one notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Not a dispatch frame, or no event type
    NotAnEvent,
    /// Event type is in the ignore set
    Ignored,
    /// Payload could not be serialized
    SerializeFailed,
    /// The broker rejected the message
    DispatchFailed,
    Dispatched(Ack),
}

/// Turns gateway notifications into published envelopes
pub struct Router {
    broker: Arc<dyn BrokerConnection>,
    dispatcher: Dispatcher,
    ignore: IgnoreSet,
    shard: ShardInfo,
}

impl Router {
    pub fn new(
        broker: Arc<dyn BrokerConnection>,
        dispatcher: Dispatcher,
        ignore: IgnoreSet,
        shard: ShardInfo,
    ) -> Self {
        Self {
            broker,
            dispatcher,
            ignore,
            shard,
        }
    }

    pub fn shard(&self) -> ShardInfo {
        self.shard
    }

    /// Filter, serialize and dispatch one notification
    ///
    /// Never fails: per-event errors are logged and reported through the
    /// returned [`RouteOutcome`].
    pub async fn handle(&self, notification: GatewayNotification) -> RouteOutcome {
        let event_type = match notification.business_event() {
            Some(t) => t.to_string(),
            None => return RouteOutcome::NotAnEvent,
        };

        if self.ignore.contains(&event_type) {
            return RouteOutcome::Ignored;
        }

        let payload = match notification.payload {
            Some(payload) => payload,
            None => decode_raw(&event_type, notification.raw.as_deref()),
        };

        let data = match GatewayEventType::from_str(&event_type) {
            Some(known) => route(known)(payload),
            None => payload,
        };

        let body = match serializer::serialize(&event_type, self.shard.id, &data) {
            Ok(body) => body,
            Err(e) => {
                error!(event_type = %event_type, shard_id = self.shard.id, error = %e, "dropping event");
                return RouteOutcome::SerializeFailed;
            }
        };

        match self
            .dispatcher
            .dispatch(self.broker.as_ref(), &event_type, &body)
            .await
        {
            Ok(ack) => RouteOutcome::Dispatched(ack),
            Err(_) => RouteOutcome::DispatchFailed,
        }
    }
}

fn decode_raw(event_type: &str, raw: Option<&str>) -> Value {
    let Some(raw) = raw.filter(|r| !r.is_empty()) else {
        return Value::Null;
    };
    match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            warn!(event_type, error = %e, "failed to decode raw payload");
            Value::Null
        }
    }
}
