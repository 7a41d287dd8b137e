//! Startup and the main run loop

use crate::bridge::Bridge;
use crate::dispatcher::Dispatcher;
use crate::shutdown::{self, ShutdownOutcome, SHUTDOWN_TIMEOUT};
use bridge_common::{AppError, AppResult, BridgeConfig};
use bridge_core::BrokerConnection;
use bridge_gateway::{DiscordSession, RestClient, SessionConfig};
use std::sync::Arc;
use tracing::{info, warn};

/// Connect both sides, forward events until a signal arrives, then shut down
///
/// Any failure before the bridge is running is returned as an
/// [`AppError`]; the broker connection is released before returning.
pub async fn run(config: BridgeConfig) -> AppResult<ShutdownOutcome> {
    let shard = config.discord.shard();
    info!(
        name = %config.app.name,
        env = ?config.app.env,
        shard = %shard,
        destination = %config.broker.events_destination,
        ignored = config.events.ignore.len(),
        "Starting gateway bridge..."
    );

    let connection = bridge_broker::connect(&config.broker.uri)
        .await
        .map_err(AppError::broker)?;
    let broker: Arc<dyn BrokerConnection> = Arc::new(connection);

    let user = match authenticate(&config).await {
        Ok(user) => user,
        Err(e) => {
            release(broker.as_ref()).await;
            return Err(e);
        }
    };
    info!(user_id = %user.id, user = %user.tag(), bot = user.bot, "token accepted");

    let session = Arc::new(DiscordSession::new(SessionConfig::new(
        config.discord.token.clone(),
        config.discord.gateway_url.clone(),
        shard,
        config.discord.intents,
    )));
    let bridge = Bridge::new(
        broker,
        session,
        Dispatcher::new(config.broker.events_destination.clone()),
        config.events.ignore_set(),
    );

    if let Err(e) = bridge.start().await {
        bridge.shutdown(SHUTDOWN_TIMEOUT).await;
        return Err(AppError::gateway(e));
    }
    info!("Bridge is now running. Press Ctrl+C to exit.");

    let stream_ended = tokio::select! {
        _ = shutdown::wait_for_signal() => false,
        () = bridge.stream_ended() => {
            warn!("gateway session ended unexpectedly");
            true
        }
    };

    let outcome =
        shutdown::shutdown_or_force(bridge.shutdown(SHUTDOWN_TIMEOUT), shutdown::second_interrupt())
            .await;

    if stream_ended {
        return Err(AppError::GatewayEnded);
    }
    Ok(outcome)
}

async fn authenticate(config: &BridgeConfig) -> AppResult<bridge_gateway::CurrentUser> {
    let rest = RestClient::new(config.discord.api_base.clone(), config.discord.token.clone())
        .map_err(AppError::gateway)?;
    rest.current_user().await.map_err(AppError::gateway)
}

async fn release(broker: &dyn BrokerConnection) {
    match tokio::time::timeout(SHUTDOWN_TIMEOUT, broker.disconnect()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "failed to disconnect from broker"),
        Err(_) => warn!("timed out disconnecting from broker"),
    }
}
