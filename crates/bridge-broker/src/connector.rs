//! Entry point: URI in, ready connection out.

use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::connection::{ConnectOptions, StompConnection};
use crate::error::ConnectionError;
use crate::uri::{ConnectionParameters, ConnectionUri};

/// Connect to the broker named by `uri` with default options
pub async fn connect(uri: &str) -> Result<StompConnection, ConnectionError> {
    connect_with_options(uri, ConnectOptions::default()).await
}

/// Validate `uri`, open a TCP stream and run the handshake
///
/// Validation failures are returned before any socket is opened.
pub async fn connect_with_options(
    uri: &str,
    options: ConnectOptions,
) -> Result<StompConnection, ConnectionError> {
    let uri = ConnectionUri::parse(uri)?;
    let params = ConnectionParameters::from_uri(&uri);

    debug!(
        uri = %uri.redacted(),
        virtual_host = params.virtual_host(),
        "validated STOMP connection URI"
    );

    let stream = TcpStream::connect(params.address())
        .await
        .map_err(|e| ConnectionError::Connect(e.into()))?;
    // Frames are small and latency matters more than throughput
    let _ = stream.set_nodelay(true);

    let connection = StompConnection::establish(stream, &params, options).await?;

    info!(address = %params.address(), "connected to STOMP broker");
    Ok(connection)
}
