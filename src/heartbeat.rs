//! Background heartbeat.
//!
//! Every interval the client sends a heartbeat carrying its clock; the server
//! answers with its current view of cluster membership, which is published to
//! the [`ServerStore`]. The first failure of any kind ends the loop for good;
//! reconnecting is up to whoever owns the client.
//!
//! ```text
//! ┌──────────┐  interval   ┌───────────┐  servers  ┌─────────────┐
//! │  sleep   │ ──────────► │ heartbeat │ ────────► │ store.set() │ ──┐
//! └──────────┘             └───────────┘           └─────────────┘   │
//!      ▲                                                             │
//!      └─────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::client::{wait_closed, Shared};
use crate::codec::{decode_servers, encode_heartbeat};
use crate::config::ClientConfig;
use crate::error::{Result, WireError};
use crate::protocol::Message;
use crate::store::ServerStore;

/// Run the heartbeat until the client closes or a tick fails.
pub(crate) async fn run<S>(shared: Arc<Shared<S>>, store: Arc<dyn ServerStore>, config: ClientConfig)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match heartbeat_loop(&shared, store.as_ref(), &config).await {
        Ok(()) => debug!("heartbeat stopped"),
        Err(_) if shared.is_closed() => debug!("heartbeat interrupted by close"),
        Err(e) => warn!(error = %e, "heartbeat failed, no further heartbeats will be sent"),
    }
}

async fn heartbeat_loop<S>(
    shared: &Shared<S>,
    store: &dyn ServerStore,
    config: &ClientConfig,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut request = Message::new(config.heartbeat_request_size);
    let mut response = Message::new(config.heartbeat_response_size);
    let mut closed = shared.subscribe_closed();

    loop {
        tokio::select! {
            _ = tokio::time::sleep(config.heartbeat_interval) => {}
            _ = wait_closed(&mut closed) => {}
        }
        if shared.is_closed() {
            return Ok(());
        }

        let deadline = Instant::now() + config.heartbeat_timeout;
        encode_heartbeat(&mut request, unix_timestamp());
        shared.call(Some(deadline), &request, &mut response).await?;

        let servers = decode_servers(&mut response)?;
        debug!(count = servers.len(), "heartbeat returned servers");

        tokio::time::timeout_at(deadline, store.set(servers))
            .await
            .map_err(|_| WireError::DeadlineExceeded)??;
    }
}

/// Current time in whole seconds since the Unix epoch.
fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
