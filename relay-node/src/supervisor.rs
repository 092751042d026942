//! Keep a node running: restart after fatal startup errors until shutdown.

use std::future::Future;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::error::Result;
use crate::shutdown::ShutdownToken;

/// Run `start` until it returns cleanly after a stop request. A failed start
/// (e.g. display node unreachable) is logged and retried after `restart_delay`.
/// Returns the number of times the node was started.
pub async fn supervise<F, Fut>(
    name: &str,
    restart_delay: Duration,
    shutdown: ShutdownToken,
    mut start: F,
) -> u32
where
    F: FnMut(ShutdownToken) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut starts = 0;
    while !shutdown.is_triggered() {
        starts += 1;
        match start(shutdown.clone()).await {
            Ok(()) if shutdown.is_triggered() => break,
            Ok(()) => warn!(node = name, "node exited without a stop request"),
            Err(e) if e.is_fatal() => error!(node = name, error = %e, "node failed to start"),
            Err(e) => error!(node = name, error = %e, "node failed"),
        }
        info!(node = name, delay_secs = restart_delay.as_secs_f32(), "restarting");
        tokio::select! {
            _ = shutdown.triggered() => break,
            _ = tokio::time::sleep(restart_delay) => {}
        }
    }
    starts
}
