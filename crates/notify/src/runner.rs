//! Drives one backend over its envelope queue.
//!
//! Each backend runs in its own task: `start`, then one `send` per envelope
//! in FIFO order, then `stop`. Delivery failures are logged and counted and
//! the next envelope is processed; nothing is retried. A failure in one
//! backend never reaches another.

use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::fanout::Subscription;
use crate::traits::{Notifier, NotifyError};

/// Outcome counters for one backend run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    pub attempted: u64,
    pub delivered: u64,
    pub failed: u64,
}

/// Run `notifier` until its queue ends or `shutdown` flips to `true`.
///
/// Returns the start error if the backend could not start; in that case
/// `stop` is not called and the queue is dropped. Otherwise `stop` runs
/// exactly once, whichever way the loop ended.
pub async fn run_notifier(
    mut notifier: Box<dyn Notifier>,
    mut queue: Subscription,
    mut shutdown: watch::Receiver<bool>,
) -> Result<DeliveryStats, NotifyError> {
    let backend = notifier.channel_name().to_string();

    if let Err(e) = notifier.start().await {
        error!(backend = %backend, error = %e, "backend failed to start");
        return Err(e);
    }
    info!(backend = %backend, "backend started");

    let mut stats = DeliveryStats::default();

    loop {
        let envelope = tokio::select! {
            biased;
            _ = shutdown_requested(&mut shutdown) => {
                info!(backend = %backend, "shutdown signal received");
                break;
            }
            next = queue.recv() => match next {
                Some(envelope) => envelope,
                None => {
                    debug!(backend = %backend, "envelope stream closed");
                    break;
                }
            },
        };

        stats.attempted += 1;
        let item = &envelope.item().identifier;

        match AssertUnwindSafe(notifier.send(&envelope)).catch_unwind().await {
            Ok(Ok(())) => {
                stats.delivered += 1;
                debug!(backend = %backend, item = %item, "notification delivered");
            }
            Ok(Err(e)) => {
                stats.failed += 1;
                warn!(backend = %backend, item = %item, error = %e, "notification delivery failed");
            }
            Err(_) => {
                stats.failed += 1;
                error!(backend = %backend, item = %item, "notification delivery panicked");
            }
        }
    }

    if let Err(e) = notifier.stop().await {
        warn!(backend = %backend, error = %e, "backend stop returned error");
    }

    info!(
        backend = %backend,
        attempted = stats.attempted,
        delivered = stats.delivered,
        failed = stats.failed,
        "backend stopped"
    );
    Ok(stats)
}

/// Resolves once shutdown is requested. Never resolves if the signal's
/// sender is dropped without requesting it.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|requested| *requested).await.is_err() {
        futures::future::pending::<()>().await;
    }
}
