//! Backend tasks around one scanning run.
//!
//! Every backend is spawned before the scan starts and joined before
//! [`run_pipeline`] returns, however the scan ended, so each backend gets to
//! run its stop sequence.

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use tokio::io::AsyncBufRead;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use pastewatch_notify::{fanout, run_notifier, DeliveryStats, Notifier, NotifyError};
use pastewatch_rules::ScanningEngine;

use crate::scan::{self, ScanSummary};

type BackendTask = (String, JoinHandle<Result<DeliveryStats, NotifyError>>);

/// Spawn one runner per notifier, scan `reader`, then drain the backends.
///
/// `interrupt` is called once for the scan and once for the drain. When the
/// scan is interrupted the result is `Ok(None)`. A scan error is returned
/// only after every backend has finished.
pub async fn run_pipeline<R, S, F>(
    reader: R,
    engine: &ScanningEngine,
    notifiers: Vec<Box<dyn Notifier>>,
    drain_timeout: Duration,
    interrupt: S,
) -> Result<Option<ScanSummary>>
where
    R: AsyncBufRead + Unpin,
    S: Fn() -> F,
    F: Future<Output = ()>,
{
    let (sender, mut fanout) = fanout::channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut backends: Vec<BackendTask> = Vec::new();
    for notifier in notifiers {
        let name = notifier.channel_name().to_string();
        let queue = fanout.subscribe(name.clone());
        let handle = tokio::spawn(run_notifier(notifier, queue, shutdown_rx.clone()));
        backends.push((name, handle));
    }
    let fanout_task = fanout.spawn();

    info!(backends = backends.len(), "scanning started");
    let scanned = tokio::select! {
        result = scan::scan_lines(reader, engine, &sender) => Some(result),
        _ = interrupt() => {
            info!("interrupted, stopping scan");
            None
        }
    };
    drop(sender);

    match &scanned {
        Some(Ok(summary)) => info!(
            scanned = summary.scanned,
            matched = summary.matched,
            skipped = summary.skipped,
            "input exhausted"
        ),
        Some(Err(e)) => error!(error = %format!("{e:#}"), "scan aborted, draining backends"),
        None => {}
    }

    drain(backends, &shutdown_tx, drain_timeout, interrupt()).await;

    match fanout_task.await {
        Ok(forwarded) => info!(forwarded, "fan-out finished"),
        Err(e) => warn!(error = %e, "fan-out task aborted"),
    }

    scanned.transpose()
}

/// Let backends empty their queues. After `timeout`, or as soon as
/// `interrupt` resolves, the remaining backends get the shutdown signal.
async fn drain(
    backends: Vec<BackendTask>,
    shutdown: &watch::Sender<bool>,
    timeout: Duration,
    interrupt: impl Future<Output = ()>,
) {
    let joined = join_backends(backends);
    tokio::pin!(joined);

    let escalate = async {
        tokio::select! {
            _ = tokio::time::sleep(timeout) => warn!(
                timeout_secs = timeout.as_secs(),
                "shutdown timeout reached, signalling backends"
            ),
            _ = interrupt => info!("interrupted, signalling backends"),
        }
    };

    tokio::select! {
        _ = joined.as_mut() => return,
        _ = escalate => {}
    }

    let _ = shutdown.send(true);
    joined.await;
}

async fn join_backends(backends: Vec<BackendTask>) {
    for (name, handle) in backends {
        match handle.await {
            Ok(Ok(stats)) => info!(
                backend = %name,
                delivered = stats.delivered,
                failed = stats.failed,
                "backend finished"
            ),
            Ok(Err(e)) => warn!(backend = %name, error = %e, "backend did not run"),
            Err(e) => error!(backend = %name, error = %e, "backend task aborted"),
        }
    }
}
