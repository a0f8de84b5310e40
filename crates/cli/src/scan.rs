//! JSON-lines scanning loop.
//!
//! One [`ScannedItem`] per input line. The item's body is scanned and an
//! envelope is published whenever at least one rule fires.

use anyhow::Context;
use pastewatch_core::{MatchEnvelope, ScannedItem};
use pastewatch_notify::EnvelopeSender;
use pastewatch_rules::ScanningEngine;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub scanned: u64,
    pub matched: u64,
    pub skipped: u64,
}

/// Scan every line of `reader` until EOF.
///
/// Lines that are not UTF-8 or not a JSON item, and items the engine fails
/// on, are logged and skipped. Only a read error or a closed fan-out ends the loop early.
pub async fn scan_lines<R>(
    reader: R,
    engine: &ScanningEngine,
    sender: &EnvelopeSender,
) -> anyhow::Result<ScanSummary>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.split(b'\n');
    let mut summary = ScanSummary::default();

    while let Some(raw) = lines.next_segment().await.context("failed to read input")? {
        let line = match std::str::from_utf8(&raw) {
            Ok(line) => line.trim(),
            Err(e) => {
                warn!(error = %e, "skipping input line that is not valid UTF-8");
                summary.skipped += 1;
                continue;
            }
        };
        if line.is_empty() {
            continue;
        }

        let item: ScannedItem = match serde_json::from_str(line) {
            Ok(item) => item,
            Err(e) => {
                warn!(error = %e, "skipping malformed input line");
                summary.skipped += 1;
                continue;
            }
        };
        summary.scanned += 1;

        let matches = match engine.scan_str(&item.body) {
            Ok(matches) => matches,
            Err(e) => {
                warn!(item = %item.identifier, error = %e, "scan failed");
                summary.skipped += 1;
                continue;
            }
        };
        debug!(item = %item.identifier, matches = matches.len(), "scanned item");

        let Some(envelope) = MatchEnvelope::new(item, matches) else {
            continue;
        };
        info!(
            item = %envelope.item().identifier,
            rules = ?envelope.rule_names().collect::<Vec<_>>(),
            "rules matched"
        );
        sender
            .publish(envelope)
            .context("delivery fan-out is closed")?;
        summary.matched += 1;
    }

    Ok(summary)
}
