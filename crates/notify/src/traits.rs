//! Notifier trait definition and shared error types.

use pastewatch_core::{MatchEnvelope, MatchedRule, ScannedItem};

/// Errors that can occur during notification delivery.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("gateway error: {0}")]
    Gateway(String),

    #[error("session not established")]
    NotConnected,

    #[error("Template rendering failed: {0}")]
    Template(String),

    #[error("Serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("envelope stream closed")]
    Closed,
}

/// A delivery backend.
///
/// The runner calls [`start`](Notifier::start) once, then
/// [`send`](Notifier::send) per envelope, then [`stop`](Notifier::stop) once
/// on every exit path after a successful start.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Open sessions or announce presence. A failure means the backend does
    /// not run.
    async fn start(&mut self) -> Result<(), NotifyError> {
        Ok(())
    }

    /// Format and deliver one envelope.
    async fn send(&self, envelope: &MatchEnvelope) -> Result<(), NotifyError>;

    /// Release sessions. Called after the envelope stream ends or shutdown
    /// is requested.
    async fn stop(&mut self) -> Result<(), NotifyError> {
        Ok(())
    }

    /// Test connectivity with a sample envelope.
    async fn test(&self) -> Result<(), NotifyError> {
        self.send(&test_envelope()).await
    }

    /// Human-readable name for this channel (e.g., "slack", "discord").
    fn channel_name(&self) -> &str;
}

/// Envelope used by [`Notifier::test`].
pub fn test_envelope() -> MatchEnvelope {
    MatchEnvelope::new(
        ScannedItem::new("test", "[TEST] pastewatch test notification", ""),
        vec![MatchedRule::new("test_rule")],
    )
    .unwrap_or_else(|| unreachable!("test envelope has one match"))
}
