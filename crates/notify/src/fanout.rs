//! Replicates one envelope stream to every delivery backend.
//!
//! Producers publish into a single unbounded funnel. The [`Fanout`] task
//! copies each envelope into one unbounded FIFO queue per subscribed backend,
//! so every backend sees every envelope and a slow backend only grows its own
//! queue. When all [`EnvelopeSender`]s are dropped the funnel drains, every
//! queue closes, and each backend observes end-of-stream.

use std::sync::Arc;

use pastewatch_core::MatchEnvelope;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::traits::NotifyError;

type EnvelopeTx = mpsc::UnboundedSender<Arc<MatchEnvelope>>;
type EnvelopeRx = mpsc::UnboundedReceiver<Arc<MatchEnvelope>>;

/// Create the input funnel and its fan-out.
pub fn channel() -> (EnvelopeSender, Fanout) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        EnvelopeSender { tx },
        Fanout {
            input: rx,
            outputs: Vec::new(),
        },
    )
}

/// Producer handle. Cloneable; publishing never blocks.
#[derive(Debug, Clone)]
pub struct EnvelopeSender {
    tx: EnvelopeTx,
}

impl EnvelopeSender {
    pub fn publish(&self, envelope: MatchEnvelope) -> Result<(), NotifyError> {
        self.tx
            .send(Arc::new(envelope))
            .map_err(|_| NotifyError::Closed)
    }
}

/// Per-backend FIFO queue of envelopes.
#[derive(Debug)]
pub struct Subscription {
    name: String,
    rx: EnvelopeRx,
}

impl Subscription {
    /// Next envelope, or `None` once the stream has ended.
    pub async fn recv(&mut self) -> Option<Arc<MatchEnvelope>> {
        self.rx.recv().await
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Replicator from the funnel to the per-backend queues.
#[derive(Debug)]
pub struct Fanout {
    input: EnvelopeRx,
    outputs: Vec<(String, EnvelopeTx)>,
}

impl Fanout {
    /// Register a backend queue. Subscribe every backend before calling
    /// [`run`](Self::run); envelopes are not replayed to late subscribers.
    pub fn subscribe(&mut self, name: impl Into<String>) -> Subscription {
        let name = name.into();
        let (tx, rx) = mpsc::unbounded_channel();
        self.outputs.push((name.clone(), tx));
        Subscription { name, rx }
    }

    pub fn subscriber_count(&self) -> usize {
        self.outputs.len()
    }

    /// Copy envelopes until every sender is gone. Returns how many envelopes
    /// passed through.
    pub async fn run(mut self) -> u64 {
        let mut forwarded = 0u64;

        while let Some(envelope) = self.input.recv().await {
            forwarded += 1;
            self.outputs.retain(|(name, tx)| match tx.send(Arc::clone(&envelope)) {
                Ok(()) => true,
                Err(_) => {
                    warn!(backend = %name, "backend queue closed, dropping subscriber");
                    false
                }
            });
        }

        debug!(forwarded, "envelope funnel closed");
        forwarded
    }

    pub fn spawn(self) -> JoinHandle<u64> {
        tokio::spawn(self.run())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pastewatch_core::{MatchedRule, ScannedItem};

    fn envelope(id: &str) -> MatchEnvelope {
        MatchEnvelope::new(
            ScannedItem::new(id, "title", ""),
            vec![MatchedRule::new("X")],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn every_subscriber_sees_every_envelope_in_order() {
        let (sender, mut fanout) = channel();
        let mut a = fanout.subscribe("a");
        let mut b = fanout.subscribe("b");
        let handle = fanout.spawn();

        for id in ["1", "2", "3"] {
            sender.publish(envelope(id)).unwrap();
        }
        drop(sender);

        for sub in [&mut a, &mut b] {
            let mut seen = Vec::new();
            while let Some(env) = sub.recv().await {
                seen.push(env.item().identifier.clone());
            }
            assert_eq!(seen, vec!["1", "2", "3"]);
        }
        assert_eq!(handle.await.unwrap(), 3);
    }

    #[tokio::test]
    async fn dropped_subscriber_does_not_affect_others() {
        let (sender, mut fanout) = channel();
        let gone = fanout.subscribe("gone");
        let mut live = fanout.subscribe("live");
        drop(gone);
        let handle = fanout.spawn();

        sender.publish(envelope("1")).unwrap();
        sender.publish(envelope("2")).unwrap();
        drop(sender);

        assert_eq!(live.recv().await.unwrap().item().identifier, "1");
        assert_eq!(live.recv().await.unwrap().item().identifier, "2");
        assert!(live.recv().await.is_none());
        assert_eq!(handle.await.unwrap(), 2);
    }

    #[tokio::test]
    async fn publish_after_fanout_gone_fails() {
        let (sender, fanout) = channel();
        drop(fanout);
        assert!(matches!(
            sender.publish(envelope("1")),
            Err(NotifyError::Closed)
        ));
    }

    #[tokio::test]
    async fn subscribers_share_one_envelope() {
        let (sender, mut fanout) = channel();
        let mut a = fanout.subscribe("a");
        let mut b = fanout.subscribe("b");
        assert_eq!(fanout.subscriber_count(), 2);
        fanout.spawn();

        sender.publish(envelope("shared")).unwrap();
        let from_a = a.recv().await.unwrap();
        let from_b = b.recv().await.unwrap();
        assert!(Arc::ptr_eq(&from_a, &from_b));
        assert_eq!(a.name(), "a");
    }
}
