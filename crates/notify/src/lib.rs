//! Delivery of paste match alerts.
//!
//! This crate provides:
//! - `Notifier` trait for pluggable delivery backends
//! - Fan-out of one envelope stream into a FIFO queue per backend
//! - A runner that drives one backend through start, delivery and stop
//! - Slack webhook and Discord bot backends
//! - Minijinja templates for alert messages

pub mod discord;
pub mod fanout;
pub mod gateway;
pub mod runner;
pub mod slack;
pub mod templating;
pub mod traits;

pub use discord::{ChatSession, DiscordNotifier, Presence, SessionConnector};
pub use fanout::{EnvelopeSender, Fanout, Subscription};
pub use gateway::GatewayConnector;
pub use runner::{run_notifier, DeliveryStats};
pub use slack::SlackNotifier;
pub use traits::{Notifier, NotifyError};
