pub mod config;
pub mod envelope;
pub mod error;

pub use config::{DiscordConfig, SlackConfig};
pub use envelope::*;
pub use error::*;
