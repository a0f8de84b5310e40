//! Discord bot notifier.
//!
//! Session-oriented: the bot connects and announces itself as online when
//! the backend starts, posts one channel message per envelope, and goes
//! offline before closing the session when the backend stops.

use pastewatch_core::{DiscordConfig, MatchEnvelope};
use tracing::{info, warn};

use crate::gateway::GatewayConnector;
use crate::templating::{MessageTemplate, DISCORD_TEMPLATE};
use crate::traits::{Notifier, NotifyError};

/// Name of the activity shown while the bot is online.
pub const ACTIVITY_NAME: &str = "Pastebin";
/// Link attached to the activity.
pub const ACTIVITY_URL: &str = "https://pastebin.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceStatus {
    Online,
    Offline,
}

impl PresenceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PresenceStatus::Online => "online",
            PresenceStatus::Offline => "offline",
        }
    }
}

/// "Watching <name>" activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchingActivity {
    pub name: String,
    pub url: String,
}

/// Presence published on the chat platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Presence {
    pub status: PresenceStatus,
    pub activity: Option<WatchingActivity>,
}

impl Presence {
    /// Online, watching the paste site.
    pub fn online() -> Self {
        Self {
            status: PresenceStatus::Online,
            activity: Some(WatchingActivity {
                name: ACTIVITY_NAME.to_string(),
                url: ACTIVITY_URL.to_string(),
            }),
        }
    }

    pub fn offline() -> Self {
        Self {
            status: PresenceStatus::Offline,
            activity: None,
        }
    }
}

/// An established bot session on the chat platform.
#[async_trait::async_trait]
pub trait ChatSession: Send + Sync {
    async fn update_presence(&self, presence: &Presence) -> Result<(), NotifyError>;

    async fn send_message(&self, channel_id: &str, content: &str) -> Result<(), NotifyError>;

    /// Close the session. The session is unusable afterwards.
    async fn close(self: Box<Self>) -> Result<(), NotifyError>;
}

/// Opens [`ChatSession`]s for a bot token.
#[async_trait::async_trait]
pub trait SessionConnector: Send + Sync {
    async fn connect(&self, token: &str) -> Result<Box<dyn ChatSession>, NotifyError>;
}

/// Posts alerts to one Discord channel through a bot session.
pub struct DiscordNotifier {
    token: String,
    channel_id: String,
    template: MessageTemplate,
    connector: Box<dyn SessionConnector>,
    session: Option<Box<dyn ChatSession>>,
}

impl DiscordNotifier {
    /// Build from a populated [`DiscordConfig`] using the Discord gateway.
    pub fn new(config: &DiscordConfig, template: Option<String>) -> Result<Self, NotifyError> {
        Self::with_connector(config, template, Box::new(GatewayConnector::default()))
    }

    /// Build with a custom session connector.
    pub fn with_connector(
        config: &DiscordConfig,
        template: Option<String>,
        connector: Box<dyn SessionConnector>,
    ) -> Result<Self, NotifyError> {
        let (Some(token), Some(channel_id)) = (config.token(), config.channel_id()) else {
            return Err(NotifyError::Config(
                "discord token and channel are not set".to_string(),
            ));
        };

        Ok(Self {
            token: token.to_string(),
            channel_id: channel_id.to_string(),
            template: MessageTemplate::or_default(template, DISCORD_TEMPLATE)?,
            connector,
            session: None,
        })
    }

    /// Message posted for `envelope`.
    pub fn message(&self, envelope: &MatchEnvelope) -> Result<String, NotifyError> {
        self.template.render(envelope)
    }
}

#[async_trait::async_trait]
impl Notifier for DiscordNotifier {
    /// Connect, then announce presence. If the announcement fails the fresh
    /// session is closed again and the backend does not start.
    async fn start(&mut self) -> Result<(), NotifyError> {
        let session = self.connector.connect(&self.token).await?;

        let announced = session.update_presence(&Presence::online()).await;
        if let Err(e) = announced {
            if let Err(close_err) = session.close().await {
                warn!(error = %close_err, "failed to close discord session after presence error");
            }
            return Err(e);
        }

        info!(channel = %self.channel_id, "discord bot online");
        self.session = Some(session);
        Ok(())
    }

    async fn send(&self, envelope: &MatchEnvelope) -> Result<(), NotifyError> {
        let session = self.session.as_ref().ok_or(NotifyError::NotConnected)?;
        let message = self.message(envelope)?;
        session.send_message(&self.channel_id, &message).await
    }

    /// Go offline, then close the session.
    async fn stop(&mut self) -> Result<(), NotifyError> {
        let Some(session) = self.session.take() else {
            return Ok(());
        };

        if let Err(e) = session.update_presence(&Presence::offline()).await {
            warn!(error = %e, "failed to set discord presence offline");
        }
        session.close().await?;

        info!("discord bot offline");
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "discord"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use pastewatch_core::config::DISCORD_TOKEN_LEN;
    use pastewatch_core::{MatchedRule, ScannedItem};

    type Log = Arc<Mutex<Vec<String>>>;

    struct MockSession {
        log: Log,
        fail_presence: bool,
    }

    #[async_trait::async_trait]
    impl ChatSession for MockSession {
        async fn update_presence(&self, presence: &Presence) -> Result<(), NotifyError> {
            self.log
                .lock()
                .unwrap()
                .push(format!("presence {}", presence.status.as_str()));
            if self.fail_presence {
                return Err(NotifyError::Gateway("presence rejected".into()));
            }
            Ok(())
        }

        async fn send_message(&self, channel_id: &str, content: &str) -> Result<(), NotifyError> {
            self.log
                .lock()
                .unwrap()
                .push(format!("send {channel_id} {content}"));
            Ok(())
        }

        async fn close(self: Box<Self>) -> Result<(), NotifyError> {
            self.log.lock().unwrap().push("close".into());
            Ok(())
        }
    }

    struct MockConnector {
        log: Log,
        fail_connect: bool,
        fail_presence: bool,
    }

    #[async_trait::async_trait]
    impl SessionConnector for MockConnector {
        async fn connect(&self, token: &str) -> Result<Box<dyn ChatSession>, NotifyError> {
            self.log.lock().unwrap().push(format!("connect {}", token.len()));
            if self.fail_connect {
                return Err(NotifyError::Gateway("connect refused".into()));
            }
            Ok(Box::new(MockSession {
                log: self.log.clone(),
                fail_presence: self.fail_presence,
            }))
        }
    }

    fn config() -> DiscordConfig {
        let mut cfg = DiscordConfig::default();
        cfg.set_from_str(&format!("{}\n4242\n", "t".repeat(DISCORD_TOKEN_LEN)))
            .unwrap();
        cfg
    }

    fn notifier(log: &Log, fail_connect: bool, fail_presence: bool) -> DiscordNotifier {
        DiscordNotifier::with_connector(
            &config(),
            None,
            Box::new(MockConnector {
                log: log.clone(),
                fail_connect,
                fail_presence,
            }),
        )
        .unwrap()
    }

    fn envelope() -> MatchEnvelope {
        MatchEnvelope::new(
            ScannedItem::new("abc123", "Sample", ""),
            vec![MatchedRule::new("X")],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn lifecycle_order() {
        let log: Log = Arc::default();
        let mut n = notifier(&log, false, false);

        n.start().await.unwrap();
        n.send(&envelope()).await.unwrap();
        n.stop().await.unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                format!("connect {DISCORD_TOKEN_LEN}"),
                "presence online".to_string(),
                "send 4242 [X] Sample: https://pastebin.com/abc123".to_string(),
                "presence offline".to_string(),
                "close".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn connect_failure_aborts_start() {
        let log: Log = Arc::default();
        let mut n = notifier(&log, true, false);
        assert!(n.start().await.is_err());
        assert!(matches!(
            n.send(&envelope()).await,
            Err(NotifyError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn presence_failure_closes_session() {
        let log: Log = Arc::default();
        let mut n = notifier(&log, false, true);
        assert!(n.start().await.is_err());
        assert_eq!(
            log.lock().unwrap().last().map(String::as_str),
            Some("close")
        );
        // Nothing left to tear down.
        n.stop().await.unwrap();
        assert_eq!(log.lock().unwrap().len(), 3);
    }

    #[test]
    fn unset_config_is_rejected() {
        let result = DiscordNotifier::with_connector(
            &DiscordConfig::default(),
            None,
            Box::new(MockConnector {
                log: Arc::default(),
                fail_connect: false,
                fail_presence: false,
            }),
        );
        assert!(matches!(result, Err(NotifyError::Config(_))));
    }
}
