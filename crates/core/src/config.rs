use std::fmt;
use std::fs;
use std::path::Path;

use url::Url;

use crate::error::ConfigError;

/// Expected length of a Discord bot token.
pub const DISCORD_TOKEN_LEN: usize = 72;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn read_config_file(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })
}

// ── Slack ─────────────────────────────────────────────────────

/// Incoming-webhook endpoint for the Slack backend.
///
/// Starts empty and may be populated exactly once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlackConfig {
    endpoint_url: Option<String>,
}

impl SlackConfig {
    /// Populate from a config file holding a single URL line.
    pub fn set_from_file(&mut self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        if self.is_set() {
            return Err(ConfigError::AlreadySet);
        }
        let contents = read_config_file(path.as_ref())?;
        self.set_from_str(&contents)
    }

    /// Populate from the raw config contents. The URL is trimmed, parsed and
    /// stored in its canonical serialization.
    pub fn set_from_str(&mut self, contents: &str) -> Result<(), ConfigError> {
        if self.is_set() {
            return Err(ConfigError::AlreadySet);
        }
        let url = Url::parse(contents.trim())?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Malformed(format!(
                "unsupported webhook scheme '{}'",
                url.scheme()
            )));
        }
        self.endpoint_url = Some(url.to_string());
        Ok(())
    }

    pub fn is_set(&self) -> bool {
        self.endpoint_url.is_some()
    }

    pub fn endpoint_url(&self) -> Option<&str> {
        self.endpoint_url.as_deref()
    }
}

// ── Discord ───────────────────────────────────────────────────

/// Bot credentials and target channel for the Discord backend.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct DiscordConfig {
    credentials: Option<(String, String)>,
}

impl DiscordConfig {
    /// Populate from a config file: token on the first line, channel id on
    /// the second.
    pub fn set_from_file(&mut self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        if self.is_set() {
            return Err(ConfigError::AlreadySet);
        }
        let contents = read_config_file(path.as_ref())?;
        self.set_from_str(&contents)
    }

    pub fn set_from_str(&mut self, contents: &str) -> Result<(), ConfigError> {
        if self.is_set() {
            return Err(ConfigError::AlreadySet);
        }

        let mut lines = contents.trim().lines().map(str::trim);
        let token = lines.next().unwrap_or_default();
        let channel = lines.next().unwrap_or_default();

        if token.len() != DISCORD_TOKEN_LEN {
            return Err(ConfigError::TokenLength {
                expected: DISCORD_TOKEN_LEN,
                actual: token.len(),
            });
        }
        if channel.is_empty() {
            return Err(ConfigError::Malformed(
                "missing discord channel id on second line".to_string(),
            ));
        }

        self.credentials = Some((token.to_string(), channel.to_string()));
        Ok(())
    }

    pub fn is_set(&self) -> bool {
        self.credentials.is_some()
    }

    pub fn token(&self) -> Option<&str> {
        self.credentials.as_ref().map(|(token, _)| token.as_str())
    }

    pub fn channel_id(&self) -> Option<&str> {
        self.credentials.as_ref().map(|(_, channel)| channel.as_str())
    }
}

impl fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("token", &self.token().map(|_| "<redacted>"))
            .field("channel_id", &self.channel_id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_token() -> String {
        "x".repeat(DISCORD_TOKEN_LEN)
    }

    #[test]
    fn slack_url_is_trimmed_and_canonicalized() {
        let mut cfg = SlackConfig::default();
        cfg.set_from_str("  https://hooks.slack.com/services/T0/B0/xyz \n")
            .unwrap();
        assert_eq!(
            cfg.endpoint_url(),
            Some("https://hooks.slack.com/services/T0/B0/xyz")
        );

        let mut bare = SlackConfig::default();
        bare.set_from_str("HTTPS://Example.COM").unwrap();
        assert_eq!(bare.endpoint_url(), Some("https://example.com/"));
    }

    #[test]
    fn slack_set_twice_is_rejected() {
        let mut cfg = SlackConfig::default();
        cfg.set_from_str("https://example.com/hook").unwrap();
        let err = cfg.set_from_str("https://example.com/other").unwrap_err();
        assert!(matches!(err, ConfigError::AlreadySet));
        assert_eq!(cfg.endpoint_url(), Some("https://example.com/hook"));
    }

    #[test]
    fn slack_malformed_url_is_rejected() {
        let mut cfg = SlackConfig::default();
        assert!(matches!(
            cfg.set_from_str("not a url"),
            Err(ConfigError::InvalidUrl(_))
        ));
        assert!(matches!(
            cfg.set_from_str("ftp://example.com/hook"),
            Err(ConfigError::Malformed(_))
        ));
        assert!(!cfg.is_set());
    }

    #[test]
    fn slack_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("slack.conf");
        fs::write(&path, "https://example.com/hook\n").unwrap();

        let mut cfg = SlackConfig::default();
        cfg.set_from_file(&path).unwrap();
        assert!(cfg.is_set());
        assert!(matches!(
            cfg.set_from_file(&path),
            Err(ConfigError::AlreadySet)
        ));
    }

    #[test]
    fn missing_file_reports_path() {
        let mut cfg = SlackConfig::default();
        let err = cfg.set_from_file("/nonexistent/slack.conf").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/slack.conf"));
    }

    #[test]
    fn discord_token_and_channel() {
        let mut cfg = DiscordConfig::default();
        cfg.set_from_str(&format!("{}\n123456789012345678\n", valid_token()))
            .unwrap();
        assert_eq!(cfg.token(), Some(valid_token().as_str()));
        assert_eq!(cfg.channel_id(), Some("123456789012345678"));
    }

    #[test]
    fn discord_wrong_token_length_is_rejected() {
        let mut cfg = DiscordConfig::default();
        let err = cfg.set_from_str("short-token\n1234\n").unwrap_err();
        match err {
            ConfigError::TokenLength { expected, actual } => {
                assert_eq!(expected, DISCORD_TOKEN_LEN);
                assert_eq!(actual, "short-token".len());
            }
            other => panic!("expected TokenLength, got: {other:?}"),
        }
        assert!(!cfg.is_set());
    }

    #[test]
    fn discord_missing_channel_is_rejected() {
        let mut cfg = DiscordConfig::default();
        let err = cfg.set_from_str(&valid_token()).unwrap_err();
        assert!(matches!(err, ConfigError::Malformed(_)));
    }

    #[test]
    fn discord_set_twice_is_rejected() {
        let mut cfg = DiscordConfig::default();
        let contents = format!("{}\n42\n", valid_token());
        cfg.set_from_str(&contents).unwrap();
        assert!(matches!(
            cfg.set_from_str(&contents),
            Err(ConfigError::AlreadySet)
        ));
    }

    #[test]
    fn discord_debug_redacts_token() {
        let mut cfg = DiscordConfig::default();
        cfg.set_from_str(&format!("{}\n42\n", valid_token())).unwrap();
        let dbg = format!("{cfg:?}");
        assert!(!dbg.contains(&valid_token()));
        assert!(dbg.contains("<redacted>"));
    }
}
