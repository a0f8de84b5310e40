//! Minijinja templates for alert messages.
//!
//! Every backend renders its message from the same context: the item's
//! identifier, title and link plus the matched rule names in match order.
//! Templates are arbitrary strings, so a fresh [`minijinja::Environment`]
//! is created per render call.

use pastewatch_core::MatchEnvelope;

use crate::traits::NotifyError;

/// Default Slack message: a header line, the link, the title, then every
/// rule name followed by a space.
pub const SLACK_TEMPLATE: &str = "Pastebin Match\nURL: {{ link }}\nTitle: {{ title }}\nMatches: {% for name in matches %}{{ name }} {% endfor %}";

/// Default Discord message: bracketed rule names, then `title: link`.
pub const DISCORD_TEMPLATE: &str = "{% for name in matches %}[{{ name }}]{% endfor %} {{ title }}: {{ link }}";

/// Context data available to message templates.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MessageContext<'a> {
    pub identifier: &'a str,
    pub title: &'a str,
    pub link: String,
    pub matches: Vec<&'a str>,
}

impl<'a> MessageContext<'a> {
    pub fn from_envelope(envelope: &'a MatchEnvelope) -> Self {
        Self {
            identifier: &envelope.item().identifier,
            title: &envelope.item().title,
            link: envelope.link(),
            matches: envelope.rule_names().collect(),
        }
    }
}

/// A validated message template.
#[derive(Debug, Clone)]
pub struct MessageTemplate {
    source: String,
}

impl MessageTemplate {
    /// Parse-check `source` and keep it for rendering.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Template`] if the template has syntax errors.
    pub fn new(source: impl Into<String>) -> Result<Self, NotifyError> {
        let source = source.into();
        let env = minijinja::Environment::new();
        env.template_from_str(&source)
            .map_err(|e| NotifyError::Template(e.to_string()))?;
        Ok(Self { source })
    }

    /// Use `custom` when given, `default` otherwise.
    pub fn or_default(custom: Option<String>, default: &str) -> Result<Self, NotifyError> {
        Self::new(custom.unwrap_or_else(|| default.to_string()))
    }

    pub fn render(&self, envelope: &MatchEnvelope) -> Result<String, NotifyError> {
        let env = minijinja::Environment::new();
        env.render_str(&self.source, MessageContext::from_envelope(envelope))
            .map_err(|e| NotifyError::Template(e.to_string()))
    }
}
