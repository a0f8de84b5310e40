//! Slack incoming-webhook notifier.
//!
//! Stateless: one JSON POST per envelope, no connection state kept between
//! envelopes beyond the pooled HTTP client.

use pastewatch_core::{MatchEnvelope, SlackConfig};

use crate::templating::{MessageTemplate, SLACK_TEMPLATE};
use crate::traits::{Notifier, NotifyError};

/// Posts `{"text": ...}` to a Slack incoming webhook.
#[derive(Debug)]
pub struct SlackNotifier {
    endpoint_url: String,
    template: MessageTemplate,
    client: reqwest::Client,
}

impl SlackNotifier {
    /// Build from a populated [`SlackConfig`], optionally overriding the
    /// message template.
    pub fn new(config: &SlackConfig, template: Option<String>) -> Result<Self, NotifyError> {
        let endpoint_url = config
            .endpoint_url()
            .ok_or_else(|| NotifyError::Config("slack endpoint url is not set".to_string()))?
            .to_string();

        Ok(Self {
            endpoint_url,
            template: MessageTemplate::or_default(template, SLACK_TEMPLATE)?,
            client: reqwest::Client::new(),
        })
    }

    /// JSON body posted for `envelope`.
    pub fn payload(&self, envelope: &MatchEnvelope) -> Result<serde_json::Value, NotifyError> {
        let text = self.template.render(envelope)?;
        Ok(serde_json::json!({ "text": text }))
    }
}

#[async_trait::async_trait]
impl Notifier for SlackNotifier {
    /// POST the rendered message. The response status is logged only; a
    /// non-2xx answer is not a delivery failure.
    async fn send(&self, envelope: &MatchEnvelope) -> Result<(), NotifyError> {
        let body = serde_json::to_vec(&self.payload(envelope)?)?;

        tracing::debug!(
            item = %envelope.item().identifier,
            payload = %String::from_utf8_lossy(&body),
            "sending slack message"
        );

        let response = self
            .client
            .post(&self.endpoint_url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;
        let status = response.status();

        if status.is_success() {
            tracing::info!(%status, item = %envelope.item().identifier, "slack webhook responded");
        } else {
            tracing::warn!(
                %status,
                item = %envelope.item().identifier,
                "slack webhook returned non-2xx status"
            );
        }

        Ok(())
    }

    fn channel_name(&self) -> &str {
        "slack"
    }
}
