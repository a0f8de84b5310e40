use std::fmt;

use serde::{Deserialize, Serialize};

/// Base URL of the monitored paste site. Item identifiers are appended to it.
pub const PASTE_BASE_URL: &str = "https://pastebin.com/";

/// A scraped item as handed to the scanning loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannedItem {
    /// Paste identifier, e.g. `abc123`.
    pub identifier: String,
    pub title: String,
    /// Raw content. Only scanned, never shown in alerts.
    #[serde(default)]
    pub body: String,
}

impl ScannedItem {
    pub fn new(
        identifier: impl Into<String>,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            title: title.into(),
            body: body.into(),
        }
    }

    /// Public link to the item on the paste site.
    pub fn link(&self) -> String {
        format!("{PASTE_BASE_URL}{}", self.identifier)
    }
}

/// A rule that fired during a scan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatchedRule {
    /// Rule identifier, namespace-qualified (`ns:rule`) when the rule was
    /// registered under a named namespace.
    pub rule_name: String,
}

impl MatchedRule {
    pub fn new(rule_name: impl Into<String>) -> Self {
        Self {
            rule_name: rule_name.into(),
        }
    }
}

impl fmt::Display for MatchedRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rule_name)
    }
}

/// One scanned item together with the rules it triggered.
///
/// The match list is never empty: the only constructor refuses an empty one.
/// Envelopes are shared between backends behind an `Arc` and are immutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchEnvelope {
    item: ScannedItem,
    matches: Vec<MatchedRule>,
}

impl MatchEnvelope {
    /// Bundle an item with its matches. Returns `None` when nothing matched.
    pub fn new(item: ScannedItem, matches: Vec<MatchedRule>) -> Option<Self> {
        if matches.is_empty() {
            return None;
        }
        Some(Self { item, matches })
    }

    pub fn item(&self) -> &ScannedItem {
        &self.item
    }

    /// Matched rules in the order the engine reported them.
    pub fn matches(&self) -> &[MatchedRule] {
        &self.matches
    }

    pub fn link(&self) -> String {
        self.item.link()
    }

    pub fn rule_names(&self) -> impl Iterator<Item = &str> {
        self.matches.iter().map(|m| m.rule_name.as_str())
    }
}
