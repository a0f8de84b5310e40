use std::fmt;
use std::sync::Arc;

use pastewatch_core::MatchedRule;

use crate::error::ScanError;

/// Namespace that unqualified rule sources are registered under.
pub const GLOBAL_NAMESPACE: &str = "default";

/// Compiled, immutable rule set.
///
/// Cloning is cheap and every clone shares the same compiled rules, so any
/// number of scanning tasks can hold one without locking.
#[derive(Clone)]
pub struct ScanningEngine {
    rules: Arc<yara_x::Rules>,
}

impl ScanningEngine {
    pub(crate) fn new(rules: yara_x::Rules) -> Self {
        Self {
            rules: Arc::new(rules),
        }
    }

    /// Evaluate `data` against every rule, returning the rules that fired in
    /// the order the engine reports them.
    pub fn scan(&self, data: &[u8]) -> Result<Vec<MatchedRule>, ScanError> {
        let mut scanner = yara_x::Scanner::new(&self.rules);
        let results = scanner.scan(data).map_err(|e| ScanError(e.to_string()))?;

        Ok(results
            .matching_rules()
            .map(|rule| MatchedRule::new(qualified_name(rule.namespace(), rule.identifier())))
            .collect())
    }

    pub fn scan_str(&self, text: &str) -> Result<Vec<MatchedRule>, ScanError> {
        self.scan(text.as_bytes())
    }

    /// Number of compiled rules across all namespaces.
    pub fn rule_count(&self) -> usize {
        self.rules.iter().count()
    }
}

impl fmt::Debug for ScanningEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanningEngine").finish_non_exhaustive()
    }
}

fn qualified_name(namespace: &str, identifier: &str) -> String {
    if namespace == GLOBAL_NAMESPACE {
        identifier.to_string()
    } else {
        format!("{namespace}:{identifier}")
    }
}
