use std::path::PathBuf;

use clap::Parser;
use pastewatch_rules::{GlobalDefinition, RuleDescriptor, RuleDescriptorSet};

/// Scan pastes against compiled rules and alert Slack and Discord on matches.
#[derive(Parser, Debug)]
#[command(name = "pastewatch", version, about)]
pub struct CliArgs {
    /// Rule file to compile, as `path` or `namespace:path`. Repeatable.
    #[arg(long = "rules", value_name = "[NS:]PATH", required = true)]
    pub rules: Vec<RuleDescriptor>,

    /// External variable made available to rules, as `name=value`.
    #[arg(long = "define", value_name = "NAME=VALUE")]
    pub defines: Vec<GlobalDefinition>,

    /// Slack config file holding the incoming-webhook URL.
    #[arg(long, env = "PASTEWATCH_SLACK", value_name = "FILE")]
    pub slack: Vec<PathBuf>,

    /// Discord config file: bot token on line one, channel id on line two.
    #[arg(long, env = "PASTEWATCH_DISCORD", value_name = "FILE")]
    pub discord: Vec<PathBuf>,

    /// Message template overriding the default Slack layout.
    #[arg(long, env = "PASTEWATCH_SLACK_TEMPLATE")]
    pub slack_template: Option<String>,

    /// Message template overriding the default Discord layout.
    #[arg(long, env = "PASTEWATCH_DISCORD_TEMPLATE")]
    pub discord_template: Option<String>,

    /// JSON-lines file of scanned items (default: stdin).
    #[arg(long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Send one test notification to every configured backend and exit.
    #[arg(long)]
    pub test_notify: bool,

    /// Seconds backends may spend draining their queues after input ends.
    #[arg(long, env = "PASTEWATCH_SHUTDOWN_TIMEOUT", default_value_t = 10)]
    pub shutdown_timeout: u64,
}

impl CliArgs {
    pub fn descriptor_set(&self) -> RuleDescriptorSet {
        self.rules.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rules_are_required() {
        assert!(CliArgs::try_parse_from(["pastewatch"]).is_err());
    }

    #[test]
    fn repeated_rules_keep_order() {
        let args = CliArgs::try_parse_from([
            "pastewatch",
            "--rules",
            "a.yar",
            "--rules",
            "creds:b.yar",
        ])
        .unwrap();
        let set = args.descriptor_set();
        assert_eq!(set.to_string(), "a.yar creds:b.yar");
        assert_eq!(args.shutdown_timeout, 10);
        assert!(!args.test_notify);
    }

    #[test]
    fn empty_namespace_source_is_rejected() {
        assert!(CliArgs::try_parse_from(["pastewatch", "--rules", "ns:"]).is_err());
    }

    #[test]
    fn defines_parse() {
        let args = CliArgs::try_parse_from([
            "pastewatch",
            "--rules",
            "a.yar",
            "--define",
            "strict=true",
        ])
        .unwrap();
        assert_eq!(args.defines.len(), 1);
        assert_eq!(args.defines[0].name, "strict");
    }

    #[test]
    fn backend_flags_collect_every_occurrence() {
        let args = CliArgs::try_parse_from([
            "pastewatch",
            "--rules",
            "a.yar",
            "--slack",
            "one.conf",
            "--slack",
            "two.conf",
        ])
        .unwrap();
        assert_eq!(args.slack.len(), 2);
    }
}
