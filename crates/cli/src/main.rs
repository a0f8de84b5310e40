//! pastewatch: scan pastes against compiled rules and alert on matches.
//!
//! Reads scanned items as JSON lines, evaluates each body against the rule
//! set, and fans every match out to the configured Slack and Discord
//! backends. Each backend runs in its own task with its own queue.

mod cli;
mod pipeline;
mod scan;

use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufRead, BufReader};
use tracing::{error, info, warn};

use pastewatch_core::config::load_dotenv;
use pastewatch_core::{DiscordConfig, SlackConfig};
use pastewatch_notify::{DiscordNotifier, Notifier, SlackNotifier};
use pastewatch_rules::compile_with_globals;

use crate::cli::CliArgs;
use crate::pipeline::run_pipeline;

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> ExitCode {
    load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = CliArgs::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{e:#}"), "pastewatch failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: CliArgs) -> Result<()> {
    let mut slack_config = SlackConfig::default();
    for path in &args.slack {
        slack_config
            .set_from_file(path)
            .with_context(|| format!("invalid slack config '{}'", path.display()))?;
    }

    let mut discord_config = DiscordConfig::default();
    for path in &args.discord {
        discord_config
            .set_from_file(path)
            .with_context(|| format!("invalid discord config '{}'", path.display()))?;
    }

    let notifiers = build_notifiers(&args, &slack_config, &discord_config)?;

    let descriptors = args.descriptor_set();
    let engine =
        compile_with_globals(&descriptors, &args.defines).context("failed to compile rules")?;

    if args.test_notify {
        return test_notify(notifiers).await;
    }

    // Open the input before any backend connects.
    let reader = open_input(args.input.as_deref()).await?;

    if notifiers.is_empty() {
        warn!("no delivery backend configured, matches will only be logged");
    }

    let drain_timeout = Duration::from_secs(args.shutdown_timeout);
    run_pipeline(reader, &engine, notifiers, drain_timeout, shutdown_signal).await?;

    info!("pastewatch exited cleanly");
    Ok(())
}

/// The `--input` file, or stdin when none is given.
async fn open_input(path: Option<&Path>) -> Result<Box<dyn AsyncBufRead + Unpin + Send>> {
    match path {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("failed to open input '{}'", path.display()))?;
            Ok(Box::new(BufReader::new(file)))
        }
        None => Ok(Box::new(BufReader::new(tokio::io::stdin()))),
    }
}

fn build_notifiers(
    args: &CliArgs,
    slack_config: &SlackConfig,
    discord_config: &DiscordConfig,
) -> Result<Vec<Box<dyn Notifier>>> {
    let mut notifiers: Vec<Box<dyn Notifier>> = Vec::new();

    if slack_config.is_set() {
        let slack = SlackNotifier::new(slack_config, args.slack_template.clone())
            .context("failed to set up slack backend")?;
        notifiers.push(Box::new(slack));
    }
    if discord_config.is_set() {
        let discord = DiscordNotifier::new(discord_config, args.discord_template.clone())
            .context("failed to set up discord backend")?;
        notifiers.push(Box::new(discord));
    }

    Ok(notifiers)
}

/// Start each backend, send one test envelope, stop it again.
async fn test_notify(notifiers: Vec<Box<dyn Notifier>>) -> Result<()> {
    if notifiers.is_empty() {
        bail!("--test-notify needs at least one of --slack or --discord");
    }

    let mut failed = 0usize;
    for mut notifier in notifiers {
        let backend = notifier.channel_name().to_string();
        if let Err(e) = notifier.start().await {
            error!(backend = %backend, error = %e, "backend failed to start");
            failed += 1;
            continue;
        }

        match notifier.test().await {
            Ok(()) => info!(backend = %backend, "test notification sent"),
            Err(e) => {
                error!(backend = %backend, error = %e, "test notification failed");
                failed += 1;
            }
        }

        if let Err(e) = notifier.stop().await {
            warn!(backend = %backend, error = %e, "backend stop returned error");
        }
    }

    if failed > 0 {
        bail!("{failed} backend(s) failed the notification test");
    }
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl_c");
            futures::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {},
                    _ = sigterm.recv() => {},
                }
            }
            Err(e) => {
                warn!(error = %e, "failed to register SIGTERM handler");
                ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await;
    }
}
