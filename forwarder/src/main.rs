use std::{env, path::PathBuf, process::ExitCode};

use anyhow::Context;
use mailfwd_utils::{load_config, Forwarder};
use tokio::io::AsyncReadExt;
use tracing::{error, info};

const CONFIG_ENV: &str = "MAILFWD_CONFIG";
const DEFAULT_CONFIG: &str = "config.toml";

/// Reads a single inbound notification from stdin and forwards the
/// message it announces.
///
/// Invoked by the platform trigger once per received message, a non-zero
/// exit code signals that the message was not forwarded.
#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{e:#}"), "Failed to forward message");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let config_path =
        PathBuf::from(env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG.to_string()));
    let config = load_config(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let forwarder = Forwarder::from_config(&config.forwarder)?;

    let mut event = Vec::new();
    tokio::io::stdin()
        .read_to_end(&mut event)
        .await
        .context("reading notification from stdin")?;

    let outcome = forwarder.process_event(&event).await?;
    info!(
        dispatch_id = %outcome.message_id,
        resolved_origin = %outcome.resolved_origin,
        destinations = outcome.destinations.len(),
        "Done"
    );
    Ok(())
}
