//! Uplink monitor agent.
//!
//! Lightweight daemon for mobile routers with several uplinks (satellite
//! dish, cellular modems, WiFi clients, LAN).
//!
//! - Creates one collector per configured link via the factory
//! - Samples every link on a fixed interval with per-class deadlines
//! - Emits one normalized JSON metrics record per line on stdout
//! - In `--simulate` mode, generates marked synthetic data for local dev

mod config;
mod sampler;
mod simulate;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use config::AgentConfig;
use sampler::Sampler;

/// Uplink health monitoring agent.
#[derive(Parser, Debug)]
#[command(name = "uplink-agent", about = "Uplink link-health monitor")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Sampling interval in seconds (overrides the config file).
    #[arg(long)]
    interval: Option<u64>,

    /// Sample every link once, then exit.
    #[arg(long, default_value_t = false)]
    once: bool,

    /// Run in simulation mode (fake hardware, marked synthesized).
    #[arg(long, default_value_t = false)]
    simulate: bool,
}

const DEFAULT_INTERVAL_SECS: u64 = 30;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AgentConfig::load(path)?,
        None => AgentConfig::default(),
    };

    let interval = Duration::from_secs(
        cli.interval
            .or(config.interval_secs)
            .unwrap_or(DEFAULT_INTERVAL_SECS),
    );
    let links: Vec<_> = config.links.iter().filter(|l| l.eligible).cloned().collect();
    if links.is_empty() {
        tracing::warn!("no eligible links configured, nothing to monitor");
        return Ok(());
    }

    tracing::info!(
        links = links.len(),
        interval_s = interval.as_secs(),
        simulate = cli.simulate,
        "uplink-agent starting"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sampler = Arc::new(Sampler {
        config: config.collector,
        interval,
        simulate: cli.simulate,
        once: cli.once,
        shutdown: shutdown_rx,
    });

    let mut handles = Vec::new();
    for link in links {
        let sampler = sampler.clone();
        let name = link.name.clone();
        let handle = tokio::spawn(async move {
            if let Err(err) = sampler.run_link(link).await {
                tracing::error!(link = %name, error = %err, "sampler task failed");
            }
        });
        handles.push(handle);
    }

    if cli.once {
        for handle in handles {
            let _ = handle.await;
        }
    } else {
        tokio::signal::ctrl_c().await?;
        tracing::info!("received SIGINT, shutting down");
        let _ = shutdown_tx.send(true);
        for handle in handles {
            let _ = handle.await;
        }
    }

    tracing::info!("uplink-agent stopped");
    Ok(())
}
