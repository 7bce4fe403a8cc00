//! holewatchd: the holewatch daemon.
//!
//! Polls every configured device's admin API, confirms health changes,
//! and sends them to the configured chat recipients.
//!
//! # Usage
//!
//! ```text
//! holewatchd run --config /etc/holewatch/holewatch.toml
//! holewatchd check --config holewatch.toml
//! holewatchd validate --config holewatch.toml
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::watch;
use tracing::{error, info};

use holewatch_core::{Config, TransitionEvent};
use holewatch_health::{
    poll_device, BoxFuture, Coordinator, HttpFetcher, HttpUplink, TransitionCallback,
};
use holewatch_notify::{LogNotifier, Notifier, TelegramNotifier};

/// Covers every `holewatch*` crate target, the daemon included.
const DEFAULT_FILTER: &str = "info,holewatch=debug";

#[derive(Parser)]
#[command(
    name = "holewatchd",
    about = "Ad-blocker health monitor with chat notifications",
    version,
    propagate_version = true
)]
struct Cli {
    /// Log output format.
    #[arg(long, value_enum, default_value = "text", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Monitor devices until interrupted.
    Run {
        /// Path to the configuration file.
        #[arg(short, long, default_value = "holewatch.toml")]
        config: PathBuf,

        /// Log transitions instead of sending them.
        #[arg(long)]
        dry_run: bool,
    },
    /// Poll every device once and print its classified status.
    Check {
        #[arg(short, long, default_value = "holewatch.toml")]
        config: PathBuf,
    },
    /// Load and validate the configuration, then exit.
    Validate {
        #[arg(short, long, default_value = "holewatch.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format)?;

    match cli.command {
        Command::Run { config, dry_run } => run(&config, dry_run).await,
        Command::Check { config } => check(&config).await,
        Command::Validate { config } => {
            let config = load(&config)?;
            println!("✓ configuration valid ({} devices)", config.devices.len());
            Ok(())
        }
    }
}

fn init_tracing(format: LogFormat) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(DEFAULT_FILTER))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
    Ok(())
}

fn load(path: &Path) -> anyhow::Result<Config> {
    Config::from_file(path).with_context(|| format!("loading {}", path.display()))
}

async fn run(path: &Path, dry_run: bool) -> anyhow::Result<()> {
    let config = load(path)?;
    info!(path = %path.display(), "holewatchd starting");

    let devices = config.devices()?;
    let callback = if dry_run {
        info!("dry run: transitions will be logged, not sent");
        into_callback(LogNotifier)
    } else {
        let notifier = TelegramNotifier::builder()
            .api_base(config.api_base())
            .token(config.telegram.token.clone())
            .timeout(config.notify_timeout()?)
            .recipients(config.recipients.clone())
            .build()?;
        into_callback(notifier)
    };

    let mut coordinator = Coordinator::new(HttpFetcher, devices).with_callback(callback);
    if let Some(ref connectivity) = config.connectivity {
        let uplink = HttpUplink::new(
            &connectivity.url,
            connectivity.verify_tls,
            config.connectivity_timeout()?,
        )?;
        info!(url = %connectivity.url, "connectivity pre-check enabled");
        coordinator = coordinator.with_connectivity(uplink);
    }

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    coordinator.run(config.startup_delay()?, shutdown_rx).await;

    info!("holewatchd stopped");
    Ok(())
}

async fn check(path: &Path) -> anyhow::Result<()> {
    let config = load(path)?;
    for device in config.devices()? {
        let outcome = poll_device(&HttpFetcher, &device).await;
        println!(
            "{:<24} {:<20} {}",
            device.name,
            device.address,
            outcome.target_health()
        );
    }
    Ok(())
}

/// Adapt a notifier to the coordinator's callback shape.
fn into_callback<N: Notifier + 'static>(notifier: N) -> TransitionCallback {
    let notifier = Arc::new(notifier);
    Arc::new(move |event: TransitionEvent| -> BoxFuture {
        let notifier = notifier.clone();
        Box::pin(async move { notifier.notify(&event).await })
    })
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    result = tokio::signal::ctrl_c() => {
                        if let Err(e) = result {
                            error!(error = %e, "failed to listen for ctrl-c");
                        }
                    }
                    _ = term.recv() => {}
                }
                return;
            }
            Err(e) => error!(error = %e, "failed to install SIGTERM handler"),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for ctrl-c");
        // Without a signal source, run until killed.
        std::future::pending::<()>().await;
    }
}
