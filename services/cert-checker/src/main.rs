//! Cert Checker CLI
//!
//! Command-line interface for the certificate expiry monitoring service.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;

use cert_checker::{load_config, CheckerBuilder};
use clap::Parser;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

#[derive(Parser)]
#[command(name = "cert-checker")]
#[command(about = "TLS certificate expiry monitoring and alerting service")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.json")]
    config: PathBuf,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: Level,

    /// Also append log output to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Run a single check cycle and exit
    #[arg(long)]
    once: bool,

    /// Warning threshold in days (overrides config file)
    #[arg(long)]
    threshold_days: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    match &args.log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            tracing_subscriber::fmt()
                .with_max_level(args.log_level)
                .with_ansi(false)
                .with_writer(std::io::stdout.and(Arc::new(file)))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_max_level(args.log_level)
                .init();
        }
    }

    tracing::debug!(
        "Parsed command line arguments: config={:?}, log_level={:?}, log_file={:?}, once={}, threshold_days={:?}",
        args.config,
        args.log_level,
        args.log_file,
        args.once,
        args.threshold_days
    );

    // reqwest and lettre both pull in rustls; pin the process-wide provider
    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
    {
        tracing::debug!("rustls crypto provider already installed");
    }

    tracing::debug!("Loading configuration from {:?}", args.config);
    let mut config = load_config(&args.config)?;
    config.resolve_secrets()?;

    if let Some(threshold_days) = args.threshold_days {
        config.alert.threshold_days = threshold_days;
    }

    tracing::info!("Starting cert checker");
    tracing::debug!(
        "Static domains: {}, remote list: {}, threshold: {} day(s)",
        config.domains.list.len(),
        config.domains.use_remote_list,
        config.alert.threshold_days
    );

    let checker = CheckerBuilder::new(config).build().await?;

    if args.once {
        let report = checker.run_once().await;
        tracing::info!(
            "Single run complete: {} checked, {} failed, {} alert(s)",
            report.checked(),
            report.check_failures(),
            report.alerts_dispatched()
        );
        return Ok(());
    }

    checker.start().await?;

    Ok(())
}
