use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use redeliver_core::impls::{PgEventStore, SendGridClient};
use redeliver_core::{Config, DriverBuilder, PassLoop};

/// Reconcile SendGrid delivery activity with `email_data` and resend
/// undelivered mail.
#[derive(Debug, Parser)]
#[command(name = "redeliver", version)]
struct Args {
    /// Run a single pass and exit.
    #[arg(long)]
    once: bool,

    /// Poll, ingest and select, but send nothing.
    #[arg(long)]
    dry_run: bool,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, default_value = "info,redeliver_core=debug")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .init();

    let config = Config::from_env().context("loading configuration")?;

    let store = PgEventStore::connect(&config.database_url, config.http_timeout)
        .await
        .context("connecting to postgres")?;
    store.migrate().await.context("bootstrapping email_data")?;

    let provider = SendGridClient::new(
        config.api_key.clone(),
        &config.provider_base_url,
        config.http_timeout,
    )?;

    let driver = DriverBuilder::from_config(&config)
        .dry_run(args.dry_run)
        .store(Arc::new(store))
        .provider(Arc::new(provider))
        .build()?;

    tracing::info!(
        once = args.once,
        dry_run = args.dry_run,
        max_attempts = config.policy.max_attempts,
        "redeliver starting"
    );

    if args.once {
        return match driver.run_pass().await {
            Ok(report) => {
                tracing::info!(?report, "single pass complete");
                Ok(ExitCode::SUCCESS)
            }
            Err(e) => {
                tracing::error!(error = %e, kind = ?e.kind(), "single pass failed");
                Ok(ExitCode::FAILURE)
            }
        };
    }

    let passes = PassLoop::spawn(Arc::new(driver), config.interval);
    tokio::signal::ctrl_c()
        .await
        .context("waiting for ctrl-c")?;
    tracing::info!("shutdown requested, waiting for the current pass");
    passes.shutdown_and_join().await;
    Ok(ExitCode::SUCCESS)
}
