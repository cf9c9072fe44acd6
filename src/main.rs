mod batch;
mod cli;
mod config;
mod inventory;
mod links;
mod market;
mod report;
mod service;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;

use batch::executor::BatchExecutor;
use cli::Cli;
use config::AppConfig;
use market::client::HttpMarketplace;
use market::provider::MarketplaceApi;
use service::ListingService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = AppConfig::from_env().context("Failed to load configuration")?;
    tracing::info!("Marketplace API: {}", config.market.base_url);
    tracing::info!(
        "Upload batches of {} every {:?}, removal batches of {} every {:?}",
        config.batch.upload_batch_size,
        config.batch.upload_delay,
        config.batch.remove_batch_size,
        config.batch.remove_delay
    );

    let api: Arc<dyn MarketplaceApi> = Arc::new(
        HttpMarketplace::new(&config.market).context("Failed to build marketplace client")?,
    );

    // First Ctrl-C cancels the run (unfinished items are reported as cancelled),
    // a second one exits immediately
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        tracing::warn!("Interrupt received, cancelling remaining items");
        token.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Second interrupt received, exiting");
            std::process::exit(130);
        }
    });

    let executor = BatchExecutor::new(config.retry.clone()).with_cancellation(cancel.clone());
    let service = ListingService::new(api, executor, config.listing.clone(), config.batch.clone());

    cli::run(cli.command, &service, &config.market.listing_url, &cancel).await
}
