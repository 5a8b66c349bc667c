mod adapters;
mod config;
mod domain;
mod models;
mod services;

use crate::adapters::polymarket::{AlloyChain, ChainClient, PositionsClient};
use crate::config::{Args, Config};
use crate::services::redemption_orchestrator::RedemptionOrchestrator;
use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use std::sync::Arc;
use tokio::signal::unix::{signal, Signal, SignalKind};
use tokio::sync::watch;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_args(Args::parse()).context("Invalid configuration")?;

    let chain = AlloyChain::connect(&config.rpc_url, config.private_key()).await?;
    info!(
        "signer={:#x} wallet={:#x} rpc={}",
        chain.signer_address(),
        config.wallet_address,
        config.rpc_url
    );
    let positions = PositionsClient::new(config.positions_url.clone())
        .context("Failed to create HTTP client")?;
    let orchestrator = RedemptionOrchestrator::new(positions, Arc::new(chain), config.wallet_address);

    let mut sigterm = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        let name = wait_for_shutdown(&mut sigterm, &mut sigint).await;
        info!("shutdown_requested signal={}", name);
        if shutdown_tx.send(true).is_err() {
            warn!("shutdown_requested but the polling loop is already gone");
        }
    });

    orchestrator.run(config.poll_interval, shutdown_rx).await;
    Ok(())
}

async fn wait_for_shutdown(sigterm: &mut Signal, sigint: &mut Signal) -> &'static str {
    tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    }
}
