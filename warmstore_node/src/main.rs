//! warmstored: serves the storage payments API for one wallet

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use ethers::providers::{Http, Provider};
use ethers::signers::{LocalWallet, Signer};
use log::info;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

use warmstore_node::api;
use warmstore_node::config::Config;
use warmstore_node::payments::{
    BalanceSource, ChainBalanceSource, PaymentExecutor, StorageManager, StorageTarget,
};
use warmstore_node::types::epochs;

#[derive(Parser)]
#[command(
    name = "warmstored",
    about = "Storage payment engine daemon for the Warmstore marketplace"
)]
struct Cli {
    /// Path to the TOML configuration file; defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured API listen address
    #[arg(long)]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let listen = cli
        .listen
        .unwrap_or_else(|| config.api.listen_addr.clone());

    let provider = Provider::<Http>::try_from(config.chain.rpc_url.as_str())
        .map_err(|e| anyhow!("failed to create provider for {}: {}", config.chain.rpc_url, e))?;

    let wallet = match &config.chain.private_key {
        Some(pk) => Some(
            pk.parse::<LocalWallet>()
                .map_err(|e| anyhow!("invalid chain.private_key: {}", e))?
                .with_chain_id(config.chain.chain_id),
        ),
        None => None,
    };
    let owner = match (&wallet, &config.chain.wallet_address) {
        (Some(w), _) => w.address(),
        (None, Some(addr)) => addr
            .parse()
            .map_err(|e| anyhow!("invalid chain.wallet_address {}: {}", addr, e))?,
        (None, None) => {
            return Err(anyhow!(
                "configure chain.private_key, or chain.wallet_address for read-only mode"
            ))
        }
    };

    let usdfc = config.chain.usdfc_address()?;
    let payments_contract = config.chain.payments_address()?;
    let operator = config.chain.operator_address()?;

    let source = Arc::new(ChainBalanceSource::new(
        provider.clone(),
        owner,
        usdfc,
        payments_contract,
        operator,
    ));
    let executor = wallet.map(|w| {
        PaymentExecutor::new(
            provider,
            w,
            source.clone() as Arc<dyn BalanceSource>,
            usdfc,
            payments_contract,
            operator,
            epochs(config.storage.persistence_days),
            config.chain.confirmations,
        )
    });
    if executor.is_none() {
        info!("no signing key configured; running read-only");
    }

    let manager = StorageManager::new(
        source,
        executor,
        StorageTarget::from(&config.storage),
        config.pricing.price()?,
    );

    let app = api::router(Arc::new(RwLock::new(manager)));
    let listener = tokio::net::TcpListener::bind(&listen)
        .await
        .with_context(|| format!("failed to bind {}", listen))?;
    info!(
        "warmstored serving wallet {:?} on {} (target {}GB / {}d)",
        owner, listen, config.storage.capacity_gb, config.storage.persistence_days
    );
    axum::serve(listener, app).await.context("API server exited")
}
