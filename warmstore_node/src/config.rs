//! Node configuration
//!
//! Configuration is loaded from a TOML file and split into the chain
//! connection, the storage target the payment engine maintains, the pricing
//! schedule of the warm-storage operator, and the API listener. Defaults
//! target the public calibration network.

use anyhow::{anyhow, Context, Result};
use ethereum_types::U256;
use ethers::types::Address;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level node configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Chain connection and contract addresses
    #[serde(default)]
    pub chain: ChainConfig,
    /// Storage capacity/retention target maintained by the engine
    #[serde(default)]
    pub storage: StorageConfig,
    /// Operator pricing schedule
    #[serde(default)]
    pub pricing: PricingConfig,
    /// HTTP API listener
    #[serde(default)]
    pub api: ApiConfig,
}

/// Chain connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// JSON-RPC endpoint
    pub rpc_url: String,
    /// Expected chain ID (used when deriving the signing wallet)
    pub chain_id: u64,
    /// USDFC token contract address
    pub usdfc_token: String,
    /// Storage payments (escrow) contract address
    pub payments_contract: String,
    /// Warm-storage operator address holding the service approval
    pub warm_storage_operator: String,
    /// Hex-encoded signing key; absent means read-only mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    /// Wallet address observed in read-only mode; derived from the signing
    /// key when one is present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet_address: Option<String>,
    /// Confirmations to await on each submitted transaction
    pub confirmations: usize,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://api.calibration.node.glif.io/rpc/v1".to_string(),
            chain_id: 314159,
            usdfc_token: "0xb3042734b608a1B16e9e86B374A3f3e389B4cDf0".to_string(),
            payments_contract: "0x0E690D3e60B0576D01352AB03b258115eb84A047".to_string(),
            warm_storage_operator: "0x394feCa6bCB84502d93c0c5C03c620ba8897e8f4".to_string(),
            private_key: None,
            wallet_address: None,
            confirmations: 1,
        }
    }
}

impl ChainConfig {
    /// Parsed USDFC token address
    pub fn usdfc_address(&self) -> Result<Address> {
        self.usdfc_token
            .parse()
            .map_err(|e| anyhow!("invalid usdfc_token address {}: {}", self.usdfc_token, e))
    }

    /// Parsed payments contract address
    pub fn payments_address(&self) -> Result<Address> {
        self.payments_contract.parse().map_err(|e| {
            anyhow!(
                "invalid payments_contract address {}: {}",
                self.payments_contract,
                e
            )
        })
    }

    /// Parsed warm-storage operator address
    pub fn operator_address(&self) -> Result<Address> {
        self.warm_storage_operator.parse().map_err(|e| {
            anyhow!(
                "invalid warm_storage_operator address {}: {}",
                self.warm_storage_operator,
                e
            )
        })
    }
}

/// Storage target the engine keeps funded
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Desired storage capacity in GB
    pub capacity_gb: u64,
    /// Desired retention window in days
    pub persistence_days: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            capacity_gb: 10,
            persistence_days: 30,
        }
    }
}

/// Operator pricing schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    /// Price per TiB per 30-day month, as a decimal string in USDFC base units
    pub price_per_tib_per_month: String,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            // 2 USDFC / TiB / month
            price_per_tib_per_month: "2000000000000000000".to_string(),
        }
    }
}

impl PricingConfig {
    /// Parsed monthly TiB price in base units
    pub fn price(&self) -> Result<U256> {
        U256::from_dec_str(&self.price_per_tib_per_month).map_err(|e| {
            anyhow!(
                "invalid price_per_tib_per_month {}: {:?}",
                self.price_per_tib_per_month,
                e
            )
        })
    }
}

/// HTTP API listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Socket address the API server binds to
    pub listen_addr: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8099".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate addresses and pricing eagerly so misconfiguration fails at startup
    pub fn validate(&self) -> Result<()> {
        self.chain.usdfc_address()?;
        self.chain.payments_address()?;
        self.chain.operator_address()?;
        self.pricing.price()?;
        if self.storage.capacity_gb == 0 {
            return Err(anyhow!("storage.capacity_gb must be nonzero"));
        }
        if self.storage.persistence_days == 0 {
            return Err(anyhow!("storage.persistence_days must be nonzero"));
        }
        Ok(())
    }
}
