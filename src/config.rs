//! Environment-based Configuration for the OmniSweep Backend
//!
//! All sensitive values (the backend signer key, the aggregator API key)
//! come from environment variables, never from hardcoded values.
//!
//! # Recognized Environment Variables
//!
//! ## Signing
//! - `BACKEND_PRIVATE_KEY` - Hex-encoded key for the backend signer.
//!   Absent means read-only mode: startup succeeds, submission endpoints
//!   return SIGNER_UNAVAILABLE.
//!
//! ## Aggregator
//! - `ONEINCH_API_KEY` - Bearer key for the 1inch swap API
//! - `ONEINCH_API_URL` - Base URL override (primarily for tests)
//!
//! ## Server
//! - `PORT` - HTTP listen port (default: 3001)
//! - `ENABLE_EVENT_LISTENER` - "1" to run on-chain event subscriptions
//!
//! ## Chain access
//! - `ETH_SEPOLIA_RPC` / `AVALANCHE_FUJI_RPC` - RPC endpoint overrides
//! - `DATA_SOURCE` - "live" (on-chain reads) or "fixture" (demo data)
//!
//! ## Logging
//! - `LOG_LEVEL` - trace/debug/info/warn/error (default: info)
//! - `LOG_JSON` - "1" for JSON output

use std::env;
use std::str::FromStr;
use thiserror::Error;

use crate::contracts::Chain;

/// Default 1inch swap API base URL
pub const DEFAULT_ONEINCH_API_URL: &str = "https://api.1inch.dev/swap/v5.2";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Which data source backs chain reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    /// Real on-chain reads over RPC
    Live,
    /// Deterministic demo fixtures
    Fixture,
}

impl FromStr for DataSource {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "live" | "onchain" => Ok(DataSource::Live),
            "fixture" | "demo" | "mock" => Ok(DataSource::Fixture),
            _ => Err(ConfigError::InvalidValue(
                "DATA_SOURCE".to_string(),
                format!("unknown data source: {} (use 'live' or 'fixture')", s),
            )),
        }
    }
}

/// Main configuration struct
#[derive(Debug, Clone)]
pub struct OmniSweepConfig {
    /// HTTP listen port
    pub port: u16,

    /// Backend signer key, if configured. None means read-only mode.
    pub backend_private_key: Option<String>,

    /// 1inch API bearer key, if configured
    pub oneinch_api_key: Option<String>,

    /// 1inch API base URL
    pub oneinch_api_url: String,

    /// Source chain RPC endpoint
    pub eth_sepolia_rpc: String,

    /// Destination chain RPC endpoint
    pub avalanche_fuji_rpc: String,

    /// Whether to run the on-chain event listener
    pub enable_event_listener: bool,

    /// Data source for chain reads
    pub data_source: DataSource,

    /// Log level
    pub log_level: String,

    /// JSON log output
    pub log_json: bool,
}

impl OmniSweepConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match env::var("PORT") {
            Ok(v) => v.parse().map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), format!("not a port number: {}", v))
            })?,
            Err(_) => 3001,
        };

        let backend_private_key = env::var("BACKEND_PRIVATE_KEY").ok().filter(|k| !k.is_empty());
        let oneinch_api_key = env::var("ONEINCH_API_KEY").ok().filter(|k| !k.is_empty());

        let oneinch_api_url =
            env::var("ONEINCH_API_URL").unwrap_or_else(|_| DEFAULT_ONEINCH_API_URL.to_string());

        let eth_sepolia_rpc = env::var("ETH_SEPOLIA_RPC")
            .unwrap_or_else(|_| Chain::EthSepolia.default_rpc().to_string());
        let avalanche_fuji_rpc = env::var("AVALANCHE_FUJI_RPC")
            .unwrap_or_else(|_| Chain::AvalancheFuji.default_rpc().to_string());

        let enable_event_listener =
            env::var("ENABLE_EVENT_LISTENER").map(|v| v == "1").unwrap_or(false);

        let data_source = match env::var("DATA_SOURCE") {
            Ok(v) => v.parse()?,
            Err(_) => DataSource::Live,
        };

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_json = env::var("LOG_JSON").map(|v| v == "1").unwrap_or(false);

        Ok(Self {
            port,
            backend_private_key,
            oneinch_api_key,
            oneinch_api_url,
            eth_sepolia_rpc,
            avalanche_fuji_rpc,
            enable_event_listener,
            data_source,
            log_level,
            log_json,
        })
    }

    /// Whether transaction submission is available
    pub fn has_signer(&self) -> bool {
        self.backend_private_key.is_some()
    }

    /// RPC endpoint for the given chain
    pub fn rpc_url(&self, chain: Chain) -> &str {
        match chain {
            Chain::EthSepolia => &self.eth_sepolia_rpc,
            Chain::AvalancheFuji => &self.avalanche_fuji_rpc,
        }
    }

    /// Print configuration summary (hiding sensitive values)
    pub fn print_summary(&self) {
        println!("=== OmniSweep Backend Configuration ===");
        println!("Port: {}", self.port);
        println!(
            "Backend signer: {}",
            if self.has_signer() { "configured" } else { "absent (read-only mode)" }
        );
        println!(
            "1inch API key: {}",
            if self.oneinch_api_key.is_some() { "configured" } else { "absent (mock quotes)" }
        );
        println!("ETH Sepolia RPC: {}", self.eth_sepolia_rpc);
        println!("Avalanche Fuji RPC: {}", self.avalanche_fuji_rpc);
        println!("Data source: {:?}", self.data_source);
        println!("Event listener: {}", self.enable_event_listener);
        println!("Log level: {}", self.log_level);
        println!("=======================================");
    }
}

impl Default for OmniSweepConfig {
    fn default() -> Self {
        Self {
            port: 3001,
            backend_private_key: None,
            oneinch_api_key: None,
            oneinch_api_url: DEFAULT_ONEINCH_API_URL.to_string(),
            eth_sepolia_rpc: Chain::EthSepolia.default_rpc().to_string(),
            avalanche_fuji_rpc: Chain::AvalancheFuji.default_rpc().to_string(),
            enable_event_listener: false,
            data_source: DataSource::Fixture,
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}
