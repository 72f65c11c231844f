use alloy::primitives::Address;
use eyre::{eyre, Result, WrapErr};
use std::env;
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::gas::{GasPriceUnit, DEFAULT_ORACLE_FIELD};
use crate::retry::RetryConfig;
use crate::types::SubmissionMode;

/// Main configuration for the mint relayer
#[derive(Debug, Clone)]
pub struct Config {
    pub source: SourceConfig,
    pub destination: DestinationConfig,
    pub relay: RelayConfig,
    /// Optional HTTP gas price oracle; the destination node's price is used otherwise
    pub gas_oracle: Option<GasOracleConfig>,
    /// Replay store location
    pub state_file: PathBuf,
    /// Health/metrics bind address; `None` disables the server
    pub api_addr: Option<SocketAddr>,
}

/// Source chain configuration
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub rpc_url: String,
    pub bridge_address: String,
}

/// Destination chain configuration
#[derive(Clone)]
pub struct DestinationConfig {
    pub rpc_url: String,
    pub mint_contract: String,
    /// Deposits must name this chain as their destination
    pub chain_id: u64,
    pub private_key: String,
}

/// Custom Debug that redacts private_key to prevent accidental log leakage.
impl fmt::Debug for DestinationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DestinationConfig")
            .field("rpc_url", &self.rpc_url)
            .field("mint_contract", &self.mint_contract)
            .field("chain_id", &self.chain_id)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Relay loop and broadcaster configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub simulate_only: bool,
    pub poll_interval_ms: u64,
    pub confirmation_blocks: u64,
    pub mint_gas_limit: u64,
    pub receipt_timeout_secs: u64,
    pub connect_max_attempts: u32,
    pub connect_retry_delay_ms: u64,
}

/// Gas oracle configuration
#[derive(Debug, Clone)]
pub struct GasOracleConfig {
    pub url: String,
    pub field: String,
    pub unit: GasPriceUnit,
}

/// Default functions
fn default_destination_chain_id() -> u64 {
    80001
}

fn default_poll_interval() -> u64 {
    10_000
}

fn default_confirmation_blocks() -> u64 {
    6
}

fn default_mint_gas_limit() -> u64 {
    200_000
}

fn default_receipt_timeout() -> u64 {
    120
}

fn default_connect_attempts() -> u32 {
    3
}

fn default_connect_retry_delay() -> u64 {
    5000
}

fn default_state_file() -> PathBuf {
    PathBuf::from("processed_events_db.json")
}

fn default_api_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 9090))
}

/// `true`, `1` and `t` (any case) enable simulate mode
pub fn parse_simulate_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "t")
}

fn required(name: &str) -> Result<String> {
    env::var(name).map_err(|_| eyre!("{} environment variable is required", name))
}

fn is_hex_address(value: &str) -> bool {
    value.len() == 42
        && value.starts_with("0x")
        && value[2..].chars().all(|c| c.is_ascii_hexdigit())
}

fn is_hex_private_key(value: &str) -> bool {
    let key = value.strip_prefix("0x").unwrap_or(value);
    key.len() == 64 && key.chars().all(|c| c.is_ascii_hexdigit())
}

impl Config {
    /// Load configuration from environment variables
    /// Loads .env file if present, then reads from environment
    pub fn load() -> Result<Self> {
        Self::load_from_file(".env")
    }

    /// Load from a specific .env file path
    pub fn load_from_file(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            dotenvy::from_filename(path)
                .wrap_err_with(|| format!("Failed to load .env file from {}", path))?;
        }
        Self::load_from_env()
    }

    /// Load configuration from environment variables
    pub fn load_from_env() -> Result<Self> {
        let source = SourceConfig {
            rpc_url: required("SOURCE_CHAIN_RPC")?,
            bridge_address: required("SOURCE_BRIDGE_CONTRACT")?,
        };

        let destination = DestinationConfig {
            rpc_url: required("DEST_CHAIN_RPC")?,
            mint_contract: required("DEST_MINT_CONTRACT")?,
            chain_id: match env::var("DEST_CHAIN_ID") {
                Ok(v) => v
                    .trim()
                    .parse()
                    .wrap_err("DEST_CHAIN_ID must be a valid u64")?,
                Err(_) => default_destination_chain_id(),
            },
            private_key: required("SIGNER_PRIVATE_KEY")?,
        };

        let relay = RelayConfig {
            simulate_only: env::var("SIMULATE_ONLY")
                .map(|v| parse_simulate_flag(&v))
                .unwrap_or(true),
            poll_interval_ms: env::var("POLL_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default_poll_interval()),
            confirmation_blocks: env::var("CONFIRMATION_BLOCKS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default_confirmation_blocks()),
            mint_gas_limit: env::var("MINT_GAS_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default_mint_gas_limit()),
            receipt_timeout_secs: env::var("RECEIPT_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default_receipt_timeout()),
            connect_max_attempts: env::var("CONNECT_MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default_connect_attempts()),
            connect_retry_delay_ms: env::var("CONNECT_RETRY_DELAY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default_connect_retry_delay()),
        };

        let gas_oracle = match env::var("GAS_ORACLE_URL").ok().filter(|v| !v.trim().is_empty()) {
            Some(url) => Some(GasOracleConfig {
                url,
                field: env::var("GAS_ORACLE_FIELD")
                    .unwrap_or_else(|_| DEFAULT_ORACLE_FIELD.to_string()),
                unit: match env::var("GAS_ORACLE_UNIT") {
                    Ok(v) => v.parse().wrap_err("GAS_ORACLE_UNIT is invalid")?,
                    Err(_) => GasPriceUnit::Gwei,
                },
            }),
            None => None,
        };

        let api_addr = match env::var("API_ADDR") {
            Ok(v) if v.trim().eq_ignore_ascii_case("off") => None,
            Ok(v) => Some(
                v.trim()
                    .parse()
                    .wrap_err("API_ADDR must be a socket address or \"off\"")?,
            ),
            Err(_) => Some(default_api_addr()),
        };

        let config = Config {
            source,
            destination,
            relay,
            gas_oracle,
            state_file: env::var("STATE_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_state_file()),
            api_addr,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.source.rpc_url.is_empty() {
            return Err(eyre!("source.rpc_url cannot be empty"));
        }

        if !is_hex_address(&self.source.bridge_address) {
            return Err(eyre!(
                "source.bridge_address must be a valid hex address (42 chars with 0x prefix)"
            ));
        }

        if self.destination.rpc_url.is_empty() {
            return Err(eyre!("destination.rpc_url cannot be empty"));
        }

        if !is_hex_address(&self.destination.mint_contract) {
            return Err(eyre!(
                "destination.mint_contract must be a valid hex address (42 chars with 0x prefix)"
            ));
        }

        if !is_hex_private_key(&self.destination.private_key) {
            return Err(eyre!(
                "destination.private_key must be 64 hex chars (optionally 0x-prefixed)"
            ));
        }

        if self.relay.poll_interval_ms == 0 {
            return Err(eyre!("relay.poll_interval_ms must be positive"));
        }

        if self.relay.confirmation_blocks == 0 {
            return Err(eyre!("relay.confirmation_blocks must be positive"));
        }

        if self.relay.mint_gas_limit == 0 {
            return Err(eyre!("relay.mint_gas_limit must be positive"));
        }

        if self.relay.receipt_timeout_secs == 0 {
            return Err(eyre!("relay.receipt_timeout_secs must be positive"));
        }

        if self.relay.connect_max_attempts == 0 {
            return Err(eyre!("relay.connect_max_attempts must be positive"));
        }

        if let Some(oracle) = &self.gas_oracle {
            if !oracle.url.starts_with("http://") && !oracle.url.starts_with("https://") {
                return Err(eyre!("gas_oracle.url must be an http(s) URL"));
            }
            if oracle.field.trim().is_empty() {
                return Err(eyre!("gas_oracle.field cannot be empty"));
            }
        }

        if self.state_file.as_os_str().is_empty() {
            return Err(eyre!("state_file cannot be empty"));
        }

        Ok(())
    }

    pub fn source_bridge_address(&self) -> Result<Address> {
        self.source
            .bridge_address
            .parse()
            .wrap_err("Invalid SOURCE_BRIDGE_CONTRACT")
    }

    pub fn mint_contract_address(&self) -> Result<Address> {
        self.destination
            .mint_contract
            .parse()
            .wrap_err("Invalid DEST_MINT_CONTRACT")
    }

    pub fn submission_mode(&self) -> SubmissionMode {
        SubmissionMode::from_simulate_flag(self.relay.simulate_only)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.relay.poll_interval_ms)
    }

    pub fn receipt_timeout(&self) -> Duration {
        Duration::from_secs(self.relay.receipt_timeout_secs)
    }

    /// Startup connection retry policy
    pub fn connect_retry(&self) -> RetryConfig {
        RetryConfig::new(
            self.relay.connect_max_attempts,
            Duration::from_millis(self.relay.connect_retry_delay_ms),
        )
    }

    /// Replay store partition: one store per destination chain
    pub fn store_partition(&self) -> String {
        self.destination.chain_id.to_string()
    }
}
