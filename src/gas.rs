//! External gas price oracle
//!
//! Fetches a JSON document over HTTP and reads the price at a configured,
//! dot-separated field path (e.g. `fast.maxFee` for the Polygon gas station).
//! Any failure here is non-fatal: the broadcaster falls back to the
//! destination node's suggested price.

use std::str::FromStr;
use std::time::Duration;

use eyre::{eyre, Result, WrapErr};
use reqwest::Client;
use serde_json::Value;

/// Default JSON field path for the price
pub const DEFAULT_ORACLE_FIELD: &str = "fast.maxFee";

const ORACLE_TIMEOUT: Duration = Duration::from_secs(10);

const WEI_PER_GWEI: f64 = 1_000_000_000.0;

/// Denomination of the oracle's price field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GasPriceUnit {
    Gwei,
    Wei,
}

impl FromStr for GasPriceUnit {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "gwei" => Ok(GasPriceUnit::Gwei),
            "wei" => Ok(GasPriceUnit::Wei),
            other => Err(eyre!("unknown gas price unit {:?} (expected gwei or wei)", other)),
        }
    }
}

/// HTTP gas price oracle
#[derive(Debug, Clone)]
pub struct GasOracle {
    client: Client,
    url: String,
    field_path: Vec<String>,
    unit: GasPriceUnit,
}

impl GasOracle {
    pub fn new(url: &str, field_path: &str, unit: GasPriceUnit) -> Result<Self> {
        let client = Client::builder()
            .timeout(ORACLE_TIMEOUT)
            .build()
            .wrap_err("Failed to build gas oracle HTTP client")?;

        Ok(Self {
            client,
            url: url.to_string(),
            field_path: parse_field_path(field_path),
            unit,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch the current price in wei
    pub async fn fetch_gas_price(&self) -> Result<u128> {
        let body: Value = self
            .client
            .get(&self.url)
            .send()
            .await
            .wrap_err("Gas oracle request failed")?
            .error_for_status()
            .wrap_err("Gas oracle returned an error status")?
            .json()
            .await
            .wrap_err("Gas oracle returned invalid JSON")?;

        extract_gas_price(&body, &self.field_path, self.unit)
    }
}

fn parse_field_path(path: &str) -> Vec<String> {
    path.split('.')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Read the price at `path` in `body` and convert it to wei
pub fn extract_gas_price(body: &Value, path: &[String], unit: GasPriceUnit) -> Result<u128> {
    let mut current = body;
    for segment in path {
        let next = match current {
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => current.get(segment),
        };
        current = next.ok_or_else(|| eyre!("field {:?} missing from gas oracle response", segment))?;
    }

    let value = match current {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| eyre!("gas oracle field is not numeric: {}", current))?;

    if !value.is_finite() || value <= 0.0 {
        return Err(eyre!("gas oracle returned a non-positive price: {}", value));
    }

    let wei = match unit {
        GasPriceUnit::Gwei => value * WEI_PER_GWEI,
        GasPriceUnit::Wei => value,
    };
    let wei = wei.round() as u128;
    if wei == 0 {
        return Err(eyre!("gas oracle price {} rounds to zero wei", value));
    }
    Ok(wei)
}
