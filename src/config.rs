use anyhow::{Context, Result, bail};
use std::env;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub chain_gateway_url: String,
    pub chain_api_key: Option<String>,
    pub store_url: String,
    pub store_api_key: Option<String>,
    pub escrow_currency: String,
    pub call_timeout_secs: u64,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// # Environment Variables
    /// - `CHAIN_GATEWAY_URL`: Required - Chain gateway base URL
    /// - `CHAIN_API_KEY`: Optional - Chain gateway API key
    /// - `STORE_URL`: Required - Reservation store base URL
    /// - `STORE_API_KEY`: Optional - Reservation store API key
    /// - `ESCROW_CURRENCY`: Optional - Escrow currency unit (default: "ETH")
    /// - `CALL_TIMEOUT_SECS`: Optional - Per-call timeout in seconds (default: 30)
    pub fn from_env() -> Result<Self> {
        // Parse chain gateway URL (required)
        let chain_gateway_url = env::var("CHAIN_GATEWAY_URL")
            .context("CHAIN_GATEWAY_URL not set")?;

        if chain_gateway_url.trim().is_empty() {
            bail!("CHAIN_GATEWAY_URL cannot be empty");
        }

        // Parse chain API key (optional)
        let chain_api_key = env::var("CHAIN_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());

        // Parse store URL (required)
        let store_url = env::var("STORE_URL")
            .context("STORE_URL not set")?;

        if store_url.trim().is_empty() {
            bail!("STORE_URL cannot be empty");
        }

        // Parse store API key (optional)
        let store_api_key = env::var("STORE_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());

        // Parse escrow currency (optional, has default)
        let escrow_currency = env::var("ESCROW_CURRENCY")
            .unwrap_or_else(|_| "ETH".to_string());

        // Parse per-call timeout (optional, has default)
        let call_timeout_secs = match env::var("CALL_TIMEOUT_SECS") {
            Ok(value) => {
                let secs = value
                    .parse::<u64>()
                    .context("CALL_TIMEOUT_SECS must be a positive integer")?;

                if secs == 0 {
                    bail!("CALL_TIMEOUT_SECS cannot be zero");
                }

                secs
            }
            Err(_) => 30,
        };

        Ok(Config {
            chain_gateway_url,
            chain_api_key,
            store_url,
            store_api_key,
            escrow_currency,
            call_timeout_secs,
        })
    }
}
