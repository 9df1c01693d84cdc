use bigdecimal::BigDecimal;
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::str::FromStr;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    pub redis_url: Option<String>,
    pub transfer: TransferConfig,
}

/// Business bounds and timing knobs for the transfer engine.
#[derive(Debug, Deserialize, Clone)]
pub struct TransferConfig {
    pub min_transfer_amount: BigDecimal,
    pub single_transfer_limit: BigDecimal,
    pub duplicate_window_secs: u64,
    pub stale_pending_timeout_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        Ok(Config {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            database_url: env::var("DATABASE_URL")?,
            redis_url: env::var("REDIS_URL").ok(),
            transfer: TransferConfig::from_env()?,
        })
    }
}

impl TransferConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(TransferConfig {
            min_transfer_amount: parse_decimal_var("MIN_TRANSFER_AMOUNT", "0.01")?,
            single_transfer_limit: parse_decimal_var("SINGLE_TRANSFER_LIMIT", "1000000.00")?,
            duplicate_window_secs: parse_u64_var("DUPLICATE_WINDOW_SECS", 300)?,
            stale_pending_timeout_secs: parse_u64_var("STALE_PENDING_TIMEOUT_SECS", 300)?,
            sweep_interval_secs: parse_u64_var("SWEEP_INTERVAL_SECS", 60)?,
        })
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            min_transfer_amount: BigDecimal::from_str("0.01").expect("valid decimal literal"),
            single_transfer_limit: BigDecimal::from_str("1000000.00")
                .expect("valid decimal literal"),
            duplicate_window_secs: 300,
            stale_pending_timeout_secs: 300,
            sweep_interval_secs: 60,
        }
    }
}

fn parse_decimal_var(name: &str, default: &str) -> anyhow::Result<BigDecimal> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    BigDecimal::from_str(raw.trim())
        .map_err(|e| anyhow::anyhow!("{} must be a decimal number: {}", name, e))
}

fn parse_u64_var(name: &str, default: u64) -> anyhow::Result<u64> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} must be an integer: {}", name, e)),
        Err(_) => Ok(default),
    }
}
