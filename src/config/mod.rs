use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use clap::Parser;
use secrecy::{ExposeSecret, SecretString};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const DEFAULT_RPC_URL: &str = "https://polygon-rpc.com";
pub const DEFAULT_POSITIONS_URL: &str = "https://data-api.polymarket.com/positions";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 120;
pub const MIN_POLL_INTERVAL_SECS: u64 = 10;

/// Every setting is read from the environment (or a local `.env`); the flags
/// exist mostly so the values can be overridden by hand.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Wallet private key (0x-prefixed hex, 66 chars).
    #[arg(long, env = "PRIVATE_KEY", hide_env_values = true)]
    pub private_key: String,

    /// Wallet address whose positions are redeemed (0x-prefixed, 42 chars).
    #[arg(long, env = "WALLET_ADDRESS")]
    pub wallet_address: String,

    /// Polygon mainnet RPC endpoint.
    #[arg(long, env = "POLYGON_RPC_URL", default_value = DEFAULT_RPC_URL)]
    pub polygon_rpc_url: String,

    /// Seconds between redemption polls.
    #[arg(
        long,
        env = "POLL_INTERVAL",
        default_value_t = DEFAULT_POLL_INTERVAL_SECS,
        value_parser = clap::value_parser!(u64).range(MIN_POLL_INTERVAL_SECS..)
    )]
    pub poll_interval: u64,

    /// Positions index queried with `?user=<wallet>`.
    #[arg(long, env = "POSITIONS_API_URL", default_value = DEFAULT_POSITIONS_URL)]
    pub positions_api_url: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("private key must be 0x-prefixed 32-byte hex")]
    InvalidPrivateKey,
    #[error("invalid wallet address {0:?}: expected 0x-prefixed 20-byte hex")]
    InvalidWalletAddress(String),
    #[error("invalid {name} {value:?}: {source}")]
    InvalidUrl {
        name: &'static str,
        value: String,
        source: url::ParseError,
    },
    #[error("poll interval must be at least {MIN_POLL_INTERVAL_SECS}s, got {0}s")]
    PollIntervalTooShort(u64),
}

/// Validated runtime configuration, built once at startup and handed to the
/// orchestrator.
#[derive(Debug)]
pub struct Config {
    private_key: SecretString,
    pub wallet_address: Address,
    pub rpc_url: Url,
    pub positions_url: Url,
    pub poll_interval: Duration,
}

impl Config {
    pub fn from_args(args: Args) -> Result<Self, ConfigError> {
        validate_private_key(&args.private_key)?;

        let wallet_address = parse_wallet_address(&args.wallet_address)?;

        if args.poll_interval < MIN_POLL_INTERVAL_SECS {
            return Err(ConfigError::PollIntervalTooShort(args.poll_interval));
        }

        Ok(Self {
            private_key: SecretString::from(args.private_key),
            wallet_address,
            rpc_url: parse_url("POLYGON_RPC_URL", &args.polygon_rpc_url)?,
            positions_url: parse_url("POSITIONS_API_URL", &args.positions_api_url)?,
            poll_interval: Duration::from_secs(args.poll_interval),
        })
    }

    pub fn private_key(&self) -> &str {
        self.private_key.expose_secret()
    }
}

fn validate_private_key(key: &str) -> Result<(), ConfigError> {
    let hex_part = key
        .strip_prefix("0x")
        .ok_or(ConfigError::InvalidPrivateKey)?;
    if hex_part.len() != 64 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ConfigError::InvalidPrivateKey);
    }
    // Rejects zero and out-of-range scalars.
    PrivateKeySigner::from_str(key).map_err(|_| ConfigError::InvalidPrivateKey)?;
    Ok(())
}

fn parse_wallet_address(raw: &str) -> Result<Address, ConfigError> {
    let invalid = || ConfigError::InvalidWalletAddress(raw.to_string());
    let hex_part = raw.strip_prefix("0x").ok_or_else(invalid)?;
    if hex_part.len() != 40 {
        return Err(invalid());
    }
    Address::from_str(raw).map_err(|_| invalid())
}

fn parse_url(name: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|source| ConfigError::InvalidUrl {
        name,
        value: value.to_string(),
        source,
    })
}
