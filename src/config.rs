//! Linker configuration
//!
//! Read from the environment, after loading `.env` when one is present.

use alloy::primitives::{Address, U256};
use eyre::{eyre, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::gas::DEFAULT_RELAY_GAS_LIMIT;
use crate::orchestrator::{TransferConfig, DEFAULT_SEND_GAS_MULTIPLIER, MIN_SEND_GAS_MULTIPLIER};
use crate::provisioner::ProvisionConfig;
use crate::redact::Redacted;
use crate::registry::DEFAULT_CANONICAL_CHAIN;

#[derive(Debug, Clone)]
pub struct Config {
    /// Chain registry JSON
    pub chains_file: PathBuf,
    /// Signing key shared by every chain
    pub private_key: Redacted<String>,
    pub canonical_chain: String,

    pub relay_gas_limit: u64,
    pub send_gas_multiplier: u64,
    /// Unit price quoted by the fixed gas estimator
    pub gas_price_wei: U256,

    pub poll_interval_ms: u64,
    pub max_poll_attempts: u32,
    pub role_confirm_attempts: u32,

    pub transfer: TransferRequest,
}

/// The single transfer the binary performs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub source_chain: String,
    pub destination_chain: String,
    pub token_id: U256,
    /// Defaults to the signer
    pub recipient: Option<Address>,
}

impl Config {
    /// Load configuration from environment
    pub fn load() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded .env from {:?}", path);
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| lookup(key).ok_or_else(|| eyre!("{} required", key));
        let or_default =
            |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let config = Self {
            chains_file: PathBuf::from(required("HRO_CHAINS_FILE")?),
            private_key: Redacted(required("HRO_PRIVATE_KEY")?),
            canonical_chain: or_default("HRO_CANONICAL_CHAIN", DEFAULT_CANONICAL_CHAIN),

            relay_gas_limit: parse_or(&lookup, "HRO_RELAY_GAS_LIMIT", DEFAULT_RELAY_GAS_LIMIT)?,
            send_gas_multiplier: parse_or(
                &lookup,
                "HRO_SEND_GAS_MULTIPLIER",
                DEFAULT_SEND_GAS_MULTIPLIER,
            )?,
            gas_price_wei: parse_or(&lookup, "HRO_GAS_PRICE_WEI", U256::from(1))?,

            poll_interval_ms: parse_or(&lookup, "HRO_POLL_INTERVAL_MS", 500)?,
            max_poll_attempts: parse_or(&lookup, "HRO_MAX_POLL_ATTEMPTS", 10)?,
            role_confirm_attempts: parse_or(&lookup, "HRO_ROLE_CONFIRM_ATTEMPTS", 5)?,

            transfer: TransferRequest {
                source_chain: or_default("HRO_TRANSFER_SOURCE", DEFAULT_CANONICAL_CHAIN),
                destination_chain: or_default("HRO_TRANSFER_DESTINATION", "Fantom"),
                token_id: parse_or(&lookup, "HRO_TRANSFER_TOKEN_ID", U256::from(1))?,
                recipient: lookup("HRO_TRANSFER_RECIPIENT")
                    .map(|s| {
                        s.trim()
                            .parse::<Address>()
                            .map_err(|e| eyre!("Invalid HRO_TRANSFER_RECIPIENT: {}", e))
                    })
                    .transpose()?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.send_gas_multiplier < MIN_SEND_GAS_MULTIPLIER {
            return Err(eyre!(
                "HRO_SEND_GAS_MULTIPLIER must be at least {}, got {}",
                MIN_SEND_GAS_MULTIPLIER,
                self.send_gas_multiplier
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(eyre!("HRO_POLL_INTERVAL_MS must be positive"));
        }
        if self.transfer.source_chain == self.transfer.destination_chain {
            return Err(eyre!(
                "Transfer source and destination are both {}",
                self.transfer.source_chain
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn transfer_config(&self) -> TransferConfig {
        TransferConfig {
            relay_gas_limit: self.relay_gas_limit,
            send_gas_multiplier: self.send_gas_multiplier,
            ..TransferConfig::default()
        }
    }

    pub fn provision_config(&self) -> ProvisionConfig {
        ProvisionConfig {
            confirm_interval: self.poll_interval(),
            confirm_attempts: self.role_confirm_attempts,
            ..ProvisionConfig::default()
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| eyre!("Invalid {}: {}", key, e)),
        None => Ok(default),
    }
}
