//! Chain Registry
//!
//! Holds the per-chain connection record (RPC endpoint, gateway, gas service,
//! deployer) and the deployment results written back for each chain.
//!
//! The registry is a plain data record passed by reference. Deployment is the
//! only writer of contract addresses and may write each one exactly once;
//! provisioning and transfers only read.
//!
//! ## File Format
//!
//! ```json
//! [
//!   {
//!     "name": "Avalanche",
//!     "rpc": "http://localhost:8500/0",
//!     "gateway": "0x...",
//!     "gasReceiver": "0x...",
//!     "constAddressDeployer": "0x...",
//!     "hrotoken": "0x...",
//!     "hrolinker": "0x..."
//!   }
//! ]
//! ```

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::error::{LinkerError, Result};
use crate::types::{AssetKind, DeployedAddresses};

/// Chain the canonical asset lives on unless configured otherwise
pub const DEFAULT_CANONICAL_CHAIN: &str = "Avalanche";

/// Validates that a URL uses http/https and has a host component.
pub fn validate_rpc_url(url_str: &str, name: &str) -> Result<()> {
    let parsed = url::Url::parse(url_str).map_err(|e| {
        LinkerError::configuration(name, format!("RPC URL must be a valid URL: {}", e))
    })?;

    let scheme = parsed.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(LinkerError::configuration(
            name,
            format!("RPC URL must use http:// or https:// scheme, got {}", scheme),
        ));
    }

    if parsed.host_str().is_none() {
        return Err(LinkerError::configuration(
            name,
            "RPC URL must have a host component",
        ));
    }

    if scheme == "http" {
        tracing::debug!(chain = name, "RPC URL uses unencrypted http://");
    }

    Ok(())
}

/// One chain record of the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chain {
    /// Unique chain name, also the relay's destination identifier
    pub name: String,
    /// JSON-RPC endpoint
    pub rpc: String,
    /// Relay gateway contract
    pub gateway: Address,
    /// Relay gas service contract
    pub gas_receiver: Address,
    /// Deterministic deployer used for the linker proxy
    pub const_address_deployer: Address,
    #[serde(rename = "hrotoken", default, skip_serializing_if = "Option::is_none")]
    asset_address: Option<Address>,
    #[serde(rename = "hrolinker", default, skip_serializing_if = "Option::is_none")]
    linker_address: Option<Address>,
}

impl Chain {
    pub fn new(
        name: impl Into<String>,
        rpc: impl Into<String>,
        gateway: Address,
        gas_receiver: Address,
        const_address_deployer: Address,
    ) -> Self {
        Self {
            name: name.into(),
            rpc: rpc.into(),
            gateway,
            gas_receiver,
            const_address_deployer,
            asset_address: None,
            linker_address: None,
        }
    }

    /// Asset contract address, if deployed
    pub fn asset_address(&self) -> Option<Address> {
        self.asset_address
    }

    /// Linker contract address, if deployed
    pub fn linker_address(&self) -> Option<Address> {
        self.linker_address
    }

    /// Both deployed addresses, or a configuration error naming what is missing
    pub fn deployed(&self) -> Result<DeployedAddresses> {
        let asset = self.asset_address.ok_or_else(|| {
            LinkerError::configuration(&self.name, "asset contract address not populated")
        })?;
        let linker = self.linker_address.ok_or_else(|| {
            LinkerError::configuration(&self.name, "linker contract address not populated")
        })?;
        Ok(DeployedAddresses { asset, linker })
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(LinkerError::InvalidRegistry(
                "chain name must not be empty".to_string(),
            ));
        }
        validate_rpc_url(&self.rpc, &self.name)
    }
}

/// The set of chains taking part in the linker network
#[derive(Debug, Clone)]
pub struct ChainRegistry {
    chains: Vec<Chain>,
    canonical: String,
}

impl ChainRegistry {
    /// Build a registry, checking names are unique and the canonical chain exists
    pub fn new(chains: Vec<Chain>, canonical: &str) -> Result<Self> {
        let mut seen = HashSet::new();
        for chain in &chains {
            chain.validate()?;
            if !seen.insert(chain.name.as_str()) {
                return Err(LinkerError::InvalidRegistry(format!(
                    "duplicate chain name {}",
                    chain.name
                )));
            }
        }

        if !seen.contains(canonical) {
            return Err(LinkerError::InvalidRegistry(format!(
                "canonical chain {} is not in the registry",
                canonical
            )));
        }

        Ok(Self {
            chains,
            canonical: canonical.to_string(),
        })
    }

    pub fn from_json_str(json: &str, canonical: &str) -> Result<Self> {
        let chains: Vec<Chain> = serde_json::from_str(json)
            .map_err(|e| LinkerError::InvalidRegistry(format!("failed to parse: {}", e)))?;
        Self::new(chains, canonical)
    }

    pub fn from_file(path: &Path, canonical: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            LinkerError::InvalidRegistry(format!("failed to read {}: {}", path.display(), e))
        })?;
        let registry = Self::from_json_str(&content, canonical)?;
        tracing::info!(
            path = %path.display(),
            chains = registry.chains.len(),
            canonical = canonical,
            "Loaded chain registry"
        );
        Ok(registry)
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.chains)
            .map_err(|e| LinkerError::InvalidRegistry(format!("failed to serialize: {}", e)))
    }

    pub fn chains(&self) -> &[Chain] {
        &self.chains
    }

    pub fn get(&self, name: &str) -> Result<&Chain> {
        self.chains
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| LinkerError::UnknownChain(name.to_string()))
    }

    fn get_mut(&mut self, name: &str) -> Result<&mut Chain> {
        self.chains
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| LinkerError::UnknownChain(name.to_string()))
    }

    pub fn is_canonical(&self, name: &str) -> bool {
        self.canonical == name
    }

    pub fn asset_kind(&self, name: &str) -> AssetKind {
        if self.is_canonical(name) {
            AssetKind::Canonical
        } else {
            AssetKind::Remote
        }
    }

    /// All chains holding a mirror contract, in registry order
    pub fn remote_chains(&self) -> impl Iterator<Item = &Chain> {
        self.chains.iter().filter(move |c| c.name != self.canonical)
    }

    /// Deployed addresses of a chain, failing if it is unknown or not deployed
    pub fn require_deployed(&self, name: &str) -> Result<DeployedAddresses> {
        self.get(name)?.deployed()
    }

    /// Record the asset contract address. May only be written once.
    pub fn set_asset_address(&mut self, name: &str, address: Address) -> Result<()> {
        let chain = self.get_mut(name)?;
        if let Some(existing) = chain.asset_address {
            return Err(LinkerError::AddressAlreadySet {
                chain: name.to_string(),
                field: "hrotoken",
                existing: existing.to_string(),
            });
        }
        chain.asset_address = Some(address);
        Ok(())
    }

    /// Record the linker contract address. May only be written once.
    pub fn set_linker_address(&mut self, name: &str, address: Address) -> Result<()> {
        let chain = self.get_mut(name)?;
        if let Some(existing) = chain.linker_address {
            return Err(LinkerError::AddressAlreadySet {
                chain: name.to_string(),
                field: "hrolinker",
                existing: existing.to_string(),
            });
        }
        chain.linker_address = Some(address);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REGISTRY_JSON: &str = r#"[
        {
            "name": "Avalanche",
            "chainId": 2500,
            "rpc": "http://localhost:8500/0",
            "gateway": "0x0000000000000000000000000000000000000a01",
            "gasReceiver": "0x0000000000000000000000000000000000000a02",
            "constAddressDeployer": "0x0000000000000000000000000000000000000a03",
            "hrotoken": "0x0000000000000000000000000000000000000a04"
        },
        {
            "name": "Fantom",
            "rpc": "http://localhost:8500/1",
            "gateway": "0x0000000000000000000000000000000000000f01",
            "gasReceiver": "0x0000000000000000000000000000000000000f02",
            "constAddressDeployer": "0x0000000000000000000000000000000000000f03"
        }
    ]"#;

    #[test]
    fn test_parse_registry_file_format() {
        let registry = ChainRegistry::from_json_str(REGISTRY_JSON, "Avalanche").unwrap();
        assert_eq!(registry.chains().len(), 2);

        let avalanche = registry.get("Avalanche").unwrap();
        assert_eq!(avalanche.rpc, "http://localhost:8500/0");
        assert!(avalanche.asset_address().is_some());
        assert!(avalanche.linker_address().is_none());

        let remotes: Vec<_> = registry.remote_chains().map(|c| c.name.as_str()).collect();
        assert_eq!(remotes, vec!["Fantom"]);
        assert_eq!(registry.asset_kind("Avalanche"), AssetKind::Canonical);
        assert_eq!(registry.asset_kind("Fantom"), AssetKind::Remote);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let chain = Chain::new(
            "Fantom",
            "http://localhost:8545",
            Address::ZERO,
            Address::ZERO,
            Address::ZERO,
        );
        let err = ChainRegistry::new(vec![chain.clone(), chain], "Fantom").unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_missing_canonical_rejected() {
        let chain = Chain::new(
            "Fantom",
            "http://localhost:8545",
            Address::ZERO,
            Address::ZERO,
            Address::ZERO,
        );
        assert!(ChainRegistry::new(vec![chain], "Avalanche").is_err());
    }

    #[test]
    fn test_invalid_rpc_rejected() {
        let chain = Chain::new(
            "Fantom",
            "ws://localhost:8545",
            Address::ZERO,
            Address::ZERO,
            Address::ZERO,
        );
        let err = ChainRegistry::new(vec![chain], "Fantom").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_addresses_written_once() {
        let mut registry = ChainRegistry::from_json_str(REGISTRY_JSON, "Avalanche").unwrap();
        let linker = Address::repeat_byte(0x11);

        registry.set_linker_address("Fantom", linker).unwrap();
        assert_eq!(registry.get("Fantom").unwrap().linker_address(), Some(linker));

        let err = registry
            .set_linker_address("Fantom", Address::repeat_byte(0x22))
            .unwrap_err();
        assert!(matches!(err, LinkerError::AddressAlreadySet { field: "hrolinker", .. }));

        // Pre-populated from the file
        assert!(registry
            .set_asset_address("Avalanche", Address::repeat_byte(0x33))
            .is_err());
    }

    #[test]
    fn test_require_deployed_reports_missing_address() {
        let registry = ChainRegistry::from_json_str(REGISTRY_JSON, "Avalanche").unwrap();
        let err = registry.require_deployed("Avalanche").unwrap_err();
        assert!(err.to_string().contains("linker"));

        let err = registry.require_deployed("Polygon").unwrap_err();
        assert!(matches!(err, LinkerError::UnknownChain(_)));
    }

    #[test]
    fn test_round_trip_keeps_external_field_names() {
        let registry = ChainRegistry::from_json_str(REGISTRY_JSON, "Avalanche").unwrap();
        let json = registry.to_json_string().unwrap();
        assert!(json.contains("\"gasReceiver\""));
        assert!(json.contains("\"hrotoken\""));
        assert!(!json.contains("\"hrolinker\""));
    }
}
