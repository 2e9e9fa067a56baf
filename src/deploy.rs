//! Contract deployment and linker wiring checks
//!
//! Each chain gets an asset contract (the canonical variant on the canonical
//! chain, the remote variant elsewhere) and an upgradable linker pointing at
//! it. Addresses are written back into the registry exactly once. How the
//! bytecode reaches the chain is behind [`Deployer`].

use alloy::primitives::{Address, Bytes};
use alloy::sol_types::SolValue;
use async_trait::async_trait;
use tracing::{info, warn};

use crate::bindings::LinkerContract;
use crate::error::{LinkerError, Result};
use crate::registry::{Chain, ChainRegistry};
use crate::types::{AssetKind, DeployedAddresses};

/// Constructor and initializer arguments of a linker proxy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkerDeployment {
    pub gateway: Address,
    pub gas_service: Address,
    pub chain_name: String,
    pub token: Address,
    /// `abi.encode(chainName, token)` passed to the proxy initializer
    pub init_params: Bytes,
}

impl LinkerDeployment {
    pub fn for_chain(chain: &Chain, token: Address) -> Self {
        Self {
            gateway: chain.gateway,
            gas_service: chain.gas_receiver,
            chain_name: chain.name.clone(),
            token,
            init_params: linker_init_params(&chain.name, token),
        }
    }
}

/// Puts contracts on chain
#[async_trait]
pub trait Deployer: Send + Sync {
    async fn deploy_asset(&self, chain: &Chain, kind: AssetKind) -> eyre::Result<Address>;

    async fn deploy_linker(
        &self,
        chain: &Chain,
        deployment: &LinkerDeployment,
    ) -> eyre::Result<Address>;
}

/// ABI-encoded `(string chainName, address token)`
pub fn linker_init_params(chain_name: &str, token: Address) -> Bytes {
    Bytes::from((chain_name.to_string(), token).abi_encode_params())
}

/// Deploy whatever `name` is missing and record it in the registry.
///
/// A chain that already has both addresses is left alone. A chain with only
/// an asset gets just its linker.
pub async fn deploy_chain(
    registry: &mut ChainRegistry,
    deployer: &dyn Deployer,
    name: &str,
) -> Result<DeployedAddresses> {
    let chain = registry.get(name)?.clone();
    if let Ok(existing) = chain.deployed() {
        info!(chain = name, asset = %existing.asset, linker = %existing.linker, "Already deployed");
        return Ok(existing);
    }

    let asset = match chain.asset_address() {
        Some(asset) => asset,
        None => {
            let kind = registry.asset_kind(name);
            info!(chain = name, kind = %kind, "Deploying asset contract");
            let asset = deployer
                .deploy_asset(&chain, kind)
                .await
                .map_err(|e| LinkerError::Deployment {
                    chain: name.to_string(),
                    reason: format!("asset: {}", e),
                })?;
            registry.set_asset_address(name, asset)?;
            asset
        }
    };

    info!(chain = name, token = %asset, gateway = %chain.gateway, "Deploying linker");
    let deployment = LinkerDeployment::for_chain(&chain, asset);
    let linker = deployer
        .deploy_linker(&chain, &deployment)
        .await
        .map_err(|e| LinkerError::Deployment {
            chain: name.to_string(),
            reason: format!("linker: {}", e),
        })?;
    registry.set_linker_address(name, linker)?;

    info!(chain = name, asset = %asset, linker = %linker, "Deployed");
    Ok(DeployedAddresses { asset, linker })
}

/// Deploy every chain, one after another, in registry order
pub async fn deploy_all(
    registry: &mut ChainRegistry,
    deployer: &dyn Deployer,
) -> Result<Vec<DeployedAddresses>> {
    let names: Vec<String> = registry.chains().iter().map(|c| c.name.clone()).collect();
    let mut deployed = Vec::with_capacity(names.len());
    for name in names {
        deployed.push(deploy_chain(registry, deployer, &name).await?);
    }
    Ok(deployed)
}

/// One linker accessor that disagrees with the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WiringMismatch {
    pub field: &'static str,
    pub expected: String,
    pub actual: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WiringReport {
    pub chain: String,
    pub mismatches: Vec<WiringMismatch>,
}

impl WiringReport {
    pub fn is_consistent(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Compare a deployed linker's immutable wiring against the registry
pub async fn check_linker_wiring(
    chain: &Chain,
    linker: &dyn LinkerContract,
) -> Result<WiringReport> {
    let deployed = chain.deployed()?;
    let rpc_err = |e: crate::error::CallError| LinkerError::Rpc {
        chain: chain.name.clone(),
        reason: e.to_string(),
    };

    let token = linker.token_address().await.map_err(rpc_err)?;
    let chain_name = linker.chain_name().await.map_err(rpc_err)?;
    let gas_service = linker.gas_service().await.map_err(rpc_err)?;
    let gateway = linker.gateway().await.map_err(rpc_err)?;

    let checks = [
        ("tokenAddress", deployed.asset.to_string(), token.to_string()),
        ("chainName", chain.name.clone(), chain_name),
        ("gasService", chain.gas_receiver.to_string(), gas_service.to_string()),
        ("gateway", chain.gateway.to_string(), gateway.to_string()),
    ];

    let mut mismatches = Vec::new();
    for (field, expected, actual) in checks {
        if expected != actual {
            warn!(
                chain = %chain.name,
                field = field,
                expected = %expected,
                actual = %actual,
                "Linker wiring mismatch"
            );
            mismatches.push(WiringMismatch {
                field,
                expected,
                actual,
            });
        }
    }

    if mismatches.is_empty() {
        info!(chain = %chain.name, linker = %deployed.linker, "Linker wiring matches registry");
    }

    Ok(WiringReport {
        chain: chain.name.clone(),
        mismatches,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{SimNetwork, SimWorld};

    #[test]
    fn test_init_params_layout() {
        let token = Address::repeat_byte(0xab);
        let params = linker_init_params("Avalanche", token);

        // head: string offset, address; tail: length, padded bytes
        assert_eq!(params.len(), 128);
        assert_eq!(params[31], 0x40);
        assert_eq!(&params[44..64], token.as_slice());
        assert_eq!(params[95], 9);
        assert_eq!(&params[96..105], b"Avalanche");
    }

    #[tokio::test]
    async fn test_deploy_all_assigns_kinds_and_records_addresses() {
        let world = SimWorld::deployed(&["Avalanche", "Fantom"]).await;

        for chain in world.registry.chains() {
            let deployed = chain.deployed().unwrap();
            assert_ne!(deployed.asset, deployed.linker);
        }
        assert_eq!(world.registry.asset_kind("Avalanche"), AssetKind::Canonical);
        assert_eq!(world.registry.asset_kind("Fantom"), AssetKind::Remote);
        // asset + linker per chain
        assert_eq!(world.network.transaction_count(), 4);
    }

    #[tokio::test]
    async fn test_deploy_is_idempotent() {
        let mut world = SimWorld::deployed(&["Avalanche", "Fantom"]).await;
        let before = world.registry.require_deployed("Fantom").unwrap();

        let again = deploy_chain(&mut world.registry, &world.network, "Fantom")
            .await
            .unwrap();
        assert_eq!(again, before);
        assert_eq!(world.network.transaction_count(), 4);
    }

    #[tokio::test]
    async fn test_deploy_completes_missing_linker() {
        let mut world =
            SimWorld::with_undeployed_linker(&["Avalanche", "Fantom"], "Fantom").await;
        let asset = world.chain("Fantom").asset_address().unwrap();

        let deployed = deploy_chain(&mut world.registry, &world.network, "Fantom")
            .await
            .unwrap();
        assert_eq!(deployed.asset, asset);
        assert!(world.chain("Fantom").linker_address().is_some());
    }

    #[tokio::test]
    async fn test_deployer_failure_is_deployment_error() {
        // The blank network has no asset contract to attach a linker to
        let blank = SimNetwork::new(SimWorld::SIGNER);
        let mut fresh = ChainRegistry::new(
            vec![Chain::new(
                "Avalanche",
                "http://localhost:8545",
                Address::ZERO,
                Address::ZERO,
                Address::ZERO,
            )],
            "Avalanche",
        )
        .unwrap();
        fresh
            .set_asset_address("Avalanche", Address::repeat_byte(0x01))
            .unwrap();

        let err = deploy_chain(&mut fresh, &blank, "Avalanche")
            .await
            .unwrap_err();
        assert!(matches!(err, LinkerError::Deployment { .. }));
        assert!(fresh.get("Avalanche").unwrap().linker_address().is_none());
    }

    #[tokio::test]
    async fn test_wiring_matches_registry() {
        let world = SimWorld::deployed(&["Avalanche", "Fantom"]).await;
        for chain in world.registry.chains() {
            let handles = world.connections.get(&chain.name).unwrap();
            let report = check_linker_wiring(chain, handles.linker.as_ref())
                .await
                .unwrap();
            assert!(report.is_consistent(), "{:?}", report);
        }
    }

    #[tokio::test]
    async fn test_wiring_reports_mismatch() {
        let world = SimWorld::deployed(&["Avalanche", "Fantom"]).await;
        // Fantom's linker checked against Avalanche's registry record
        let handles = world.connections.get("Fantom").unwrap();
        let report = check_linker_wiring(world.chain("Avalanche"), handles.linker.as_ref())
            .await
            .unwrap();

        let fields: Vec<_> = report.mismatches.iter().map(|m| m.field).collect();
        assert_eq!(fields, vec!["tokenAddress", "chainName", "gasService", "gateway"]);
    }
}
