//! EVM Chain Support Module
//!
//! alloy-backed implementations of the binding traits.
//!
//! ## Submodules
//!
//! - `contracts` - HRO token and linker ABIs using alloy sol! macro
//! - `signer` - Shared signing identity and its submission queue
//! - `asset` - Asset contract binding
//! - `linker` - Linker contract binding

pub mod asset;
pub mod contracts;
pub mod linker;
pub mod signer;

pub use asset::EvmAssetContract;
pub use contracts::{HeroesToken, HeroesTokenLinker};
pub use linker::EvmLinkerContract;
pub use signer::SigningIdentity;

use alloy::providers::ProviderBuilder;
use std::sync::Arc;
use tracing::info;

use crate::bindings::{ChainConnections, ChainHandles};
use crate::error::{CallError, LinkerError, Result};
use crate::registry::{Chain, ChainRegistry};

/// Build signing bindings for one deployed chain
pub fn connect_chain(chain: &Chain, identity: &SigningIdentity) -> Result<ChainHandles> {
    let deployed = chain.deployed()?;

    let provider = ProviderBuilder::new()
        .with_recommended_fillers()
        .wallet(identity.wallet().clone())
        .on_http(chain.rpc.parse().map_err(|e| {
            LinkerError::configuration(&chain.name, format!("Invalid RPC URL: {}", e))
        })?);

    info!(
        chain = %chain.name,
        rpc = %chain.rpc,
        asset = %deployed.asset,
        linker = %deployed.linker,
        signer = %identity.address(),
        "Connected chain"
    );

    Ok(ChainHandles {
        asset: Arc::new(EvmAssetContract::new(
            &chain.name,
            deployed.asset,
            provider.clone(),
        )),
        linker: Arc::new(EvmLinkerContract::new(
            &chain.name,
            deployed.linker,
            provider,
        )),
    })
}

/// Connect every chain in the registry. Fails before any network traffic if
/// a chain is missing an address.
pub fn connect_all(
    registry: &ChainRegistry,
    identity: &SigningIdentity,
) -> Result<ChainConnections> {
    for chain in registry.chains() {
        chain.deployed()?;
    }

    let mut connections = ChainConnections::new();
    for chain in registry.chains() {
        connections.insert(chain.name.clone(), connect_chain(chain, identity)?);
    }
    Ok(connections)
}

/// Split an RPC/contract error into a revert (with its reason) or a
/// transport failure. Revert data appended by the node is dropped from the
/// reason.
pub(crate) fn classify_call_error(error: impl std::fmt::Display) -> CallError {
    const REVERTED: &str = "execution reverted";
    const DATA: &str = ", data:";

    let message = error.to_string();
    let lower = message.to_lowercase();

    if let Some(idx) = lower.find(REVERTED) {
        let tail = message.get(idx + REVERTED.len()..).unwrap_or_default();
        let reason = tail
            .find(DATA)
            .map_or(tail, |end| &tail[..end])
            .trim_start_matches(':')
            .trim();
        if reason.is_empty() {
            return CallError::Reverted(message);
        }
        return CallError::Reverted(reason.to_string());
    }

    if lower.contains("revert")
        || lower.contains("insufficient funds")
        || lower.contains("out of gas")
    {
        return CallError::Reverted(message);
    }

    CallError::Transport(message)
}
