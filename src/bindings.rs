//! Contract binding seams
//!
//! The orchestration code talks to chains only through these traits. The
//! alloy-backed implementations live in [`crate::evm`]; the in-memory
//! simulator in `testing` implements the same traits.

use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{CallError, LinkerError, Result};
use crate::queue::SubmissionPermit;

/// Typed client over the asset contract's ownership and role operations
#[async_trait]
pub trait AssetContract: Send + Sync {
    fn address(&self) -> Address;

    /// Current owner; fails if the token is not minted on this chain
    async fn owner_of(&self, token_id: U256) -> std::result::Result<Address, CallError>;

    /// Approve `spender` for `token_id`. Returns once the transaction is included.
    async fn approve(
        &self,
        permit: &SubmissionPermit,
        spender: Address,
        token_id: U256,
        gas_limit: u64,
    ) -> std::result::Result<B256, CallError>;

    /// Grant `role` to `grantee`. Returns once the transaction is included.
    async fn grant_role(
        &self,
        permit: &SubmissionPermit,
        role: B256,
        grantee: Address,
        gas_limit: u64,
    ) -> std::result::Result<B256, CallError>;

    async fn has_role(&self, role: B256, grantee: Address)
        -> std::result::Result<bool, CallError>;
}

/// Arguments of a linker send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendRequest {
    pub destination_chain: String,
    pub recipient: Address,
    pub token_id: U256,
    pub refund_address: Address,
    /// Native value attached for relay gas
    pub fee: U256,
    /// Gas limit of the source-chain transaction
    pub gas_limit: u64,
}

/// Typed client over the per-chain linker contract
#[async_trait]
pub trait LinkerContract: Send + Sync {
    fn address(&self) -> Address;

    /// Lock or burn the token and hand the message to the relay.
    /// Returns once the source transaction is included.
    async fn send_asset(
        &self,
        permit: &SubmissionPermit,
        request: &SendRequest,
    ) -> std::result::Result<B256, CallError>;

    async fn chain_name(&self) -> std::result::Result<String, CallError>;

    async fn gateway(&self) -> std::result::Result<Address, CallError>;

    async fn gas_service(&self) -> std::result::Result<Address, CallError>;

    async fn token_address(&self) -> std::result::Result<Address, CallError>;
}

/// Bindings for one chain
#[derive(Clone)]
pub struct ChainHandles {
    pub asset: Arc<dyn AssetContract>,
    pub linker: Arc<dyn LinkerContract>,
}

/// Bindings for every connected chain, keyed by chain name
#[derive(Clone, Default)]
pub struct ChainConnections {
    handles: HashMap<String, ChainHandles>,
}

impl ChainConnections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, chain: impl Into<String>, handles: ChainHandles) {
        self.handles.insert(chain.into(), handles);
    }

    pub fn get(&self, chain: &str) -> Result<&ChainHandles> {
        self.handles
            .get(chain)
            .ok_or_else(|| LinkerError::configuration(chain, "no connection for chain"))
    }
}
