//! Asset contract binding over alloy
//!
//! State-changing calls are dry-run with `eth_call` first so that a revert
//! surfaces with its reason, then sent and awaited until included.

use alloy::{
    primitives::{Address, B256, U256},
    providers::Provider,
    transports::Transport,
};
use async_trait::async_trait;
use tracing::{debug, info};

use super::classify_call_error;
use super::contracts::HeroesToken;
use crate::bindings::AssetContract;
use crate::error::CallError;
use crate::queue::SubmissionPermit;

pub struct EvmAssetContract<T, P> {
    chain: String,
    contract: HeroesToken::HeroesTokenInstance<T, P>,
}

impl<T, P> EvmAssetContract<T, P>
where
    T: Transport + Clone,
    P: Provider<T>,
{
    pub fn new(chain: &str, address: Address, provider: P) -> Self {
        Self {
            chain: chain.to_string(),
            contract: HeroesToken::new(address, provider),
        }
    }
}

#[async_trait]
impl<T, P> AssetContract for EvmAssetContract<T, P>
where
    T: Transport + Clone,
    P: Provider<T> + Send + Sync + 'static,
{
    fn address(&self) -> Address {
        *self.contract.address()
    }

    async fn owner_of(&self, token_id: U256) -> Result<Address, CallError> {
        let owner = self
            .contract
            .ownerOf(token_id)
            .call()
            .await
            .map_err(classify_call_error)?;
        Ok(owner._0)
    }

    async fn approve(
        &self,
        permit: &SubmissionPermit,
        spender: Address,
        token_id: U256,
        gas_limit: u64,
    ) -> Result<B256, CallError> {
        let call = self
            .contract
            .approve(spender, token_id)
            .from(permit.signer())
            .gas(gas_limit);

        call.call().await.map_err(classify_call_error)?;

        let pending = call.send().await.map_err(classify_call_error)?;
        debug!(chain = %self.chain, tx = %pending.tx_hash(), "approve sent");

        let receipt = pending
            .get_receipt()
            .await
            .map_err(|e| CallError::Transport(e.to_string()))?;

        if !receipt.status() {
            return Err(CallError::Reverted(format!(
                "approve transaction {} reverted",
                receipt.transaction_hash
            )));
        }

        info!(
            chain = %self.chain,
            spender = %spender,
            token_id = %token_id,
            tx = %receipt.transaction_hash,
            "approve included"
        );
        Ok(receipt.transaction_hash)
    }

    async fn grant_role(
        &self,
        permit: &SubmissionPermit,
        role: B256,
        grantee: Address,
        gas_limit: u64,
    ) -> Result<B256, CallError> {
        let call = self
            .contract
            .grantRole(role, grantee)
            .from(permit.signer())
            .gas(gas_limit);

        call.call().await.map_err(classify_call_error)?;

        let pending = call.send().await.map_err(classify_call_error)?;
        debug!(chain = %self.chain, tx = %pending.tx_hash(), "grantRole sent");

        let receipt = pending
            .get_receipt()
            .await
            .map_err(|e| CallError::Transport(e.to_string()))?;

        if !receipt.status() {
            return Err(CallError::Reverted(format!(
                "grantRole transaction {} reverted",
                receipt.transaction_hash
            )));
        }

        Ok(receipt.transaction_hash)
    }

    async fn has_role(&self, role: B256, grantee: Address) -> Result<bool, CallError> {
        let result = self
            .contract
            .hasRole(role, grantee)
            .call()
            .await
            .map_err(classify_call_error)?;
        Ok(result._0)
    }
}
