//! Linker contract binding over alloy

use alloy::{
    primitives::{Address, B256},
    providers::Provider,
    transports::Transport,
};
use async_trait::async_trait;
use tracing::{debug, info};

use super::classify_call_error;
use super::contracts::HeroesTokenLinker;
use crate::bindings::{LinkerContract, SendRequest};
use crate::error::CallError;
use crate::queue::SubmissionPermit;

pub struct EvmLinkerContract<T, P> {
    chain: String,
    contract: HeroesTokenLinker::HeroesTokenLinkerInstance<T, P>,
}

impl<T, P> EvmLinkerContract<T, P>
where
    T: Transport + Clone,
    P: Provider<T>,
{
    pub fn new(chain: &str, address: Address, provider: P) -> Self {
        Self {
            chain: chain.to_string(),
            contract: HeroesTokenLinker::new(address, provider),
        }
    }
}

#[async_trait]
impl<T, P> LinkerContract for EvmLinkerContract<T, P>
where
    T: Transport + Clone,
    P: Provider<T> + Send + Sync + 'static,
{
    fn address(&self) -> Address {
        *self.contract.address()
    }

    async fn send_asset(
        &self,
        permit: &SubmissionPermit,
        request: &SendRequest,
    ) -> Result<B256, CallError> {
        let call = self
            .contract
            .sendNft(
                request.destination_chain.clone(),
                request.recipient,
                request.token_id,
                request.refund_address,
            )
            .from(permit.signer())
            .value(request.fee)
            .gas(request.gas_limit);

        call.call().await.map_err(classify_call_error)?;

        let pending = call.send().await.map_err(classify_call_error)?;
        debug!(chain = %self.chain, tx = %pending.tx_hash(), "sendNft sent");

        let receipt = pending
            .get_receipt()
            .await
            .map_err(|e| CallError::Transport(e.to_string()))?;

        if !receipt.status() {
            return Err(CallError::Reverted(format!(
                "sendNft transaction {} reverted",
                receipt.transaction_hash
            )));
        }

        info!(
            chain = %self.chain,
            destination = %request.destination_chain,
            token_id = %request.token_id,
            fee = %request.fee,
            tx = %receipt.transaction_hash,
            "sendNft included"
        );
        Ok(receipt.transaction_hash)
    }

    async fn chain_name(&self) -> Result<String, CallError> {
        let result = self
            .contract
            .chainName()
            .call()
            .await
            .map_err(classify_call_error)?;
        Ok(result._0)
    }

    async fn gateway(&self) -> Result<Address, CallError> {
        let result = self
            .contract
            .gateway()
            .call()
            .await
            .map_err(classify_call_error)?;
        Ok(result._0)
    }

    async fn gas_service(&self) -> Result<Address, CallError> {
        let result = self
            .contract
            .gasService()
            .call()
            .await
            .map_err(classify_call_error)?;
        Ok(result._0)
    }

    async fn token_address(&self) -> Result<Address, CallError> {
        let result = self
            .contract
            .tokenAddress()
            .call()
            .await
            .map_err(classify_call_error)?;
        Ok(result._0)
    }
}
