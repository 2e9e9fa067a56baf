//! Cross-chain transfer orchestration
//!
//! A transfer runs as a fixed sequence on the source chain:
//!
//! 1. **Pre-check** - confirm every remote linker involved holds the bridge
//!    role, then read `ownerOf` on both chains as a baseline
//! 2. **Authorize** - approve the source linker for the token
//! 3. **Price** - unit relay gas price times the gas budget
//! 4. **Submit** - `sendNft` with the fee attached
//!
//! Approval and send run under one [`SubmissionPermit`](crate::queue::SubmissionPermit),
//! so nothing else from the same signer lands between them. Settlement on
//! the destination is observed afterwards with [`TransferOrchestrator::verify`]
//! or [`TransferOrchestrator::await_settlement`]; neither ever fails, a
//! transfer that has not arrived is reported as pending.

use alloy::primitives::{Address, U256};
use std::convert::Infallible;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::bindings::{ChainConnections, SendRequest};
use crate::confirmation::{ConfirmationWaiter, WaitOutcome, DEFAULT_POLL_INTERVAL};
use crate::error::{LinkerError, Result};
use crate::gas::{relay_fee, GasEstimator, DEFAULT_RELAY_GAS_LIMIT, NATIVE_FEE_TOKEN};
use crate::provisioner::bridge_role;
use crate::queue::SubmissionQueue;
use crate::registry::{Chain, ChainRegistry};
use crate::types::{
    OwnerView, OwnershipSnapshot, TransferIntent, TransferReceipt, VerificationReport,
};

/// Base gas limit for source-chain transactions
pub const DEFAULT_TX_GAS_LIMIT: u64 = 500_000;
pub const DEFAULT_SEND_GAS_MULTIPLIER: u64 = 20;
/// The send carries the relay hand-off and needs far more than an approve
pub const MIN_SEND_GAS_MULTIPLIER: u64 = 10;

#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Relay execution gas paid for on the destination
    pub relay_gas_limit: u64,
    pub approve_gas_limit: u64,
    pub base_tx_gas_limit: u64,
    /// Clamped to at least [`MIN_SEND_GAS_MULTIPLIER`]
    pub send_gas_multiplier: u64,
    /// Delay between retries of a failed bridge role read
    pub role_read_interval: Duration,
    pub role_read_retries: u32,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            relay_gas_limit: DEFAULT_RELAY_GAS_LIMIT,
            approve_gas_limit: DEFAULT_TX_GAS_LIMIT,
            base_tx_gas_limit: DEFAULT_TX_GAS_LIMIT,
            send_gas_multiplier: DEFAULT_SEND_GAS_MULTIPLIER,
            role_read_interval: DEFAULT_POLL_INTERVAL,
            role_read_retries: 3,
        }
    }
}

impl TransferConfig {
    pub fn send_gas_limit(&self) -> u64 {
        self.base_tx_gas_limit
            .saturating_mul(self.send_gas_multiplier.max(MIN_SEND_GAS_MULTIPLIER))
    }
}

/// Result of waiting for a transfer to land
#[derive(Debug, Clone)]
pub struct Settlement {
    pub outcome: WaitOutcome,
    /// Ownership read after the wait ended
    pub report: VerificationReport,
}

pub struct TransferOrchestrator<'a> {
    registry: &'a ChainRegistry,
    connections: &'a ChainConnections,
    estimator: &'a dyn GasEstimator,
    queue: SubmissionQueue,
    waiter: ConfirmationWaiter,
    config: TransferConfig,
}

impl<'a> TransferOrchestrator<'a> {
    pub fn new(
        registry: &'a ChainRegistry,
        connections: &'a ChainConnections,
        estimator: &'a dyn GasEstimator,
        queue: SubmissionQueue,
    ) -> Self {
        Self {
            registry,
            connections,
            estimator,
            queue,
            waiter: ConfirmationWaiter::default(),
            config: TransferConfig::default(),
        }
    }

    pub fn with_waiter(mut self, waiter: ConfirmationWaiter) -> Self {
        self.waiter = waiter;
        self
    }

    pub fn with_config(mut self, config: TransferConfig) -> Self {
        self.config = config;
        self
    }

    /// Build an intent with the configured relay gas budget and execute it
    pub async fn transfer(
        &self,
        source_chain: &str,
        destination_chain: &str,
        token_id: U256,
        sender: Address,
        recipient: Address,
    ) -> Result<TransferReceipt> {
        let intent = TransferIntent::new(
            source_chain,
            destination_chain,
            token_id,
            sender,
            recipient,
            self.config.relay_gas_limit,
        );
        self.execute(&intent).await
    }

    /// Run pre-check, approval, pricing and submission for `intent`
    pub async fn execute(&self, intent: &TransferIntent) -> Result<TransferReceipt> {
        let source = self.registry.get(&intent.source_chain)?;
        let destination = self.registry.get(&intent.destination_chain)?;
        if source.name == destination.name {
            return Err(LinkerError::configuration(
                &source.name,
                "source and destination chain are the same",
            ));
        }
        let deployed = source.deployed()?;
        self.registry.require_deployed(&destination.name)?;
        let handles = self.connections.get(&source.name)?;
        self.connections.get(&destination.name)?;

        // Remote linkers burn outbound and mint inbound; without the role the
        // token would be stranded in flight
        for chain in [source, destination] {
            if !self.registry.is_canonical(&chain.name) {
                self.require_bridge_role(chain).await?;
            }
        }

        info!(
            from_chain = %source.name,
            to_chain = %destination.name,
            token_id = %intent.token_id,
            sender = %intent.sender,
            recipient = %intent.recipient,
            "Starting transfer"
        );

        let baseline = self.snapshot(intent).await;
        if !baseline.source.is_owned_by(intent.sender) {
            warn!(
                chain = %source.name,
                token_id = %intent.token_id,
                owner = %baseline.source,
                "Sender does not appear to own the token on the source chain"
            );
        }

        let permit = self.queue.acquire().await;
        if permit.signer() != intent.sender {
            return Err(LinkerError::Authorization {
                chain: source.name.clone(),
                token_id: intent.token_id,
                reason: format!(
                    "signer {} cannot approve on behalf of sender {}",
                    permit.signer(),
                    intent.sender
                ),
            });
        }

        info!(
            chain = %source.name,
            token_id = %intent.token_id,
            spender = %deployed.linker,
            "Approving linker"
        );
        let approval_tx = handles
            .asset
            .approve(
                &permit,
                deployed.linker,
                intent.token_id,
                self.config.approve_gas_limit,
            )
            .await
            .map_err(|e| LinkerError::Authorization {
                chain: source.name.clone(),
                token_id: intent.token_id,
                reason: e.to_string(),
            })?;

        let unit_price = self
            .estimator
            .estimate(source, destination, NATIVE_FEE_TOKEN)
            .await
            .map_err(|e| LinkerError::FeeEstimation {
                from_chain: source.name.clone(),
                to_chain: destination.name.clone(),
                reason: e.to_string(),
            })?;
        let fee = relay_fee(intent.gas_budget, unit_price);
        debug!(
            unit_price = %unit_price,
            gas_budget = intent.gas_budget,
            fee = %fee,
            "Relay fee computed"
        );

        let request = SendRequest {
            destination_chain: destination.name.clone(),
            recipient: intent.recipient,
            token_id: intent.token_id,
            refund_address: intent.sender,
            fee,
            gas_limit: self.config.send_gas_limit(),
        };

        info!(
            from_chain = %source.name,
            to_chain = %destination.name,
            token_id = %intent.token_id,
            fee = %fee,
            "Submitting transfer"
        );
        let send_tx = handles
            .linker
            .send_asset(&permit, &request)
            .await
            .map_err(|e| LinkerError::Submission {
                chain: source.name.clone(),
                token_id: intent.token_id,
                reason: e.to_string(),
            })?;
        drop(permit);

        info!(
            from_chain = %source.name,
            to_chain = %destination.name,
            token_id = %intent.token_id,
            tx = %send_tx,
            "Transfer submitted, relay pending"
        );

        Ok(TransferReceipt {
            intent: intent.clone(),
            baseline,
            approval_tx,
            send_tx,
            fee,
        })
    }

    async fn require_bridge_role(&self, chain: &Chain) -> Result<()> {
        let linker = chain.deployed()?.linker;
        let asset = self.connections.get(&chain.name)?.asset.clone();
        let role = bridge_role();

        let held = self
            .waiter
            .read_with_retry(
                &format!("bridge role on {}", chain.name),
                || {
                    let asset = asset.clone();
                    async move { asset.has_role(role, linker).await }
                },
                self.config.role_read_interval,
                self.config.role_read_retries,
            )
            .await
            .map_err(|e| LinkerError::Rpc {
                chain: chain.name.clone(),
                reason: e.to_string(),
            })?;

        if !held {
            return Err(LinkerError::configuration(
                &chain.name,
                format!("linker {} does not hold the bridge role", linker),
            ));
        }
        Ok(())
    }

    /// Both chains' current view of the intent's token. Read failures become
    /// [`OwnerView::Unknown`].
    pub async fn snapshot(&self, intent: &TransferIntent) -> OwnershipSnapshot {
        let (source, destination) = tokio::join!(
            self.owner_view(&intent.source_chain, intent.token_id),
            self.owner_view(&intent.destination_chain, intent.token_id),
        );

        info!(
            token_id = %intent.token_id,
            from_chain = %intent.source_chain,
            source_owner = %source,
            to_chain = %intent.destination_chain,
            destination_owner = %destination,
            "Ownership"
        );

        OwnershipSnapshot {
            token_id: intent.token_id,
            source,
            destination,
        }
    }

    async fn owner_view(&self, chain: &str, token_id: U256) -> OwnerView {
        let handles = match self.connections.get(chain) {
            Ok(handles) => handles,
            Err(e) => return OwnerView::Unknown(e.to_string()),
        };
        match handles.asset.owner_of(token_id).await {
            Ok(owner) => OwnerView::Owner(owner),
            Err(e) => {
                debug!(chain = chain, token_id = %token_id, error = %e, "ownerOf failed");
                OwnerView::Unknown(e.reason().to_string())
            }
        }
    }

    /// Whether the token has left the sender on the source chain and reached
    /// the recipient on the destination
    pub async fn verify(&self, intent: &TransferIntent) -> VerificationReport {
        let report = VerificationReport::evaluate(intent, self.snapshot(intent).await);
        info!(
            token_id = %intent.token_id,
            to_chain = %intent.destination_chain,
            status = %report.status,
            "Transfer verification"
        );
        report
    }

    /// Re-run [`verify`](Self::verify) on the given cadence until settled or
    /// out of attempts
    pub async fn await_settlement(
        &self,
        intent: &TransferIntent,
        poll_interval: Duration,
        max_attempts: u32,
    ) -> Settlement {
        let this = self;
        let outcome = self
            .waiter
            .wait_for(
                &format!("token {} on {}", intent.token_id, intent.destination_chain),
                || async move { Ok::<_, Infallible>(this.verify(intent).await.is_settled()) },
                poll_interval,
                max_attempts,
            )
            .await;

        let report = self.verify(intent).await;
        if !report.is_settled() {
            warn!(
                token_id = %intent.token_id,
                to_chain = %intent.destination_chain,
                attempts = outcome.attempts(),
                "Transfer not settled yet"
            );
        }
        Settlement { outcome, report }
    }
}
