//! In-memory linker network
//!
//! [`SimNetwork`] models every chain's asset and linker contract plus the
//! relay between them, behind the same binding traits the alloy clients
//! implement. It enforces the contract rules the orchestration depends on:
//!
//! - only the owner approves, and the linker needs that approval to move
//!   a token
//! - the canonical chain's linker locks outbound tokens and unlocks inbound
//!   ones; remote linkers burn and mint and need the bridge role for it
//! - the attached value must cover the chain's minimum relay fee
//!
//! Relay delivery is explicit: sent messages queue until
//! [`SimNetwork::deliver_next`] or [`SimNetwork::deliver_all`] runs, so
//! tests can observe the in-transit state.

use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use eyre::{eyre, Result};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::bindings::{AssetContract, ChainConnections, ChainHandles, LinkerContract, SendRequest};
use crate::deploy::{deploy_all, Deployer, LinkerDeployment};
use crate::error::CallError;
use crate::provisioner::bridge_role;
use crate::queue::{SubmissionPermit, SubmissionQueue};
use crate::registry::{Chain, ChainRegistry};
use crate::types::AssetKind;

/// A cross-chain message waiting for relay delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayMessage {
    pub from_chain: String,
    pub to_chain: String,
    pub recipient: Address,
    pub token_id: U256,
}

struct SimChain {
    kind: AssetKind,
    asset: Address,
    admin: Address,
    linker: Option<LinkerDeployment>,
    linker_address: Address,
    owners: HashMap<U256, Address>,
    approvals: HashMap<U256, Address>,
    roles: HashMap<B256, HashSet<Address>>,
    /// Stale `hasRole` answers still owed per (role, account)
    stale_reads: HashMap<(B256, Address), u32>,
    role_visibility_lag: u32,
    /// `hasRole` calls that still fail at the transport level
    failing_role_reads: u32,
    min_relay_fee: U256,
}

impl SimChain {
    fn holds_role(&self, role: B256, account: Address) -> bool {
        self.roles
            .get(&role)
            .is_some_and(|holders| holders.contains(&account))
    }
}

#[derive(Default)]
struct SimState {
    chains: HashMap<String, SimChain>,
    relay: VecDeque<RelayMessage>,
    transactions: u64,
    next_address: u64,
}

impl SimState {
    fn chain_mut(&mut self, name: &str) -> std::result::Result<&mut SimChain, CallError> {
        self.chains
            .get_mut(name)
            .ok_or_else(|| CallError::Transport(format!("no contracts deployed on {}", name)))
    }

    fn fresh_address(&mut self) -> Address {
        self.next_address += 1;
        let mut bytes = [0u8; 20];
        bytes[0] = 0xc0;
        bytes[12..].copy_from_slice(&self.next_address.to_be_bytes());
        Address::from(bytes)
    }

    fn record_transaction(&mut self) -> B256 {
        self.transactions += 1;
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&self.transactions.to_be_bytes());
        B256::from(bytes)
    }
}

/// Shared handle to the simulated network; clones see the same state
#[derive(Clone)]
pub struct SimNetwork {
    state: Arc<Mutex<SimState>>,
    admin: Address,
}

impl SimNetwork {
    /// `admin` deploys every contract and holds the role admin rights
    pub fn new(admin: Address) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState::default())),
            admin,
        }
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Mint `token_id` to `owner` on `chain`
    pub fn mint(&self, chain: &str, token_id: U256, owner: Address) -> Result<()> {
        let mut state = self.state();
        let sim = state.chain_mut(chain).map_err(|e| eyre!("{}", e))?;
        if sim.owners.contains_key(&token_id) {
            return Err(eyre!("token {} already minted on {}", token_id, chain));
        }
        sim.owners.insert(token_id, owner);
        Ok(())
    }

    /// Current owner straight from state, bypassing the bindings
    pub fn owner_of(&self, chain: &str, token_id: U256) -> Option<Address> {
        self.state()
            .chains
            .get(chain)
            .and_then(|sim| sim.owners.get(&token_id).copied())
    }

    /// Chains where `token_id` is held by an account other than the linker
    pub fn active_holders(&self, token_id: U256) -> Vec<(String, Address)> {
        let state = self.state();
        let mut holders: Vec<_> = state
            .chains
            .iter()
            .filter_map(|(name, sim)| {
                sim.owners
                    .get(&token_id)
                    .filter(|owner| **owner != sim.linker_address)
                    .map(|owner| (name.clone(), *owner))
            })
            .collect();
        holders.sort();
        holders
    }

    /// Make the next `reads` role checks after each grant on `chain` read false
    pub fn set_role_visibility_lag(&self, chain: &str, reads: u32) {
        if let Some(sim) = self.state().chains.get_mut(chain) {
            sim.role_visibility_lag = reads;
        }
    }

    /// Make the next `reads` role checks on `chain` fail as if the RPC dropped
    pub fn fail_role_reads(&self, chain: &str, reads: u32) {
        if let Some(sim) = self.state().chains.get_mut(chain) {
            sim.failing_role_reads = reads;
        }
    }

    pub fn set_min_relay_fee(&self, chain: &str, fee: U256) {
        if let Some(sim) = self.state().chains.get_mut(chain) {
            sim.min_relay_fee = fee;
        }
    }

    /// Transactions included across all chains
    pub fn transaction_count(&self) -> u64 {
        self.state().transactions
    }

    pub fn pending_messages(&self) -> Vec<RelayMessage> {
        self.state().relay.iter().cloned().collect()
    }

    /// Execute the oldest relay message on its destination chain
    pub fn deliver_next(&self) -> Option<Result<RelayMessage>> {
        let mut state = self.state();
        let message = state.relay.pop_front()?;
        Some(Self::execute(&mut state, &message).map(|_| message))
    }

    /// Deliver until the relay is empty; returns how many messages executed
    pub fn deliver_all(&self) -> Result<usize> {
        let mut delivered = 0;
        while let Some(result) = self.deliver_next() {
            result?;
            delivered += 1;
        }
        Ok(delivered)
    }

    fn execute(state: &mut SimState, message: &RelayMessage) -> Result<()> {
        let sim = state
            .chains
            .get_mut(&message.to_chain)
            .ok_or_else(|| eyre!("relay destination {} not deployed", message.to_chain))?;

        match sim.kind {
            AssetKind::Canonical => {
                if sim.owners.get(&message.token_id) != Some(&sim.linker_address) {
                    return Err(eyre!(
                        "token {} is not locked in the {} linker",
                        message.token_id,
                        message.to_chain
                    ));
                }
                sim.owners.insert(message.token_id, message.recipient);
            }
            AssetKind::Remote => {
                if !sim.holds_role(bridge_role(), sim.linker_address) {
                    return Err(eyre!(
                        "{} linker is missing the bridge role",
                        message.to_chain
                    ));
                }
                if sim.owners.contains_key(&message.token_id) {
                    return Err(eyre!(
                        "ERC721: token {} already minted on {}",
                        message.token_id,
                        message.to_chain
                    ));
                }
                sim.owners.insert(message.token_id, message.recipient);
            }
        }
        Ok(())
    }

    /// Bindings for one deployed chain
    pub fn handles(&self, chain: &str) -> Result<ChainHandles> {
        let state = self.state();
        let sim = state
            .chains
            .get(chain)
            .ok_or_else(|| eyre!("no contracts deployed on {}", chain))?;
        if sim.linker.is_none() {
            return Err(eyre!("no linker deployed on {}", chain));
        }

        Ok(ChainHandles {
            asset: Arc::new(SimAsset {
                network: self.clone(),
                chain: chain.to_string(),
                address: sim.asset,
            }),
            linker: Arc::new(SimLinker {
                network: self.clone(),
                chain: chain.to_string(),
                address: sim.linker_address,
            }),
        })
    }

    /// Bindings for every registry chain with both contracts deployed
    pub fn connections(&self, registry: &ChainRegistry) -> ChainConnections {
        let mut connections = ChainConnections::new();
        for chain in registry.chains() {
            if let Ok(handles) = self.handles(&chain.name) {
                connections.insert(chain.name.clone(), handles);
            }
        }
        connections
    }
}

#[async_trait]
impl Deployer for SimNetwork {
    async fn deploy_asset(&self, chain: &Chain, kind: AssetKind) -> Result<Address> {
        let mut state = self.state();
        if state.chains.contains_key(&chain.name) {
            return Err(eyre!("asset already deployed on {}", chain.name));
        }
        let asset = state.fresh_address();
        state.record_transaction();
        state.chains.insert(
            chain.name.clone(),
            SimChain {
                kind,
                asset,
                admin: self.admin,
                linker: None,
                linker_address: Address::ZERO,
                owners: HashMap::new(),
                approvals: HashMap::new(),
                roles: HashMap::new(),
                stale_reads: HashMap::new(),
                role_visibility_lag: 0,
                failing_role_reads: 0,
                min_relay_fee: U256::ZERO,
            },
        );
        Ok(asset)
    }

    async fn deploy_linker(&self, chain: &Chain, deployment: &LinkerDeployment) -> Result<Address> {
        let mut state = self.state();
        let linker = state.fresh_address();
        state.record_transaction();
        let sim = state
            .chains
            .get_mut(&chain.name)
            .ok_or_else(|| eyre!("deploy the asset on {} first", chain.name))?;
        if sim.asset != deployment.token {
            return Err(eyre!(
                "linker token {} does not match asset {}",
                deployment.token,
                sim.asset
            ));
        }
        sim.linker = Some(deployment.clone());
        sim.linker_address = linker;
        Ok(linker)
    }
}

struct SimAsset {
    network: SimNetwork,
    chain: String,
    address: Address,
}

#[async_trait]
impl AssetContract for SimAsset {
    fn address(&self) -> Address {
        self.address
    }

    async fn owner_of(&self, token_id: U256) -> std::result::Result<Address, CallError> {
        let mut state = self.network.state();
        let sim = state.chain_mut(&self.chain)?;
        sim.owners
            .get(&token_id)
            .copied()
            .ok_or_else(|| CallError::Reverted("ERC721: invalid token ID".to_string()))
    }

    async fn approve(
        &self,
        permit: &SubmissionPermit,
        spender: Address,
        token_id: U256,
        _gas_limit: u64,
    ) -> std::result::Result<B256, CallError> {
        let mut state = self.network.state();
        let sim = state.chain_mut(&self.chain)?;
        let owner = sim
            .owners
            .get(&token_id)
            .copied()
            .ok_or_else(|| CallError::Reverted("ERC721: invalid token ID".to_string()))?;
        if owner != permit.signer() {
            return Err(CallError::Reverted(
                "ERC721: approve caller is not token owner or approved for all".to_string(),
            ));
        }
        sim.approvals.insert(token_id, spender);
        Ok(state.record_transaction())
    }

    async fn grant_role(
        &self,
        permit: &SubmissionPermit,
        role: B256,
        grantee: Address,
        _gas_limit: u64,
    ) -> std::result::Result<B256, CallError> {
        let mut state = self.network.state();
        let sim = state.chain_mut(&self.chain)?;
        if permit.signer() != sim.admin {
            return Err(CallError::Reverted(format!(
                "AccessControl: account {} is missing role {}",
                permit.signer(),
                B256::ZERO
            )));
        }
        if sim.roles.entry(role).or_default().insert(grantee) && sim.role_visibility_lag > 0 {
            sim.stale_reads
                .insert((role, grantee), sim.role_visibility_lag);
        }
        Ok(state.record_transaction())
    }

    async fn has_role(&self, role: B256, grantee: Address) -> std::result::Result<bool, CallError> {
        let mut state = self.network.state();
        let sim = state.chain_mut(&self.chain)?;
        if sim.failing_role_reads > 0 {
            sim.failing_role_reads -= 1;
            return Err(CallError::Transport(format!("{} rpc unavailable", self.chain)));
        }
        if let Some(remaining) = sim.stale_reads.get_mut(&(role, grantee)) {
            if *remaining > 0 {
                *remaining -= 1;
                return Ok(false);
            }
        }
        Ok(sim.holds_role(role, grantee))
    }
}

struct SimLinker {
    network: SimNetwork,
    chain: String,
    address: Address,
}

impl SimLinker {
    fn deployment(&self) -> std::result::Result<LinkerDeployment, CallError> {
        let mut state = self.network.state();
        let sim = state.chain_mut(&self.chain)?;
        sim.linker
            .clone()
            .ok_or_else(|| CallError::Transport(format!("no linker deployed on {}", self.chain)))
    }
}

#[async_trait]
impl LinkerContract for SimLinker {
    fn address(&self) -> Address {
        self.address
    }

    async fn send_asset(
        &self,
        permit: &SubmissionPermit,
        request: &SendRequest,
    ) -> std::result::Result<B256, CallError> {
        let mut state = self.network.state();
        if request.destination_chain == self.chain
            || !state.chains.contains_key(&request.destination_chain)
        {
            return Err(CallError::Reverted(format!(
                "unsupported destination chain {}",
                request.destination_chain
            )));
        }

        let sim = state.chain_mut(&self.chain)?;
        if request.fee < sim.min_relay_fee {
            return Err(CallError::Reverted(format!(
                "insufficient value for relay gas: {} < {}",
                request.fee, sim.min_relay_fee
            )));
        }
        let owner = sim
            .owners
            .get(&request.token_id)
            .copied()
            .ok_or_else(|| CallError::Reverted("ERC721: invalid token ID".to_string()))?;
        if owner != permit.signer() {
            return Err(CallError::Reverted("caller is not token owner".to_string()));
        }
        if sim.approvals.get(&request.token_id) != Some(&self.address) {
            return Err(CallError::Reverted(
                "ERC721: caller is not token owner or approved".to_string(),
            ));
        }

        match sim.kind {
            AssetKind::Canonical => {
                sim.owners.insert(request.token_id, self.address);
            }
            AssetKind::Remote => {
                if !sim.holds_role(bridge_role(), self.address) {
                    return Err(CallError::Reverted(
                        "linker is missing the bridge role".to_string(),
                    ));
                }
                sim.owners.remove(&request.token_id);
            }
        }
        sim.approvals.remove(&request.token_id);

        state.relay.push_back(RelayMessage {
            from_chain: self.chain.clone(),
            to_chain: request.destination_chain.clone(),
            recipient: request.recipient,
            token_id: request.token_id,
        });
        Ok(state.record_transaction())
    }

    async fn chain_name(&self) -> std::result::Result<String, CallError> {
        Ok(self.deployment()?.chain_name)
    }

    async fn gateway(&self) -> std::result::Result<Address, CallError> {
        Ok(self.deployment()?.gateway)
    }

    async fn gas_service(&self) -> std::result::Result<Address, CallError> {
        Ok(self.deployment()?.gas_service)
    }

    async fn token_address(&self) -> std::result::Result<Address, CallError> {
        Ok(self.deployment()?.token)
    }
}

/// A registry, a simulated network and its connections, wired together
pub struct SimWorld {
    pub registry: ChainRegistry,
    pub network: SimNetwork,
    pub connections: ChainConnections,
    queue: SubmissionQueue,
}

impl SimWorld {
    /// Signer that deployed everything and owns minted test tokens
    pub const SIGNER: Address = Address::new([0x5e; 20]);

    /// Chains named `names` with contracts deployed; the first is canonical
    pub async fn deployed(names: &[&str]) -> Self {
        let mut registry = Self::registry(names);
        let network = SimNetwork::new(Self::SIGNER);
        if let Err(e) = deploy_all(&mut registry, &network).await {
            panic!("simulated deployment failed: {}", e);
        }
        let connections = network.connections(&registry);
        Self {
            registry,
            network,
            connections,
            queue: SubmissionQueue::new(Self::SIGNER),
        }
    }

    /// Like [`deployed`](Self::deployed), but `missing` only gets its asset
    pub async fn with_undeployed_linker(names: &[&str], missing: &str) -> Self {
        let mut registry = Self::registry(names);
        let network = SimNetwork::new(Self::SIGNER);
        for name in names {
            let result = if *name == missing {
                Self::deploy_asset_only(&mut registry, &network, name).await
            } else {
                crate::deploy::deploy_chain(&mut registry, &network, name)
                    .await
                    .map(|_| ())
                    .map_err(|e| eyre!("{}", e))
            };
            if let Err(e) = result {
                panic!("simulated deployment of {} failed: {}", name, e);
            }
        }
        let connections = network.connections(&registry);
        Self {
            registry,
            network,
            connections,
            queue: SubmissionQueue::new(Self::SIGNER),
        }
    }

    async fn deploy_asset_only(
        registry: &mut ChainRegistry,
        network: &SimNetwork,
        name: &str,
    ) -> Result<()> {
        let chain = registry.get(name)?.clone();
        let kind = registry.asset_kind(name);
        let asset = network.deploy_asset(&chain, kind).await?;
        registry.set_asset_address(name, asset)?;
        Ok(())
    }

    fn registry(names: &[&str]) -> ChainRegistry {
        let chains = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                Chain::new(
                    *name,
                    format!("http://localhost:{}", 8545 + i),
                    Address::repeat_byte(0x10 + i as u8),
                    Address::repeat_byte(0x20 + i as u8),
                    Address::repeat_byte(0x30 + i as u8),
                )
            })
            .collect();
        match ChainRegistry::new(chains, names.first().copied().unwrap_or_default()) {
            Ok(registry) => registry,
            Err(e) => panic!("invalid simulated registry: {}", e),
        }
    }

    /// Submission queue of [`SIGNER`](Self::SIGNER); every call shares it
    pub fn queue(&self) -> SubmissionQueue {
        self.queue.clone()
    }

    pub fn chain(&self, name: &str) -> &Chain {
        match self.registry.get(name) {
            Ok(chain) => chain,
            Err(e) => panic!("{}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_canonical_lock_and_remote_mint() {
        let world = SimWorld::deployed(&["Avalanche", "Fantom"]).await;
        let queue = world.queue();
        let token = U256::from(7);
        world.network.mint("Avalanche", token, SimWorld::SIGNER).unwrap();

        let avalanche = world.connections.get("Avalanche").unwrap();
        let fantom = world.connections.get("Fantom").unwrap();
        let permit = queue.acquire().await;
        fantom
            .asset
            .grant_role(&permit, bridge_role(), fantom.linker.address(), 0)
            .await
            .unwrap();
        avalanche
            .asset
            .approve(&permit, avalanche.linker.address(), token, 0)
            .await
            .unwrap();
        avalanche
            .linker
            .send_asset(
                &permit,
                &SendRequest {
                    destination_chain: "Fantom".to_string(),
                    recipient: SimWorld::SIGNER,
                    token_id: token,
                    refund_address: SimWorld::SIGNER,
                    fee: U256::ZERO,
                    gas_limit: 0,
                },
            )
            .await
            .unwrap();

        assert_eq!(
            world.network.owner_of("Avalanche", token),
            Some(avalanche.linker.address())
        );
        assert!(world.network.active_holders(token).is_empty());
        assert_eq!(world.network.pending_messages().len(), 1);

        assert_eq!(world.network.deliver_all().unwrap(), 1);
        assert_eq!(
            world.network.active_holders(token),
            vec![("Fantom".to_string(), SimWorld::SIGNER)]
        );
    }

    #[tokio::test]
    async fn test_send_without_approval_reverts() {
        let world = SimWorld::deployed(&["Avalanche", "Fantom"]).await;
        let queue = world.queue();
        let token = U256::from(1);
        world.network.mint("Avalanche", token, SimWorld::SIGNER).unwrap();

        let avalanche = world.connections.get("Avalanche").unwrap();
        let permit = queue.acquire().await;
        let err = avalanche
            .linker
            .send_asset(
                &permit,
                &SendRequest {
                    destination_chain: "Fantom".to_string(),
                    recipient: SimWorld::SIGNER,
                    token_id: token,
                    refund_address: SimWorld::SIGNER,
                    fee: U256::ZERO,
                    gas_limit: 0,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CallError::Reverted(_)));
        assert!(world.network.pending_messages().is_empty());
    }

    #[tokio::test]
    async fn test_mint_delivery_without_role_fails() {
        let world = SimWorld::deployed(&["Avalanche", "Fantom"]).await;
        let queue = world.queue();
        let token = U256::from(3);
        world.network.mint("Avalanche", token, SimWorld::SIGNER).unwrap();

        let avalanche = world.connections.get("Avalanche").unwrap();
        let permit = queue.acquire().await;
        avalanche
            .asset
            .approve(&permit, avalanche.linker.address(), token, 0)
            .await
            .unwrap();
        avalanche
            .linker
            .send_asset(
                &permit,
                &SendRequest {
                    destination_chain: "Fantom".to_string(),
                    recipient: SimWorld::SIGNER,
                    token_id: token,
                    refund_address: SimWorld::SIGNER,
                    fee: U256::ZERO,
                    gas_limit: 0,
                },
            )
            .await
            .unwrap();

        assert!(world.network.deliver_next().unwrap().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_world_queue_is_shared() {
        let world = SimWorld::deployed(&["Avalanche", "Fantom"]).await;
        let _held = world.queue().acquire().await;

        let second = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            world.queue().acquire(),
        )
        .await;
        assert!(second.is_err(), "queue clones must serialize");
    }

    #[tokio::test]
    async fn test_failing_role_reads_recover() {
        let world = SimWorld::deployed(&["Avalanche", "Fantom"]).await;
        world.network.fail_role_reads("Fantom", 1);

        let fantom = world.connections.get("Fantom").unwrap();
        let linker = fantom.linker.address();
        assert!(matches!(
            fantom.asset.has_role(bridge_role(), linker).await,
            Err(CallError::Transport(_))
        ));
        assert!(!fantom.asset.has_role(bridge_role(), linker).await.unwrap());
    }
}
