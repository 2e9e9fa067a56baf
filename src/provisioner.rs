//! Bridge role provisioning
//!
//! Every remote chain's linker needs the asset contract's bridge role before
//! it can mint inbound tokens or burn outbound ones. The canonical chain's
//! linker only locks and unlocks, so it is skipped.
//!
//! Chains are visited strictly one after another under the signing
//! identity's submission queue. A grant that is included but not yet
//! visible through `hasRole` is a stale read: the read is retried on the
//! confirmation cadence, the transaction is never resent.

use alloy::primitives::{keccak256, Address, B256};
use std::time::Duration;
use tracing::{info, warn};

use crate::bindings::{ChainConnections, ChainHandles};
use crate::confirmation::{ConfirmationWaiter, DEFAULT_POLL_INTERVAL};
use crate::error::{LinkerError, Result};
use crate::queue::SubmissionQueue;
use crate::registry::ChainRegistry;

/// Gas limit for role grants; a generous fixed overestimate
pub const DEFAULT_GRANT_GAS_LIMIT: u64 = 500_000;

/// `keccak256("BRIDGE_ROLE")`
pub fn bridge_role() -> B256 {
    keccak256("BRIDGE_ROLE")
}

#[derive(Debug, Clone)]
pub struct ProvisionConfig {
    pub grant_gas_limit: u64,
    /// Delay between role re-reads after a grant
    pub confirm_interval: Duration,
    /// Re-reads before the grant is reported as not yet visible
    pub confirm_attempts: u32,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            grant_gas_limit: DEFAULT_GRANT_GAS_LIMIT,
            confirm_interval: DEFAULT_POLL_INTERVAL,
            confirm_attempts: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleStatus {
    /// Role was already held; nothing was sent
    AlreadyGranted,
    /// Grant included and observed through `hasRole`
    Granted { tx: B256 },
    /// Grant included but `hasRole` still reads false after every re-read
    PendingVisibility { tx: B256 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionReport {
    pub chain: String,
    pub linker: Address,
    pub status: RoleStatus,
}

pub struct PermissionProvisioner<'a> {
    registry: &'a ChainRegistry,
    connections: &'a ChainConnections,
    queue: SubmissionQueue,
    waiter: ConfirmationWaiter,
    config: ProvisionConfig,
}

impl<'a> PermissionProvisioner<'a> {
    pub fn new(
        registry: &'a ChainRegistry,
        connections: &'a ChainConnections,
        queue: SubmissionQueue,
    ) -> Self {
        Self {
            registry,
            connections,
            queue,
            waiter: ConfirmationWaiter::default(),
            config: ProvisionConfig::default(),
        }
    }

    pub fn with_waiter(mut self, waiter: ConfirmationWaiter) -> Self {
        self.waiter = waiter;
        self
    }

    pub fn with_config(mut self, config: ProvisionConfig) -> Self {
        self.config = config;
        self
    }

    /// Grant the bridge role on every remote chain, in registry order.
    ///
    /// All remote chains are checked for addresses and connections before
    /// the first transaction goes out.
    pub async fn provision_all(&self) -> Result<Vec<ProvisionReport>> {
        let mut targets = Vec::new();
        for chain in self.registry.remote_chains() {
            let deployed = chain.deployed()?;
            let handles = self.connections.get(&chain.name)?;
            targets.push((chain.name.as_str(), deployed.linker, handles));
        }

        info!(chains = targets.len(), "Provisioning bridge roles");

        let mut reports = Vec::with_capacity(targets.len());
        for (chain, linker, handles) in targets {
            reports.push(self.provision(chain, linker, handles).await?);
        }
        Ok(reports)
    }

    /// Grant the bridge role on a single remote chain
    pub async fn provision_chain(&self, chain: &str) -> Result<ProvisionReport> {
        if self.registry.is_canonical(chain) {
            return Err(LinkerError::configuration(
                chain,
                "canonical chain linker does not take the bridge role",
            ));
        }
        let deployed = self.registry.require_deployed(chain)?;
        let handles = self.connections.get(chain)?;
        self.provision(chain, deployed.linker, handles).await
    }

    async fn provision(
        &self,
        chain: &str,
        linker: Address,
        handles: &ChainHandles,
    ) -> Result<ProvisionReport> {
        let role = bridge_role();
        let asset = handles.asset.clone();

        let held = asset
            .has_role(role, linker)
            .await
            .map_err(|e| LinkerError::Rpc {
                chain: chain.to_string(),
                reason: e.to_string(),
            })?;

        if held {
            info!(chain = chain, linker = %linker, "Linker already holds bridge role");
            return Ok(ProvisionReport {
                chain: chain.to_string(),
                linker,
                status: RoleStatus::AlreadyGranted,
            });
        }

        info!(chain = chain, linker = %linker, "Granting bridge role to linker");
        let tx = {
            let permit = self.queue.acquire().await;
            asset
                .grant_role(&permit, role, linker, self.config.grant_gas_limit)
                .await
                .map_err(|e| LinkerError::RoleGrant {
                    chain: chain.to_string(),
                    reason: e.to_string(),
                })?
        };
        info!(chain = chain, linker = %linker, tx = %tx, "Bridge role grant included");

        let visible = matches!(asset.has_role(role, linker).await, Ok(true));
        let status = if visible {
            RoleStatus::Granted { tx }
        } else {
            warn!(
                chain = chain,
                linker = %linker,
                "Bridge role not visible right after inclusion, re-reading"
            );
            let outcome = self
                .waiter
                .wait_for(
                    &format!("bridge role on {}", chain),
                    || {
                        let asset = asset.clone();
                        async move { asset.has_role(role, linker).await }
                    },
                    self.config.confirm_interval,
                    self.config.confirm_attempts,
                )
                .await;

            if outcome.is_settled() {
                RoleStatus::Granted { tx }
            } else {
                warn!(
                    chain = chain,
                    linker = %linker,
                    tx = %tx,
                    attempts = outcome.attempts(),
                    "Bridge role still not visible; grant is included, check again later"
                );
                RoleStatus::PendingVisibility { tx }
            }
        };

        Ok(ProvisionReport {
            chain: chain.to_string(),
            linker,
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingSleeper, SimWorld};
    use std::sync::Arc;

    fn provisioner(world: &SimWorld) -> PermissionProvisioner<'_> {
        PermissionProvisioner::new(&world.registry, &world.connections, world.queue())
            .with_waiter(ConfirmationWaiter::new(Arc::new(RecordingSleeper::default())))
    }

    #[test]
    fn test_bridge_role_constant() {
        assert_eq!(
            hex::encode(bridge_role()),
            "52ba824bfabc2bcfcdf7f0edbb486ebb05e1836c90e78047efeb949990f72e5f"
        );
    }

    #[tokio::test]
    async fn test_grants_role_on_remote_chains_only() {
        let world = SimWorld::deployed(&["Avalanche", "Fantom", "Polygon"]).await;
        let provisioner = provisioner(&world);

        let reports = provisioner.provision_all().await.unwrap();
        let chains: Vec<_> = reports.iter().map(|r| r.chain.as_str()).collect();
        assert_eq!(chains, vec!["Fantom", "Polygon"]);
        assert!(reports
            .iter()
            .all(|r| matches!(r.status, RoleStatus::Granted { .. })));

        for chain in ["Fantom", "Polygon"] {
            let handles = world.connections.get(chain).unwrap();
            let linker = handles.linker.address();
            assert!(handles.asset.has_role(bridge_role(), linker).await.unwrap());
        }
        let avalanche = world.connections.get("Avalanche").unwrap();
        assert!(!avalanche
            .asset
            .has_role(bridge_role(), avalanche.linker.address())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_second_pass_is_a_no_op() {
        let world = SimWorld::deployed(&["Avalanche", "Fantom"]).await;
        let provisioner = provisioner(&world);

        provisioner.provision_all().await.unwrap();
        let sent = world.network.transaction_count();

        let reports = provisioner.provision_all().await.unwrap();
        assert_eq!(reports[0].status, RoleStatus::AlreadyGranted);
        assert_eq!(world.network.transaction_count(), sent);
    }

    #[tokio::test]
    async fn test_stale_role_read_is_retried_not_resent() {
        let world = SimWorld::deployed(&["Avalanche", "Fantom"]).await;
        world.network.set_role_visibility_lag("Fantom", 3);

        let sleeper = Arc::new(RecordingSleeper::default());
        let provisioner =
            provisioner(&world).with_waiter(ConfirmationWaiter::new(sleeper.clone()));

        let before = world.network.transaction_count();
        let report = provisioner.provision_chain("Fantom").await.unwrap();

        assert!(matches!(report.status, RoleStatus::Granted { .. }));
        assert_eq!(world.network.transaction_count(), before + 1);
        // One immediate read, then two delayed re-reads were stale
        assert_eq!(sleeper.calls(), 3);
    }

    #[tokio::test]
    async fn test_persistent_staleness_reports_pending_visibility() {
        let world = SimWorld::deployed(&["Avalanche", "Fantom"]).await;
        world.network.set_role_visibility_lag("Fantom", 100);

        let provisioner = provisioner(&world).with_config(ProvisionConfig {
                confirm_attempts: 2,
                ..ProvisionConfig::default()
            });

        let report = provisioner.provision_chain("Fantom").await.unwrap();
        assert!(matches!(report.status, RoleStatus::PendingVisibility { .. }));
    }

    #[tokio::test]
    async fn test_missing_linker_fails_before_any_transaction() {
        let world =
            SimWorld::with_undeployed_linker(&["Avalanche", "Fantom", "Polygon"], "Polygon").await;
        let provisioner = provisioner(&world);

        let before = world.network.transaction_count();
        let err = provisioner.provision_all().await.unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(world.network.transaction_count(), before);
    }

    #[tokio::test]
    async fn test_canonical_chain_rejected() {
        let world = SimWorld::deployed(&["Avalanche", "Fantom"]).await;
        let provisioner = provisioner(&world);
        assert!(provisioner.provision_chain("Avalanche").await.is_err());
    }

    #[tokio::test]
    async fn test_grant_by_non_admin_is_role_grant_error() {
        let world = SimWorld::deployed(&["Avalanche", "Fantom"]).await;
        let stranger = SubmissionQueue::new(Address::repeat_byte(0x99));
        let provisioner = PermissionProvisioner::new(&world.registry, &world.connections, stranger)
            .with_waiter(ConfirmationWaiter::new(Arc::new(RecordingSleeper::default())));

        let err = provisioner.provision_chain("Fantom").await.unwrap_err();
        assert!(matches!(err, LinkerError::RoleGrant { .. }));
    }
}
