//! HRO Linker: cross-chain NFT linker orchestration
//!
//! Drives the HRO token across EVM chains connected by a message relay. One
//! chain holds the canonical token contract; every other chain holds a
//! mirror, and a linker contract per chain locks, burns, unlocks or mints
//! as tokens move.
//!
//! - **Registry** - Chain records and once-only deployed address write-back
//! - **Deployment** - Asset and linker deployment, linker wiring checks
//! - **Provisioning** - Bridge role grants to every remote linker
//! - **Transfers** - Approve, price and submit a transfer, then verify it
//! - **Confirmation** - Bounded, cancellable polling with an injected clock
//! - **EVM Module** - alloy bindings and the shared signing identity
//! - **Testing Module** - In-memory network for exercising all of the above
//!
//! ## Feature Flags
//!
//! - `evm` - Enable alloy-backed chain support (default)
//! - `testing` - Enable the simulated network for integration tests
//! - `full` - Enable all features

// Core modules (always available)
pub mod bindings;
pub mod config;
pub mod confirmation;
pub mod deploy;
pub mod error;
pub mod gas;
pub mod orchestrator;
pub mod provisioner;
pub mod queue;
pub mod redact;
pub mod registry;
pub mod types;

// Chain-specific modules (feature-gated)
#[cfg(feature = "evm")]
pub mod evm;

// Testing utilities (feature-gated)
#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export commonly used items at the crate root
pub use bindings::{AssetContract, ChainConnections, ChainHandles, LinkerContract, SendRequest};
pub use confirmation::{ConfirmationWaiter, Sleeper, TokioSleeper, WaitOutcome};
pub use deploy::{
    check_linker_wiring, deploy_all, deploy_chain, linker_init_params, Deployer, LinkerDeployment,
    WiringReport,
};
pub use error::{CallError, LinkerError, Result};
pub use gas::{relay_fee, FixedGasPrice, FnGasEstimator, GasEstimator, NATIVE_FEE_TOKEN};
pub use orchestrator::{Settlement, TransferConfig, TransferOrchestrator};
pub use provisioner::{
    bridge_role, PermissionProvisioner, ProvisionConfig, ProvisionReport, RoleStatus,
};
pub use queue::{SubmissionPermit, SubmissionQueue};
pub use registry::{Chain, ChainRegistry, DEFAULT_CANONICAL_CHAIN};
pub use types::{
    AssetKind, DeployedAddresses, OwnerView, OwnershipSnapshot, TransferIntent, TransferReceipt,
    VerificationReport, VerificationStatus,
};
