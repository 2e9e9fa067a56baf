//! Common types for cross-chain transfers
//!
//! Transfer intents, receipts, and the ownership views used to decide whether
//! a transfer has settled.

use alloy::primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which flavour of asset contract a chain carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetKind {
    /// Home token contract; outbound transfers lock, inbound transfers unlock
    Canonical,
    /// Mirror token; outbound transfers burn, inbound transfers mint
    Remote,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Canonical => "canonical",
            AssetKind::Remote => "remote",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Contract addresses of a fully deployed chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeployedAddresses {
    pub asset: Address,
    pub linker: Address,
}

/// A single transfer attempt. Built per attempt and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferIntent {
    pub source_chain: String,
    pub destination_chain: String,
    pub token_id: U256,
    pub sender: Address,
    pub recipient: Address,
    /// Relay execution gas the fee is paid for
    pub gas_budget: u64,
}

impl TransferIntent {
    pub fn new(
        source_chain: impl Into<String>,
        destination_chain: impl Into<String>,
        token_id: U256,
        sender: Address,
        recipient: Address,
        gas_budget: u64,
    ) -> Self {
        Self {
            source_chain: source_chain.into(),
            destination_chain: destination_chain.into(),
            token_id,
            sender,
            recipient,
            gas_budget,
        }
    }
}

/// One chain's answer to `ownerOf(tokenId)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerView {
    Owner(Address),
    /// The read failed, typically because the token is not minted there
    Unknown(String),
}

impl OwnerView {
    pub fn owner(&self) -> Option<Address> {
        match self {
            OwnerView::Owner(address) => Some(*address),
            OwnerView::Unknown(_) => None,
        }
    }

    pub fn is_owned_by(&self, address: Address) -> bool {
        self.owner() == Some(address)
    }
}

impl fmt::Display for OwnerView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OwnerView::Owner(address) => write!(f, "{}", address),
            OwnerView::Unknown(reason) => write!(f, "unknown ({})", reason),
        }
    }
}

/// Both chains' view of one token at a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnershipSnapshot {
    pub token_id: U256,
    pub source: OwnerView,
    pub destination: OwnerView,
}

/// Locally observable outcome of a submitted transfer
#[derive(Debug, Clone)]
pub struct TransferReceipt {
    pub intent: TransferIntent,
    /// Ownership before the approval was sent
    pub baseline: OwnershipSnapshot,
    pub approval_tx: B256,
    pub send_tx: B256,
    /// Native value attached to the send for relay gas
    pub fee: U256,
}

/// Whether a transfer can be seen as complete on both chains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerificationStatus {
    /// Recipient owns the token on the destination and the sender no longer
    /// holds it on the source
    Settled,
    /// Expected end state not observable yet
    Pending,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Settled => "settled",
            VerificationStatus::Pending => "pending",
        }
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationReport {
    pub status: VerificationStatus,
    pub snapshot: OwnershipSnapshot,
}

impl VerificationReport {
    /// Classify a snapshot against the intent it was taken for
    pub fn evaluate(intent: &TransferIntent, snapshot: OwnershipSnapshot) -> Self {
        let arrived = snapshot.destination.is_owned_by(intent.recipient);
        let left_source = !snapshot.source.is_owned_by(intent.sender);

        let status = if arrived && left_source {
            VerificationStatus::Settled
        } else {
            VerificationStatus::Pending
        };

        Self { status, snapshot }
    }

    pub fn is_settled(&self) -> bool {
        self.status == VerificationStatus::Settled
    }
}
