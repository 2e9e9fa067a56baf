//! Common Test Assertions
//!
//! Assertion helpers over token ownership and transfer verification.

use alloy::primitives::{Address, U256};
use eyre::{eyre, Result};

use crate::testing::sim::SimNetwork;
use crate::types::{OwnerView, VerificationReport, VerificationStatus};

/// Assert that a chain's ownership read names `expected`
pub fn assert_owner_eq(view: &OwnerView, expected: Address) -> Result<()> {
    if !view.is_owned_by(expected) {
        return Err(eyre!("Owner mismatch: expected {}, got {}", expected, view));
    }
    Ok(())
}

/// Assert that a chain's ownership read failed (token absent there)
pub fn assert_owner_unknown(view: &OwnerView) -> Result<()> {
    if let OwnerView::Owner(owner) = view {
        return Err(eyre!("Expected no owner, got {}", owner));
    }
    Ok(())
}

/// Assert a verification outcome
pub fn assert_status(report: &VerificationReport, expected: VerificationStatus) -> Result<()> {
    if report.status != expected {
        return Err(eyre!(
            "Verification mismatch: expected {}, got {} (source: {}, destination: {})",
            expected.as_str(),
            report.status.as_str(),
            report.snapshot.source,
            report.snapshot.destination
        ));
    }
    Ok(())
}

/// Assert that at most one chain has an active (non-linker) owner of the
/// token, and exactly one unless a relay message for it is in flight
pub fn assert_single_active_owner(network: &SimNetwork, token_id: U256) -> Result<()> {
    let holders = network.active_holders(token_id);
    let in_flight = network
        .pending_messages()
        .iter()
        .any(|message| message.token_id == token_id);

    match holders.len() {
        1 => Ok(()),
        0 if in_flight => Ok(()),
        0 => Err(eyre!("Token {} has no active owner on any chain", token_id)),
        _ => Err(eyre!(
            "Token {} is active on more than one chain: {:?}",
            token_id,
            holders
        )),
    }
}
