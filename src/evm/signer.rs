//! EVM Signing Identity
//!
//! One private key signs for every chain. The identity owns the wallet used
//! to build per-chain providers and the [`SubmissionQueue`] that serializes
//! its transactions across all of them.

use alloy::{network::EthereumWallet, primitives::Address, signers::local::PrivateKeySigner};
use eyre::{eyre, Result};
use tracing::info;

use crate::queue::SubmissionQueue;

/// Shared signing identity with its submission queue
pub struct SigningIdentity {
    wallet: EthereumWallet,
    address: Address,
    queue: SubmissionQueue,
}

impl SigningIdentity {
    /// Create from a private key (hex string, with or without 0x prefix)
    pub fn from_private_key(private_key: &str) -> Result<Self> {
        let signer: PrivateKeySigner = private_key
            .parse()
            .map_err(|e| eyre!("Invalid private key: {}", e))?;

        let address = signer.address();
        let wallet = EthereumWallet::from(signer);

        info!(address = %address, "Signing identity initialized");

        Ok(Self {
            wallet,
            address,
            queue: SubmissionQueue::new(address),
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Wallet for building signing providers
    pub fn wallet(&self) -> &EthereumWallet {
        &self.wallet
    }

    /// Handle to the identity's submission queue
    pub fn queue(&self) -> SubmissionQueue {
        self.queue.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Anvil account #0
    const ANVIL_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_identity_from_private_key() {
        let identity = SigningIdentity::from_private_key(ANVIL_KEY).unwrap();
        let expected: Address = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse().unwrap();
        assert_eq!(identity.address(), expected);
        assert_eq!(identity.queue().signer(), expected);
    }

    #[test]
    fn test_identity_accepts_unprefixed_key() {
        let identity = SigningIdentity::from_private_key(ANVIL_KEY.trim_start_matches("0x"));
        assert!(identity.is_ok());
    }

    #[test]
    fn test_invalid_key_rejected() {
        assert!(SigningIdentity::from_private_key("not-a-key").is_err());
    }
}
