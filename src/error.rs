//! Error types for linker orchestration
//!
//! Configuration and submission problems propagate as [`LinkerError`].
//! Staleness and observation timeouts are never errors: they surface as
//! status values from the confirmation and verification paths.

use alloy::primitives::U256;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LinkerError>;

#[derive(Error, Debug)]
pub enum LinkerError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    #[error("Unknown chain: {0}")]
    UnknownChain(String),

    #[error("Configuration error for chain {chain}: {reason}")]
    Configuration { chain: String, reason: String },

    #[error("Address {field} already set for chain {chain} ({existing})")]
    AddressAlreadySet {
        chain: String,
        field: &'static str,
        existing: String,
    },

    #[error("Invalid chain registry: {0}")]
    InvalidRegistry(String),

    // ========================================================================
    // Transfer Errors
    // ========================================================================
    #[error("Approval of token {token_id} on {chain} failed: {reason}")]
    Authorization {
        chain: String,
        token_id: U256,
        reason: String,
    },

    #[error("Gas estimation {from_chain} -> {to_chain} failed: {reason}")]
    FeeEstimation {
        from_chain: String,
        to_chain: String,
        reason: String,
    },

    #[error("Send of token {token_id} on {chain} failed: {reason}")]
    Submission {
        chain: String,
        token_id: U256,
        reason: String,
    },

    // ========================================================================
    // Provisioning / Deployment Errors
    // ========================================================================
    #[error("Granting bridge role on {chain} failed: {reason}")]
    RoleGrant { chain: String, reason: String },

    #[error("Deployment on {chain} failed: {reason}")]
    Deployment { chain: String, reason: String },

    #[error("RPC error on {chain}: {reason}")]
    Rpc { chain: String, reason: String },
}

impl LinkerError {
    pub fn configuration(chain: impl Into<String>, reason: impl Into<String>) -> Self {
        LinkerError::Configuration {
            chain: chain.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error was raised before any transaction was submitted
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            LinkerError::UnknownChain(_)
                | LinkerError::Configuration { .. }
                | LinkerError::AddressAlreadySet { .. }
                | LinkerError::InvalidRegistry(_)
        )
    }
}

/// Failure of a single contract call made through a binding
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    /// The call or transaction reverted; holds the revert reason verbatim
    #[error("execution reverted: {0}")]
    Reverted(String),

    #[error("transport error: {0}")]
    Transport(String),
}

impl CallError {
    pub fn reason(&self) -> &str {
        match self {
            CallError::Reverted(reason) | CallError::Transport(reason) => reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submission_error_carries_context() {
        let err = LinkerError::Submission {
            chain: "Avalanche".to_string(),
            token_id: U256::from(7u64),
            reason: "insufficient value".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Avalanche"));
        assert!(msg.contains('7'));
        assert!(msg.contains("insufficient value"));
        assert!(!err.is_configuration());
    }

    #[test]
    fn test_configuration_classification() {
        assert!(LinkerError::UnknownChain("Moonbeam".into()).is_configuration());
        assert!(LinkerError::configuration("Fantom", "linker not deployed").is_configuration());
        assert!(!LinkerError::RoleGrant {
            chain: "Fantom".into(),
            reason: "reverted".into()
        }
        .is_configuration());
    }

    #[test]
    fn test_call_error_reason_is_verbatim() {
        let err = CallError::Reverted("ERC721: invalid token ID".to_string());
        assert_eq!(err.reason(), "ERC721: invalid token ID");
        assert_eq!(err.to_string(), "execution reverted: ERC721: invalid token ID");
    }
}
