//! Relay gas pricing
//!
//! The relay charges for destination-side execution up front, in the source
//! chain's native currency. Price discovery is an external oracle behind
//! [`GasEstimator`]; this module only turns a unit price into a fee.

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use eyre::Result;

use crate::registry::Chain;

/// Fee token sentinel: the zero address means the chain's native currency
pub const NATIVE_FEE_TOKEN: Address = Address::ZERO;

/// Relay execution gas paid for per transfer
pub const DEFAULT_RELAY_GAS_LIMIT: u64 = 500_000;

/// Supplies the unit price of relay execution gas
#[async_trait]
pub trait GasEstimator: Send + Sync {
    async fn estimate(&self, from: &Chain, to: &Chain, fee_token: Address) -> Result<U256>;
}

/// Constant unit price, as local relay networks quote
#[derive(Debug, Clone, Copy)]
pub struct FixedGasPrice(pub U256);

#[async_trait]
impl GasEstimator for FixedGasPrice {
    async fn estimate(&self, _from: &Chain, _to: &Chain, _fee_token: Address) -> Result<U256> {
        Ok(self.0)
    }
}

/// Adapts a plain pricing function into a [`GasEstimator`]
pub struct FnGasEstimator<F>(pub F);

#[async_trait]
impl<F> GasEstimator for FnGasEstimator<F>
where
    F: Fn(&Chain, &Chain, Address) -> Result<U256> + Send + Sync,
{
    async fn estimate(&self, from: &Chain, to: &Chain, fee_token: Address) -> Result<U256> {
        (self.0)(from, to, fee_token)
    }
}

/// Native value to attach for `gas_budget` units at `unit_price`
pub fn relay_fee(gas_budget: u64, unit_price: U256) -> U256 {
    U256::from(gas_budget).saturating_mul(unit_price)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(name: &str) -> Chain {
        Chain::new(
            name,
            "http://localhost:8545",
            Address::ZERO,
            Address::ZERO,
            Address::ZERO,
        )
    }

    #[test]
    fn test_relay_fee() {
        assert_eq!(relay_fee(500_000, U256::from(1u64)), U256::from(500_000u64));
        assert_eq!(relay_fee(0, U256::from(25u64)), U256::ZERO);
        assert_eq!(relay_fee(2, U256::MAX), U256::MAX);
    }

    #[tokio::test]
    async fn test_fixed_price() {
        let estimator = FixedGasPrice(U256::from(3u64));
        let price = estimator
            .estimate(&chain("Avalanche"), &chain("Fantom"), NATIVE_FEE_TOKEN)
            .await
            .unwrap();
        assert_eq!(price, U256::from(3u64));
    }

    #[tokio::test]
    async fn test_fn_estimator_sees_route() {
        let estimator = FnGasEstimator(|from: &Chain, to: &Chain, token: Address| {
            assert_eq!(token, NATIVE_FEE_TOKEN);
            if from.name == "Avalanche" && to.name == "Fantom" {
                Ok(U256::from(7u64))
            } else {
                Err(eyre::eyre!("no route {} -> {}", from.name, to.name))
            }
        });

        let price = estimator
            .estimate(&chain("Avalanche"), &chain("Fantom"), NATIVE_FEE_TOKEN)
            .await
            .unwrap();
        assert_eq!(price, U256::from(7u64));

        assert!(estimator
            .estimate(&chain("Fantom"), &chain("Polygon"), NATIVE_FEE_TOKEN)
            .await
            .is_err());
    }
}
