//! Fee bases: everything needed to compute a fee without knowing the
//! transfer's outcome.
//!
//! A fee basis is `cost factor × price per cost factor`, where both halves
//! are chain-specific: bytes × sat/kB for the Bitcoin family, gas × gas
//! price for Ethereum, a flat price for the fixed-fee chains. The derived
//! `fee()` is always defined, even at a zero cost factor.

use common::amount::{Amount, U256};
use common::chain::ChainKind;
use common::unit::Unit;
use serde::{Deserialize, Serialize};

/// A polymorphic fee descriptor. Equality is structural: chain, unit and
/// the chain-specific payload must all match exactly.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum FeeBasis {
    /// Bitcoin-family: a fee rate over the transaction's virtual size.
    Bitcoin {
        chain: ChainKind,
        unit: Unit,
        sats_per_kb: u64,
        size_bytes: u64,
    },
    /// Ethereum: gas price × gas limit, in wei.
    Ethereum {
        unit: Unit,
        gas_price_wei: u128,
        gas_limit: u64,
    },
    /// Hedera charges a flat per-transaction fee in tinybar.
    Hedera { unit: Unit, fee_tinybar: u64 },
    /// Ripple charges a flat per-transaction fee in drops.
    Ripple { unit: Unit, fee_drops: u64 },
    /// Tezos fees are an estimate before inclusion and a single actual
    /// number afterwards.
    Tezos { unit: Unit, fee: XtzFee },
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum XtzFee {
    Estimate {
        mutez_per_kb: u64,
        size_bytes: u64,
        gas_limit: u64,
        storage_limit: u64,
    },
    Actual {
        fee_mutez: u64,
    },
}

impl FeeBasis {
    pub fn chain(&self) -> ChainKind {
        match self {
            Self::Bitcoin { chain, .. } => *chain,
            Self::Ethereum { .. } => ChainKind::Eth,
            Self::Hedera { .. } => ChainKind::Hbar,
            Self::Ripple { .. } => ChainKind::Xrp,
            Self::Tezos { .. } => ChainKind::Xtz,
        }
    }

    /// The unit the derived fee is denominated in (the transfer's
    /// unit-for-fee).
    pub fn unit(&self) -> &Unit {
        match self {
            Self::Bitcoin { unit, .. }
            | Self::Ethereum { unit, .. }
            | Self::Hedera { unit, .. }
            | Self::Ripple { unit, .. }
            | Self::Tezos { unit, .. } => unit,
        }
    }

    /// How many cost units this basis covers: kilobytes, gas units, or a
    /// single flat transaction.
    pub fn cost_factor(&self) -> f64 {
        match self {
            Self::Bitcoin { size_bytes, .. } => *size_bytes as f64 / 1000.0,
            Self::Ethereum { gas_limit, .. } => *gas_limit as f64,
            Self::Hedera { .. } | Self::Ripple { .. } => 1.0,
            Self::Tezos { fee, .. } => match fee {
                XtzFee::Estimate { size_bytes, .. } =>
                    *size_bytes as f64 / 1000.0,
                XtzFee::Actual { .. } => 1.0,
            },
        }
    }

    /// The price of one cost unit, in the fee unit's base denomination.
    pub fn price_per_cost_factor(&self) -> Amount {
        let unit = self.unit().clone();
        match self {
            Self::Bitcoin { sats_per_kb, .. } =>
                Amount::from_base(unit, *sats_per_kb),
            Self::Ethereum { gas_price_wei, .. } =>
                Amount::from_base_u128(unit, *gas_price_wei),
            Self::Hedera { fee_tinybar, .. } =>
                Amount::from_base(unit, *fee_tinybar),
            Self::Ripple { fee_drops, .. } =>
                Amount::from_base(unit, *fee_drops),
            Self::Tezos { fee, .. } => match fee {
                XtzFee::Estimate { mutez_per_kb, .. } =>
                    Amount::from_base(unit, *mutez_per_kb),
                XtzFee::Actual { fee_mutez } =>
                    Amount::from_base(unit, *fee_mutez),
            },
        }
    }

    /// The derived fee. Defined for every basis, including degenerate
    /// zero-cost ones, where it is simply zero in the fee unit.
    pub fn fee(&self) -> Amount {
        let unit = self.unit().clone();
        match self {
            Self::Bitcoin {
                sats_per_kb,
                size_bytes,
                ..
            } => {
                let sats =
                    u128::from(*sats_per_kb) * u128::from(*size_bytes) / 1000;
                Amount::from_base_u128(unit, sats)
            }
            Self::Ethereum {
                gas_price_wei,
                gas_limit,
                ..
            } => {
                let wei = U256::from(*gas_price_wei)
                    .checked_mul(U256::from(*gas_limit))
                    .unwrap_or(U256::MAX);
                Amount::new(unit, false, wei)
            }
            Self::Hedera { fee_tinybar, .. } =>
                Amount::from_base(unit, *fee_tinybar),
            Self::Ripple { fee_drops, .. } =>
                Amount::from_base(unit, *fee_drops),
            Self::Tezos { fee, .. } => match fee {
                XtzFee::Estimate {
                    mutez_per_kb,
                    size_bytes,
                    ..
                } => {
                    let mutez = u128::from(*mutez_per_kb)
                        * u128::from(*size_bytes)
                        / 1000;
                    Amount::from_base_u128(unit, mutez)
                }
                XtzFee::Actual { fee_mutez } =>
                    Amount::from_base(unit, *fee_mutez),
            },
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sat_unit() -> Unit {
        ChainKind::Btc.base_unit()
    }

    #[test]
    fn bitcoin_fee_is_rate_times_size() {
        let basis = FeeBasis::Bitcoin {
            chain: ChainKind::Btc,
            unit: sat_unit(),
            sats_per_kb: 1000,
            size_bytes: 250,
        };
        assert_eq!(basis.fee().to_base_u64(), Some(250));
        assert_eq!(basis.cost_factor(), 0.25);
        assert_eq!(basis.price_per_cost_factor().to_base_u64(), Some(1000));
    }

    #[test]
    fn zero_cost_factor_still_defines_a_fee() {
        let basis = FeeBasis::Bitcoin {
            chain: ChainKind::Bch,
            unit: ChainKind::Bch.base_unit(),
            sats_per_kb: 5000,
            size_bytes: 0,
        };
        assert!(basis.fee().is_zero());
    }

    #[test]
    fn ethereum_fee_is_gas_times_price() {
        let basis = FeeBasis::Ethereum {
            unit: ChainKind::Eth.base_unit(),
            gas_price_wei: 20_000_000_000,
            gas_limit: 21_000,
        };
        let fee = basis.fee();
        assert_eq!(fee.value(), U256::from(420_000_000_000_000u128));
    }

    #[test]
    fn xtz_actual_vs_estimate() {
        let unit = ChainKind::Xtz.base_unit();
        let est = FeeBasis::Tezos {
            unit: unit.clone(),
            fee: XtzFee::Estimate {
                mutez_per_kb: 1000,
                size_bytes: 500,
                gas_limit: 10_000,
                storage_limit: 300,
            },
        };
        assert_eq!(est.fee().to_base_u64(), Some(500));

        let actual = FeeBasis::Tezos {
            unit,
            fee: XtzFee::Actual { fee_mutez: 423 },
        };
        assert_eq!(actual.fee().to_base_u64(), Some(423));
        assert_ne!(est, actual);
    }

    #[test]
    fn equality_is_structural() {
        let a = FeeBasis::Ripple {
            unit: ChainKind::Xrp.base_unit(),
            fee_drops: 10,
        };
        let b = FeeBasis::Ripple {
            unit: ChainKind::Xrp.base_unit(),
            fee_drops: 10,
        };
        let c = FeeBasis::Ripple {
            unit: ChainKind::Xrp.base_unit(),
            fee_drops: 12,
        };
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn serde_roundtrip() {
        let basis = FeeBasis::Hedera {
            unit: ChainKind::Hbar.base_unit(),
            fee_tinybar: 500_000,
        };
        let json = serde_json::to_string(&basis).unwrap();
        assert_eq!(serde_json::from_str::<FeeBasis>(&json).unwrap(), basis);
    }
}
