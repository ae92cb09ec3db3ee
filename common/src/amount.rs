//! A cross-chain amount type which maintains some useful internal
//! invariants and keeps sign separate from magnitude.
//!
//! An [`Amount`] is always stored in the *base* units of its currency
//! (satoshi, wei, drop, ...), regardless of which [`Unit`] it carries for
//! display. This makes arithmetic between compatible amounts exact integer
//! arithmetic; there is no floating point anywhere in the value path.
//!
//! The magnitude is a [`U256`] so that ERC-20 token quantities round-trip
//! without truncation. Direction (sent/received) is *not* part of an
//! amount; the sign here only appears through arithmetic (e.g. subtracting
//! a fee from a directed amount) and through the explicit negation used by
//! directed-amount getters.

use std::cmp::Ordering;
use std::fmt::{self, Display};
use std::ops::{Add, Neg, Sub};

pub use alloy_primitives::U256;
use serde::{Deserialize, Deserializer, Serialize};

use crate::unit::Unit;

/// A signed quantity of one currency, stored in base units.
///
/// Invariants:
///
/// - Zero is never negative.
/// - All arithmetic is checked; combining incompatible currencies yields
///   `None` rather than a garbage value.
#[derive(Clone, Debug, Serialize)]
pub struct Amount {
    unit: Unit,
    negative: bool,
    value: U256,
}

impl Amount {
    // --- Constructors --- //

    pub fn new(unit: Unit, negative: bool, value: U256) -> Self {
        Self {
            unit,
            // Normalize: zero carries no sign.
            negative: negative && !value.is_zero(),
            value,
        }
    }

    /// An amount of zero in the given unit.
    pub fn zero(unit: Unit) -> Self {
        Self::new(unit, false, U256::ZERO)
    }

    /// A non-negative amount from a `u64` base-unit value.
    pub fn from_base(unit: Unit, value: u64) -> Self {
        Self::new(unit, false, U256::from(value))
    }

    /// A non-negative amount from a `u128` base-unit value.
    pub fn from_base_u128(unit: Unit, value: u128) -> Self {
        Self::new(unit, false, U256::from(value))
    }

    /// Parse a non-negative base-unit decimal string, as delivered by the
    /// remote indexer.
    pub fn parse_base(unit: Unit, s: &str) -> anyhow::Result<Self> {
        let value = U256::from_str_radix(s.trim(), 10)
            .map_err(|e| anyhow::anyhow!("Invalid base-unit amount '{s}': {e}"))?;
        Ok(Self::new(unit, false, value))
    }

    // --- Getters --- //

    pub fn unit(&self) -> &Unit {
        &self.unit
    }

    /// The unsigned magnitude in base units.
    pub fn value(&self) -> U256 {
        self.value
    }

    pub fn is_negative(&self) -> bool {
        self.negative
    }

    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    /// The magnitude as a `u64`, if it fits.
    pub fn to_base_u64(&self) -> Option<u64> {
        u64::try_from(self.value).ok()
    }

    // --- Checked arithmetic --- //
    // All of these return `None` when the two operands denominate
    // different currencies; the magnitudes themselves cannot overflow in
    // practice (sums of U256 magnitudes of real ledgers), but additions are
    // still checked.

    pub fn checked_add(&self, rhs: &Self) -> Option<Self> {
        if !self.unit.is_compatible(&rhs.unit) {
            return None;
        }
        let out = if self.negative == rhs.negative {
            Self::new(
                self.unit.clone(),
                self.negative,
                self.value.checked_add(rhs.value)?,
            )
        } else {
            // Differing signs: the result takes the sign of the larger
            // magnitude.
            match self.value.cmp(&rhs.value) {
                Ordering::Equal => Self::zero(self.unit.clone()),
                Ordering::Greater => Self::new(
                    self.unit.clone(),
                    self.negative,
                    self.value - rhs.value,
                ),
                Ordering::Less => Self::new(
                    self.unit.clone(),
                    rhs.negative,
                    rhs.value - self.value,
                ),
            }
        };
        Some(out)
    }

    pub fn checked_sub(&self, rhs: &Self) -> Option<Self> {
        self.checked_add(&rhs.clone().neg())
    }

    /// Compare two amounts as signed values. `None` if the currencies are
    /// incompatible.
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        if !self.unit.is_compatible(&other.unit) {
            return None;
        }
        let ord = match (self.negative, other.negative) {
            (false, false) => self.value.cmp(&other.value),
            (true, true) => other.value.cmp(&self.value),
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
        };
        Some(ord)
    }
}

// Equality treats sign and magnitude across compatible units; amounts of
// different currencies are simply unequal.
impl PartialEq for Amount {
    fn eq(&self, other: &Self) -> bool {
        self.unit.is_compatible(&other.unit)
            && self.negative == other.negative
            && self.value == other.value
    }
}
impl Eq for Amount {}

impl Neg for Amount {
    type Output = Self;
    fn neg(self) -> Self {
        let negative = !self.negative;
        Self::new(self.unit, negative, self.value)
    }
}

// Panicking ops for code paths where both operands are by construction the
// same currency (wallet balance sums). Cross-currency code must use the
// checked variants.
impl Add for Amount {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        self.checked_add(&rhs).expect("Incompatible units")
    }
}

impl Sub for Amount {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        self.checked_sub(&rhs).expect("Incompatible units")
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negative {
            write!(f, "-")?;
        }
        write!(f, "{} {}", self.value, self.unit.currency())
    }
}

/// Enforces the no-negative-zero invariant on decode.
impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            unit: Unit,
            negative: bool,
            value: U256,
        }
        let raw = Raw::deserialize(deserializer)?;
        Ok(Self::new(raw.unit, raw.negative, raw.value))
    }
}

// --- Tests and test infra --- //

#[cfg(any(test, feature = "test-utils"))]
mod arbitrary_impl {
    use proptest::arbitrary::{any, Arbitrary};
    use proptest::strategy::{BoxedStrategy, Strategy};

    use super::*;

    impl Arbitrary for Amount {
        type Parameters = ();
        type Strategy = BoxedStrategy<Self>;
        fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
            (any::<bool>(), any::<u128>())
                .prop_map(|(negative, value)| {
                    Amount::new(
                        Unit::new("BTC", "sat", 0),
                        negative,
                        U256::from(value),
                    )
                })
                .boxed()
        }
    }
}
