use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// One denomination of one currency.
///
/// `decimals` is the power-of-ten offset from the currency's base unit, so
/// the base unit itself always has `decimals == 0` ("sat", "wei", "drop")
/// and e.g. "btc" has `decimals == 8`.
///
/// Two units are *compatible* iff they denominate the same currency;
/// amounts and fees may only be combined across compatible units.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Unit {
    currency: String,
    code: String,
    decimals: u8,
}

impl Unit {
    pub fn new(
        currency: impl Into<String>,
        code: impl Into<String>,
        decimals: u8,
    ) -> Self {
        Self {
            currency: currency.into(),
            code: code.into(),
            decimals,
        }
    }

    /// The currency this unit denominates ("BTC", "ETH", "USDT").
    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// The unit code ("sat", "gwei", "usdt").
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    /// Whether `self` and `other` denominate the same currency.
    pub fn is_compatible(&self, other: &Unit) -> bool {
        self.currency == other.currency
    }

    /// The base unit of this unit's currency.
    pub fn base(&self) -> Unit {
        Unit {
            currency: self.currency.clone(),
            code: format!("{}-base", self.currency.to_lowercase()),
            decimals: 0,
        }
    }

    pub fn is_base(&self) -> bool {
        self.decimals == 0
    }
}

impl Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code)
    }
}

/// An ERC-20 style token unit: the token's contract address doubles as part
/// of the currency identity so that two tokens with the same ticker never
/// become compatible by accident.
pub fn token_unit(ticker: &str, contract: &str, decimals: u8) -> Unit {
    Unit::new(format!("{ticker}:{contract}"), ticker.to_lowercase(), decimals)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn compatibility_is_per_currency() {
        let sat = Unit::new("BTC", "sat", 0);
        let btc = Unit::new("BTC", "btc", 8);
        let wei = Unit::new("ETH", "wei", 0);

        assert!(sat.is_compatible(&btc));
        assert!(!sat.is_compatible(&wei));
        assert!(sat.is_compatible(&sat.base()));
    }

    #[test]
    fn token_units_distinguish_contracts() {
        let usdt_a = token_unit("USDT", "0xdac17f958d2ee523a2206206994597c13d831ec7", 6);
        let usdt_b = token_unit("USDT", "0x0000000000000000000000000000000000000001", 6);
        assert!(!usdt_a.is_compatible(&usdt_b));
    }
}
