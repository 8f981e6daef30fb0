//! FIL amounts in attoFIL with lossless 256-bit representation.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use ruint::aliases::U256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// attoFIL per FIL.
const ATTO_PER_FIL: u64 = 1_000_000_000_000_000_000;

/// attoFIL per displayed digit at six decimal places.
const ATTO_PER_MICRO_FIL: u64 = 1_000_000_000_000;

/// A signed FIL amount held in base units (attoFIL, 10^-18 FIL).
///
/// Balances, pledges and penalties are all transmitted as decimal attoFIL
/// strings. Fee debt can be negative, so the sign is tracked separately from
/// the 256-bit magnitude. Display divides by 10^18 in integer arithmetic and
/// rounds to six decimals:
///
/// ```text
/// 1000000000000000000 -> "1.000000 FIL"
/// 1500000             -> "0.000000 FIL"
/// -2500000000000000000 -> "-2.500000 FIL"
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TokenAmount {
    negative: bool,
    atto: U256,
}

impl TokenAmount {
    pub const ZERO: Self = Self {
        negative: false,
        atto: U256::ZERO,
    };

    pub fn from_atto(atto: U256) -> Self {
        Self {
            negative: false,
            atto,
        }
    }

    pub fn from_whole_fil(fil: u64) -> Self {
        Self::from_atto(U256::from(fil) * U256::from(ATTO_PER_FIL))
    }

    pub fn is_zero(&self) -> bool {
        self.atto.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.negative && !self.atto.is_zero()
    }

    /// Magnitude in attoFIL.
    pub fn atto(&self) -> U256 {
        self.atto
    }

    /// Sum of two amounts, or `None` if the magnitude overflows 256 bits.
    pub fn checked_add(self, other: Self) -> Option<Self> {
        if self.is_negative() == other.is_negative() {
            return Some(Self {
                negative: self.is_negative(),
                atto: self.atto.checked_add(other.atto)?,
            });
        }

        // Opposite signs: the larger magnitude decides the sign
        let (larger, smaller) = match self.atto.cmp(&other.atto) {
            Ordering::Less => (other, self),
            _ => (self, other),
        };
        Some(Self {
            negative: larger.is_negative(),
            atto: larger.atto - smaller.atto,
        })
    }
}

impl FromStr for TokenAmount {
    type Err = ruint::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        if digits.is_empty() {
            return Err(ruint::ParseError::InvalidDigit('\0'));
        }
        let atto = U256::from_str_radix(digits, 10)?;
        Ok(Self { negative, atto })
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = U256::from(ATTO_PER_MICRO_FIL);
        // Round half up to the nearest micro-FIL. Dividing first keeps the
        // increment below U256::MAX.
        let mut micro = self.atto / unit;
        if self.atto % unit >= unit / U256::from(2_u64) {
            micro += U256::from(1_u64);
        }
        let million = U256::from(1_000_000_u64);
        let whole = micro / million;
        let fraction = (micro % million).as_limbs()[0];

        let sign = if self.is_negative() && !micro.is_zero() {
            "-"
        } else {
            ""
        };
        write!(f, "{sign}{whole}.{fraction:06} FIL")
    }
}

impl Serialize for TokenAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let sign = if self.is_negative() { "-" } else { "" };
        serializer.collect_str(&format_args!("{sign}{}", self.atto))
    }
}

impl<'de> Deserialize<'de> for TokenAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Render a decimal attoFIL string as FIL with six decimals.
///
/// Never fails: empty or unparseable input renders as `"0 FIL"`.
pub fn format_fil(value: &str) -> String {
    match value.parse::<TokenAmount>() {
        Ok(amount) => amount.to_string(),
        Err(_) => "0 FIL".to_string(),
    }
}
