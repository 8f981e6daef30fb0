//! Storage size with lossless 256-bit representation.

use std::fmt;
use std::str::FromStr;

use ruint::aliases::U256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

const UNITS: [&str; 7] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];

/// A number of bytes, as reported for sector sizes and storage power.
///
/// Power values arrive as decimal strings because network totals exceed what
/// an f64 can hold exactly. The value is kept as a 256-bit integer and only
/// rendered, never converted to a float:
///
/// ```text
/// 0            -> "0 B"
/// 1024         -> "1.00 KiB"
/// 34359738368  -> "32.00 GiB"
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ByteSize(U256);

impl ByteSize {
    pub const ZERO: Self = Self(U256::ZERO);

    pub fn new(value: U256) -> Self {
        Self(value)
    }

    pub fn as_u256(self) -> U256 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }
}

impl From<u64> for ByteSize {
    fn from(bytes: u64) -> Self {
        Self(U256::from(bytes))
    }
}

impl FromStr for ByteSize {
    type Err = ruint::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ruint::ParseError::InvalidDigit('\0'));
        }
        U256::from_str_radix(s, 10).map(Self)
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_zero() {
            return write!(f, "0 B");
        }

        // Largest unit whose scale does not exceed the value
        let base = U256::from(1024_u64);
        let mut unit = 0;
        let mut divisor = U256::from(1_u64);
        while unit < UNITS.len() - 1 {
            let next = divisor * base;
            if self.0 < next {
                break;
            }
            divisor = next;
            unit += 1;
        }

        let (whole, hundredths) = scaled_hundredths(self.0, divisor);
        write!(f, "{}.{:02} {}", whole, hundredths, UNITS[unit])
    }
}

/// Divide `value` by `divisor`, rounding half up to two decimal places.
///
/// Returns the integer part and the hundredths. The remainder is always
/// smaller than `divisor` (at most 2^60 here), so `remainder * 100` cannot
/// overflow.
fn scaled_hundredths(value: U256, divisor: U256) -> (U256, u64) {
    let hundred = U256::from(100_u64);
    let mut whole = value / divisor;
    let remainder = value % divisor;
    let rounded = (remainder * hundred + divisor / U256::from(2_u64)) / divisor;
    let mut hundredths = rounded.as_limbs()[0];
    if hundredths >= 100 {
        whole += U256::from(1_u64);
        hundredths -= 100;
    }
    (whole, hundredths)
}

impl Serialize for ByteSize {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ByteSize {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Lotus sends sector sizes as JSON numbers and power as strings.
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(Self::from(n)),
            Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// Render a decimal byte count with binary units.
///
/// Never fails: empty or unparseable input renders as `"0 B"`.
pub fn format_bytes(value: &str) -> String {
    value
        .parse::<ByteSize>()
        .unwrap_or(ByteSize::ZERO)
        .to_string()
}
