//! Run-length encoded sector bitfields.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A set of sector numbers in the JSON form Lotus uses for bitfields.
///
/// On the wire a bitfield is a list of run lengths that alternate between
/// unset and set bits, always starting with an unset run (which may be 0):
///
/// ```text
/// [0, 3]       -> {0, 1, 2}
/// [5, 2, 3, 1] -> {5, 6, 10}
/// null / []    -> {}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitField {
    runs: Vec<u64>,
}

impl BitField {
    pub fn from_runs(runs: Vec<u64>) -> Self {
        Self { runs }
    }

    /// Number of set bits.
    pub fn count(&self) -> u64 {
        self.runs.iter().skip(1).step_by(2).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Set bits in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        let mut position = 0_u64;
        self.runs.iter().enumerate().flat_map(move |(i, &len)| {
            let start = position;
            position = position.saturating_add(len);
            let set = i % 2 == 1;
            (start..position).filter(move |_| set)
        })
    }

    pub fn contains(&self, bit: u64) -> bool {
        let mut position = 0_u64;
        for (i, &len) in self.runs.iter().enumerate() {
            let end = position.saturating_add(len);
            if bit < end {
                return i % 2 == 1;
            }
            position = end;
        }
        false
    }

    pub fn to_vec(&self) -> Vec<u64> {
        self.iter().collect()
    }
}

impl Serialize for BitField {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.runs.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for BitField {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let runs = Option::<Vec<u64>>::deserialize(deserializer)?.unwrap_or_default();
        Ok(Self { runs })
    }
}
