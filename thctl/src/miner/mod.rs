//! Miner-level views composed from several client calls.

mod aggregate;
mod status;

pub use aggregate::{
    AddressBalance, AggregateError, Aggregator, DEFAULT_AGGREGATE_TIMEOUT, MinerAggregate,
    aggregate, power_share,
};
pub use status::{ListedSector, SectorHealth, SectorStatus, list_sector_states, sector_status};
