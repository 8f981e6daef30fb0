//! Proving state of a single sector.

use std::collections::HashSet;

use serde::Serialize;

use crate::context::CallContext;
use crate::error::{ClientError, Result};
use crate::lotus::LotusClient;
use crate::lotus::types::{ChainEpoch, Partition, SectorNumber, SectorRecord};
use crate::types::BitField;

/// Where a sector stands in its partition's bitfields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SectorHealth {
    /// Proven and counted for power.
    Active,
    /// Declared or detected faulty.
    Faulty,
    /// Faulty, with a recovery declared.
    Recovering,
    /// Live but not yet proven for the first time.
    Unproven,
    /// No longer live in its partition.
    Terminated,
}

impl SectorHealth {
    fn classify(partition: &Partition, sector: SectorNumber) -> Self {
        if partition.faulty_sectors.contains(sector) {
            if partition.recovering_sectors.contains(sector) {
                SectorHealth::Recovering
            } else {
                SectorHealth::Faulty
            }
        } else if partition.active_sectors.contains(sector) {
            SectorHealth::Active
        } else if partition.live_sectors.contains(sector) {
            SectorHealth::Unproven
        } else {
            SectorHealth::Terminated
        }
    }

    /// Classify from the miner-wide fault sets, without partition detail.
    ///
    /// Sectors outside the active set are reported as unproven, since a
    /// terminated sector no longer appears in the enumeration.
    fn from_fault_sets(
        faults: &BitField,
        recoveries: &BitField,
        sector: SectorNumber,
        active: bool,
    ) -> Self {
        if faults.contains(sector) {
            if recoveries.contains(sector) {
                SectorHealth::Recovering
            } else {
                SectorHealth::Faulty
            }
        } else if active {
            SectorHealth::Active
        } else {
            SectorHealth::Unproven
        }
    }
}

/// One row of a sector listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListedSector {
    #[serde(flatten)]
    pub sector: SectorRecord,
    pub state: SectorHealth,
}

/// List the sectors of `miner` with the state of each.
///
/// With `only_active` set only the active set is enumerated; otherwise
/// every sector is, and the active set is fetched alongside to tell
/// proven sectors from unproven ones.
pub async fn list_sector_states(
    client: &LotusClient,
    ctx: &CallContext,
    miner: &str,
    only_active: bool,
) -> Result<Vec<ListedSector>> {
    let (sectors, active, faults, recoveries) = tokio::try_join!(
        client.list_sectors(ctx, miner, only_active),
        async {
            if only_active {
                Ok(None)
            } else {
                client.list_sectors(ctx, miner, true).await.map(Some)
            }
        },
        client.get_miner_faults(ctx, miner),
        client.get_miner_recoveries(ctx, miner),
    )?;

    let active: Option<HashSet<SectorNumber>> =
        active.map(|records| records.iter().map(|s| s.sector_number).collect());

    Ok(sectors
        .into_iter()
        .map(|sector| {
            let is_active = active
                .as_ref()
                .is_none_or(|set| set.contains(&sector.sector_number));
            let state = SectorHealth::from_fault_sets(
                &faults,
                &recoveries,
                sector.sector_number,
                is_active,
            );
            ListedSector { sector, state }
        })
        .collect())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectorStatus {
    pub sector_number: SectorNumber,
    pub deadline: u64,
    pub partition: u64,
    pub state: SectorHealth,
    pub activation: ChainEpoch,
    pub expiration: ChainEpoch,
}

/// Locate `sector` and classify it against its partition.
pub async fn sector_status(
    client: &LotusClient,
    ctx: &CallContext,
    miner: &str,
    sector: SectorNumber,
) -> Result<SectorStatus> {
    let (location, info) = tokio::try_join!(
        client.get_sector_location(ctx, miner, sector),
        client.get_sector_info(ctx, miner, sector),
    )?;

    let partitions = client
        .get_miner_partitions(ctx, miner, location.deadline)
        .await?;
    let partition = usize::try_from(location.partition)
        .ok()
        .and_then(|index| partitions.get(index))
        .ok_or_else(|| {
            ClientError::malformed(format!(
                "deadline {} has no partition {}",
                location.deadline, location.partition
            ))
        })?;

    Ok(SectorStatus {
        sector_number: sector,
        deadline: location.deadline,
        partition: location.partition,
        state: SectorHealth::classify(partition, sector),
        activation: info.activation,
        expiration: info.expiration,
    })
}
