//! Typed results of Lotus state queries.
//!
//! Field names follow the node's PascalCase JSON. Lists the node may send
//! as `null` decode as empty, and big integers decode into [`ByteSize`] or
//! [`TokenAmount`] without passing through a float.

use serde::{Deserialize, Deserializer, Serialize};

use crate::types::{BitField, ByteSize, TokenAmount};

pub type ChainEpoch = i64;
pub type SectorNumber = u64;

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Content identifier in its IPLD JSON form, `{"/": "bafy..."}`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Cid {
    #[serde(rename = "/")]
    pub root: String,
}

/// Result of `StateMinerInfo`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MinerInfo {
    pub owner: String,
    pub worker: String,
    pub new_worker: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub control_addresses: Vec<String>,
    pub peer_id: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub multiaddrs: Vec<String>,
    #[serde(rename = "WindowPoStProofType")]
    pub window_post_proof_type: i64,
    pub sector_size: ByteSize,
    #[serde(rename = "WindowPoStPartitionSectors")]
    pub window_post_partition_sectors: u64,
    pub consensus_fault_elapsed: ChainEpoch,
    pub beneficiary: Option<String>,
    pub pending_owner_address: Option<String>,
}

/// Raw and quality-adjusted power.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Claim {
    pub raw_byte_power: ByteSize,
    pub quality_adj_power: ByteSize,
}

/// Result of `StateMinerPower`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MinerPower {
    pub miner_power: Claim,
    pub total_power: Claim,
    pub has_min_power: bool,
}

/// Result of `StateMinerProvingDeadline`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DeadlineInfo {
    pub current_epoch: ChainEpoch,
    pub period_start: ChainEpoch,
    pub index: u64,
    pub open: ChainEpoch,
    pub close: ChainEpoch,
    pub challenge: ChainEpoch,
    pub fault_cutoff: ChainEpoch,
    #[serde(rename = "WPoStPeriodDeadlines")]
    pub period_deadlines: u64,
    #[serde(rename = "WPoStProvingPeriod")]
    pub proving_period: ChainEpoch,
    #[serde(rename = "WPoStChallengeWindow")]
    pub challenge_window: ChainEpoch,
}

/// One entry of `StateMinerDeadlines`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Deadline {
    pub post_submissions: BitField,
    pub disputable_proof_count: u64,
}

/// One entry of `StateMinerPartitions`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Partition {
    pub all_sectors: BitField,
    pub faulty_sectors: BitField,
    pub recovering_sectors: BitField,
    pub live_sectors: BitField,
    pub active_sectors: BitField,
}

/// Result of `StateMinerSectorCount`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SectorCount {
    pub live: u64,
    pub active: u64,
    pub faulty: u64,
}

/// Result of `StateSectorPartition`: where a sector is proven.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SectorLocation {
    pub deadline: u64,
    pub partition: u64,
}

/// On-chain sector metadata from `StateSectorGetInfo` / `StateMinerSectors`.
///
/// Weights and pledges stay as the decimal strings the node sent.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SectorRecord {
    pub sector_number: SectorNumber,
    pub seal_proof: i64,
    #[serde(rename = "SealedCID")]
    pub sealed_cid: Cid,
    #[serde(rename = "DealIDs", deserialize_with = "null_as_default")]
    pub deal_ids: Vec<u64>,
    pub activation: ChainEpoch,
    pub expiration: ChainEpoch,
    pub deal_weight: String,
    pub verified_deal_weight: String,
    pub initial_pledge: String,
    pub expected_day_reward: String,
    pub expected_storage_pledge: String,
}

/// Balance fields of the miner actor's state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MinerStateSummary {
    pub pre_commit_deposits: TokenAmount,
    /// Funds still vesting from block rewards.
    pub locked_funds: TokenAmount,
    pub fee_debt: TokenAmount,
    #[serde(alias = "InitialPledgeRequirement")]
    pub initial_pledge: TokenAmount,
}

/// Result of `StateReadState` for a miner actor.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MinerActorState {
    pub balance: TokenAmount,
    pub code: Cid,
    pub state: MinerStateSummary,
}

/// Result of `Version`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NodeVersion {
    pub version: String,
    #[serde(rename = "APIVersion")]
    pub api_version: u32,
    pub block_delay: u64,
}
