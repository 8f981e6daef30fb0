//! Comprehensive miner summary assembled from many state queries.
//!
//! All lookups are issued at once and joined as they complete. Miner info
//! is foundational: without it there is no summary. Everything else is on
//! an explicit best-effort list and is left at its zero value when the
//! node cannot answer, unless the failure means no further call could
//! succeed either (authentication, cancellation).

use std::collections::BTreeMap;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use ruint::aliases::U256;
use serde::Serialize;
use thiserror::Error;

use crate::context::CallContext;
use crate::error::{ClientError, ErrorKind};
use crate::lotus::LotusClient;
use crate::lotus::types::{
    ChainEpoch, Deadline, DeadlineInfo, MinerActorState, MinerInfo, MinerPower, SectorCount,
    SectorRecord,
};
use crate::tracing::prelude::*;
use crate::types::{BitField, ByteSize, TokenAmount};

/// Overall bound on one aggregate, on top of the caller's context.
pub const DEFAULT_AGGREGATE_TIMEOUT: Duration = Duration::from_secs(30);

/// Power share is computed in integer parts per trillion before narrowing.
const SHARE_SCALE: u64 = 1_000_000_000_000;

/// How many faulty sector numbers the summary lists individually.
const FAULTY_SAMPLE_LEN: usize = 5;

/// An address together with its wallet balance.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AddressBalance {
    pub address: String,
    /// `None` when the balance lookup failed.
    pub balance: Option<TokenAmount>,
}

/// Everything known about one miner at (roughly) the current head.
///
/// Sub-queries run independently, so fields may reflect slightly
/// different tipsets if the chain advances mid-aggregate.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct MinerAggregate {
    pub miner_id: String,

    // Addresses
    pub owner: AddressBalance,
    pub worker: AddressBalance,
    pub beneficiary: Option<AddressBalance>,
    pub control_addresses: Vec<AddressBalance>,
    pub peer_id: Option<String>,

    // Sealing
    pub sector_size: ByteSize,
    pub window_post_proof_type: i64,

    // Power
    pub raw_byte_power: ByteSize,
    pub quality_adj_power: ByteSize,
    /// Quality-adjusted power divided by active sectors.
    pub qap_per_sector: ByteSize,
    pub network_raw_byte_power: ByteSize,
    pub network_quality_adj_power: ByteSize,
    /// Fraction of network raw byte power, in `[0, 1]`.
    pub network_power_share: f64,
    pub has_min_power: bool,

    // Funds
    pub available_balance: TokenAmount,
    pub initial_pledge: TokenAmount,
    pub pre_commit_deposits: TokenAmount,
    pub vesting_funds: TokenAmount,
    pub fee_debt: TokenAmount,
    /// `initial_pledge + pre_commit_deposits + vesting_funds`.
    pub total_locked: TokenAmount,

    // Sectors
    pub total_sectors: u64,
    /// Sectors not yet terminated, faulty ones included.
    pub live_sectors: u64,
    pub active_sectors: u64,
    pub faulty_sectors: Vec<u64>,
    /// The lowest faulty sector numbers, at most five.
    pub faulty_sector_sample: Vec<u64>,
    /// `len(faulty_sectors) / total_sectors`, in `[0, 1]`.
    pub fault_rate: f64,
    pub recovering_sectors: Vec<u64>,

    // Proving
    pub current_epoch: ChainEpoch,
    pub current_deadline: u64,
    pub proving_period_start: ChainEpoch,
    pub deadline_open: ChainEpoch,
    pub deadline_close: ChainEpoch,
    pub deadline_count: u64,

    // No standard full-node procedure reports these
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocks_mined: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_rewards: Option<TokenAmount>,
}

/// Why an aggregate did not complete.
#[derive(Debug, Error)]
pub enum AggregateError {
    /// A foundational lookup failed, or a failure that no other lookup
    /// could survive. No partial record exists.
    #[error(transparent)]
    Failed(#[from] ClientError),

    /// The context was cancelled or the deadline passed before every
    /// lookup joined.
    #[error("miner summary incomplete: {source}")]
    Incomplete {
        partial: Box<MinerAggregate>,
        #[source]
        source: ClientError,
    },
}

impl AggregateError {
    pub fn kind(&self) -> ErrorKind {
        self.client_error().kind()
    }

    pub fn client_error(&self) -> &ClientError {
        match self {
            AggregateError::Failed(err) => err,
            AggregateError::Incomplete { source, .. } => source,
        }
    }

    /// Whatever had joined before the aggregate was cut short.
    pub fn partial(&self) -> Option<&MinerAggregate> {
        match self {
            AggregateError::Failed(_) => None,
            AggregateError::Incomplete { partial, .. } => Some(partial.as_ref()),
        }
    }
}

/// The lookups an aggregate is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
enum SubCall {
    MinerInfo,
    Power,
    AvailableBalance,
    Faults,
    Recoveries,
    ProvingDeadline,
    Deadlines,
    SectorCount,
    ActiveSectors,
    AllSectors,
    ActorState,
    WalletBalance,
}

/// Lookups whose failure leaves a zero-valued field instead of failing
/// the aggregate. [`SubCall::MinerInfo`] is deliberately absent.
const BEST_EFFORT: &[SubCall] = &[
    SubCall::Power,
    SubCall::AvailableBalance,
    SubCall::Faults,
    SubCall::Recoveries,
    SubCall::ProvingDeadline,
    SubCall::Deadlines,
    SubCall::SectorCount,
    SubCall::ActiveSectors,
    SubCall::AllSectors,
    SubCall::ActorState,
    SubCall::WalletBalance,
];

impl SubCall {
    fn is_best_effort(self) -> bool {
        BEST_EFFORT.contains(&self)
    }
}

/// Failures that would repeat on every other lookup.
fn never_downgraded(kind: ErrorKind) -> bool {
    matches!(kind, ErrorKind::Authentication | ErrorKind::Canceled)
}

/// One completed lookup.
enum Piece {
    MinerInfo(Result<MinerInfo, ClientError>),
    Power(Result<MinerPower, ClientError>),
    AvailableBalance(Result<TokenAmount, ClientError>),
    Faults(Result<BitField, ClientError>),
    Recoveries(Result<BitField, ClientError>),
    ProvingDeadline(Result<DeadlineInfo, ClientError>),
    Deadlines(Result<Vec<Deadline>, ClientError>),
    SectorCount(Result<SectorCount, ClientError>),
    ActiveSectors(Result<Vec<SectorRecord>, ClientError>),
    AllSectors(Result<Vec<SectorRecord>, ClientError>),
    ActorState(Result<MinerActorState, ClientError>),
    WalletBalance(String, Result<TokenAmount, ClientError>),
}

/// A lookup that can only be issued once an earlier one has joined.
#[derive(Debug, PartialEq, Eq)]
enum FollowUp {
    Balance(String),
    /// Enumerate every sector when the node cannot count them.
    AllSectors,
}

/// Results joined so far.
#[derive(Default)]
struct Collected {
    info: Option<MinerInfo>,
    power: Option<MinerPower>,
    available_balance: Option<TokenAmount>,
    faults: Option<BitField>,
    recoveries: Option<BitField>,
    proving: Option<DeadlineInfo>,
    deadlines: Option<Vec<Deadline>>,
    sector_count: Option<SectorCount>,
    active_sectors: Option<Vec<SectorRecord>>,
    all_sectors: Option<Vec<SectorRecord>>,
    actor_state: Option<MinerActorState>,
    balances: BTreeMap<String, TokenAmount>,
}

/// Builds [`MinerAggregate`]s from one borrowed client.
pub struct Aggregator<'a> {
    client: &'a LotusClient,
    timeout: Duration,
}

impl<'a> Aggregator<'a> {
    pub fn new(client: &'a LotusClient) -> Self {
        Self {
            client,
            timeout: DEFAULT_AGGREGATE_TIMEOUT,
        }
    }

    /// Override the overall deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Collect everything known about `miner`.
    pub async fn aggregate(
        &self,
        ctx: &CallContext,
        miner: &str,
    ) -> Result<MinerAggregate, AggregateError> {
        if miner.trim().is_empty() {
            return Err(ClientError::invalid_params("miner id must not be empty").into());
        }

        let ctx = ctx.child_with_timeout(self.timeout);
        let ctx = &ctx;
        let client = self.client;

        let mut pending: FuturesUnordered<BoxFuture<'_, Piece>> = FuturesUnordered::new();
        pending.push(
            async move { Piece::MinerInfo(client.get_miner_info(ctx, miner).await) }.boxed(),
        );
        pending.push(async move { Piece::Power(client.get_miner_power(ctx, miner).await) }.boxed());
        pending.push(
            async move {
                Piece::AvailableBalance(client.get_miner_available_balance(ctx, miner).await)
            }
            .boxed(),
        );
        pending
            .push(async move { Piece::Faults(client.get_miner_faults(ctx, miner).await) }.boxed());
        pending.push(
            async move { Piece::Recoveries(client.get_miner_recoveries(ctx, miner).await) }
                .boxed(),
        );
        pending.push(
            async move {
                Piece::ProvingDeadline(client.get_miner_proving_deadline(ctx, miner).await)
            }
            .boxed(),
        );
        pending.push(
            async move { Piece::Deadlines(client.get_miner_deadlines(ctx, miner).await) }.boxed(),
        );
        pending.push(
            async move { Piece::SectorCount(client.get_miner_sector_count(ctx, miner).await) }
                .boxed(),
        );
        pending.push(
            async move { Piece::ActiveSectors(client.list_sectors(ctx, miner, true).await) }
                .boxed(),
        );
        pending.push(
            async move { Piece::ActorState(client.get_miner_state(ctx, miner).await) }.boxed(),
        );

        let mut collected = Collected::default();
        loop {
            tokio::select! {
                biased;
                source = ctx.done() => {
                    warn!(miner, error = %source, "Miner summary cut short");
                    return Err(AggregateError::Incomplete {
                        partial: Box::new(collected.finish(miner)),
                        source,
                    });
                }
                piece = pending.next() => {
                    let Some(piece) = piece else { break };
                    for follow_up in collected.absorb(miner, piece)? {
                        let next = match follow_up {
                            FollowUp::Balance(address) => async move {
                                let balance = client.get_wallet_balance(ctx, &address).await;
                                Piece::WalletBalance(address, balance)
                            }
                            .boxed(),
                            FollowUp::AllSectors => async move {
                                Piece::AllSectors(client.list_sectors(ctx, miner, false).await)
                            }
                            .boxed(),
                        };
                        pending.push(next);
                    }
                }
            }
        }

        Ok(collected.finish(miner))
    }
}

/// Collect everything known about `miner` with the default deadline.
pub async fn aggregate(
    client: &LotusClient,
    ctx: &CallContext,
    miner: &str,
) -> Result<MinerAggregate, AggregateError> {
    Aggregator::new(client).aggregate(ctx, miner).await
}

/// Keep a successful result, or decide whether a failure may be dropped.
fn settle<T>(
    miner: &str,
    call: SubCall,
    result: Result<T, ClientError>,
) -> Result<Option<T>, ClientError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if call.is_best_effort() && !never_downgraded(err.kind()) => {
            warn!(miner, call = %call, kind = %err.kind(), error = %err, "Lookup failed, leaving field empty");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

impl Collected {
    /// Store `piece`, returning the lookups it makes possible.
    fn absorb(&mut self, miner: &str, piece: Piece) -> Result<Vec<FollowUp>, ClientError> {
        match piece {
            Piece::MinerInfo(r) => {
                let Some(info) = settle(miner, SubCall::MinerInfo, r)? else {
                    return Ok(Vec::new());
                };
                let balances = balance_addresses(&info)
                    .into_iter()
                    .map(FollowUp::Balance)
                    .collect();
                self.info = Some(info);
                return Ok(balances);
            }
            Piece::SectorCount(r) => {
                self.sector_count = settle(miner, SubCall::SectorCount, r)?;
                if self.sector_count.is_none() {
                    debug!(miner, "No sector count, enumerating all sectors");
                    return Ok(vec![FollowUp::AllSectors]);
                }
            }
            Piece::Power(r) => self.power = settle(miner, SubCall::Power, r)?,
            Piece::AvailableBalance(r) => {
                self.available_balance = settle(miner, SubCall::AvailableBalance, r)?
            }
            Piece::Faults(r) => self.faults = settle(miner, SubCall::Faults, r)?,
            Piece::Recoveries(r) => self.recoveries = settle(miner, SubCall::Recoveries, r)?,
            Piece::ProvingDeadline(r) => self.proving = settle(miner, SubCall::ProvingDeadline, r)?,
            Piece::Deadlines(r) => self.deadlines = settle(miner, SubCall::Deadlines, r)?,
            Piece::ActiveSectors(r) => {
                self.active_sectors = settle(miner, SubCall::ActiveSectors, r)?
            }
            Piece::AllSectors(r) => self.all_sectors = settle(miner, SubCall::AllSectors, r)?,
            Piece::ActorState(r) => self.actor_state = settle(miner, SubCall::ActorState, r)?,
            Piece::WalletBalance(address, r) => {
                if let Some(balance) = settle(miner, SubCall::WalletBalance, r)? {
                    self.balances.insert(address, balance);
                }
            }
        }
        Ok(Vec::new())
    }

    fn address(&self, address: &str) -> AddressBalance {
        AddressBalance {
            address: address.to_string(),
            balance: self.balances.get(address).copied(),
        }
    }

    fn finish(&self, miner: &str) -> MinerAggregate {
        let mut agg = MinerAggregate {
            miner_id: miner.to_string(),
            ..MinerAggregate::default()
        };

        if let Some(info) = &self.info {
            agg.owner = self.address(&info.owner);
            agg.worker = self.address(&info.worker);
            agg.beneficiary = info
                .beneficiary
                .as_deref()
                .filter(|b| !b.is_empty())
                .map(|b| self.address(b));
            agg.control_addresses = info
                .control_addresses
                .iter()
                .map(|a| self.address(a))
                .collect();
            agg.peer_id = info.peer_id.clone();
            agg.sector_size = info.sector_size;
            agg.window_post_proof_type = info.window_post_proof_type;
        }

        if let Some(power) = &self.power {
            agg.raw_byte_power = power.miner_power.raw_byte_power;
            agg.quality_adj_power = power.miner_power.quality_adj_power;
            agg.network_raw_byte_power = power.total_power.raw_byte_power;
            agg.network_quality_adj_power = power.total_power.quality_adj_power;
            agg.has_min_power = power.has_min_power;
            agg.network_power_share =
                power_share(agg.raw_byte_power, agg.network_raw_byte_power);
        }

        if let Some(balance) = self.available_balance {
            agg.available_balance = balance;
        }

        if let Some(state) = &self.actor_state {
            agg.initial_pledge = state.state.initial_pledge;
            agg.pre_commit_deposits = state.state.pre_commit_deposits;
            agg.vesting_funds = state.state.locked_funds;
            agg.fee_debt = state.state.fee_debt;
            agg.total_locked = total_locked(&[
                agg.initial_pledge,
                agg.pre_commit_deposits,
                agg.vesting_funds,
            ]);
        }

        if let Some(faults) = &self.faults {
            agg.faulty_sectors = faults.to_vec();
            agg.faulty_sector_sample = faults.iter().take(FAULTY_SAMPLE_LEN).collect();
        }
        if let Some(recoveries) = &self.recoveries {
            agg.recovering_sectors = recoveries.to_vec();
        }

        match (&self.sector_count, &self.all_sectors) {
            (Some(count), _) => {
                agg.total_sectors = count.live;
                agg.live_sectors = count.live;
                agg.active_sectors = count.active;
            }
            (None, Some(sectors)) => {
                agg.total_sectors = sectors.len() as u64;
                agg.live_sectors = agg.total_sectors;
                agg.active_sectors = agg
                    .total_sectors
                    .saturating_sub(agg.faulty_sectors.len() as u64);
            }
            (None, None) => {
                // The active set excludes faulty sectors already
                if let Some(active) = &self.active_sectors {
                    agg.active_sectors = active.len() as u64;
                }
            }
        }
        agg.fault_rate = ratio(agg.faulty_sectors.len() as u64, agg.total_sectors);
        agg.qap_per_sector = per_sector(agg.quality_adj_power, agg.active_sectors);

        if let Some(dl) = &self.proving {
            agg.current_epoch = dl.current_epoch;
            agg.current_deadline = dl.index;
            agg.proving_period_start = dl.period_start;
            agg.deadline_open = dl.open;
            agg.deadline_close = dl.close;
            agg.deadline_count = dl.period_deadlines;
        }
        if let Some(deadlines) = &self.deadlines {
            agg.deadline_count = deadlines.len() as u64;
        }

        agg
    }
}

/// Distinct, non-empty addresses whose balances belong in the summary.
fn balance_addresses(info: &MinerInfo) -> Vec<String> {
    let mut addresses: Vec<String> = Vec::new();
    let candidates = [Some(&info.owner), Some(&info.worker), info.beneficiary.as_ref()]
        .into_iter()
        .flatten()
        .chain(info.control_addresses.iter());
    for address in candidates {
        if !address.is_empty() && !addresses.contains(address) {
            addresses.push(address.clone());
        }
    }
    addresses
}

/// `miner / network` as a fraction in `[0, 1]`.
///
/// The ratio is taken in 256-bit integers scaled by 10^12 and only then
/// narrowed to a float.
pub fn power_share(miner: ByteSize, network: ByteSize) -> f64 {
    if network.is_zero() {
        return 0.0;
    }
    let scale = U256::from(SHARE_SCALE);
    let scaled = (miner.as_u256().saturating_mul(scale) / network.as_u256()).min(scale);
    scaled.as_limbs()[0] as f64 / SHARE_SCALE as f64
}

/// `part / whole` clamped to `[0, 1]`; zero when `whole` is zero.
fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (part as f64 / whole as f64).min(1.0)
}

fn per_sector(power: ByteSize, sectors: u64) -> ByteSize {
    if sectors == 0 {
        return ByteSize::ZERO;
    }
    ByteSize::new(power.as_u256() / U256::from(sectors))
}

fn total_locked(parts: &[TokenAmount]) -> TokenAmount {
    parts
        .iter()
        .fold(TokenAmount::ZERO, |acc, part| acc.checked_add(*part).unwrap_or(acc))
}
