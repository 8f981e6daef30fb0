//! Query a Filecoin storage provider through a Lotus full node.
//!
//! [`lotus::LotusClient`] wraps the node's JSON-RPC state API with typed
//! results, bounded retries and per-call cancellation via
//! [`context::CallContext`]. [`miner`] composes those calls into a
//! fault-tolerant [`miner::MinerAggregate`].

pub mod config;
pub mod context;
pub mod error;
pub mod lotus;
pub mod miner;
pub mod tracing;
pub mod types;
