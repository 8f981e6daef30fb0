//! Bounded retry of transient transport failures.

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hasher};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::context::CallContext;
use crate::error::Result;
use crate::tracing::prelude::*;

use super::transport::Transport;

/// How many times, and how patiently, to retry a failing call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first; `0` disables retrying.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(500);
    pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(8);

    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_backoff: Self::DEFAULT_INITIAL_BACKOFF,
            max_backoff: Self::DEFAULT_MAX_BACKOFF,
        }
    }
}

/// Delay before each retry of one call.
///
/// Retry `n` (counting from 1) waits `initial * 2^(n-1)`, capped at `max`,
/// scaled by a jitter factor in [0.5, 1.0] derived from the retry number.
#[derive(Debug)]
struct RetryBackoff {
    initial: Duration,
    max: Duration,
    // Seeded from OS randomness, so separate calls jitter differently.
    seed: RandomState,
}

impl RetryBackoff {
    fn for_policy(policy: &RetryPolicy) -> Self {
        Self {
            initial: policy.initial_backoff,
            max: policy.max_backoff,
            seed: RandomState::new(),
        }
    }

    /// Un-jittered delay before retry `retry`.
    fn nominal(&self, retry: u32) -> Duration {
        let doublings = retry.saturating_sub(1).min(31);
        self.initial
            .checked_mul(1 << doublings)
            .map_or(self.max, |d| d.min(self.max))
    }

    fn delay(&self, retry: u32) -> Duration {
        let mut hasher = self.seed.build_hasher();
        hasher.write_u32(retry);
        let jitter = 0.5 + (hasher.finish() as f64 / u64::MAX as f64) * 0.5;
        self.nominal(retry).mul_f64(jitter)
    }
}

/// Wraps a [`Transport`] with a [`RetryPolicy`] and call-context checks.
#[derive(Clone)]
pub struct RetryingCaller {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
}

impl RetryingCaller {
    pub fn new(transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Call `method`, retrying connection failures and timeouts.
    ///
    /// Makes at most `max_retries + 1` attempts. Any other error kind is
    /// returned immediately. Both the attempts and the sleeps between them
    /// end early with the context's error once `ctx` is done.
    pub async fn call(&self, ctx: &CallContext, method: &str, params: Vec<Value>) -> Result<Value> {
        let backoff = RetryBackoff::for_policy(&self.policy);
        let attempts = self.policy.max_retries.saturating_add(1);
        let mut attempt = 1;

        loop {
            let result = ctx
                .run(self.transport.call(method, params.clone()))
                .await;

            let err = match result {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.is_retryable() || attempt >= attempts || ctx.err().is_some() {
                return Err(err);
            }

            let delay = backoff.delay(attempt);
            debug!(
                method,
                attempt,
                max_attempts = attempts,
                kind = %err.kind(),
                error = %err,
                delay_ms = delay.as_millis() as u64,
                "RPC call failed, retrying"
            );
            ctx.sleep(delay).await?;
            attempt += 1;
        }
    }
}
