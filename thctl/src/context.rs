//! Per-call cancellation and deadlines.
//!
//! A [`CallContext`] travels with every client call. It combines a
//! [`CancellationToken`] with an optional deadline; each transport round
//! trip and each retry backoff sleep races against it, so cancelling the
//! context (or letting the deadline pass) makes in-flight work return
//! promptly instead of hanging.
//!
//! Contexts form a tree: a child is cancelled when its parent is, and its
//! deadline is never later than the parent's.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{ClientError, Result};

#[derive(Debug, Clone, Default)]
pub struct CallContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    /// A context that is never done unless cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// A context that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new().child_with_timeout(timeout)
    }

    /// Derive a child cancelled along with this context.
    pub fn child(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
            deadline: self.deadline,
        }
    }

    /// Derive a child that additionally expires `timeout` from now.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(existing) if existing < candidate => existing,
            _ => candidate,
        };
        Self {
            cancel: self.cancel.child_token(),
            deadline: Some(deadline),
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// The error this context reports if it is already done.
    pub fn err(&self) -> Option<ClientError> {
        if self.cancel.is_cancelled() {
            Some(ClientError::canceled())
        } else if self.deadline.is_some_and(|d| Instant::now() >= d) {
            Some(ClientError::deadline_exceeded())
        } else {
            None
        }
    }

    /// Resolve once the context is cancelled or its deadline passes.
    pub async fn done(&self) -> ClientError {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.cancel.cancelled() => ClientError::canceled(),
                    _ = tokio::time::sleep_until(deadline) => ClientError::deadline_exceeded(),
                }
            }
            None => {
                self.cancel.cancelled().await;
                ClientError::canceled()
            }
        }
    }

    /// Run `fut` to completion unless the context finishes first.
    ///
    /// When the context wins, `fut` is dropped, which aborts any request
    /// it had in flight.
    pub async fn run<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if let Some(err) = self.err() {
            return Err(err);
        }
        tokio::select! {
            biased;
            err = self.done() => Err(err),
            result = fut => result,
        }
    }

    /// Sleep for `duration` unless the context finishes first.
    pub async fn sleep(&self, duration: Duration) -> Result<()> {
        self.run(async {
            tokio::time::sleep(duration).await;
            Ok(())
        })
        .await
    }
}
