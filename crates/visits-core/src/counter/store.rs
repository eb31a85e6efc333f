//! Atomic increment-and-get over a `CounterBackend`.
//!
//! The store keeps no copy of the count. Backends with a native increment
//! get exactly one call per visit. Otherwise each call reads the record,
//! writes `current + 1` conditionally, and re-reads on conflict until the
//! write lands or the attempt budget runs out. A first use writes through the
//! backend's create-if-absent path with an implied baseline of 0.
//!
//! Failed or timed-out legs are surfaced as `StoreUnavailable` and never
//! retried here: a write that timed out may still have committed.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::counter::{CounterBackend, CounterName, WriteOutcome};
use crate::error::{Result, VisitsError};

/// Bounds for one `increment_and_get` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Conditional write attempts before giving up with `StoreConflict`.
    pub max_attempts: u32,
    /// Per backend call (each read and each write).
    pub op_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 16,
            op_timeout: Duration::from_millis(2000),
        }
    }
}

/// A committed increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Increment {
    pub count: u64,
    /// Conditional writes issued, including the committing one.
    pub attempts: u32,
}

#[derive(Clone)]
pub struct CounterStore {
    backend: Arc<dyn CounterBackend>,
    policy: RetryPolicy,
}

impl CounterStore {
    pub fn new(backend: Arc<dyn CounterBackend>, policy: RetryPolicy) -> Self {
        Self {
            backend,
            policy: RetryPolicy {
                max_attempts: policy.max_attempts.max(1),
                ..policy
            },
        }
    }

    pub fn backend_kind(&self) -> &'static str {
        self.backend.kind()
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Increment `name` by one and return the new value.
    pub async fn increment_and_get(&self, name: &CounterName) -> Result<u64> {
        self.increment(name).await.map(|inc| inc.count)
    }

    /// Like `increment_and_get`, also reporting how many attempts it took.
    pub async fn increment(&self, name: &CounterName) -> Result<Increment> {
        let native = self
            .timed("increment", name, self.backend.increment_native(name))
            .await?;
        if let Some(count) = native {
            return Ok(Increment { count, attempts: 1 });
        }

        let max = self.policy.max_attempts;

        for attempt in 1..=max {
            let current = self.timed("read", name, self.backend.read(name)).await?;
            let new = current
                .unwrap_or(0)
                .checked_add(1)
                .ok_or_else(|| VisitsError::Internal(format!("counter {name} overflowed")))?;

            let outcome = self
                .timed("write", name, self.backend.write_if(name, current, new))
                .await?;

            match outcome {
                WriteOutcome::Committed => {
                    return Ok(Increment {
                        count: new,
                        attempts: attempt,
                    })
                }
                WriteOutcome::Conflict => {
                    tracing::debug!(counter = %name, attempt, "conditional write lost, retrying");
                }
            }
        }

        tracing::warn!(
            counter = %name,
            attempts = max,
            backend = self.backend.kind(),
            "increment retry budget exhausted"
        );
        Err(VisitsError::StoreConflict { attempts: max })
    }

    async fn timed<T>(
        &self,
        leg: &'static str,
        name: &CounterName,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.policy.op_timeout, fut).await {
            Ok(res) => res,
            Err(_) => Err(VisitsError::StoreUnavailable(format!(
                "{} {leg} of counter {name} timed out after {}ms",
                self.backend.kind(),
                self.policy.op_timeout.as_millis()
            ))),
        }
    }
}
