//! Counter contract.
//!
//! - `CounterName`: validated identifier of one logical counter
//! - `CounterBackend`: persistence seam (read + conditional write)
//! - `CounterStore`: the atomic increment-and-get built on top of the seam
//! - `MemoryBackend`: in-process backend for local runs and tests

pub mod memory;
pub mod store;

use std::fmt;

use async_trait::async_trait;

use crate::error::{Result, VisitsError};

pub use memory::MemoryBackend;
pub use store::{CounterStore, Increment, RetryPolicy};

const MAX_NAME_BYTES: usize = 128;

/// Identifier of one logical counter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CounterName(String);

impl CounterName {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(VisitsError::BadRequest("counter name must not be empty".into()));
        }
        if name.len() > MAX_NAME_BYTES {
            return Err(VisitsError::BadRequest(format!(
                "counter name must be at most {MAX_NAME_BYTES} bytes"
            )));
        }
        if let Some(c) = name
            .chars()
            .find(|&c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
        {
            return Err(VisitsError::BadRequest(format!(
                "counter name contains invalid character {c:?}"
            )));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CounterName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of a conditional write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Committed,
    /// The stored value no longer matched `expected`.
    Conflict,
}

/// Persistence seam for counters.
///
/// Implementations own the durable record and must make `write_if` atomic:
/// - `expected == None`: create the record with `new` only if it is absent
/// - `expected == Some(v)`: replace the value with `new` only if it is still `v`
///
/// Counts never decrease, so the stored value doubles as the record version.
///
/// Backends with a native single-statement increment override
/// `increment_native`; `CounterStore` then skips the read/`write_if` loop.
#[async_trait]
pub trait CounterBackend: Send + Sync {
    /// Short backend label for logs and metrics.
    fn kind(&self) -> &'static str;

    async fn read(&self, name: &CounterName) -> Result<Option<u64>>;

    async fn write_if(
        &self,
        name: &CounterName,
        expected: Option<u64>,
        new: u64,
    ) -> Result<WriteOutcome>;

    /// Create-if-absent (baseline 0) and add one in a single atomic step,
    /// returning the new count. `Ok(None)` means the backend has no such
    /// primitive; it never means the record is absent.
    async fn increment_native(&self, _name: &CounterName) -> Result<Option<u64>> {
        Ok(None)
    }
}
