use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::counter::{CounterBackend, CounterName, WriteOutcome};
use crate::error::Result;

/// In-process counter records.
///
/// Stands in for an external store: reads and conditional writes are separate
/// calls, so concurrent increments race exactly as they would over a network.
#[derive(Default)]
pub struct MemoryBackend {
    records: DashMap<String, u64>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    /// Seed a record, overwriting any existing value.
    pub fn insert(&self, name: &CounterName, count: u64) {
        self.records.insert(name.as_str().to_string(), count);
    }

    /// Current stored value, bypassing the store.
    pub fn peek(&self, name: &CounterName) -> Option<u64> {
        self.records.get(name.as_str()).map(|r| *r.value())
    }
}

#[async_trait]
impl CounterBackend for MemoryBackend {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn read(&self, name: &CounterName) -> Result<Option<u64>> {
        Ok(self.peek(name))
    }

    async fn write_if(
        &self,
        name: &CounterName,
        expected: Option<u64>,
        new: u64,
    ) -> Result<WriteOutcome> {
        // The entry guard holds the shard lock for the compare and the swap.
        let outcome = match (self.records.entry(name.as_str().to_string()), expected) {
            (Entry::Vacant(slot), None) => {
                slot.insert(new);
                WriteOutcome::Committed
            }
            (Entry::Occupied(mut slot), Some(current)) if *slot.get() == current => {
                slot.insert(new);
                WriteOutcome::Committed
            }
            _ => WriteOutcome::Conflict,
        };
        Ok(outcome)
    }
}
