//! Durable counter backends and the startup factory that picks one from config.

pub mod sqlite;

use std::sync::Arc;
use std::time::Duration;

use visits_core::error::Result;
use visits_core::{CounterBackend, MemoryBackend};

use crate::config::{StoreBackend, VisitsConfig};

pub use sqlite::SqliteBackend;

/// Open the configured backend. Called once at process start; the handle is
/// shared by every request.
pub fn open(cfg: &VisitsConfig) -> Result<Arc<dyn CounterBackend>> {
    let store = &cfg.store;
    match store.backend {
        StoreBackend::Sqlite => {
            let backend = SqliteBackend::open(
                &store.path,
                Duration::from_millis(store.busy_timeout_ms),
                cfg.counter.retry_policy().op_timeout,
            )?;
            Ok(Arc::new(backend))
        }
        StoreBackend::Memory => {
            tracing::warn!("memory backend selected; counts will not survive a restart");
            Ok(Arc::new(MemoryBackend::new()))
        }
    }
}
