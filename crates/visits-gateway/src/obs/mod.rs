//! Lightweight in-process metrics.
//!
//! Request and store-contention counters kept as atomics and rendered by the
//! `/metrics` handler in Prometheus text format. These describe the service,
//! not the visit count, which lives only in the backing store.

pub mod metrics;
