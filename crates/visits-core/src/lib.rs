//! visits core: the counter contract, its error surface, and an in-memory backend.
//!
//! This crate defines the `CounterStore` increment primitive and the
//! `CounterBackend` seam that persistence layers plug into. It carries no HTTP
//! or database dependencies so the contract can be tested without a live store.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! Every store failure surfaces as `VisitsError` so a request never sees a
//! fabricated count.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod counter;
pub mod error;

/// Shared result type.
pub use error::{Result, VisitsError};

pub use counter::{
    CounterBackend, CounterName, CounterStore, Increment, MemoryBackend, RetryPolicy, WriteOutcome,
};
