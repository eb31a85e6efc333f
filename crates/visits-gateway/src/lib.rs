//! visits gateway library entry.
//!
//! Wires config, the durable counter backend, the HTTP handler, and the ops
//! endpoints into one service. Consumed by the binary (`main.rs`) and by
//! integration tests.

pub mod app_state;
pub mod config;
pub mod obs;
pub mod ops;
pub mod router;
pub mod storage;
pub mod transport;
