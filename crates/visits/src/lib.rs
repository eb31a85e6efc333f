//! Top-level facade crate for visits.
//!
//! Re-exports the counter core and the HTTP gateway so users can depend on a single crate.

pub mod core {
    pub use visits_core::*;
}

pub mod gateway {
    pub use visits_gateway::*;
}
