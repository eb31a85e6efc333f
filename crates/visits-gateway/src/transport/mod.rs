//! Transport layer (HTTP).
//!
//! Exposes the counter request handler and its error-to-response mapping.

pub mod visits;
