//! Shared utilities.
//!
//! Content hashing for artifact verification.

pub mod hash;

