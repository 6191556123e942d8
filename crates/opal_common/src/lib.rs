//! Shared digest types used across the Opal compiler cache.
//!
//! This crate provides the 128-bit content checksum used for payload
//! integrity and input-file hashing, and the 256-bit invocation fingerprint
//! together with its streaming accumulator.

#![warn(missing_docs)]

pub mod fingerprint;
pub mod hash;

pub use fingerprint::{Fingerprint, FingerprintHasher};
pub use hash::ContentHash;
