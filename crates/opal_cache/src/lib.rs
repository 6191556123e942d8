//! The local cache store for the Opal compiler cache.
//!
//! Entries are keyed by invocation fingerprint and live in per-entry
//! directories holding validated metadata plus one payload file per
//! logical output role. Reads are fail-safe: any corruption or format
//! mismatch is a cache miss, never an error. Writes stage into a scratch
//! directory and rename into place, so concurrent inserts for the same
//! fingerprint resolve last-writer-wins.

#![warn(missing_docs)]

pub mod entry;
pub mod error;
pub mod stats;
pub mod store;

pub use entry::{EntryMeta, PayloadInfo};
pub use error::CacheError;
pub use stats::Stats;
pub use store::{CachedEntry, LocalStore};
