//! Program wrappers: per-tool adapters for the Opal compiler cache.
//!
//! A wrapper teaches the cache how to read one tool family's command
//! line: whether an invocation is cacheable, which arguments and
//! environment variables affect the produced artifacts, which files are
//! read, and which files will be written. The orchestrator drives the
//! [`ProgramWrapper`] operations in a fixed order and treats every
//! wrapper error as "run the tool transparently".
//!
//! Shared helpers that any wrapper can use — response-file expansion
//! (via `opal_args`) and makefile-style depfile parsing — live outside
//! the individual adapters.

#![warn(missing_docs)]

pub mod depfile;
pub mod error;
pub mod gcc;
pub mod wrapper;

pub use depfile::parse_depfile;
pub use error::WrapperError;
pub use gcc::GccWrapper;
pub use wrapper::{BuildFiles, Capability, ExePath, ProgramWrapper};
