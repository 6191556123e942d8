//! Path and file utilities for the Opal compiler cache.
//!
//! This crate provides lexical path manipulation (no filesystem access),
//! filesystem helpers with atomic-write semantics, executable resolution,
//! unique-id generation, and scoped resources for temporary files and the
//! process working directory.
//!
//! Paths are handled as UTF-8 strings throughout: the cache shim receives
//! its paths from command lines and environment variables, and the lexical
//! operations (splitting, joining, canonicalization) mirror what the
//! wrapped tools themselves do with those strings.

#![warn(missing_docs)]

pub mod error;
pub mod fs;
pub mod path;
pub mod scoped;

pub use error::UtilError;
pub use fs::{
    create_dir, dir_exists, file_exists, find_executable, get_cwd, get_temp_dir, link_or_copy,
    set_cwd, write,
};
pub use path::{
    append_path, canonicalize_path, change_extension, get_dir_part, get_extension, get_file_part,
};
pub use scoped::{get_unique_id, ScopedWorkDir, TmpFile};
