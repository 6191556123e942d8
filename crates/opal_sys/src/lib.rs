//! Process execution for the Opal compiler cache.
//!
//! Provides synchronous spawning of external tools with full capture of
//! stdout, stderr, and the exit code, plus byte-exact replay of captured
//! streams. Stream replay must not apply any text-mode translation: cache
//! hits reproduce the recorded tool output 1:1.

#![warn(missing_docs)]

pub mod run;

pub use run::{
    get_local_temp_folder, print_raw_stderr, print_raw_stdout, run, RunResult, SysError,
};
