//! The polymorphic wrapper contract.

use std::collections::BTreeMap;

use opal_args::ArgList;

use crate::error::WrapperError;

/// The resolved location of the tool a wrapper fronts.
///
/// Holds the canonicalized path of the real executable, plus the shim
/// directory that executable resolution must skip so the shim never
/// recurses into itself.
#[derive(Debug, Clone)]
pub struct ExePath {
    path: String,
    shim_dir: String,
}

impl ExePath {
    /// Creates an executable path. `path` is canonicalized lexically;
    /// `shim_dir` is the directory the shim itself was invoked from.
    pub fn new(path: &str, shim_dir: &str) -> Self {
        Self {
            path: opal_util::canonicalize_path(path),
            shim_dir: shim_dir.to_string(),
        }
    }

    /// The canonicalized path of the real tool.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The tool's base name (final path component).
    pub fn file_part(&self) -> String {
        opal_util::get_file_part(&self.path)
    }

    /// The directory excluded from executable resolution.
    pub fn shim_dir(&self) -> &str {
        &self.shim_dir
    }
}

/// An optimization a wrapper declares legal for an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Capability {
    /// The wrapper can recover implicit inputs from depfile output.
    Depfile,
    /// Lookup may use declared inputs only, skipping preprocessing.
    DirectMode,
    /// Cache hits may be hard-linked into place.
    HardLinks,
}

impl Capability {
    /// The stable tag mixed into the fingerprint.
    pub fn tag(&self) -> &'static str {
        match self {
            Capability::Depfile => "depfile",
            Capability::DirectMode => "direct_mode",
            Capability::HardLinks => "hard_links",
        }
    }
}

/// Logical output role → concrete path the real tool will write.
///
/// Ordered map so iteration (and thus materialization and logging) is
/// deterministic.
pub type BuildFiles = BTreeMap<String, String>;

/// The contract every compiler-family adapter implements.
///
/// One wrapper instance lives for exactly one invocation. The
/// orchestrator calls the operations in a fixed order:
/// `can_handle_command`, `resolve_args`, then the queries. Queries that
/// return `Result` make the invocation non-cacheable on error; the
/// others are total.
pub trait ProgramWrapper {
    /// Decides whether this wrapper owns the invocation, from the
    /// executable path alone. Pure.
    fn can_handle_command(&self) -> bool;

    /// Expands response files and normalizes the argument sequence.
    /// After this call, every later query operates on the resolved
    /// sequence.
    fn resolve_args(&mut self) -> Result<(), WrapperError>;

    /// The optimizations legal for this invocation.
    fn get_capabilities(&self) -> Vec<Capability>;

    /// A stable identifier for the underlying tool binary, cached
    /// per-path within the process.
    fn get_program_id(&mut self) -> Result<String, WrapperError>;

    /// The tag identifying the wrapper's compatible mode, mixed into the
    /// fingerprint.
    fn compatible_mode_tag(&self) -> &'static str {
        "none"
    }

    /// The arguments that semantically affect a cacheable run's outputs.
    /// Order-preserving; non-affecting flags are elided.
    fn get_relevant_arguments(&self) -> ArgList;

    /// The declared environment variables the tool reads, snapshotted.
    fn get_relevant_env_vars(&self) -> BTreeMap<String, String>;

    /// Explicit input files named on the command line.
    fn get_input_files(&self) -> Vec<String>;

    /// Runs the tool's preprocessor and returns the preprocessed
    /// translation unit. Side effect: implicit inputs become known.
    fn preprocess_source(&mut self) -> Result<Vec<u8>, WrapperError>;

    /// Files consumed by the tool but not named in its arguments
    /// (included headers). May be empty; never fails.
    fn get_implicit_input_files(&mut self) -> Vec<String>;

    /// Logical output roles mapped to the paths the real invocation will
    /// produce. Errors make the invocation non-cacheable.
    fn get_build_files(&self) -> Result<BuildFiles, WrapperError>;

    /// Whether the preprocess step consumes `-D` definitions, making
    /// them redundant in the relevant-argument list while in preprocess
    /// mode.
    fn uses_defines_in_preprocess(&self) -> bool {
        false
    }
}
