//! The GCC/Clang-family adapter.
//!
//! Handles command lines of GCC-compatible C/C++ compilers, including
//! cross prefixes (`arm-none-eabi-gcc`) and versioned names (`gcc-13`).
//! Cacheable invocations are single-source compile steps (`-c`); link
//! steps, preprocess-only runs, and informational invocations run
//! transparently.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::{Mutex, OnceLock};

use opal_args::{expand_response_files, ArgList};
use opal_common::ContentHash;
use opal_util::{canonicalize_path, change_extension, get_file_part, TmpFile};
use tracing::debug;

use crate::depfile::parse_depfile;
use crate::error::WrapperError;
use crate::wrapper::{BuildFiles, Capability, ExePath, ProgramWrapper};

/// Base names this wrapper claims, either exactly or as the suffix of a
/// cross-compile prefix (`<triple>-gcc`).
const HANDLED_NAMES: &[&str] = &["cc", "c++", "gcc", "g++", "clang", "clang++"];

/// Two-token flags recognized in every compatible mode.
const VALUE_FLAGS: &[&str] = &[
    "-D", "-I", "-L", "-T", "-U", "-Xassembler", "-Xlinker", "-Xpreprocessor", "--param",
    "-aux-info", "-idirafter", "-imacros", "-include", "-iprefix", "-iquote", "-isysroot",
    "-isystem", "-l", "-u", "-x", "-z",
];

/// Additional two-token flags in Clang-compatible mode.
const CLANG_VALUE_FLAGS: &[&str] = &["-Xclang", "-arch", "-mllvm", "-target"];

/// Environment variables that affect GCC-family compilation output.
const RELEVANT_ENV_VARS: &[&str] = &[
    "CPATH",
    "CPLUS_INCLUDE_PATH",
    "C_INCLUDE_PATH",
    "COMPILER_PATH",
    "DEPENDENCIES_OUTPUT",
    "GCC_EXEC_PREFIX",
    "LANG",
    "LC_ALL",
    "LC_CTYPE",
    "LC_MESSAGES",
    "OBJC_INCLUDE_PATH",
    "SOURCE_DATE_EPOCH",
    "SUNPRO_DEPENDENCIES",
];

/// Which dialect of GCC-compatible flags the tool accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompatibleMode {
    /// No specific toolchain identified; use the common subset.
    Unspecified,
    /// GCC-compatible flags may be used.
    Gcc,
    /// Clang-compatible flags may be used.
    Clang,
}

impl CompatibleMode {
    fn tag(self) -> &'static str {
        match self {
            CompatibleMode::Unspecified => "none",
            CompatibleMode::Gcc => "gcc",
            CompatibleMode::Clang => "clang",
        }
    }
}

/// A program wrapper for GCC and GCC-like C/C++ compilers.
pub struct GccWrapper {
    exe_path: ExePath,
    args: ArgList,
    resolved_args: Option<ArgList>,
    implicit_inputs: Vec<String>,
    compatible_mode: CompatibleMode,
    direct_mode: bool,
    temp_dir: String,
}

/// One pass over the resolved arguments, classifying every token.
#[derive(Default)]
struct Scanned {
    /// Indices of positional input files.
    input_indices: Vec<usize>,
    /// Input file tokens, in order.
    inputs: Vec<String>,
    /// The `-o` target, split or fused.
    output: Option<String>,
    /// Indices elided from the relevant-argument list (output and
    /// depfile controls, diagnostic color, with their values).
    elided_indices: HashSet<usize>,
    has_compile: bool,
    has_preprocess_only: bool,
    has_assembly_only: bool,
    wants_depfile: bool,
    dep_target: Option<String>,
    coverage: bool,
    split_dwarf: bool,
    informational: bool,
}

impl GccWrapper {
    /// Creates a wrapper for one invocation.
    ///
    /// `args` are the tool's arguments (program name excluded).
    /// `direct_mode` selects declared-inputs-only hashing; `temp_dir` is
    /// the scratch directory for preprocessor output.
    pub fn new(exe_path: ExePath, args: ArgList, direct_mode: bool, temp_dir: String) -> Self {
        let compatible_mode = infer_mode(&normalized_base_name(&exe_path.file_part()));
        Self {
            exe_path,
            args,
            resolved_args: None,
            implicit_inputs: Vec::new(),
            compatible_mode,
            direct_mode,
            temp_dir,
        }
    }

    /// The canonical argument sequence: resolved if `resolve_args` has
    /// run, raw otherwise.
    fn resolved(&self) -> &ArgList {
        self.resolved_args.as_ref().unwrap_or(&self.args)
    }

    fn takes_value(&self, flag: &str) -> bool {
        VALUE_FLAGS.contains(&flag)
            || (self.compatible_mode == CompatibleMode::Clang && CLANG_VALUE_FLAGS.contains(&flag))
    }

    fn scan(&self) -> Scanned {
        let args = self.resolved();
        let mut s = Scanned::default();
        let mut skip_value_of: Option<usize> = None;

        for (i, token) in args.iter().enumerate() {
            if let Some(flag_idx) = skip_value_of.take() {
                // This token is the value of the preceding flag; it is
                // elided exactly when its flag is.
                if s.elided_indices.contains(&flag_idx) {
                    s.elided_indices.insert(i);
                }
                continue;
            }
            let tok = token.as_str();
            match tok {
                "-c" => s.has_compile = true,
                "-E" => s.has_preprocess_only = true,
                "-S" => s.has_assembly_only = true,
                "-o" => {
                    s.output = args.get(i + 1).map(str::to_string);
                    s.elided_indices.insert(i);
                    skip_value_of = Some(i);
                }
                "-MD" | "-MMD" | "-MP" => {
                    if tok != "-MP" {
                        s.wants_depfile = true;
                    }
                    s.elided_indices.insert(i);
                }
                "-MF" | "-MT" | "-MQ" => {
                    if tok == "-MF" {
                        s.dep_target = args.get(i + 1).map(str::to_string);
                    }
                    s.elided_indices.insert(i);
                    skip_value_of = Some(i);
                }
                "--coverage" | "-ftest-coverage" | "-fprofile-arcs" => s.coverage = true,
                "-gsplit-dwarf" => s.split_dwarf = true,
                "--help" | "--version" | "-v" | "-###" | "-dumpversion" | "-dumpmachine" => {
                    s.informational = true
                }
                _ if tok.starts_with("-o") && tok.len() > 2 => {
                    s.output = Some(tok[2..].to_string());
                    s.elided_indices.insert(i);
                }
                _ if tok.starts_with("-MF") && tok.len() > 3 => {
                    s.dep_target = Some(tok[3..].to_string());
                    s.elided_indices.insert(i);
                }
                _ if tok.starts_with("-MT") && tok.len() > 3 || tok.starts_with("-MQ") && tok.len() > 3 => {
                    s.elided_indices.insert(i);
                }
                _ if tok.starts_with("-print-") => s.informational = true,
                _ if is_color_flag(tok) => {
                    s.elided_indices.insert(i);
                }
                _ if self.takes_value(tok) => skip_value_of = Some(i),
                _ if !tok.starts_with('-') => {
                    s.input_indices.push(i);
                    s.inputs.push(tok.to_string());
                }
                _ => {}
            }
        }
        s
    }

    /// Builds the preprocessor command: the resolved arguments with the
    /// compile action replaced by `-E`, the output and depfile controls
    /// stripped, `-H` added for include reporting, and the output
    /// redirected to `out_path`.
    fn make_preprocessor_cmd(&self, out_path: &str) -> ArgList {
        let mut cmd = ArgList::new();
        cmd.push(self.exe_path.path());
        self.push_args_without_action(&mut cmd);
        cmd.push("-E");
        cmd.push("-H");
        cmd.push("-o");
        cmd.push(out_path);
        cmd
    }

    /// Builds the dependency-generation command used in direct mode:
    /// like the preprocessor command, but `-M` writing to `out_path`.
    fn make_dep_cmd(&self, out_path: &str) -> ArgList {
        let mut cmd = ArgList::new();
        cmd.push(self.exe_path.path());
        self.push_args_without_action(&mut cmd);
        cmd.push("-M");
        cmd.push("-MF");
        cmd.push(out_path);
        cmd
    }

    /// Appends the resolved arguments minus the action (`-c`), the output
    /// target, and the depfile controls.
    fn push_args_without_action(&self, cmd: &mut ArgList) {
        let mut skip_next = false;
        for token in self.resolved() {
            if skip_next {
                skip_next = false;
                continue;
            }
            let tok = token.as_str();
            match tok {
                "-c" | "-MD" | "-MMD" | "-MP" => {}
                "-o" | "-MF" | "-MT" | "-MQ" => skip_next = true,
                _ if tok.starts_with("-o") && tok.len() > 2 => {}
                _ if (tok.starts_with("-MF") || tok.starts_with("-MT") || tok.starts_with("-MQ"))
                    && tok.len() > 3 => {}
                _ => cmd.push(tok),
            }
        }
    }

    /// Extracts included headers from `-H` stderr output.
    ///
    /// Every line starting with one or more dots and a space names one
    /// included header at that nesting depth. Paths are canonicalized
    /// and deduplicated in first-occurrence order.
    fn get_include_files(&self, std_err: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut files = Vec::new();
        for line in std_err.lines() {
            let dots = line.bytes().take_while(|b| *b == b'.').count();
            if dots == 0 {
                continue;
            }
            let rest = &line[dots..];
            let Some(path) = rest.strip_prefix(' ') else {
                continue;
            };
            let path = path.trim();
            if path.is_empty() {
                continue;
            }
            let canonical = canonicalize_path(path);
            if seen.insert(canonical.clone()) {
                files.push(canonical);
            }
        }
        files
    }

    /// Runs the dependency-generation command and parses its depfile.
    fn generate_implicit_inputs(&self) -> Result<Vec<String>, WrapperError> {
        let tmp = TmpFile::new(&self.temp_dir, ".d");
        let cmd = self.make_dep_cmd(tmp.path());
        let result = opal_sys::run(cmd.as_slice(), true, "")?;
        if !result.success() {
            return Err(WrapperError::ToolFailed {
                exit_code: result.return_code,
                stderr_tail: stderr_tail(&result.stderr_text()),
            });
        }
        let text = std::fs::read_to_string(tmp.path()).map_err(|e| WrapperError::Io {
            op: "read",
            path: tmp.path().to_string(),
            source: e,
        })?;
        Ok(parse_depfile(&text)
            .into_iter()
            .map(|p| canonicalize_path(&p))
            .collect())
    }
}

impl ProgramWrapper for GccWrapper {
    fn can_handle_command(&self) -> bool {
        let base = normalized_base_name(&self.exe_path.file_part());
        HANDLED_NAMES
            .iter()
            .any(|name| base == *name || base.ends_with(&format!("-{name}")))
    }

    fn resolve_args(&mut self) -> Result<(), WrapperError> {
        let resolved = expand_response_files(&self.args)?;
        debug!(args = %resolved, "resolved command line");
        self.resolved_args = Some(resolved);
        Ok(())
    }

    fn get_capabilities(&self) -> Vec<Capability> {
        vec![Capability::Depfile, Capability::DirectMode, Capability::HardLinks]
    }

    fn get_program_id(&mut self) -> Result<String, WrapperError> {
        static PROGRAM_IDS: OnceLock<Mutex<HashMap<String, String>>> = OnceLock::new();

        let cache = PROGRAM_IDS.get_or_init(|| Mutex::new(HashMap::new()));
        let mut ids = cache.lock().unwrap_or_else(|poison| poison.into_inner());
        if let Some(id) = ids.get(self.exe_path.path()) {
            return Ok(id.clone());
        }

        let exe_hash =
            ContentHash::from_file(Path::new(self.exe_path.path())).map_err(|e| {
                WrapperError::Io {
                    op: "read",
                    path: self.exe_path.path().to_string(),
                    source: e,
                }
            })?;
        // Version probing failure is tolerated: some cross tools cannot
        // report a version, and the executable hash still identifies them.
        let version = opal_sys::run(
            &[self.exe_path.path().to_string(), "--version".to_string()],
            true,
            "",
        )
        .map(|r| r.stdout)
        .unwrap_or_default();

        let id = format!(
            "{}-{}-{}",
            self.exe_path.file_part(),
            exe_hash,
            ContentHash::from_bytes(&version)
        );
        ids.insert(self.exe_path.path().to_string(), id.clone());
        Ok(id)
    }

    fn compatible_mode_tag(&self) -> &'static str {
        self.compatible_mode.tag()
    }

    fn get_relevant_arguments(&self) -> ArgList {
        let scanned = self.scan();
        let elide_defines = !self.direct_mode && self.uses_defines_in_preprocess();

        let mut out = ArgList::new();
        let mut skip_next = false;
        for (i, token) in self.resolved().iter().enumerate() {
            if skip_next {
                skip_next = false;
                continue;
            }
            if scanned.elided_indices.contains(&i) || scanned.input_indices.contains(&i) {
                continue;
            }
            let tok = token.as_str();
            if elide_defines {
                if tok == "-D" {
                    skip_next = true;
                    continue;
                }
                if tok.starts_with("-D") && tok.len() > 2 {
                    continue;
                }
            }
            out.push(tok);
        }
        out
    }

    fn get_relevant_env_vars(&self) -> BTreeMap<String, String> {
        relevant_env_from(std::env::vars())
    }

    fn get_input_files(&self) -> Vec<String> {
        self.scan().inputs
    }

    fn preprocess_source(&mut self) -> Result<Vec<u8>, WrapperError> {
        let tmp = TmpFile::new(&self.temp_dir, ".i");
        let cmd = self.make_preprocessor_cmd(tmp.path());
        let result = opal_sys::run(cmd.as_slice(), true, "")?;
        if !result.success() {
            return Err(WrapperError::ToolFailed {
                exit_code: result.return_code,
                stderr_tail: stderr_tail(&result.stderr_text()),
            });
        }
        self.implicit_inputs = self.get_include_files(&result.stderr_text());
        std::fs::read(tmp.path()).map_err(|e| WrapperError::Io {
            op: "read",
            path: tmp.path().to_string(),
            source: e,
        })
    }

    fn get_implicit_input_files(&mut self) -> Vec<String> {
        if self.implicit_inputs.is_empty() && self.direct_mode {
            match self.generate_implicit_inputs() {
                Ok(deps) => self.implicit_inputs = deps,
                Err(e) => debug!(error = %e, "implicit input detection failed"),
            }
        }
        self.implicit_inputs.clone()
    }

    fn get_build_files(&self) -> Result<BuildFiles, WrapperError> {
        let scanned = self.scan();

        if scanned.informational {
            return Err(WrapperError::NonCacheable {
                reason: "informational invocation".to_string(),
            });
        }
        if scanned.has_preprocess_only {
            return Err(WrapperError::NonCacheable {
                reason: "preprocess-only invocation".to_string(),
            });
        }
        if scanned.has_assembly_only {
            return Err(WrapperError::NonCacheable {
                reason: "assembly output".to_string(),
            });
        }
        if !scanned.has_compile {
            return Err(WrapperError::NonCacheable {
                reason: "not a compile step".to_string(),
            });
        }
        if scanned.inputs.len() != 1 {
            return Err(WrapperError::NonCacheable {
                reason: format!("expected exactly one input file, got {}", scanned.inputs.len()),
            });
        }
        if scanned.output.as_deref() == Some("-") {
            return Err(WrapperError::NonCacheable {
                reason: "output to stdout".to_string(),
            });
        }

        let object = match &scanned.output {
            Some(path) => path.clone(),
            None => change_extension(&get_file_part(&scanned.inputs[0]), ".o"),
        };

        let mut files = BuildFiles::new();
        if scanned.wants_depfile {
            let dep = scanned
                .dep_target
                .clone()
                .unwrap_or_else(|| change_extension(&object, ".d"));
            files.insert("dep".to_string(), dep);
        }
        if scanned.coverage {
            files.insert(
                "coverage-notes".to_string(),
                change_extension(&object, ".gcno"),
            );
        }
        if scanned.split_dwarf {
            files.insert("split-dwarf".to_string(), change_extension(&object, ".dwo"));
        }
        files.insert("object".to_string(), object);
        Ok(files)
    }

    fn uses_defines_in_preprocess(&self) -> bool {
        // Both toolchains expand macros during -E, so the preprocessed
        // output fully reflects -D flags. With an unidentified tool we
        // keep the defines in the fingerprint instead.
        matches!(
            self.compatible_mode,
            CompatibleMode::Gcc | CompatibleMode::Clang
        )
    }
}

/// Lowercases a tool base name and strips a Windows `.exe` suffix and a
/// trailing version suffix (`gcc-13`, `clang-17.0`).
fn normalized_base_name(file_part: &str) -> String {
    let mut base = file_part.to_ascii_lowercase();
    if let Some(stripped) = base.strip_suffix(".exe") {
        base = stripped.to_string();
    }
    if let Some(idx) = base.rfind('-') {
        let suffix = &base[idx + 1..];
        if !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit() || c == '.') {
            base.truncate(idx);
        }
    }
    base
}

fn infer_mode(base: &str) -> CompatibleMode {
    if base.contains("clang") {
        CompatibleMode::Clang
    } else if base.contains("gcc") || base.contains("g++") {
        CompatibleMode::Gcc
    } else {
        CompatibleMode::Unspecified
    }
}

fn is_color_flag(tok: &str) -> bool {
    tok.starts_with("-fdiagnostics-color")
        || tok == "-fcolor-diagnostics"
        || tok == "-fno-color-diagnostics"
}

/// Filters an environment snapshot down to the declared relevant set.
fn relevant_env_from(vars: impl Iterator<Item = (String, String)>) -> BTreeMap<String, String> {
    vars.filter(|(name, _)| RELEVANT_ENV_VARS.contains(&name.as_str()))
        .collect()
}

/// The last few lines of a tool's stderr, for diagnostic logging.
fn stderr_tail(std_err: &str) -> String {
    const TAIL_LINES: usize = 10;
    let lines: Vec<&str> = std_err.lines().collect();
    let start = lines.len().saturating_sub(TAIL_LINES);
    lines[start..].join("\n")
}
