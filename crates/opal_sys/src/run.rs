//! Spawning external tools and reproducing their output.

use std::io::Write;
use std::process::{Command, Stdio};

use tracing::debug;

/// Errors from process execution.
#[derive(Debug, thiserror::Error)]
pub enum SysError {
    /// The command list was empty.
    #[error("cannot run an empty command")]
    EmptyCommand,

    /// The program could not be spawned at all.
    #[error("failed to launch '{program}': {source}")]
    Launch {
        /// The program that was to be spawned.
        program: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Writing to one of our own standard streams failed.
    #[error("{stream} write failed: {source}")]
    StreamWrite {
        /// Which stream failed (`"stdout"` or `"stderr"`).
        stream: &'static str,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

/// The captured result of running an external command.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// The raw contents of the tool's stdout.
    pub stdout: Vec<u8>,
    /// The raw contents of the tool's stderr.
    pub stderr: Vec<u8>,
    /// The tool's exit code (zero for success). A tool terminated by a
    /// signal reports 1.
    pub return_code: i32,
}

impl RunResult {
    /// Returns `true` if the tool exited with code zero.
    pub fn success(&self) -> bool {
        self.return_code == 0
    }

    /// The stderr contents, lossily decoded for inspection and logging.
    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Runs a command, capturing stdout, stderr, and the exit code.
///
/// `args[0]` is the program; the remaining items are its arguments. When
/// `quiet` is false the captured streams are echoed raw after the run
/// completes. A non-empty `work_dir` sets the child's working directory
/// (the parent's CWD is untouched).
pub fn run(args: &[String], quiet: bool, work_dir: &str) -> Result<RunResult, SysError> {
    let (program, rest) = args.split_first().ok_or(SysError::EmptyCommand)?;

    let mut cmd = Command::new(program);
    cmd.args(rest)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if !work_dir.is_empty() {
        cmd.current_dir(work_dir);
    }

    debug!(program = %program, argc = args.len(), "running external tool");

    let output = cmd.output().map_err(|e| SysError::Launch {
        program: program.clone(),
        source: e,
    })?;

    let result = RunResult {
        stdout: output.stdout,
        stderr: output.stderr,
        return_code: output.status.code().unwrap_or(1),
    };

    if !quiet {
        print_raw_stdout(&result.stdout)?;
        print_raw_stderr(&result.stderr)?;
    }

    Ok(result)
}

/// Writes bytes to our stdout without any text-mode translation.
pub fn print_raw_stdout(data: &[u8]) -> Result<(), SysError> {
    let mut out = std::io::stdout().lock();
    out.write_all(data)
        .and_then(|()| out.flush())
        .map_err(|e| SysError::StreamWrite {
            stream: "stdout",
            source: e,
        })
}

/// Writes bytes to our stderr without any text-mode translation.
pub fn print_raw_stderr(data: &[u8]) -> Result<(), SysError> {
    let mut err = std::io::stderr().lock();
    err.write_all(data)
        .and_then(|()| err.flush())
        .map_err(|e| SysError::StreamWrite {
            stream: "stderr",
            source: e,
        })
}

/// Returns the scratch directory inside the cache, creating it on demand.
///
/// Temp files that will later be linked or renamed into the cache live
/// here so they stay on the same filesystem as the store. The directory
/// also acts as a namespace owned by the cache, so name collisions with
/// other programs cannot occur.
pub fn get_local_temp_folder(cache_dir: &str) -> Result<String, opal_util::UtilError> {
    let dir = opal_util::append_path(cache_dir, "tmp");
    opal_util::create_dir(&dir)?;
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_command_errors() {
        let err = run(&[], true, "").unwrap_err();
        assert!(matches!(err, SysError::EmptyCommand));
    }

    #[test]
    fn missing_program_errors() {
        let err = run(&cmd(&["/nonexistent/program"]), true, "").unwrap_err();
        assert!(matches!(err, SysError::Launch { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn captures_stdout_and_exit_code() {
        let result = run(&cmd(&["sh", "-c", "printf hello; exit 3"]), true, "").unwrap();
        assert_eq!(result.stdout, b"hello");
        assert!(result.stderr.is_empty());
        assert_eq!(result.return_code, 3);
        assert!(!result.success());
    }

    #[cfg(unix)]
    #[test]
    fn captures_stderr() {
        let result = run(&cmd(&["sh", "-c", "printf oops >&2"]), true, "").unwrap();
        assert!(result.stdout.is_empty());
        assert_eq!(result.stderr, b"oops");
        assert_eq!(result.return_code, 0);
        assert!(result.success());
    }

    #[cfg(unix)]
    #[test]
    fn work_dir_applies_to_child_only() {
        let dir = tempfile::tempdir().unwrap();
        let expected = std::fs::canonicalize(dir.path()).unwrap();

        let before = std::env::current_dir().unwrap();
        let result = run(&cmd(&["pwd"]), true, &dir.path().to_string_lossy()).unwrap();
        assert_eq!(std::env::current_dir().unwrap(), before);

        let reported = String::from_utf8_lossy(&result.stdout).trim().to_string();
        assert_eq!(
            std::fs::canonicalize(&reported).unwrap(),
            expected,
            "child should have run in the requested directory"
        );
    }

    #[test]
    fn local_temp_folder_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let cache_dir = dir.path().join("cache");
        let tmp = get_local_temp_folder(&cache_dir.to_string_lossy()).unwrap();
        assert!(opal_util::dir_exists(&tmp));
        assert!(tmp.ends_with("tmp"));
    }

    #[test]
    fn stderr_text_lossy_decodes() {
        let result = RunResult {
            stdout: Vec::new(),
            stderr: b"warning: \xff odd bytes".to_vec(),
            return_code: 0,
        };
        assert!(result.stderr_text().contains("warning:"));
    }
}
