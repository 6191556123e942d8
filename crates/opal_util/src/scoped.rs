//! Unique-id generation and scoped filesystem resources.
//!
//! Scoped resources release on every exit path via `Drop`: a panic or an
//! early `?` return cleans up the same way a normal scope exit does.

use rand::Rng;

use crate::error::UtilError;
use crate::fs::{dir_exists, file_exists, get_cwd, set_cwd};
use crate::path::append_path;

/// Url-safe alphabet used for unique ids (64 symbols).
const ID_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// Number of alphabet symbols per generated id (72 bits of entropy).
const ID_LEN: usize = 12;

/// Returns a fresh opaque id string.
///
/// Ids are drawn from the OS-seeded CSPRNG over a url-safe alphabet, so
/// any two calls are distinct with overwhelming probability, across
/// threads, processes, and hosts.
pub fn get_unique_id() -> String {
    let mut rng = rand::thread_rng();
    (0..ID_LEN)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect()
}

/// A reserved temporary path, removed when the value is dropped.
///
/// Construction only reserves the name `<base_path>/<unique-id><ext>`;
/// nothing is created on disk. The caller decides whether the path
/// becomes a file or a directory. On drop, a file is unlinked, a
/// directory is removed recursively, and a never-created path is a no-op.
pub struct TmpFile {
    path: String,
}

impl TmpFile {
    /// Reserves a unique path under `base_path` with the given extension
    /// (which should include the leading `.`, or be empty for a
    /// directory-style name).
    pub fn new(base_path: &str, ext: &str) -> Self {
        let name = format!("{}{ext}", get_unique_id());
        Self {
            path: append_path(base_path, &name),
        }
    }

    /// The reserved path.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Drop for TmpFile {
    fn drop(&mut self) {
        if file_exists(&self.path) {
            let _ = std::fs::remove_file(&self.path);
        } else if dir_exists(&self.path) {
            let _ = std::fs::remove_dir_all(&self.path);
        }
    }
}

/// A scoped change of the process working directory.
///
/// Construction remembers the current directory and switches to
/// `new_cwd`; drop restores the remembered directory. The CWD is
/// process-global, so all access goes through this guard.
pub struct ScopedWorkDir {
    old_cwd: String,
}

impl ScopedWorkDir {
    /// Switches the process CWD to `new_cwd` until the guard is dropped.
    pub fn new(new_cwd: &str) -> Result<Self, UtilError> {
        let old_cwd = get_cwd()?;
        set_cwd(new_cwd)?;
        Ok(Self { old_cwd })
    }
}

impl Drop for ScopedWorkDir {
    fn drop(&mut self) {
        let _ = set_cwd(&self.old_cwd);
    }
}
