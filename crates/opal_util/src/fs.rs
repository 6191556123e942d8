//! Filesystem helpers: existence predicates, working-directory access,
//! atomic writes, hard-link-or-copy materialization, and executable
//! resolution.

use crate::error::UtilError;
use crate::path::{append_path, canonicalize_path};
use crate::scoped::get_unique_id;

/// Returns `true` if `path` names an existing regular file.
///
/// Never fails: any underlying error reads as "does not exist".
pub fn file_exists(path: &str) -> bool {
    std::fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
}

/// Returns `true` if `path` names an existing directory.
///
/// Never fails: any underlying error reads as "does not exist". On
/// Windows a bare drive letter (`"C:"`) reports as an existing directory,
/// matching platform convention.
pub fn dir_exists(path: &str) -> bool {
    #[cfg(windows)]
    if is_bare_drive_letter(path) {
        return true;
    }
    std::fs::metadata(path).map(|m| m.is_dir()).unwrap_or(false)
}

#[cfg(windows)]
fn is_bare_drive_letter(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() == 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic()
}

/// Creates a directory, including missing parents.
pub fn create_dir(path: &str) -> Result<(), UtilError> {
    std::fs::create_dir_all(path).map_err(|e| UtilError::io("create_dir", path, e))
}

/// Returns the current working directory of the process.
pub fn get_cwd() -> Result<String, UtilError> {
    let cwd = std::env::current_dir().map_err(|e| UtilError::io("get_cwd", "", e))?;
    Ok(canonicalize_path(&cwd.to_string_lossy()))
}

/// Sets the current working directory of the process.
pub fn set_cwd(path: &str) -> Result<(), UtilError> {
    std::env::set_current_dir(path).map_err(|e| UtilError::io("set_cwd", path, e))
}

/// Returns the OS-provided temporary directory, canonicalized.
pub fn get_temp_dir() -> String {
    canonicalize_path(&std::env::temp_dir().to_string_lossy())
}

/// Atomically writes `data` to `path`.
///
/// The data is first written to a uniquely named sibling file and then
/// renamed over `path`, so readers observe either the old contents or the
/// new contents, never a torn state.
pub fn write(data: &[u8], path: &str) -> Result<(), UtilError> {
    let tmp_path = format!("{path}.{}.tmp", get_unique_id());
    std::fs::write(&tmp_path, data).map_err(|e| UtilError::io("write", &tmp_path, e))?;
    if let Err(e) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(UtilError::io("rename", path, e));
    }
    Ok(())
}

/// Materializes `src` at `dst`, replacing any existing file.
///
/// When `allow_hard_link` is true a hard link is attempted first; on
/// failure (or when links are disallowed) the contents are copied.
pub fn link_or_copy(src: &str, dst: &str, allow_hard_link: bool) -> Result<(), UtilError> {
    if file_exists(dst) {
        std::fs::remove_file(dst).map_err(|e| UtilError::io("remove_file", dst, e))?;
    }
    if allow_hard_link && std::fs::hard_link(src, dst).is_ok() {
        return Ok(());
    }
    std::fs::copy(src, dst).map_err(|e| UtilError::io("copy", dst, e))?;
    Ok(())
}

/// Locates the executable for `name`.
///
/// A name containing a path separator is canonicalized and checked
/// directly. A bare name is searched for in the directories of `PATH`,
/// skipping any directory that canonicalizes to `exclude_dir` — this
/// keeps a shim that shadows the real tool from resolving to itself.
/// On Windows the `.exe` suffix is probed as well.
pub fn find_executable(name: &str, exclude_dir: &str) -> Result<String, UtilError> {
    let has_separator = name.contains('/') || (cfg!(windows) && name.contains('\\'));
    if has_separator {
        let path = canonicalize_path(name);
        if is_executable(&path) {
            return Ok(path);
        }
        return Err(UtilError::ExecutableNotFound {
            name: name.to_string(),
        });
    }

    let excluded = if exclude_dir.is_empty() {
        String::new()
    } else {
        canonicalize_path(exclude_dir)
    };

    let search_path = std::env::var_os("PATH").unwrap_or_default();
    for dir in std::env::split_paths(&search_path) {
        let dir = canonicalize_path(&dir.to_string_lossy());
        if dir.is_empty() || (!excluded.is_empty() && dir == excluded) {
            continue;
        }
        for candidate in candidate_names(&dir, name) {
            if is_executable(&candidate) {
                return Ok(candidate);
            }
        }
    }

    Err(UtilError::ExecutableNotFound {
        name: name.to_string(),
    })
}

#[cfg(windows)]
fn candidate_names(dir: &str, name: &str) -> Vec<String> {
    vec![
        append_path(dir, name),
        append_path(dir, &format!("{name}.exe")),
    ]
}

#[cfg(not(windows))]
fn candidate_names(dir: &str, name: &str) -> Vec<String> {
    vec![append_path(dir, name)]
}

#[cfg(unix)]
fn is_executable(path: &str) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &str) -> bool {
    file_exists(path)
}
