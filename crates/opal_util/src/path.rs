//! Lexical path manipulation.
//!
//! These functions operate purely on strings and never touch the
//! filesystem. On Windows both `/` and `\` are accepted as separators on
//! input; outputs use the platform-native separator.

/// The platform-native path separator.
#[cfg(windows)]
pub const SEP: char = '\\';
/// The platform-native path separator.
#[cfg(not(windows))]
pub const SEP: char = '/';

#[cfg(windows)]
fn is_sep(c: char) -> bool {
    c == '/' || c == '\\'
}

#[cfg(not(windows))]
fn is_sep(c: char) -> bool {
    c == '/'
}

/// Joins a directory part and a file part with the native separator.
///
/// Returns `file` if `dir` is empty and `dir` if `file` is empty. The
/// result is plain concatenation: no canonicalization is performed.
pub fn append_path(dir: &str, file: &str) -> String {
    if dir.is_empty() {
        return file.to_string();
    }
    if file.is_empty() {
        return dir.to_string();
    }
    format!("{dir}{SEP}{file}")
}

/// Returns everything before the last separator, or `""` if there is none.
pub fn get_dir_part(path: &str) -> String {
    match path.rfind(is_sep) {
        Some(idx) => path[..idx].to_string(),
        None => String::new(),
    }
}

/// Returns everything after the last separator, or the whole string if
/// there is none.
pub fn get_file_part(path: &str) -> String {
    match path.rfind(is_sep) {
        Some(idx) => path[idx + 1..].to_string(),
        None => path.to_string(),
    }
}

/// Returns the extension of the file part, including the leading `.`.
///
/// Only the last `.` counts: `"a.tar.gz"` yields `".gz"`. Returns `""`
/// when the file part contains no `.`.
pub fn get_extension(path: &str) -> String {
    let file = get_file_part(path);
    match file.rfind('.') {
        Some(idx) => file[idx..].to_string(),
        None => String::new(),
    }
}

/// Returns `path` with its extension (as defined by [`get_extension`])
/// replaced by `new_ext`. `new_ext` should include the leading `.`.
pub fn change_extension(path: &str, new_ext: &str) -> String {
    let ext = get_extension(path);
    format!("{}{}", &path[..path.len() - ext.len()], new_ext)
}

/// Lexically canonicalizes a path.
///
/// Resolves `.` and `..` segments, collapses repeated separators,
/// converts separators to the platform-native form, uppercases a Windows
/// drive letter, and strips the trailing separator except at the
/// filesystem root. `..` past the root of an absolute path is absorbed;
/// leading `..` segments of a relative path are kept. Symlinks are not
/// dereferenced and the filesystem is never consulted.
pub fn canonicalize_path(path: &str) -> String {
    let (prefix, rest) = split_drive_prefix(path);
    let absolute = !prefix.is_empty() || rest.chars().next().map(is_sep).unwrap_or(false);

    let mut parts: Vec<&str> = Vec::new();
    for segment in rest.split(is_sep) {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.last().map(|p| *p != "..").unwrap_or(false) {
                    parts.pop();
                } else if !absolute {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }

    let joined = parts.join(&SEP.to_string());
    if absolute {
        format!("{prefix}{SEP}{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

/// Splits off a Windows drive prefix (`"C:"`, uppercased) from a path.
/// On other platforms the prefix is always empty.
#[cfg(windows)]
fn split_drive_prefix(path: &str) -> (String, &str) {
    let bytes = path.as_bytes();
    if bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic() {
        let letter = (bytes[0] as char).to_ascii_uppercase();
        (format!("{letter}:"), &path[2..])
    } else {
        (String::new(), path)
    }
}

#[cfg(not(windows))]
fn split_drive_prefix(path: &str) -> (String, &str) {
    (String::new(), path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_path_joins_with_separator() {
        let result = append_path("hello", "world");
        assert_eq!(result.len(), "hello".len() + "world".len() + 1);
        assert_eq!(result, format!("hello{SEP}world"));
    }

    #[test]
    fn append_path_empty_dir() {
        assert_eq!(append_path("", "world"), "world");
    }

    #[test]
    fn append_path_empty_file() {
        assert_eq!(append_path("hello", ""), "hello");
    }

    #[test]
    fn get_dir_part_with_dir() {
        let path = append_path("hello", "world");
        assert_eq!(get_dir_part(&path), "hello");
    }

    #[test]
    fn get_dir_part_without_dir() {
        assert_eq!(get_dir_part("world"), "");
    }

    #[test]
    fn get_file_part_with_dir() {
        let path = append_path("hello", "world");
        assert_eq!(get_file_part(&path), "world");
    }

    #[test]
    fn get_file_part_without_dir() {
        assert_eq!(get_file_part("world"), "world");
    }

    #[test]
    fn get_extension_simple() {
        let path = append_path("hello", "world") + ".ext";
        assert_eq!(get_extension(&path), ".ext");
    }

    #[test]
    fn get_extension_takes_last_of_many() {
        let path = append_path("hello", "world") + ".some.other.parts.ext";
        assert_eq!(get_extension(&path), ".ext");
    }

    #[test]
    fn get_extension_none() {
        assert_eq!(get_extension("hello"), "");
        assert_eq!(get_extension(&append_path("some.dir", "file")), "");
    }

    #[test]
    fn change_extension_replaces_suffix() {
        assert_eq!(change_extension("out/main.o", ".d"), "out/main.d");
        assert_eq!(change_extension("main", ".o"), "main.o");
    }

    #[cfg(not(windows))]
    mod posix {
        use super::super::*;

        #[test]
        fn canonicalize_dot_segments() {
            assert_eq!(canonicalize_path("/foo/././bar/."), "/foo/bar");
        }

        #[test]
        fn canonicalize_dotdot_segments() {
            assert_eq!(canonicalize_path("/foo/./../bar/."), "/bar");
        }

        #[test]
        fn canonicalize_to_root() {
            assert_eq!(canonicalize_path("/foo/.///../bar/.."), "/");
        }

        #[test]
        fn canonicalize_strips_trailing_separator() {
            assert_eq!(canonicalize_path("/foo/bar/"), "/foo/bar");
        }

        #[test]
        fn canonicalize_absorbs_dotdot_past_root() {
            assert_eq!(canonicalize_path("/../../foo"), "/foo");
        }

        #[test]
        fn canonicalize_relative_keeps_leading_dotdot() {
            assert_eq!(canonicalize_path("../foo/../bar"), "../bar");
        }

        #[test]
        fn canonicalize_relative_reducing_to_nothing() {
            assert_eq!(canonicalize_path("foo/.."), ".");
        }
    }

    #[cfg(windows)]
    mod windows {
        use super::super::*;

        #[test]
        fn canonicalize_dot_segments() {
            assert_eq!(canonicalize_path("C:\\foo\\.\\.\\bar\\."), "C:\\foo\\bar");
        }

        #[test]
        fn canonicalize_dotdot_segments() {
            assert_eq!(canonicalize_path("C:\\foo\\.\\..\\bar\\."), "C:\\bar");
        }

        #[test]
        fn canonicalize_to_root() {
            assert_eq!(canonicalize_path("C:\\foo\\.\\\\\\..\\bar\\.."), "C:\\");
        }

        #[test]
        fn canonicalize_mixed_separators_and_case() {
            assert_eq!(canonicalize_path("c:\\foo/bar\\"), "C:\\foo\\bar");
        }
    }
}
