//! The fingerprint-keyed local store.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use opal_common::{ContentHash, Fingerprint};
use tracing::{debug, warn};

use crate::entry::{decode_entry, encode_entry, EntryMeta, PayloadInfo};
use crate::error::CacheError;

/// Subdirectory holding one directory per cached fingerprint.
const ENTRIES_SUBDIR: &str = "entries";

/// Scratch subdirectory for staged inserts.
const TMP_SUBDIR: &str = "tmp";

/// File name of the framed metadata inside each entry directory.
const ENTRY_FILE: &str = "entry.bin";

/// Recency stamp file, rewritten on every hit for LRU eviction.
const USED_FILE: &str = "used";

/// A validated cache hit.
///
/// Holds the decoded metadata and the entry directory, from which the
/// orchestrator links or copies payloads into place.
#[derive(Debug)]
pub struct CachedEntry {
    /// The recorded invocation result.
    pub meta: EntryMeta,
    dir: PathBuf,
}

impl CachedEntry {
    /// The on-disk path of the payload stored under `role`, if the entry
    /// recorded one.
    pub fn payload_path(&self, role: &str) -> Option<PathBuf> {
        self.meta
            .files
            .iter()
            .find(|f| f.role == role)
            .map(|f| self.dir.join(&f.file_name))
    }
}

/// The local, fingerprint-keyed cache store.
///
/// Layout: `<cache_dir>/entries/<fingerprint-hex>/` with `entry.bin`
/// plus one payload file per role. `lookup` is side-effect free apart
/// from refreshing the hit entry's recency stamp; `insert` is atomic per
/// fingerprint via rename.
pub struct LocalStore {
    cache_dir: PathBuf,
    max_size: u64,
}

impl LocalStore {
    /// Creates a store rooted at `cache_dir` with the given byte budget.
    pub fn new(cache_dir: &Path, max_size: u64) -> Self {
        Self {
            cache_dir: cache_dir.to_path_buf(),
            max_size,
        }
    }

    fn entries_dir(&self) -> PathBuf {
        self.cache_dir.join(ENTRIES_SUBDIR)
    }

    fn entry_dir(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.entries_dir().join(fingerprint.hex())
    }

    /// Looks up a fingerprint, validating the entry before reporting it.
    ///
    /// Returns `None` for a missing entry and for every kind of damage:
    /// truncated or corrupt metadata, a missing payload, a size or
    /// checksum mismatch. A hit refreshes the entry's recency stamp.
    pub fn lookup(&self, fingerprint: &Fingerprint) -> Option<CachedEntry> {
        let dir = self.entry_dir(fingerprint);
        let raw = std::fs::read(dir.join(ENTRY_FILE)).ok()?;
        let meta = decode_entry(&raw)?;

        for file in &meta.files {
            let path = dir.join(&file.file_name);
            let metadata = std::fs::metadata(&path).ok()?;
            if metadata.len() != file.size {
                debug!(path = %path.display(), "payload size mismatch; treating as miss");
                return None;
            }
            let checksum = ContentHash::from_file(&path).ok()?;
            if checksum != file.checksum {
                debug!(path = %path.display(), "payload checksum mismatch; treating as miss");
                return None;
            }
        }

        // Refresh the LRU stamp. Failure only skews eviction order.
        let _ = std::fs::write(dir.join(USED_FILE), b"");

        Some(CachedEntry { meta, dir })
    }

    /// Inserts an entry for `fingerprint`.
    ///
    /// `payloads` maps each logical role to the produced file to record.
    /// The entry is staged under the scratch directory and renamed into
    /// place; a concurrent insert for the same fingerprint resolves
    /// last-writer-wins. After a successful insert the size budget is
    /// enforced. Returns the number of entries evicted.
    pub fn insert(
        &self,
        fingerprint: &Fingerprint,
        return_code: i32,
        stdout: &[u8],
        stderr: &[u8],
        payloads: &[(String, String)],
    ) -> Result<usize, CacheError> {
        let tmp_root = self.cache_dir.join(TMP_SUBDIR);
        std::fs::create_dir_all(&tmp_root).map_err(|e| CacheError::Io {
            path: tmp_root.clone(),
            source: e,
        })?;
        std::fs::create_dir_all(self.entries_dir()).map_err(|e| CacheError::Io {
            path: self.entries_dir(),
            source: e,
        })?;

        let stage = tmp_root.join(opal_util::get_unique_id());
        std::fs::create_dir(&stage).map_err(|e| CacheError::Io {
            path: stage.clone(),
            source: e,
        })?;

        let result = self.populate_stage(&stage, return_code, stdout, stderr, payloads);
        if result.is_err() {
            let _ = std::fs::remove_dir_all(&stage);
            result?;
        }

        let dest = self.entry_dir(fingerprint);
        if let Err(e) = std::fs::rename(&stage, &dest) {
            // A concurrent insert got there first: replace it.
            let _ = std::fs::remove_dir_all(&dest);
            if let Err(e2) = std::fs::rename(&stage, &dest) {
                let _ = std::fs::remove_dir_all(&stage);
                debug!(error = %e, retry_error = %e2, "entry rename failed");
                return Err(CacheError::Io {
                    path: dest,
                    source: e2,
                });
            }
        }

        self.enforce_size_budget()
    }

    fn populate_stage(
        &self,
        stage: &Path,
        return_code: i32,
        stdout: &[u8],
        stderr: &[u8],
        payloads: &[(String, String)],
    ) -> Result<(), CacheError> {
        let mut files = Vec::with_capacity(payloads.len());
        for (role, src) in payloads {
            let src_path = Path::new(src);
            let dst = stage.join(role);
            std::fs::copy(src_path, &dst).map_err(|e| CacheError::Io {
                path: src_path.to_path_buf(),
                source: e,
            })?;
            let size = std::fs::metadata(&dst)
                .map_err(|e| CacheError::Io {
                    path: dst.clone(),
                    source: e,
                })?
                .len();
            let checksum = ContentHash::from_file(&dst).map_err(|e| CacheError::Io {
                path: dst.clone(),
                source: e,
            })?;
            files.push(PayloadInfo {
                role: role.clone(),
                file_name: role.clone(),
                size,
                checksum,
            });
        }

        let meta = EntryMeta {
            return_code,
            stdout: stdout.to_vec(),
            stderr: stderr.to_vec(),
            files,
        };
        let encoded = encode_entry(env!("CARGO_PKG_VERSION"), &meta)?;
        let entry_path = stage.join(ENTRY_FILE);
        std::fs::write(&entry_path, encoded).map_err(|e| CacheError::Io {
            path: entry_path,
            source: e,
        })?;
        Ok(())
    }

    /// Removes least-recently-used entries until the store fits its byte
    /// budget. Returns the number of entries evicted.
    pub fn enforce_size_budget(&self) -> Result<usize, CacheError> {
        let entries = self.scan_entries()?;
        let mut total: u64 = entries.iter().map(|e| e.size).sum();
        if total <= self.max_size {
            return Ok(0);
        }

        let mut by_age = entries;
        by_age.sort_by_key(|e| e.last_used);

        let mut evicted = 0;
        for entry in by_age {
            if total <= self.max_size {
                break;
            }
            match std::fs::remove_dir_all(&entry.path) {
                Ok(()) => {
                    total = total.saturating_sub(entry.size);
                    evicted += 1;
                    debug!(path = %entry.path.display(), "evicted cache entry");
                }
                Err(e) => warn!(path = %entry.path.display(), error = %e, "eviction failed"),
            }
        }
        Ok(evicted)
    }

    /// The total size in bytes of all cached entries.
    pub fn size(&self) -> Result<u64, CacheError> {
        Ok(self.scan_entries()?.iter().map(|e| e.size).sum())
    }

    /// The number of cached entries.
    pub fn entry_count(&self) -> Result<usize, CacheError> {
        Ok(self.scan_entries()?.len())
    }

    /// Removes every cached entry and staged temp file.
    pub fn clear(&self) -> Result<(), CacheError> {
        for subdir in [ENTRIES_SUBDIR, TMP_SUBDIR] {
            let dir = self.cache_dir.join(subdir);
            if dir.exists() {
                std::fs::remove_dir_all(&dir).map_err(|e| CacheError::Io {
                    path: dir.clone(),
                    source: e,
                })?;
            }
        }
        Ok(())
    }

    fn scan_entries(&self) -> Result<Vec<ScannedEntry>, CacheError> {
        let dir = self.entries_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        let iter = std::fs::read_dir(&dir).map_err(|e| CacheError::Io {
            path: dir.clone(),
            source: e,
        })?;
        for item in iter {
            let item = item.map_err(|e| CacheError::Io {
                path: dir.clone(),
                source: e,
            })?;
            let path = item.path();
            if !path.is_dir() {
                continue;
            }
            entries.push(ScannedEntry {
                size: dir_size(&path),
                last_used: entry_recency(&path),
                path,
            });
        }
        Ok(entries)
    }
}

struct ScannedEntry {
    path: PathBuf,
    size: u64,
    last_used: SystemTime,
}

/// Sums the sizes of the files directly inside an entry directory.
fn dir_size(dir: &Path) -> u64 {
    let Ok(iter) = std::fs::read_dir(dir) else {
        return 0;
    };
    iter.flatten()
        .filter_map(|item| item.metadata().ok())
        .filter(|m| m.is_file())
        .map(|m| m.len())
        .sum()
}

/// The entry's recency: the `used` stamp if present, else the metadata
/// file, else the epoch (evict first).
fn entry_recency(dir: &Path) -> SystemTime {
    for name in [USED_FILE, ENTRY_FILE] {
        if let Ok(m) = std::fs::metadata(dir.join(name)) {
            if let Ok(t) = m.modified() {
                return t;
            }
        }
    }
    SystemTime::UNIX_EPOCH
}
