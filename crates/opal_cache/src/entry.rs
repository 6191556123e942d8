//! Cache entry metadata and its on-disk framing.
//!
//! Every entry directory holds an `entry.bin` describing the recorded
//! invocation result, framed as a 4-byte little-endian header length
//! followed by the bincode-encoded header. The header carries magic
//! bytes, a format version, and per-payload checksums so that decoding
//! can validate everything before a hit is reported.

use opal_common::ContentHash;
use serde::{Deserialize, Serialize};

use crate::error::CacheError;

/// Magic bytes identifying an Opal cache entry.
const ENTRY_MAGIC: [u8; 4] = *b"OPAL";

/// Current entry format version. Increment on breaking changes to the
/// header or payload layout.
const ENTRY_FORMAT_VERSION: u32 = 1;

/// Header written at the front of every `entry.bin`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryHeader {
    /// Magic bytes: must be `b"OPAL"`.
    pub magic: [u8; 4],

    /// Entry format version.
    pub format_version: u32,

    /// Opal version that produced this entry.
    pub producer_version: String,

    /// The recorded invocation result.
    pub meta: EntryMeta,
}

/// The recorded result of one cached invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryMeta {
    /// The tool's exit code.
    pub return_code: i32,

    /// The tool's captured stdout, replayed on a hit.
    pub stdout: Vec<u8>,

    /// The tool's captured stderr, replayed on a hit.
    pub stderr: Vec<u8>,

    /// One record per stored payload file.
    pub files: Vec<PayloadInfo>,
}

/// Description of one stored payload file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayloadInfo {
    /// The logical output role (`"object"`, `"dep"`, …).
    pub role: String,

    /// The payload's file name within the entry directory.
    pub file_name: String,

    /// The payload size in bytes.
    pub size: u64,

    /// Content hash of the payload (for integrity checks).
    pub checksum: ContentHash,
}

/// Encodes an entry's metadata into the framed `entry.bin` form.
pub fn encode_entry(producer_version: &str, meta: &EntryMeta) -> Result<Vec<u8>, CacheError> {
    let header = EntryHeader {
        magic: ENTRY_MAGIC,
        format_version: ENTRY_FORMAT_VERSION,
        producer_version: producer_version.to_string(),
        meta: meta.clone(),
    };

    let header_bytes = bincode::serde::encode_to_vec(&header, bincode::config::standard())
        .map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })?;

    let header_len = header_bytes.len() as u32;
    let mut output = Vec::with_capacity(4 + header_bytes.len());
    output.extend_from_slice(&header_len.to_le_bytes());
    output.extend_from_slice(&header_bytes);
    Ok(output)
}

/// Decodes a framed `entry.bin`, validating magic and format version.
///
/// Returns `None` for any truncation, corruption, or version mismatch.
/// This is fail-safe: a bad entry reads as a cache miss.
pub fn decode_entry(raw: &[u8]) -> Option<EntryMeta> {
    if raw.len() < 4 {
        return None;
    }
    let header_len = u32::from_le_bytes(raw[..4].try_into().ok()?) as usize;
    if raw.len() < 4 + header_len {
        return None;
    }

    let header: EntryHeader =
        bincode::serde::decode_from_slice(&raw[4..4 + header_len], bincode::config::standard())
            .ok()?
            .0;

    if header.magic != ENTRY_MAGIC {
        return None;
    }
    if header.format_version != ENTRY_FORMAT_VERSION {
        return None;
    }
    Some(header.meta)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_meta() -> EntryMeta {
        EntryMeta {
            return_code: 0,
            stdout: b"".to_vec(),
            stderr: b"warning: unused variable\n".to_vec(),
            files: vec![PayloadInfo {
                role: "object".to_string(),
                file_name: "object".to_string(),
                size: 11,
                checksum: ContentHash::from_bytes(b"object code"),
            }],
        }
    }

    #[test]
    fn encode_decode_roundtrip() {
        let meta = sample_meta();
        let encoded = encode_entry("0.1.0", &meta).unwrap();
        let decoded = decode_entry(&encoded).unwrap();
        assert_eq!(decoded.return_code, 0);
        assert_eq!(decoded.stderr, meta.stderr);
        assert_eq!(decoded.files.len(), 1);
        assert_eq!(decoded.files[0].role, "object");
        assert_eq!(decoded.files[0].checksum, meta.files[0].checksum);
    }

    #[test]
    fn decode_truncated_returns_none() {
        assert!(decode_entry(b"").is_none());
        assert!(decode_entry(b"AB").is_none());

        let encoded = encode_entry("0.1.0", &sample_meta()).unwrap();
        assert!(decode_entry(&encoded[..encoded.len() / 2]).is_none());
    }

    #[test]
    fn decode_garbage_returns_none() {
        assert!(decode_entry(b"garbage data that is not an entry").is_none());
    }

    #[test]
    fn decode_wrong_magic_returns_none() {
        let header = EntryHeader {
            magic: *b"BAAD",
            format_version: ENTRY_FORMAT_VERSION,
            producer_version: "0.1.0".to_string(),
            meta: sample_meta(),
        };
        let header_bytes =
            bincode::serde::encode_to_vec(&header, bincode::config::standard()).unwrap();
        let mut output = Vec::new();
        output.extend_from_slice(&(header_bytes.len() as u32).to_le_bytes());
        output.extend_from_slice(&header_bytes);

        assert!(decode_entry(&output).is_none());
    }

    #[test]
    fn decode_wrong_version_returns_none() {
        let header = EntryHeader {
            magic: ENTRY_MAGIC,
            format_version: 999,
            producer_version: "0.1.0".to_string(),
            meta: sample_meta(),
        };
        let header_bytes =
            bincode::serde::encode_to_vec(&header, bincode::config::standard()).unwrap();
        let mut output = Vec::new();
        output.extend_from_slice(&(header_bytes.len() as u32).to_le_bytes());
        output.extend_from_slice(&header_bytes);

        assert!(decode_entry(&output).is_none());
    }
}
