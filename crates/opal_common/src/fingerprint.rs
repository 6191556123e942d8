//! Invocation fingerprints and the streaming accumulator that produces them.
//!
//! A fingerprint identifies one cacheable tool invocation: two invocations
//! with the same fingerprint are assumed to produce identical outputs. The
//! accumulator ingests labeled, length-prefixed segments so that distinct
//! segment sequences can never alias under concatenation.

use sha2::{Digest, Sha256};
use std::fmt;

/// A 256-bit digest identifying a cacheable invocation.
///
/// The value is opaque: its only contract is that it is a pure,
/// collision-resistant function of the segments fed to the
/// [`FingerprintHasher`] that produced it.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Returns the raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Returns the digest as a 64-character lowercase hex string.
    ///
    /// This is the form used as the cache entry key on disk.
    pub fn hex(&self) -> String {
        format!("{self}")
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({:02x}{:02x}..)", self.0[0], self.0[1])
    }
}

/// Streaming accumulator yielding a [`Fingerprint`].
///
/// Each ingested segment is framed as
/// `LE64(label len) || label || LE64(data len) || data`, so neither
/// reordering segments nor moving bytes across a segment boundary can
/// produce the same digest.
pub struct FingerprintHasher {
    inner: Sha256,
}

impl FingerprintHasher {
    /// Creates an empty accumulator.
    pub fn new() -> Self {
        Self {
            inner: Sha256::new(),
        }
    }

    /// Feeds one labeled segment into the accumulator.
    pub fn feed(&mut self, label: &str, data: &[u8]) {
        self.inner.update((label.len() as u64).to_le_bytes());
        self.inner.update(label.as_bytes());
        self.inner.update((data.len() as u64).to_le_bytes());
        self.inner.update(data);
    }

    /// Consumes the accumulator and returns the fingerprint.
    pub fn finish(self) -> Fingerprint {
        let digest = self.inner.finalize();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        Fingerprint(bytes)
    }
}

impl Default for FingerprintHasher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest_of(segments: &[(&str, &[u8])]) -> Fingerprint {
        let mut h = FingerprintHasher::new();
        for (label, data) in segments {
            h.feed(label, data);
        }
        h.finish()
    }

    #[test]
    fn deterministic() {
        let a = digest_of(&[("arg", b"-c"), ("arg", b"main.c")]);
        let b = digest_of(&[("arg", b"-c"), ("arg", b"main.c")]);
        assert_eq!(a, b);
    }

    #[test]
    fn data_sensitivity() {
        let a = digest_of(&[("arg", b"-O2")]);
        let b = digest_of(&[("arg", b"-O3")]);
        assert_ne!(a, b);
    }

    #[test]
    fn label_sensitivity() {
        let a = digest_of(&[("arg", b"value")]);
        let b = digest_of(&[("env", b"value")]);
        assert_ne!(a, b);
    }

    #[test]
    fn order_sensitivity() {
        let a = digest_of(&[("arg", b"-c"), ("arg", b"main.c")]);
        let b = digest_of(&[("arg", b"main.c"), ("arg", b"-c")]);
        assert_ne!(a, b);
    }

    #[test]
    fn segment_boundaries_do_not_alias() {
        let a = digest_of(&[("arg", b"ab"), ("arg", b"c")]);
        let b = digest_of(&[("arg", b"a"), ("arg", b"bc")]);
        assert_ne!(a, b);
    }

    #[test]
    fn label_and_data_do_not_alias() {
        let a = digest_of(&[("argx", b"y")]);
        let b = digest_of(&[("arg", b"xy")]);
        assert_ne!(a, b);
    }

    #[test]
    fn empty_segment_still_counts() {
        let a = digest_of(&[("input", b"")]);
        let b = digest_of(&[]);
        assert_ne!(a, b);
    }

    #[test]
    fn hex_is_64_chars() {
        let fp = digest_of(&[("format", b"1")]);
        let hex = fp.hex();
        assert_eq!(hex.len(), 64);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hex, format!("{fp}"));
    }

    #[test]
    fn debug_abbreviated() {
        let fp = digest_of(&[("format", b"1")]);
        let s = format!("{fp:?}");
        assert!(s.starts_with("Fingerprint("));
    }
}
