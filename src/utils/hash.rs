//! Content hashing using FxHash.
//!
//! Loaded route modules carry a fingerprint of the bytes they were parsed
//! from, so summaries and logs can tell two versions of a unit apart.

use rustc_hash::FxHasher;
use std::hash::Hasher;

/// Compute 64-bit hash from byte data.
#[inline]
pub fn compute<T: AsRef<[u8]> + ?Sized>(data: &T) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write(data.as_ref());
    hasher.finish()
}

/// Compute hash and return as 16-char hex fingerprint.
#[inline]
pub fn fingerprint<T: AsRef<[u8]> + ?Sized>(value: &T) -> String {
    format!("{:016x}", compute(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_deterministic() {
        assert_eq!(compute("routes"), compute("routes"));
        assert_ne!(compute("routes"), compute("routes "));
    }

    #[test]
    fn test_fingerprint_length() {
        assert_eq!(fingerprint("[[routes]]").len(), 16);
    }
}
