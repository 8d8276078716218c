//! Attachment content digests.
//!
//! Packages produced before this service existed carry MD5 checksums, so the
//! digest here must stay MD5 for sign/validate round-trips to keep matching.
//! The digest only detects accidental tampering between packaging and
//! validation; the cryptographic guarantee comes from the external signature.

use std::{fs, path::Path};

use md5::{Digest, Md5};

use crate::error::Result;

/// Compute the lowercase-hex MD5 digest of a file's full contents.
///
/// Deterministic: identical bytes always produce the identical digest.
/// Fails with an I/O error if the file is missing or unreadable.
pub fn file_digest(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;
    Ok(bytes_digest(&bytes))
}

/// Compute the lowercase-hex MD5 digest of a byte slice.
pub fn bytes_digest(bytes: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_digest() {
        // Well-known MD5 of "hello"
        assert_eq!(bytes_digest(b"hello"), "5d41402abc4b2a76b9719d911017c592");
    }

    #[test]
    fn deterministic_and_sensitive() {
        let a = bytes_digest(b"attachment contents");
        let b = bytes_digest(b"attachment contents");
        let c = bytes_digest(b"attachment content!");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn file_digest_matches_bytes_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("att1.pdf");
        fs::write(&path, b"%PDF-1.4 fake").unwrap();

        assert_eq!(file_digest(&path).unwrap(), bytes_digest(b"%PDF-1.4 fake"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = file_digest(Path::new("./does/not/exist")).unwrap_err();
        assert_eq!(err.code(), "io_error");
    }
}
