//! Content hash of a refined row.

use sha2::{Digest, Sha256};

const SEPARATOR: &[u8] = b"||";
/// Written for a null value, so that null and `""` hash differently.
const NULL_MARKER: &[u8] = b"\0";

/// SHA-256 (hex) of `values` joined by `||`, with null written as a NUL byte.
///
/// Callers pass the output columns in a fixed order so equal rows hash equally
/// across runs.
pub fn row_hash(values: &[Option<&str>]) -> String {
    let mut hasher = Sha256::new();
    for (index, value) in values.iter().enumerate() {
        if index > 0 {
            hasher.update(SEPARATOR);
        }
        match value {
            Some(value) => hasher.update(value.as_bytes()),
            None => hasher.update(NULL_MARKER),
        }
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_sha256_of_joined_text() {
        let expected = hex::encode(Sha256::digest(b"S1||2021-10-01 00:00:00||SYD01"));
        assert_eq!(
            row_hash(&[Some("S1"), Some("2021-10-01 00:00:00"), Some("SYD01")]),
            expected
        );
    }

    #[test]
    fn test_null_differs_from_empty() {
        assert_ne!(row_hash(&[Some("a"), None]), row_hash(&[Some("a"), Some("")]));
        assert_ne!(row_hash(&[Some("a"), None]), row_hash(&[Some("a")]));
        assert_eq!(
            row_hash(&[Some("a"), None]),
            hex::encode(Sha256::digest(b"a||\0"))
        );
    }

    #[test]
    fn test_hex_length() {
        assert_eq!(row_hash(&[]).len(), 64);
    }
}
