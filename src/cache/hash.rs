//! Content identity for query trees.

use std::io;

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Feeds serialized bytes straight into the digest.
struct DigestWriter<'a>(&'a mut Sha256);

impl io::Write for DigestWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Lowercase hex SHA-256 of the JSON form of `value`.
///
/// Trees that serialize identically share an id, so two structurally equal
/// queries built in different places hit the same cache entries.
pub fn compute_hash<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let mut hasher = Sha256::new();
    serde_json::to_writer(DigestWriter(&mut hasher), value)?;
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{constant, name, QueryRoot};

    fn adults(min: i64) -> QueryRoot {
        QueryRoot::select(name("p"))
            .iterate("p", name("Person"))
            .filter(name("p").attr("age").gt(constant(min)))
    }

    #[test]
    fn test_structurally_equal_trees_share_id() {
        let a = compute_hash(&adults(30)).unwrap();
        assert_eq!(a, compute_hash(&adults(30)).unwrap());
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_constants_are_part_of_identity() {
        assert_ne!(
            compute_hash(&adults(30)).unwrap(),
            compute_hash(&adults(31)).unwrap()
        );
    }
}
