//! Hash primitives: plain SHA-256 and the BIP-340-style tagged hash used by
//! the metadata Merkle tree.

use sha2::{Digest, Sha256};

/// `SHA256(data)`.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// `SHA256(SHA256(tag) || SHA256(tag) || msg)`, per BIP-340. Domain
/// separation lets the same underlying hash function serve leaves and
/// branches of the metadata Merkle tree without ambiguity between the two.
pub fn tagged_hash(tag: &str, msg: &[u8]) -> [u8; 32] {
    let tag_hash = sha256(tag.as_bytes());
    let mut hasher = Sha256::new();
    hasher.update(tag_hash);
    hasher.update(tag_hash);
    hasher.update(msg);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_empty() {
        let digest = sha256(b"");
        assert_eq!(
            hex::encode(digest),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn tagged_hash_is_deterministic() {
        let a = tagged_hash("ArkadeAssetLeaf", b"hello");
        let b = tagged_hash("ArkadeAssetLeaf", b"hello");
        assert_eq!(a, b);
    }

    #[test]
    fn tagged_hash_is_domain_separated() {
        let leaf = tagged_hash("ArkadeAssetLeaf", b"same bytes");
        let branch = tagged_hash("ArkadeAssetBranch", b"same bytes");
        assert_ne!(leaf, branch);
    }
}
