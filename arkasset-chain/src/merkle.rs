//! A BIP-341-style domain-separated Merkle commitment over a sorted
//! key/value map, with proofs independently verifiable by a light client or
//! an on-chain verifier.

use crate::hash::{sha256, tagged_hash};
use crate::model::MetadataMap;
use crate::wire::WireEncode;

const LEAF_TAG: &str = "ArkadeAssetLeaf";
const BRANCH_TAG: &str = "ArkadeAssetBranch";
const LEAF_VERSION: u8 = 0x00;

/// The Merkle root of a metadata map, 32 bytes.
pub type Root = [u8; 32];

fn varstr(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len() + 5);
    crate::compactsize::CompactSize::from(s.len())
        .wire_encode(&mut out)
        .expect("writing to a Vec cannot fail");
    out.extend_from_slice(s.as_bytes());
    out
}

/// The leaf hash for a single `(key, value)` entry.
pub fn leaf_hash(key: &str, value: &str) -> [u8; 32] {
    let mut msg = Vec::with_capacity(1 + key.len() + value.len() + 10);
    msg.push(LEAF_VERSION);
    msg.extend(varstr(key));
    msg.extend(varstr(value));
    tagged_hash(LEAF_TAG, &msg)
}

/// The branch hash combining two sibling nodes. Siblings are sorted
/// lexicographically before hashing, which makes the tree order-independent
/// at each level.
pub fn branch_hash(a: [u8; 32], b: [u8; 32]) -> [u8; 32] {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let mut msg = Vec::with_capacity(64);
    msg.extend_from_slice(&lo);
    msg.extend_from_slice(&hi);
    tagged_hash(BRANCH_TAG, &msg)
}

/// One level of pairing, returning the next level's nodes plus, for every
/// entry at the current level, the sibling hash a proof for that entry would
/// need at this step (`None` for a lone promotion, which contributes
/// nothing to the proof).
fn pair_level(level: &[[u8; 32]]) -> (Vec<[u8; 32]>, Vec<Option<[u8; 32]>>) {
    let mut next = Vec::with_capacity(level.len().div_ceil(2));
    let mut siblings = vec![None; level.len()];
    let mut i = 0;
    while i < level.len() {
        if i + 1 < level.len() {
            next.push(branch_hash(level[i], level[i + 1]));
            siblings[i] = Some(level[i + 1]);
            siblings[i + 1] = Some(level[i]);
            i += 2;
        } else {
            // Lone odd entry promoted unchanged.
            next.push(level[i]);
            i += 1;
        }
    }
    (next, siblings)
}

/// The root of `map`. The empty map's root is `SHA256("")`.
pub fn root(map: &MetadataMap) -> Root {
    if map.is_empty() {
        return sha256(b"");
    }
    let mut level: Vec<[u8; 32]> = map
        .sorted_entries()
        .into_iter()
        .map(|(k, v)| leaf_hash(k, v))
        .collect();
    while level.len() > 1 {
        level = pair_level(&level).0;
    }
    level[0]
}

/// An ordered list of sibling hashes from the leaf up to (but not
/// including) the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proof(Vec<[u8; 32]>);

impl Proof {
    pub fn siblings(&self) -> &[[u8; 32]] {
        &self.0
    }
}

/// Builds the inclusion proof for `key` in `map`. Returns `None` if `key`
/// is absent.
pub fn proof(map: &MetadataMap, key: &str) -> Option<Proof> {
    let entries = map.sorted_entries();
    let mut index = entries.iter().position(|(k, _)| *k == key)?;
    let mut level: Vec<[u8; 32]> = entries
        .into_iter()
        .map(|(k, v)| leaf_hash(k, v))
        .collect();

    let mut siblings = Vec::new();
    while level.len() > 1 {
        let (next, level_siblings) = pair_level(&level);
        if let Some(sibling) = level_siblings[index] {
            siblings.push(sibling);
        }
        index /= 2;
        level = next;
    }
    Some(Proof(siblings))
}

/// Folds `proof` with `leaf` and compares the result to `expected_root`.
pub fn verify_proof(leaf: [u8; 32], proof: &Proof, expected_root: Root) -> bool {
    let folded = proof
        .0
        .iter()
        .fold(leaf, |acc, sibling| branch_hash(acc, *sibling));
    folded == expected_root
}
