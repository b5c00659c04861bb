//! Merkle tree over transaction hashes.
//!
//! Pair hash is `hash256(left || right)`; odd layers duplicate their last
//! element before pairing; a single leaf is its own root; an empty tree's
//! root is [`Hash256::ZERO`].

use serde::{Deserialize, Serialize};

use crate::hash::{hash256_pair, Hash256};

/// Compute the merkle root of an ordered list of transaction hashes.
pub fn merkle_root(leaves: &[Hash256]) -> Hash256 {
    if leaves.is_empty() {
        return Hash256::ZERO;
    }
    let mut current = leaves.to_vec();
    while current.len() > 1 {
        current = next_layer(&current);
    }
    current[0]
}

/// Pair adjacent hashes, duplicating the last on odd counts.
fn next_layer(layer: &[Hash256]) -> Vec<Hash256> {
    let mut next = Vec::with_capacity(layer.len().div_ceil(2));
    let mut i = 0;
    while i < layer.len() {
        let left = &layer[i];
        let right = if i + 1 < layer.len() { &layer[i + 1] } else { left };
        next.push(hash256_pair(left.as_bytes(), right.as_bytes()));
        i += 2;
    }
    next
}

/// Which side a proof sibling sits on.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// One step of an inclusion proof.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ProofStep {
    pub hash: Hash256,
    pub side: Side,
}

/// An inclusion proof from a leaf to the root.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MerkleProof {
    pub leaf: Hash256,
    pub path: Vec<ProofStep>,
}

impl MerkleProof {
    /// Recompute the root implied by this proof.
    pub fn compute_root(&self) -> Hash256 {
        let mut acc = self.leaf;
        for step in &self.path {
            acc = match step.side {
                Side::Left => hash256_pair(step.hash.as_bytes(), acc.as_bytes()),
                Side::Right => hash256_pair(acc.as_bytes(), step.hash.as_bytes()),
            };
        }
        acc
    }

    pub fn verify(&self, root: Hash256) -> bool {
        self.compute_root() == root
    }
}

/// Full tree retaining every layer, for proof extraction.
#[derive(Clone, Debug)]
pub struct MerkleTree {
    /// `layers[0]` holds the leaves; the last layer holds only the root.
    layers: Vec<Vec<Hash256>>,
}

impl MerkleTree {
    pub fn from_leaves(leaves: &[Hash256]) -> Self {
        if leaves.is_empty() {
            return Self { layers: Vec::new() };
        }
        let mut layers = vec![leaves.to_vec()];
        while layers.last().expect("at least one layer").len() > 1 {
            let next = next_layer(layers.last().expect("at least one layer"));
            layers.push(next);
        }
        Self { layers }
    }

    pub fn root(&self) -> Hash256 {
        self.layers
            .last()
            .and_then(|layer| layer.first())
            .copied()
            .unwrap_or(Hash256::ZERO)
    }

    pub fn leaf_count(&self) -> usize {
        self.layers.first().map_or(0, Vec::len)
    }

    /// Inclusion proof for the leaf at `index`, or `None` when out of range.
    pub fn proof(&self, index: usize) -> Option<MerkleProof> {
        let leaves = self.layers.first()?;
        if index >= leaves.len() {
            return None;
        }
        let mut path = Vec::new();
        let mut pos = index;
        for layer in &self.layers[..self.layers.len() - 1] {
            let sibling_pos = pos ^ 1;
            let sibling = if sibling_pos < layer.len() { layer[sibling_pos] } else { layer[pos] };
            let side = if pos % 2 == 0 { Side::Right } else { Side::Left };
            path.push(ProofStep { hash: sibling, side });
            pos /= 2;
        }
        Some(MerkleProof { leaf: leaves[index], path })
    }
}
