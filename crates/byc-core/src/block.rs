//! Blocks, headers, and chain tips.
//!
//! Canonical header encoding:
//!
//! ```text
//! version (4 LE) || prev_hash (32) || merkle_root (32) || timestamp (8 LE)
//!                || difficulty_bits (4 LE) || nonce (4 LE) || height (8 LE)
//! ```
//!
//! The header hash is double-SHA-256 over those bytes, and proof of work
//! compares it against the expanded target as a little-endian u256. Block
//! bodies length-prefix each transaction so that a block file has exactly
//! one valid parse.

use primitive_types::U256;
use serde::{Deserialize, Serialize};

use crate::constants::MAX_BLOCK_SIZE;
use crate::error::DecodeError;
use crate::hash::{hash256, Hash256};
use crate::serialize::{write_sized_bytes, write_varint, Reader};
use crate::target;
use crate::types::Transaction;

/// Serialized header length in bytes.
pub const HEADER_SIZE: usize = 4 + 32 + 32 + 8 + 4 + 4 + 8;

/// Block header carrying the proof-of-work puzzle.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct BlockHeader {
    pub version: u32,
    /// Hash of the parent block's header.
    pub prev_hash: Hash256,
    /// Merkle root over the block's transaction hashes.
    pub merkle_root: Hash256,
    /// Unix timestamp in seconds.
    pub timestamp: u64,
    /// Compact difficulty target.
    pub difficulty_bits: u32,
    pub nonce: u32,
    pub height: u64,
}

impl BlockHeader {
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(self.prev_hash.as_bytes());
        out.extend_from_slice(self.merkle_root.as_bytes());
        out.extend_from_slice(&self.timestamp.to_le_bytes());
        out.extend_from_slice(&self.difficulty_bits.to_le_bytes());
        out.extend_from_slice(&self.nonce.to_le_bytes());
        out.extend_from_slice(&self.height.to_le_bytes());
    }

    pub fn decode(reader: &mut Reader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            version: reader.read_u32()?,
            prev_hash: Hash256(reader.read_hash_bytes()?),
            merkle_root: Hash256(reader.read_hash_bytes()?),
            timestamp: reader.read_u64()?,
            difficulty_bits: reader.read_u32()?,
            nonce: reader.read_u32()?,
            height: reader.read_u64()?,
        })
    }

    /// Double-SHA-256 of the canonical header bytes.
    pub fn hash(&self) -> Hash256 {
        let mut buf = Vec::with_capacity(HEADER_SIZE);
        self.encode(&mut buf);
        hash256(&buf)
    }

    /// Whether this header's hash satisfies its own claimed difficulty.
    pub fn meets_target(&self) -> bool {
        target::hash_meets_bits(&self.hash(), self.difficulty_bits)
    }

    /// Work this header contributes to its chain.
    pub fn work(&self) -> U256 {
        target::work_from_bits(self.difficulty_bits)
    }
}

/// A complete block: header plus ordered transactions, coinbase first.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// The block's header hash.
    pub fn hash(&self) -> Hash256 {
        self.header.hash()
    }

    /// The coinbase transaction, if the block is non-empty.
    pub fn coinbase(&self) -> Option<&Transaction> {
        self.transactions.first()
    }

    /// Canonical block bytes: header, then varint count, then each
    /// transaction as a length-prefixed canonical encoding.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_SIZE + 64 * self.transactions.len());
        self.header.encode(&mut out);
        write_varint(&mut out, self.transactions.len() as u64);
        for tx in &self.transactions {
            write_sized_bytes(&mut out, &tx.encode());
        }
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = Reader::new(bytes);
        let header = BlockHeader::decode(&mut reader)?;
        let count = reader.read_count(MAX_BLOCK_SIZE)?;
        let mut transactions = Vec::with_capacity(count);
        for _ in 0..count {
            let tx_bytes = reader.read_sized_bytes(MAX_BLOCK_SIZE)?;
            transactions.push(Transaction::decode(&tx_bytes)?);
        }
        reader.finish()?;
        Ok(Self { header, transactions })
    }

    /// Serialized size in bytes.
    pub fn size(&self) -> usize {
        self.encode().len()
    }
}

/// The head of the best chain.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ChainTip {
    pub hash: Hash256,
    pub height: u64,
    /// Sum of `2^256 / (target + 1)` over this block and all ancestors.
    pub work: U256,
}

impl ChainTip {
    /// The tip of an empty chain, before any block is applied.
    pub fn empty() -> Self {
        Self { hash: Hash256::ZERO, height: 0, work: U256::zero() }
    }

    pub fn is_empty(&self) -> bool {
        self.hash.is_zero()
    }
}
