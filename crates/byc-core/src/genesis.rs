//! The genesis block.
//!
//! The chain starts empty; the first block (height 1) is mined like any
//! other. This module builds the canonical genesis block from fixed
//! parameters so every node derives the same starting chain, and offers a
//! parameterized builder for test networks.

use crate::block::{Block, BlockHeader};
use crate::coin::CoinType;
use crate::hash::Hash256;
use crate::merkle;
use crate::reward;
use crate::script::templates::p2pkh_script;
use crate::target::MAX_TARGET_BITS;
use crate::types::{Transaction, TxOutput};

/// Fixed genesis timestamp (2024-01-01T00:00:00Z).
pub const GENESIS_TIMESTAMP: u64 = 1_704_067_200;

/// Payload carried in the canonical genesis coinbase.
pub const GENESIS_TAG: &[u8] = b"and it came to pass";

/// Build the block at height 1 on an empty chain.
///
/// The coinbase pays the full height-1 subsidy to `payout_address` in
/// `coin_type`. The nonce starts at zero; the caller mines it against
/// `difficulty_bits` if the target demands work.
pub fn genesis_block(
    payout_address: &[u8; 20],
    coin_type: CoinType,
    timestamp: u64,
    difficulty_bits: u32,
) -> Block {
    let coinbase = Transaction::new_coinbase(
        1,
        GENESIS_TAG,
        vec![TxOutput::new(reward::block_reward(1), p2pkh_script(payout_address))],
        coin_type,
    );
    let merkle_root = merkle::merkle_root(&[coinbase.hash()]);
    Block {
        header: BlockHeader {
            version: 1,
            prev_hash: Hash256::ZERO,
            merkle_root,
            timestamp,
            difficulty_bits,
            nonce: 0,
            height: 1,
        },
        transactions: vec![coinbase],
    }
}

/// The canonical genesis block: subsidy to the all-zero address in Leah,
/// fixed timestamp, easiest target.
pub fn canonical_genesis() -> Block {
    genesis_block(&[0u8; 20], CoinType::Leah, GENESIS_TIMESTAMP, MAX_TARGET_BITS)
}

/// The canonical genesis block hash.
pub fn genesis_hash() -> Hash256 {
    canonical_genesis().hash()
}
