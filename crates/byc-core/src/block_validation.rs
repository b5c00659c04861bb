//! Block validation.
//!
//! - **Structural** ([`validate_block_structure`]): context-free — coinbase
//!   placement, committed height, duplicate txids, merkle root, size, and
//!   the header's own proof of work.
//! - **Contextual** ([`validate_block`]): linkage to the expected parent,
//!   difficulty schedule, timestamp window, per-transaction contextual
//!   validation with intra-block chaining and double-spend detection, and
//!   the coinbase reward bound.
//!
//! The same pathway verifies blocks a miner is about to publish and blocks
//! arriving from outside.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::block::Block;
use crate::constants::{MAX_BLOCK_SIZE, MAX_FUTURE_BLOCK_TIME};
use crate::error::{BlockError, ValidationError};
use crate::fee::FeeEstimator;
use crate::hash::Hash256;
use crate::merkle;
use crate::traits::{NoPool, UtxoView};
use crate::types::Outpoint;
use crate::utxo_set::Utxo;
use crate::validation::{self, ValidationContext};

/// Chain-derived expectations for the block under validation.
#[derive(Debug, Clone)]
pub struct BlockContext<'a> {
    /// Expected height (tip height + 1).
    pub height: u64,
    /// Expected parent hash (the current tip).
    pub prev_hash: Hash256,
    /// Median of the last eleven main-chain timestamps.
    pub median_time_past: u64,
    /// Compact difficulty the retarget schedule demands at this height.
    pub expected_bits: u32,
    /// Local wall-clock time in Unix seconds.
    pub current_time: u64,
    /// Base subsidy for this height.
    pub block_reward: u64,
    /// Fee policy state, for the per-transaction fee floor.
    pub fees: &'a FeeEstimator,
}

/// Summary of a fully validated block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedBlock {
    /// Sum of all non-coinbase fees.
    pub total_fees: u64,
    /// Total value of the coinbase outputs.
    pub coinbase_value: u64,
}

/// UTXO view layered over a base view with the outputs created and spent
/// so far within the block being validated.
struct OverlayView<'a, V: UtxoView> {
    base: &'a V,
    created: HashMap<Outpoint, Utxo>,
    spent: HashSet<Outpoint>,
}

impl<V: UtxoView> UtxoView for OverlayView<'_, V> {
    fn utxo(&self, outpoint: &Outpoint) -> Option<Utxo> {
        if self.spent.contains(outpoint) {
            return None;
        }
        self.created.get(outpoint).cloned().or_else(|| self.base.utxo(outpoint))
    }
}

/// Context-free block checks.
pub fn validate_block_structure(block: &Block) -> Result<(), BlockError> {
    if block.transactions.is_empty() {
        return Err(BlockError::NoCoinbase);
    }
    if !block.transactions[0].is_coinbase() {
        return Err(BlockError::FirstTxNotCoinbase);
    }
    for tx in block.transactions.iter().skip(1) {
        if tx.is_coinbase() {
            return Err(BlockError::MultipleCoinbase);
        }
    }

    // The coinbase commits to the height, keeping its hash unique.
    let script_height = block.transactions[0]
        .coinbase_height()
        .ok_or(BlockError::NoCoinbase)?;
    if script_height != block.header.height {
        return Err(BlockError::CoinbaseHeightMismatch {
            script: script_height,
            block: block.header.height,
        });
    }

    let mut txids = HashSet::with_capacity(block.transactions.len());
    let mut hashes = Vec::with_capacity(block.transactions.len());
    for (i, tx) in block.transactions.iter().enumerate() {
        validation::validate_structure(tx)
            .map_err(|source| BlockError::Transaction { index: i, source })?;
        let txid = tx.hash();
        if !txids.insert(txid) {
            return Err(BlockError::DuplicateTxid(txid.to_string()));
        }
        hashes.push(txid);
    }

    if block.header.merkle_root != merkle::merkle_root(&hashes) {
        return Err(BlockError::InvalidMerkleRoot);
    }

    let size = block.size();
    if size > MAX_BLOCK_SIZE {
        return Err(BlockError::OversizedBlock { size, max: MAX_BLOCK_SIZE });
    }

    if !block.header.meets_target() {
        return Err(BlockError::InvalidPow);
    }

    Ok(())
}

/// Full contextual validation against the pre-block UTXO state.
///
/// Transactions may spend outputs created earlier in the same block.
pub fn validate_block(
    block: &Block,
    context: &BlockContext<'_>,
    utxo_view: &impl UtxoView,
) -> Result<ValidatedBlock, BlockError> {
    validate_block_structure(block)?;

    if block.header.height != context.height {
        return Err(BlockError::HeightMismatch {
            expected: context.height,
            got: block.header.height,
        });
    }
    if block.header.prev_hash != context.prev_hash {
        return Err(BlockError::InvalidPrevHash);
    }
    if block.header.difficulty_bits != context.expected_bits {
        return Err(BlockError::InvalidDifficulty {
            got: block.header.difficulty_bits,
            expected: context.expected_bits,
        });
    }
    if block.header.timestamp < context.median_time_past {
        return Err(BlockError::TimestampTooOld);
    }
    let horizon = context.current_time.saturating_add(MAX_FUTURE_BLOCK_TIME);
    if block.header.timestamp > horizon {
        return Err(BlockError::TimestampTooFar(block.header.timestamp - context.current_time));
    }

    let mut overlay =
        OverlayView { base: utxo_view, created: HashMap::new(), spent: HashSet::new() };
    let tx_ctx = ValidationContext {
        tip_height: context.height,
        tip_timestamp: block.header.timestamp,
        fees: context.fees,
    };

    let mut total_fees: u64 = 0;
    for (i, tx) in block.transactions.iter().enumerate() {
        if i > 0 {
            // Cross-transaction double spends inside the block.
            for input in &tx.inputs {
                if overlay.spent.contains(&input.previous_output) {
                    return Err(BlockError::DoubleSpend(input.previous_output.to_string()));
                }
            }

            let validated = validation::validate_transaction(tx, &overlay, &NoPool, &tx_ctx)
                .map_err(|source| BlockError::Transaction { index: i, source })?;
            total_fees = total_fees.checked_add(validated.fee).ok_or(BlockError::Transaction {
                index: i,
                source: ValidationError::ValueOverflow,
            })?;

            for input in &tx.inputs {
                overlay.spent.insert(input.previous_output.clone());
            }
        }

        // Expose this transaction's outputs to later transactions.
        let txid = tx.hash();
        for (index, output) in tx.outputs.iter().enumerate() {
            let outpoint = Outpoint::new(txid, index as u32);
            overlay.created.insert(
                outpoint.clone(),
                Utxo::new(
                    outpoint,
                    output.value,
                    output.script_pub_key.clone(),
                    tx.coin_type,
                    context.height,
                    tx.is_coinbase(),
                ),
            );
        }
    }

    let coinbase_value = block.transactions[0]
        .total_output_value()
        .ok_or(BlockError::Transaction { index: 0, source: ValidationError::ValueOverflow })?;
    let max_value = context
        .block_reward
        .checked_add(total_fees)
        .ok_or(BlockError::Transaction { index: 0, source: ValidationError::ValueOverflow })?;
    if coinbase_value > max_value {
        return Err(BlockError::InvalidReward { got: coinbase_value, expected: max_value });
    }

    debug!(
        height = context.height,
        txs = block.transactions.len(),
        total_fees,
        coinbase_value,
        "block validated",
    );

    Ok(ValidatedBlock { total_fees, coinbase_value })
}
