//! Trait seams between the protocol crates.
//!
//! - [`UtxoView`] — confirmed-output lookup (the UTXO set, or a store
//!   adapter behind a read lock)
//! - [`PoolView`] — unconfirmed-output lookup and conflict probing against
//!   the mempool
//! - [`BlockProducer`] — template building and block verification,
//!   implemented by the consensus engine

use crate::block::Block;
use crate::coin::CoinType;
use crate::error::{BlockError, ChainStateError};
use crate::types::{Outpoint, Transaction};
use crate::utxo_set::Utxo;

/// Read-only lookup of confirmed unspent outputs.
pub trait UtxoView {
    fn utxo(&self, outpoint: &Outpoint) -> Option<Utxo>;
}

/// Read-only view of the mempool for chained-spend validation.
pub trait PoolView {
    /// An output created by a pool transaction and not yet spent by
    /// another pool transaction.
    fn unconfirmed_output(&self, outpoint: &Outpoint) -> Option<Utxo>;

    /// Whether any pool transaction already spends this outpoint.
    fn spends_outpoint(&self, outpoint: &Outpoint) -> bool;
}

/// An empty pool view, for validating against chain state alone.
pub struct NoPool;

impl PoolView for NoPool {
    fn unconfirmed_output(&self, _outpoint: &Outpoint) -> Option<Utxo> {
        None
    }

    fn spends_outpoint(&self, _outpoint: &Outpoint) -> bool {
        false
    }
}

/// Block creation and verification, implemented by the consensus engine.
pub trait BlockProducer: Send + Sync {
    /// Assemble a block template paying `payout_address` in `coin_type`.
    fn build_template(
        &self,
        payout_address: &[u8; 20],
        coin_type: CoinType,
        pending: &[Transaction],
    ) -> Result<Block, BlockError>;

    /// Fully verify a block against current state (structure, linkage,
    /// proof of work, transactions, reward).
    fn verify_block(&self, block: &Block) -> Result<(), BlockError>;

    /// Compact difficulty bits expected for the next block.
    fn next_difficulty_bits(&self) -> Result<u32, ChainStateError>;
}

impl UtxoView for crate::utxo_set::UtxoSet {
    fn utxo(&self, outpoint: &Outpoint) -> Option<Utxo> {
        self.get(outpoint).cloned()
    }
}

impl UtxoView for std::collections::HashMap<Outpoint, Utxo> {
    fn utxo(&self, outpoint: &Outpoint) -> Option<Utxo> {
        self.get(outpoint).cloned()
    }
}
