//! Chain state: block storage, tip tracking, UTXO updates, and the
//! per-coin supply ledger.
//!
//! Blocks handed to [`ChainStore::connect_block`] must already be
//! validated by the consensus layer; the store checks only what protects
//! its own invariants (linkage, duplicates, supply ceilings, UTXO
//! existence). Every connected block leaves undo data so
//! the chain can be rewound block by block during reorganization, and
//! side-chain blocks accumulate work so the fork-choice rule can compare
//! competing tips.

use std::collections::HashMap;

use primitive_types::U256;
use tracing::{debug, info};

use crate::block::{Block, BlockHeader, ChainTip};
use crate::coin::CoinType;
use crate::constants::MEDIAN_TIME_SPAN;
use crate::error::ChainStateError;
use crate::hash::Hash256;
use crate::types::Outpoint;
use crate::utxo_set::{Utxo, UtxoSet};

/// Counters returned by a successful connect.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectResult {
    pub utxos_created: usize,
    pub utxos_spent: usize,
}

/// Counters returned by a successful disconnect.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DisconnectResult {
    pub utxos_restored: usize,
    pub utxos_removed: usize,
}

/// Spent entries of one connected block, for rewinding.
#[derive(Clone, Debug)]
struct BlockUndo {
    spent: Vec<Utxo>,
}

/// Mutable chain storage.
///
/// Not internally synchronized — the node wraps the store in a read-write
/// lock, which is what gives readers the all-or-nothing visibility of a
/// block apply.
pub trait ChainStore: Send + Sync {
    /// The current best tip.
    fn tip(&self) -> ChainTip;

    /// Connect a validated block extending the current tip.
    fn connect_block(&mut self, block: &Block) -> Result<ConnectResult, ChainStateError>;

    /// Rewind the tip block, restoring its spent UTXOs. Returns the
    /// disconnected block.
    fn disconnect_tip(&mut self) -> Result<(Block, DisconnectResult), ChainStateError>;

    /// Record a block that does not extend the current tip. Its parent
    /// must already be stored. Returns the block's cumulative work.
    fn store_side_block(&mut self, block: &Block) -> Result<U256, ChainStateError>;

    /// Blocks from the fork point (exclusive) to `tip_hash` (inclusive),
    /// in apply order, for a stored side chain.
    fn branch_blocks(&self, tip_hash: &Hash256) -> Result<Vec<Block>, ChainStateError>;

    fn utxo(&self, outpoint: &Outpoint) -> Option<Utxo>;

    fn block(&self, hash: &Hash256) -> Option<Block>;

    fn block_at(&self, height: u64) -> Option<Block>;

    fn header(&self, hash: &Hash256) -> Option<BlockHeader>;

    fn header_at(&self, height: u64) -> Option<BlockHeader>;

    /// Whether `hash` is on the main chain.
    fn is_main_chain(&self, hash: &Hash256) -> bool;

    /// Cumulative work of any stored block.
    fn cumulative_work(&self, hash: &Hash256) -> Option<U256>;

    /// Minted supply of one coin type on the main chain.
    fn supply(&self, coin_type: CoinType) -> u64;

    fn utxo_count(&self) -> usize;

    fn is_empty(&self) -> bool;

    fn balance(&self, address: &str, coin_type: CoinType) -> u64;

    fn outpoints_by_address(&self, address: &str) -> Vec<Outpoint>;

    /// Canonical UTXO snapshot bytes.
    fn snapshot_utxos(&self) -> Vec<u8>;

    /// Replace the UTXO set from canonical snapshot bytes.
    fn restore_utxos(&mut self, bytes: &[u8]) -> Result<(), ChainStateError>;

    /// Rolling integrity hash of the UTXO set.
    fn utxo_integrity_root(&self) -> Hash256;

    /// Median of the most recent main-chain timestamps (up to
    /// [`MEDIAN_TIME_SPAN`]). Zero on an empty chain.
    fn median_time_past(&self) -> u64;
}

/// In-memory chain store.
///
/// The production node persists blocks and snapshots through its storage
/// layer and rebuilds this state at startup.
pub struct MemoryChainStore {
    utxos: UtxoSet,
    /// All known blocks, main chain and side chains.
    blocks: HashMap<Hash256, Block>,
    /// Main-chain height index.
    height_to_hash: HashMap<u64, Hash256>,
    /// Undo data for connected blocks.
    undo: HashMap<Hash256, BlockUndo>,
    /// Cumulative work of every known block.
    work: HashMap<Hash256, U256>,
    /// Minted supply per coin type (coinbase outputs on the main chain).
    supply: HashMap<CoinType, u64>,
    tip: ChainTip,
}

impl MemoryChainStore {
    pub fn new() -> Self {
        Self {
            utxos: UtxoSet::new(),
            blocks: HashMap::new(),
            height_to_hash: HashMap::new(),
            undo: HashMap::new(),
            work: HashMap::new(),
            supply: HashMap::new(),
            tip: ChainTip::empty(),
        }
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Total coinbase value a block mints, by the coinbase's coin type.
    fn minted_value(block: &Block) -> Option<(CoinType, u64)> {
        let coinbase = block.coinbase()?;
        Some((coinbase.coin_type, coinbase.total_output_value().unwrap_or(u64::MAX)))
    }

    /// Apply a block's transactions to the UTXO set, rolling back on any
    /// failure so the set never ends half-updated.
    fn apply_transactions(
        &mut self,
        block: &Block,
    ) -> Result<(BlockUndo, usize), ChainStateError> {
        let height = block.header.height;
        let mut undo = BlockUndo { spent: Vec::new() };
        let mut created: Vec<Outpoint> = Vec::new();

        let result = (|| {
            for tx in &block.transactions {
                if !tx.is_coinbase() {
                    for input in &tx.inputs {
                        let spent = self.utxos.spend(&input.previous_output)?;
                        undo.spent.push(spent);
                    }
                }
                let txid = tx.hash();
                let is_coinbase = tx.is_coinbase();
                for (index, output) in tx.outputs.iter().enumerate() {
                    let outpoint = Outpoint::new(txid, index as u32);
                    self.utxos.add(Utxo::new(
                        outpoint.clone(),
                        output.value,
                        output.script_pub_key.clone(),
                        tx.coin_type,
                        height,
                        is_coinbase,
                    ))?;
                    created.push(outpoint);
                }
            }
            Ok(())
        })();

        if let Err(err) = result {
            // Roll back partial work in reverse order.
            for outpoint in created.iter().rev() {
                let _ = self.utxos.spend(outpoint);
            }
            for utxo in undo.spent.drain(..).rev() {
                let _ = self.utxos.add(utxo);
            }
            return Err(err);
        }

        Ok((undo, created.len()))
    }
}

impl Default for MemoryChainStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ChainStore for MemoryChainStore {
    fn tip(&self) -> ChainTip {
        self.tip.clone()
    }

    fn connect_block(&mut self, block: &Block) -> Result<ConnectResult, ChainStateError> {
        let hash = block.hash();
        let height = block.header.height;
        let expected = self.tip.height + 1;

        if height != expected {
            return Err(ChainStateError::HeightMismatch { expected, got: height });
        }
        if block.header.prev_hash != self.tip.hash {
            return Err(ChainStateError::UnknownParent(block.header.prev_hash.to_string()));
        }
        if self.undo.contains_key(&hash) {
            return Err(ChainStateError::DuplicateBlock(hash.to_string()));
        }

        // Supply ceilings are enforced before any mutation.
        let (coin, minted) =
            Self::minted_value(block).ok_or(ChainStateError::BlockNotFound(hash.to_string()))?;
        let current = self.supply.get(&coin).copied().unwrap_or(0);
        let would_be = current.saturating_add(minted);
        if let Some(ceiling) = coin.supply_ceiling() {
            if would_be > ceiling {
                return Err(ChainStateError::SupplyExceeded {
                    coin: coin.tag(),
                    would_be,
                    ceiling,
                });
            }
        }

        let (undo, created) = self.apply_transactions(block)?;
        let spent = undo.spent.len();

        let cumulative = self
            .work
            .get(&block.header.prev_hash)
            .copied()
            .unwrap_or_else(U256::zero)
            + block.header.work();

        self.supply.insert(coin, would_be);
        self.blocks.insert(hash, block.clone());
        self.height_to_hash.insert(height, hash);
        self.undo.insert(hash, undo);
        self.work.insert(hash, cumulative);
        self.tip = ChainTip { hash, height, work: cumulative };

        info!(height, %hash, spent, created, "block connected");

        Ok(ConnectResult { utxos_created: created, utxos_spent: spent })
    }

    fn disconnect_tip(&mut self) -> Result<(Block, DisconnectResult), ChainStateError> {
        if self.tip.is_empty() {
            return Err(ChainStateError::EmptyChain);
        }
        let tip_hash = self.tip.hash;
        let block = self
            .blocks
            .get(&tip_hash)
            .cloned()
            .ok_or_else(|| ChainStateError::BlockNotFound(tip_hash.to_string()))?;
        let undo = self
            .undo
            .remove(&tip_hash)
            .ok_or_else(|| ChainStateError::UndoDataMissing(tip_hash.to_string()))?;

        // Remove the block's outputs in reverse transaction order.
        let mut removed = 0;
        for tx in block.transactions.iter().rev() {
            let txid = tx.hash();
            for index in (0..tx.outputs.len()).rev() {
                if self.utxos.spend(&Outpoint::new(txid, index as u32)).is_ok() {
                    removed += 1;
                }
            }
        }

        // Restore what the block spent.
        let restored = undo.spent.len();
        for utxo in undo.spent {
            let _ = self.utxos.add(utxo);
        }

        // Unwind the supply ledger.
        if let Some((coin, minted)) = Self::minted_value(&block) {
            if let Some(current) = self.supply.get_mut(&coin) {
                *current = current.saturating_sub(minted);
            }
        }

        self.height_to_hash.remove(&block.header.height);

        self.tip = if block.header.height == 1 {
            ChainTip::empty()
        } else {
            let parent = block.header.prev_hash;
            ChainTip {
                hash: parent,
                height: block.header.height - 1,
                work: self.work.get(&parent).copied().unwrap_or_else(U256::zero),
            }
        };

        debug!(height = block.header.height, %tip_hash, "block disconnected");

        Ok((block, DisconnectResult { utxos_restored: restored, utxos_removed: removed }))
    }

    fn store_side_block(&mut self, block: &Block) -> Result<U256, ChainStateError> {
        let hash = block.hash();
        if let Some(existing) = self.work.get(&hash) {
            return Ok(*existing);
        }
        let parent_work = if block.header.height == 1 {
            U256::zero()
        } else {
            *self
                .work
                .get(&block.header.prev_hash)
                .ok_or_else(|| ChainStateError::UnknownParent(block.header.prev_hash.to_string()))?
        };
        let cumulative = parent_work + block.header.work();
        self.blocks.insert(hash, block.clone());
        self.work.insert(hash, cumulative);
        debug!(%hash, height = block.header.height, "side block stored");
        Ok(cumulative)
    }

    fn branch_blocks(&self, tip_hash: &Hash256) -> Result<Vec<Block>, ChainStateError> {
        let mut branch = Vec::new();
        let mut cursor = *tip_hash;
        loop {
            if self.is_main_chain(&cursor) || cursor.is_zero() {
                break;
            }
            let block = self
                .blocks
                .get(&cursor)
                .ok_or_else(|| ChainStateError::BlockNotFound(cursor.to_string()))?;
            cursor = block.header.prev_hash;
            branch.push(block.clone());
        }
        branch.reverse();
        Ok(branch)
    }

    fn utxo(&self, outpoint: &Outpoint) -> Option<Utxo> {
        self.utxos.get(outpoint).cloned()
    }

    fn block(&self, hash: &Hash256) -> Option<Block> {
        self.blocks.get(hash).cloned()
    }

    fn block_at(&self, height: u64) -> Option<Block> {
        self.height_to_hash.get(&height).and_then(|hash| self.blocks.get(hash)).cloned()
    }

    fn header(&self, hash: &Hash256) -> Option<BlockHeader> {
        self.blocks.get(hash).map(|b| b.header.clone())
    }

    fn header_at(&self, height: u64) -> Option<BlockHeader> {
        self.block_at(height).map(|b| b.header)
    }

    fn is_main_chain(&self, hash: &Hash256) -> bool {
        self.blocks
            .get(hash)
            .is_some_and(|block| self.height_to_hash.get(&block.header.height) == Some(hash))
    }

    fn cumulative_work(&self, hash: &Hash256) -> Option<U256> {
        self.work.get(hash).copied()
    }

    fn supply(&self, coin_type: CoinType) -> u64 {
        self.supply.get(&coin_type).copied().unwrap_or(0)
    }

    fn utxo_count(&self) -> usize {
        self.utxos.len()
    }

    fn is_empty(&self) -> bool {
        self.tip.is_empty()
    }

    fn balance(&self, address: &str, coin_type: CoinType) -> u64 {
        self.utxos.balance(address, coin_type)
    }

    fn outpoints_by_address(&self, address: &str) -> Vec<Outpoint> {
        self.utxos.by_address(address)
    }

    fn snapshot_utxos(&self) -> Vec<u8> {
        self.utxos.snapshot()
    }

    fn restore_utxos(&mut self, bytes: &[u8]) -> Result<(), ChainStateError> {
        self.utxos = UtxoSet::restore(bytes)
            .map_err(|_| ChainStateError::IntegrityFailure)?;
        Ok(())
    }

    fn utxo_integrity_root(&self) -> Hash256 {
        self.utxos.integrity_root()
    }

    fn median_time_past(&self) -> u64 {
        if self.tip.is_empty() {
            return 0;
        }
        let span = (MEDIAN_TIME_SPAN as u64).min(self.tip.height) as usize;
        let mut timestamps: Vec<u64> = (0..span)
            .filter_map(|i| self.header_at(self.tip.height - i as u64))
            .map(|h| h.timestamp)
            .collect();
        timestamps.sort_unstable();
        timestamps[timestamps.len() / 2]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coin::CoinType;
    use crate::merkle;
    use crate::script::templates::p2pkh_script;
    use crate::target::MAX_TARGET_BITS;
    use crate::types::{Transaction, TxInput, TxOutput};

    fn pkh(seed: u8) -> [u8; 20] {
        [seed; 20]
    }

    fn addr(seed: u8) -> String {
        hex::encode(pkh(seed))
    }

    fn coinbase(height: u64, value: u64, seed: u8, coin: CoinType) -> Transaction {
        Transaction::new_coinbase(
            height,
            b"",
            vec![TxOutput::new(value, p2pkh_script(&pkh(seed)))],
            coin,
        )
    }

    fn spend(outpoints: &[Outpoint], value: u64, seed: u8) -> Transaction {
        let inputs = outpoints.iter().map(|op| TxInput::new(op.clone(), vec![0; 72])).collect();
        Transaction::new(
            1,
            inputs,
            vec![TxOutput::new(value, p2pkh_script(&pkh(seed)))],
            0,
            CoinType::Leah,
        )
    }

    fn block_with(prev: Hash256, height: u64, timestamp: u64, txs: Vec<Transaction>) -> Block {
        let hashes: Vec<Hash256> = txs.iter().map(Transaction::hash).collect();
        Block {
            header: crate::block::BlockHeader {
                version: 1,
                prev_hash: prev,
                merkle_root: merkle::merkle_root(&hashes),
                timestamp,
                difficulty_bits: MAX_TARGET_BITS,
                nonce: 0,
                height,
            },
            transactions: txs,
        }
    }

    /// Connect `n` coinbase-only blocks paying 50 Leah each.
    fn grow_chain(store: &mut MemoryChainStore, n: u64) -> Vec<Block> {
        let mut blocks = Vec::new();
        for _ in 0..n {
            let tip = store.tip();
            let height = tip.height + 1;
            let block = block_with(
                tip.hash,
                height,
                1_000_000 + height * 600,
                vec![coinbase(height, 50, height as u8, CoinType::Leah)],
            );
            store.connect_block(&block).unwrap();
            blocks.push(block);
        }
        blocks
    }

    // ------------------------------------------------------------------
    // Empty store
    // ------------------------------------------------------------------

    #[test]
    fn new_store_is_empty() {
        let store = MemoryChainStore::new();
        assert!(store.is_empty());
        assert_eq!(store.tip(), ChainTip::empty());
        assert_eq!(store.utxo_count(), 0);
        assert_eq!(store.median_time_past(), 0);
        assert_eq!(store.supply(CoinType::Leah), 0);
    }

    #[test]
    fn disconnect_on_empty_chain_errors() {
        let mut store = MemoryChainStore::new();
        assert!(matches!(store.disconnect_tip(), Err(ChainStateError::EmptyChain)));
    }

    // ------------------------------------------------------------------
    // Connect
    // ------------------------------------------------------------------

    #[test]
    fn connect_first_block() {
        let mut store = MemoryChainStore::new();
        let block = block_with(Hash256::ZERO, 1, 1_000_600, vec![coinbase(1, 50, 1, CoinType::Leah)]);
        let result = store.connect_block(&block).unwrap();
        assert_eq!(result, ConnectResult { utxos_created: 1, utxos_spent: 0 });

        let tip = store.tip();
        assert_eq!(tip.height, 1);
        assert_eq!(tip.hash, block.hash());
        assert!(tip.work > U256::zero());
        assert_eq!(store.supply(CoinType::Leah), 50);
        assert_eq!(store.balance(&addr(1), CoinType::Leah), 50);
    }

    #[test]
    fn connect_rejects_wrong_height() {
        let mut store = MemoryChainStore::new();
        let block = block_with(Hash256::ZERO, 5, 1_000_600, vec![coinbase(5, 50, 1, CoinType::Leah)]);
        assert_eq!(
            store.connect_block(&block).unwrap_err(),
            ChainStateError::HeightMismatch { expected: 1, got: 5 },
        );
    }

    #[test]
    fn connect_rejects_wrong_parent() {
        let mut store = MemoryChainStore::new();
        grow_chain(&mut store, 1);
        let block = block_with(Hash256([9; 32]), 2, 1_002_000, vec![coinbase(2, 50, 2, CoinType::Leah)]);
        assert!(matches!(
            store.connect_block(&block),
            Err(ChainStateError::UnknownParent(_)),
        ));
    }

    #[test]
    fn connect_spends_and_creates() {
        let mut store = MemoryChainStore::new();
        let blocks = grow_chain(&mut store, 1);
        let cb_txid = blocks[0].transactions[0].hash();

        let tip = store.tip();
        let tx = spend(&[Outpoint::new(cb_txid, 0)], 49, 0xCC);
        let block = block_with(
            tip.hash,
            2,
            1_002_000,
            vec![coinbase(2, 50, 2, CoinType::Leah), tx],
        );
        let result = store.connect_block(&block).unwrap();
        assert_eq!(result.utxos_spent, 1);
        assert_eq!(result.utxos_created, 2);
        assert!(store.utxo(&Outpoint::new(cb_txid, 0)).is_none());
        assert_eq!(store.balance(&addr(0xCC), CoinType::Leah), 49);
    }

    #[test]
    fn connect_rejects_spend_of_missing_utxo() {
        let mut store = MemoryChainStore::new();
        grow_chain(&mut store, 1);
        let tip = store.tip();
        let phantom = spend(&[Outpoint::new(Hash256([0xEE; 32]), 0)], 10, 0xCC);
        let block = block_with(
            tip.hash,
            2,
            1_002_000,
            vec![coinbase(2, 50, 2, CoinType::Leah), phantom],
        );
        assert!(matches!(
            store.connect_block(&block),
            Err(ChainStateError::MissingUtxo(_)),
        ));
        // State untouched by the failed connect.
        assert_eq!(store.tip().height, 1);
        assert_eq!(store.utxo_count(), 1);
    }

    #[test]
    fn failed_connect_rolls_back_partial_spends() {
        let mut store = MemoryChainStore::new();
        let blocks = grow_chain(&mut store, 1);
        let cb_txid = blocks[0].transactions[0].hash();
        let tip = store.tip();

        // First tx spends the real UTXO, second spends a phantom one.
        let good = spend(&[Outpoint::new(cb_txid, 0)], 49, 0xCC);
        let bad = spend(&[Outpoint::new(Hash256([0xEE; 32]), 0)], 10, 0xDD);
        let block = block_with(
            tip.hash,
            2,
            1_002_000,
            vec![coinbase(2, 50, 2, CoinType::Leah), good, bad],
        );
        assert!(store.connect_block(&block).is_err());
        // The real UTXO is back.
        assert!(store.utxo(&Outpoint::new(cb_txid, 0)).is_some());
        assert_eq!(store.utxo_count(), 1);
    }

    #[test]
    fn intra_block_chained_spend_connects() {
        let mut store = MemoryChainStore::new();
        let blocks = grow_chain(&mut store, 1);
        let cb_txid = blocks[0].transactions[0].hash();
        let tip = store.tip();

        let parent = spend(&[Outpoint::new(cb_txid, 0)], 49, 0xCC);
        let child = spend(&[Outpoint::new(parent.hash(), 0)], 48, 0xDD);
        let block = block_with(
            tip.hash,
            2,
            1_002_000,
            vec![coinbase(2, 50, 2, CoinType::Leah), parent, child],
        );
        let result = store.connect_block(&block).unwrap();
        assert_eq!(result.utxos_spent, 2);
        assert_eq!(result.utxos_created, 3);
        assert_eq!(store.balance(&addr(0xDD), CoinType::Leah), 48);
        // The intermediate output is spent.
        assert_eq!(store.balance(&addr(0xCC), CoinType::Leah), 0);
    }

    // ------------------------------------------------------------------
    // Supply ceilings
    // ------------------------------------------------------------------

    #[test]
    fn supply_tracks_per_coin_type() {
        let mut store = MemoryChainStore::new();
        grow_chain(&mut store, 2);
        assert_eq!(store.supply(CoinType::Leah), 100);
        assert_eq!(store.supply(CoinType::Shiblon), 0);
    }

    #[test]
    fn completion_coin_ceiling_is_enforced() {
        let mut store = MemoryChainStore::new();
        let almost = block_with(
            Hash256::ZERO,
            1,
            1_000_600,
            vec![coinbase(1, 10_999_999, 1, CoinType::Ephraim)],
        );
        store.connect_block(&almost).unwrap();

        let tip = store.tip();
        let overflow = block_with(
            tip.hash,
            2,
            1_001_200,
            vec![coinbase(2, 2, 2, CoinType::Ephraim)],
        );
        assert_eq!(
            store.connect_block(&overflow).unwrap_err(),
            ChainStateError::SupplyExceeded {
                coin: "EPHRAIM",
                would_be: 11_000_001,
                ceiling: 11_000_000,
            },
        );

        // Exactly at the ceiling is fine.
        let exact = block_with(
            tip.hash,
            2,
            1_001_200,
            vec![coinbase(2, 1, 2, CoinType::Ephraim)],
        );
        store.connect_block(&exact).unwrap();
        assert_eq!(store.supply(CoinType::Ephraim), 11_000_000);
    }

    // ------------------------------------------------------------------
    // Disconnect
    // ------------------------------------------------------------------

    #[test]
    fn disconnect_restores_spent_utxos() {
        let mut store = MemoryChainStore::new();
        let blocks = grow_chain(&mut store, 1);
        let cb_txid = blocks[0].transactions[0].hash();
        let tip = store.tip();

        let tx = spend(&[Outpoint::new(cb_txid, 0)], 49, 0xCC);
        let block = block_with(
            tip.hash,
            2,
            1_002_000,
            vec![coinbase(2, 50, 2, CoinType::Leah), tx],
        );
        store.connect_block(&block).unwrap();

        let (returned, result) = store.disconnect_tip().unwrap();
        assert_eq!(returned.hash(), block.hash());
        assert_eq!(result.utxos_removed, 2);
        assert_eq!(result.utxos_restored, 1);
        assert!(store.utxo(&Outpoint::new(cb_txid, 0)).is_some());
        assert_eq!(store.tip().height, 1);
        assert_eq!(store.supply(CoinType::Leah), 50);
    }

    #[test]
    fn disconnect_to_empty_chain() {
        let mut store = MemoryChainStore::new();
        grow_chain(&mut store, 1);
        store.disconnect_tip().unwrap();
        assert!(store.is_empty());
        assert_eq!(store.tip(), ChainTip::empty());
        assert_eq!(store.utxo_count(), 0);
        assert_eq!(store.supply(CoinType::Leah), 0);
    }

    #[test]
    fn work_decreases_on_disconnect() {
        let mut store = MemoryChainStore::new();
        grow_chain(&mut store, 3);
        let work_before = store.tip().work;
        store.disconnect_tip().unwrap();
        assert!(store.tip().work < work_before);
    }

    #[test]
    fn work_is_monotonic_over_connects() {
        let mut store = MemoryChainStore::new();
        let mut last = U256::zero();
        grow_chain(&mut store, 5);
        for height in 1..=5u64 {
            let hash = store.header_at(height).unwrap().hash();
            let work = store.cumulative_work(&hash).unwrap();
            assert!(work > last);
            last = work;
        }
    }

    // ------------------------------------------------------------------
    // Side chains and branches
    // ------------------------------------------------------------------

    #[test]
    fn side_blocks_accumulate_work_without_touching_state() {
        let mut store = MemoryChainStore::new();
        let blocks = grow_chain(&mut store, 2);
        let utxo_count = store.utxo_count();

        // A competing block at height 2.
        let rival = block_with(
            blocks[0].hash(),
            2,
            1_002_001,
            vec![coinbase(2, 50, 0xAB, CoinType::Leah)],
        );
        let work = store.store_side_block(&rival).unwrap();
        assert!(work > U256::zero());
        assert_eq!(store.utxo_count(), utxo_count);
        assert_eq!(store.tip().hash, blocks[1].hash());
        assert!(!store.is_main_chain(&rival.hash()));
    }

    #[test]
    fn side_block_requires_known_parent() {
        let mut store = MemoryChainStore::new();
        grow_chain(&mut store, 1);
        let orphan = block_with(
            Hash256([0x77; 32]),
            2,
            1_002_000,
            vec![coinbase(2, 50, 3, CoinType::Leah)],
        );
        assert!(matches!(
            store.store_side_block(&orphan),
            Err(ChainStateError::UnknownParent(_)),
        ));
    }

    #[test]
    fn branch_blocks_walks_to_fork_point() {
        let mut store = MemoryChainStore::new();
        let blocks = grow_chain(&mut store, 2);

        let rival2 = block_with(
            blocks[0].hash(),
            2,
            1_002_002,
            vec![coinbase(2, 50, 0xAB, CoinType::Leah)],
        );
        store.store_side_block(&rival2).unwrap();
        let rival3 = block_with(
            rival2.hash(),
            3,
            1_002_700,
            vec![coinbase(3, 50, 0xAC, CoinType::Leah)],
        );
        store.store_side_block(&rival3).unwrap();

        let branch = store.branch_blocks(&rival3.hash()).unwrap();
        assert_eq!(branch.len(), 2);
        assert_eq!(branch[0].hash(), rival2.hash());
        assert_eq!(branch[1].hash(), rival3.hash());
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    #[test]
    fn lookups_by_hash_and_height() {
        let mut store = MemoryChainStore::new();
        let blocks = grow_chain(&mut store, 2);
        let hash = blocks[1].hash();
        assert_eq!(store.block(&hash).unwrap().hash(), hash);
        assert_eq!(store.block_at(2).unwrap().hash(), hash);
        assert_eq!(store.header(&hash).unwrap().height, 2);
        assert_eq!(store.header_at(2).unwrap().hash(), hash);
        assert!(store.block_at(3).is_none());
        assert!(store.is_main_chain(&hash));
    }

    #[test]
    fn median_time_past_is_the_middle_timestamp() {
        let mut store = MemoryChainStore::new();
        grow_chain(&mut store, 5);
        // Timestamps are 1_000_600, 1_001_200, ..., 1_003_000.
        assert_eq!(store.median_time_past(), 1_001_800);
    }

    #[test]
    fn snapshot_round_trips_through_store() {
        let mut store = MemoryChainStore::new();
        grow_chain(&mut store, 3);
        let snapshot = store.snapshot_utxos();
        let root = store.utxo_integrity_root();

        let mut other = MemoryChainStore::new();
        other.restore_utxos(&snapshot).unwrap();
        assert_eq!(other.utxo_count(), 3);
        assert_eq!(other.utxo_integrity_root(), root);
        assert_eq!(other.snapshot_utxos(), snapshot);
    }
}
