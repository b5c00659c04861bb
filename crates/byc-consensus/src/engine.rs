//! The consensus engine.
//!
//! Wires the core validators, difficulty schedule, and reward logic to the
//! chain store: template assembly for the miner, full verification for
//! inbound blocks, and the apply/revert pipeline including work-based
//! fork choice with atomic rollback when a reorganization fails mid-way.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use byc_core::block::{Block, BlockHeader, ChainTip};
use byc_core::block_validation::{self, BlockContext};
use byc_core::chain_state::ChainStore;
use byc_core::coin::CoinType;
use byc_core::constants::{MAX_COINBASE_DATA, MAX_TEMPLATE_TXS, RETARGET_INTERVAL};
use byc_core::error::{BlockError, ChainStateError};
use byc_core::fee::FeeEstimator;
use byc_core::hash::Hash256;
use byc_core::merkle;
use byc_core::reward;
use byc_core::script::templates::p2pkh_script;
use byc_core::target;
use byc_core::types::{Outpoint, Transaction, TxOutput};

/// Outcome of offering a block to [`ConsensusEngine::accept_block`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AcceptOutcome {
    /// The block extended the best chain.
    Extended,
    /// The block was stored on a side chain with less work than the tip.
    SideChain,
    /// The block's branch had more work; the chain reorganized onto it.
    Reorganized { reverted: usize, applied: usize },
}

/// The production consensus engine over a shared chain store.
pub struct ConsensusEngine<S: ChainStore> {
    store: Arc<RwLock<S>>,
    fees: Arc<Mutex<FeeEstimator>>,
    clock: Box<dyn Fn() -> u64 + Send + Sync>,
}

impl<S: ChainStore> ConsensusEngine<S> {
    /// Create an engine using the system clock.
    pub fn new(store: Arc<RwLock<S>>, fees: Arc<Mutex<FeeEstimator>>) -> Self {
        Self::with_clock(store, fees, || {
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs()
        })
    }

    /// Create an engine with an injected clock, for tests.
    pub fn with_clock(
        store: Arc<RwLock<S>>,
        fees: Arc<Mutex<FeeEstimator>>,
        clock: impl Fn() -> u64 + Send + Sync + 'static,
    ) -> Self {
        Self { store, fees, clock: Box::new(clock) }
    }

    pub fn store(&self) -> &Arc<RwLock<S>> {
        &self.store
    }

    pub fn tip(&self) -> ChainTip {
        self.store.read().tip()
    }

    fn now(&self) -> u64 {
        (self.clock)()
    }

    /// Compact bits the schedule demands for the next block.
    ///
    /// Heights on a retarget boundary scale the previous target by the
    /// time the last window actually took; other heights inherit the
    /// parent's bits. The first block uses the easiest target.
    pub fn next_difficulty_bits(&self) -> Result<u32, ChainStateError> {
        let store = self.store.read();
        Self::difficulty_bits_at(&*store, store.tip())
    }

    fn difficulty_bits_at(store: &S, tip: ChainTip) -> Result<u32, ChainStateError> {
        if tip.is_empty() {
            return Ok(target::MAX_TARGET_BITS);
        }
        let tip_header = store
            .header(&tip.hash)
            .ok_or_else(|| ChainStateError::BlockNotFound(tip.hash.to_string()))?;
        let next_height = tip.height + 1;
        if !target::is_retarget_height(next_height) {
            return Ok(tip_header.difficulty_bits);
        }
        // Heights are 1-based, so the first window is one block short.
        let window_start_height = (next_height - RETARGET_INTERVAL).max(1);
        let window_start = store
            .header_at(window_start_height)
            .ok_or_else(|| ChainStateError::BlockNotFound(format!(
                "height {window_start_height}",
            )))?;
        let actual_span = tip_header.timestamp.saturating_sub(window_start.timestamp);
        let bits = target::retarget_bits(tip_header.difficulty_bits, actual_span);
        info!(
            height = next_height,
            actual_span,
            old_bits = format_args!("{:#x}", tip_header.difficulty_bits),
            new_bits = format_args!("{bits:#x}"),
            "difficulty retarget",
        );
        Ok(bits)
    }

    /// Assemble a block template on the current tip.
    ///
    /// `pending` is a fee-ordered, conflict-free batch (the pool's `best`
    /// output); the engine still re-filters against chain state so a stale
    /// pool entry can never poison a template. The coinbase pays
    /// `block_reward(height) + fees` to `payout_address` in `coin_type`.
    pub fn build_template(
        &self,
        payout_address: &[u8; 20],
        coin_type: CoinType,
        pending: &[Transaction],
    ) -> Result<Block, BlockError> {
        let store = self.store.read();
        let tip = store.tip();
        let height = tip.height + 1;
        let difficulty_bits =
            Self::difficulty_bits_at(&*store, tip.clone()).map_err(|_| BlockError::InvalidPrevHash)?;

        // Timestamp: local clock, clamped to after the recent median.
        let median = store.median_time_past();
        let timestamp = self.now().max(median.saturating_add(1));

        // Re-filter the batch: drop spends of unknown or immature
        // outputs, double spends within the batch, and coinbase
        // impostors. Outputs created earlier in the batch are spendable.
        let mut included: Vec<Transaction> = Vec::new();
        let mut created: std::collections::HashMap<Outpoint, (u64, CoinType)> =
            std::collections::HashMap::new();
        let mut spent: std::collections::HashSet<Outpoint> = std::collections::HashSet::new();
        let mut total_fees: u64 = 0;

        for tx in pending.iter().take(MAX_TEMPLATE_TXS) {
            if tx.is_coinbase() {
                continue;
            }
            let mut input_value: u64 = 0;
            let mut ok = true;
            for input in &tx.inputs {
                if spent.contains(&input.previous_output) {
                    ok = false;
                    break;
                }
                let (value, coin) = if let Some(entry) = created.get(&input.previous_output) {
                    *entry
                } else if let Some(utxo) = store.utxo(&input.previous_output) {
                    if !utxo.is_mature(height) {
                        ok = false;
                        break;
                    }
                    (utxo.value, utxo.coin_type)
                } else {
                    ok = false;
                    break;
                };
                if coin != tx.coin_type {
                    ok = false;
                    break;
                }
                input_value = match input_value.checked_add(value) {
                    Some(v) => v,
                    None => {
                        ok = false;
                        break;
                    }
                };
            }
            if !ok {
                debug!(txid = %tx.hash(), "dropping stale pool entry from template");
                continue;
            }
            let output_value = match tx.total_output_value() {
                Some(v) if v <= input_value => v,
                _ => continue,
            };

            for input in &tx.inputs {
                spent.insert(input.previous_output.clone());
            }
            let txid = tx.hash();
            for (index, output) in tx.outputs.iter().enumerate() {
                created.insert(Outpoint::new(txid, index as u32), (output.value, tx.coin_type));
            }
            total_fees = total_fees.saturating_add(input_value - output_value);
            included.push(tx.clone());
        }

        let coinbase_value = reward::block_reward(height)
            .checked_add(total_fees)
            .ok_or(BlockError::InvalidReward { got: u64::MAX, expected: 0 })?;
        let coinbase = Transaction::new_coinbase(
            height,
            &template_tag(),
            vec![TxOutput::new(coinbase_value, p2pkh_script(payout_address))],
            coin_type,
        );

        let mut transactions = Vec::with_capacity(1 + included.len());
        transactions.push(coinbase);
        transactions.extend(included);
        let hashes: Vec<Hash256> = transactions.iter().map(Transaction::hash).collect();

        Ok(Block {
            header: BlockHeader {
                version: 1,
                prev_hash: tip.hash,
                merkle_root: merkle::merkle_root(&hashes),
                timestamp,
                difficulty_bits,
                nonce: 0,
                height,
            },
            transactions,
        })
    }

    /// Fully verify a block as the next block on the current tip.
    pub fn verify_block(&self, block: &Block) -> Result<(), BlockError> {
        let store = self.store.read();
        let tip = store.tip();
        let expected_bits = Self::difficulty_bits_at(&*store, tip.clone())
            .map_err(|_| BlockError::InvalidPrevHash)?;
        let fees = self.fees.lock().clone();
        let context = BlockContext {
            height: tip.height + 1,
            prev_hash: tip.hash,
            median_time_past: store.median_time_past(),
            expected_bits,
            current_time: self.now(),
            block_reward: reward::block_reward(tip.height + 1),
            fees: &fees,
        };
        let view = StoreUtxoView { store: &*store };
        block_validation::validate_block(block, &context, &view)?;
        Ok(())
    }

    /// Validate and connect a block extending the current tip.
    pub fn apply_block(&self, block: &Block) -> Result<(), byc_core::BycError> {
        self.verify_block(block)?;
        let mut store = self.store.write();
        let parent_timestamp = store
            .header(&block.header.prev_hash)
            .map(|h| h.timestamp)
            .unwrap_or(block.header.timestamp);
        store.connect_block(block)?;
        drop(store);

        let interval = block.header.timestamp.saturating_sub(parent_timestamp);
        self.fees.lock().record_block(interval, block.size());
        Ok(())
    }

    /// Offer a block that may extend the tip, a side chain, or trigger a
    /// reorganization. This is the single entry point for new blocks.
    pub fn accept_block(&self, block: &Block) -> Result<AcceptOutcome, byc_core::BycError> {
        let tip = self.tip();

        if block.header.prev_hash == tip.hash {
            self.apply_block(block)?;
            return Ok(AcceptOutcome::Extended);
        }

        // Off-tip: structural checks only, then record and compare work.
        block_validation::validate_block_structure(block)?;
        let branch_work = {
            let mut store = self.store.write();
            store.store_side_block(block)?
        };

        if branch_work <= tip.work {
            debug!(hash = %block.hash(), "stored side-chain block below tip work");
            return Ok(AcceptOutcome::SideChain);
        }

        let (reverted, applied) = self.reorganize_to(&block.hash())?;
        Ok(AcceptOutcome::Reorganized { reverted, applied })
    }

    /// Reorganize the chain onto the stored branch ending at `new_tip`.
    ///
    /// Reverts the old branch block by block back to the fork point, then
    /// applies the new branch forward. If any new block fails validation,
    /// the old branch is restored before the error surfaces.
    fn reorganize_to(&self, new_tip: &Hash256) -> Result<(usize, usize), byc_core::BycError> {
        let branch = self.store.read().branch_blocks(new_tip)?;
        let fork_prev = branch
            .first()
            .map(|b| b.header.prev_hash)
            .ok_or_else(|| ChainStateError::BlockNotFound(new_tip.to_string()))?;

        info!(new_tip = %new_tip, branch_len = branch.len(), "chain reorganization started");

        // Revert the current branch down to the fork point, keeping the
        // blocks for restoration.
        let mut reverted: Vec<Block> = Vec::new();
        {
            let mut store = self.store.write();
            while store.tip().hash != fork_prev && !store.tip().is_empty() {
                let (block, _) = store.disconnect_tip()?;
                reverted.push(block);
            }
        }

        // Apply the new branch forward.
        let mut applied = 0usize;
        for block in &branch {
            if let Err(err) = self.apply_block(block) {
                warn!(%err, "reorganization failed; restoring previous branch");
                self.restore_branch(applied, &reverted);
                return Err(ChainStateError::ReorgFailed(err.to_string()).into());
            }
            applied += 1;
        }

        info!(reverted = reverted.len(), applied, "chain reorganization complete");
        Ok((reverted.len(), applied))
    }

    /// Undo a partially applied branch and reconnect the old one.
    fn restore_branch(&self, applied: usize, old_branch: &[Block]) {
        let mut store = self.store.write();
        for _ in 0..applied {
            if let Err(err) = store.disconnect_tip() {
                warn!(%err, "failed to unwind partial branch during restore");
                return;
            }
        }
        // Old blocks were reverted tip-first; reconnect in reverse.
        for block in old_branch.iter().rev() {
            if let Err(err) = store.connect_block(block) {
                warn!(%err, hash = %block.hash(), "failed to restore old branch block");
                return;
            }
        }
    }
}

impl<S: ChainStore> byc_core::traits::BlockProducer for ConsensusEngine<S> {
    fn build_template(
        &self,
        payout_address: &[u8; 20],
        coin_type: CoinType,
        pending: &[Transaction],
    ) -> Result<Block, BlockError> {
        ConsensusEngine::build_template(self, payout_address, coin_type, pending)
    }

    fn verify_block(&self, block: &Block) -> Result<(), BlockError> {
        ConsensusEngine::verify_block(self, block)
    }

    fn next_difficulty_bits(&self) -> Result<u32, ChainStateError> {
        ConsensusEngine::next_difficulty_bits(self)
    }
}

/// Adapter exposing a locked store as a [`UtxoView`](byc_core::traits::UtxoView).
struct StoreUtxoView<'a, S: ChainStore> {
    store: &'a S,
}

impl<S: ChainStore> byc_core::traits::UtxoView for StoreUtxoView<'_, S> {
    fn utxo(&self, outpoint: &Outpoint) -> Option<byc_core::Utxo> {
        self.store.utxo(outpoint)
    }
}

/// Free-form tag the miner embeds after the height in coinbase scripts.
fn template_tag() -> [u8; 8] {
    let mut tag = [0u8; 8];
    tag.copy_from_slice(b"byc-node");
    debug_assert!(tag.len() <= MAX_COINBASE_DATA);
    tag
}
