//! The transaction pool.
//!
//! Unconfirmed transactions keyed by hash, with an outpoint index for O(1)
//! double-spend detection and score-ordered selection for block templates.
//! An entry's priority is
//!
//! ```text
//! score = fee_rate · (1 + age_hours / 24)
//! ```
//!
//! so a transaction's priority rises as it waits. Scores are computed at
//! query time from the caller-supplied clock; ties break toward the
//! earliest arrival. When the pool is full, admission evicts the
//! lowest-scoring entry only if the newcomer's fee rate strictly beats it.
//!
//! Transactions must pass contextual validation before insertion; the pool
//! itself checks only duplicates, conflicts, and the fee-rate floor.

use std::collections::{HashMap, HashSet};

use ordered_float::OrderedFloat;
use tracing::{debug, trace};

use crate::block::Block;
use crate::coin::CoinType;
use crate::constants::{DEFAULT_MEMPOOL_MAX_SIZE, DEFAULT_MIN_FEE_RATE};
use crate::error::{MempoolError, ValidationError};
use crate::hash::Hash256;
use crate::traits::PoolView;
use crate::types::{Outpoint, Transaction};
use crate::utxo_set::Utxo;

/// Sentinel height for outputs that have not yet been mined.
pub const UNCONFIRMED_HEIGHT: u64 = u64::MAX;

/// A pooled transaction with its cached priority inputs.
#[derive(Debug, Clone)]
pub struct MempoolEntry {
    pub tx: Transaction,
    pub txid: Hash256,
    /// Fee in smallest units, computed by the validator.
    pub fee: u64,
    /// Serialized size in bytes.
    pub size: usize,
    /// `fee / size`, fixed at admission.
    pub fee_rate: f64,
    /// Unix seconds at admission.
    pub arrival_time: u64,
    /// Admission sequence number, the final tie-breaker.
    seq: u64,
}

impl MempoolEntry {
    /// Priority score at time `now`. Waiting raises priority.
    pub fn score(&self, now: u64) -> f64 {
        let age_hours = now.saturating_sub(self.arrival_time) as f64 / 3600.0;
        self.fee_rate * (1.0 + age_hours / 24.0)
    }

    /// Sort key: score descending, then earliest arrival.
    fn rank(&self, now: u64) -> (OrderedFloat<f64>, std::cmp::Reverse<(u64, u64)>) {
        (OrderedFloat(self.score(now)), std::cmp::Reverse((self.arrival_time, self.seq)))
    }
}

/// The pool.
pub struct Mempool {
    entries: HashMap<Hash256, MempoolEntry>,
    /// Spent outpoint → spending pool txid.
    by_outpoint: HashMap<Outpoint, Hash256>,
    max_size: usize,
    min_fee_rate: f64,
    next_seq: u64,
}

impl Mempool {
    pub fn new(max_size: usize, min_fee_rate: f64) -> Self {
        Self {
            entries: HashMap::new(),
            by_outpoint: HashMap::new(),
            max_size,
            min_fee_rate,
            next_seq: 0,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_MEMPOOL_MAX_SIZE, DEFAULT_MIN_FEE_RATE)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Fill fraction in `[0, 1]`, fed to the fee estimator.
    pub fn fullness(&self) -> f64 {
        if self.max_size == 0 {
            return 1.0;
        }
        self.entries.len() as f64 / self.max_size as f64
    }

    pub fn contains(&self, txid: &Hash256) -> bool {
        self.entries.contains_key(txid)
    }

    pub fn get(&self, txid: &Hash256) -> Option<&MempoolEntry> {
        self.entries.get(txid)
    }

    pub fn txids(&self) -> Vec<Hash256> {
        self.entries.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MempoolEntry> {
        self.entries.values()
    }

    /// Admit a validated transaction.
    ///
    /// `fee` comes from the validator; `now` is Unix seconds. Admission
    /// order: fee-rate floor, duplicate check, conflict check, then
    /// capacity (evicting the lowest-scoring entry only when the newcomer's
    /// fee rate strictly beats it).
    pub fn insert(&mut self, tx: Transaction, fee: u64, now: u64) -> Result<Hash256, MempoolError> {
        let txid = tx.hash();
        let size = tx.size().max(1);
        let fee_rate = fee as f64 / size as f64;

        if fee_rate < self.min_fee_rate {
            return Err(MempoolError::FeeRateTooLow { rate: fee_rate, minimum: self.min_fee_rate });
        }
        if self.entries.contains_key(&txid) {
            return Err(MempoolError::AlreadyExists(txid.to_string()));
        }
        for input in &tx.inputs {
            if self.by_outpoint.contains_key(&input.previous_output) {
                return Err(ValidationError::DoubleSpend(input.previous_output.to_string()).into());
            }
        }

        if self.entries.len() >= self.max_size {
            let lowest = self
                .lowest_scoring(now)
                .expect("a full pool has a lowest entry");
            if fee_rate <= self.entries[&lowest].fee_rate {
                return Err(MempoolError::PoolFull);
            }
            debug!(evicted = %lowest, "evicting lowest-priority pool entry");
            self.remove(&lowest);
        }

        for input in &tx.inputs {
            self.by_outpoint.insert(input.previous_output.clone(), txid);
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(
            txid,
            MempoolEntry { tx, txid, fee, size, fee_rate, arrival_time: now, seq },
        );
        trace!(%txid, fee, size, "transaction admitted to pool");
        Ok(txid)
    }

    fn lowest_scoring(&self, now: u64) -> Option<Hash256> {
        self.entries.values().min_by_key(|e| e.rank(now)).map(|e| e.txid)
    }

    /// Remove an entry and clean its outpoint index.
    pub fn remove(&mut self, txid: &Hash256) -> Option<MempoolEntry> {
        let entry = self.entries.remove(txid)?;
        for input in &entry.tx.inputs {
            self.by_outpoint.remove(&input.previous_output);
        }
        Some(entry)
    }

    /// Whether any input of `tx` conflicts with a pooled spend.
    pub fn has_conflict(&self, tx: &Transaction) -> bool {
        tx.inputs.iter().any(|input| self.by_outpoint.contains_key(&input.previous_output))
    }

    /// Select up to `max_count` transactions in score order, never
    /// returning two spends of the same outpoint, and ordering pool
    /// parents before their in-pool children.
    pub fn best(&self, max_count: usize, now: u64) -> Vec<Transaction> {
        let mut ranked: Vec<&MempoolEntry> = self.entries.values().collect();
        ranked.sort_by_key(|e| std::cmp::Reverse(e.rank(now)));

        let mut selected: Vec<Transaction> = Vec::new();
        let mut selected_ids: HashSet<Hash256> = HashSet::new();
        let mut dropped: HashSet<Hash256> = HashSet::new();
        let mut spent: HashSet<&Outpoint> = HashSet::new();

        // Passes repeat while selections unblock deferred children; depth
        // is bounded by the longest unconfirmed ancestry chain.
        let mut progress = true;
        while progress && selected.len() < max_count {
            progress = false;
            for entry in &ranked {
                if selected.len() >= max_count {
                    break;
                }
                if selected_ids.contains(&entry.txid) || dropped.contains(&entry.txid) {
                    continue;
                }
                // One-pass conflict filter: never two spends of one outpoint.
                if entry.tx.inputs.iter().any(|i| spent.contains(&i.previous_output)) {
                    dropped.insert(entry.txid);
                    continue;
                }
                // A child waits until its pool parent has been selected.
                let parent_pending = entry.tx.inputs.iter().any(|i| {
                    self.entries.contains_key(&i.previous_output.txid)
                        && !selected_ids.contains(&i.previous_output.txid)
                });
                if parent_pending {
                    continue;
                }
                selected_ids.insert(entry.txid);
                for input in &entry.tx.inputs {
                    spent.insert(&input.previous_output);
                }
                selected.push(entry.tx.clone());
                progress = true;
            }
        }

        selected
    }

    /// Drop every transaction confirmed by `block`, plus any entry whose
    /// inputs conflict with an input of a confirmed transaction.
    pub fn remove_confirmed(&mut self, block: &Block) {
        let mut spent: HashSet<&Outpoint> = HashSet::new();
        for tx in &block.transactions {
            self.remove(&tx.hash());
            for input in &tx.inputs {
                if !input.previous_output.is_null() {
                    spent.insert(&input.previous_output);
                }
            }
        }

        let conflicting: Vec<Hash256> = spent
            .iter()
            .filter_map(|op| self.by_outpoint.get(op).copied())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        for txid in conflicting {
            debug!(%txid, "dropping pool entry conflicting with confirmed block");
            self.remove(&txid);
        }
    }

    /// Keep only entries the predicate accepts. Used after a reorg to
    /// silently drop transactions the new tip invalidates.
    pub fn retain_valid(&mut self, mut keep: impl FnMut(&Transaction) -> bool) {
        let doomed: Vec<Hash256> = self
            .entries
            .values()
            .filter(|entry| !keep(&entry.tx))
            .map(|entry| entry.txid)
            .collect();
        for txid in doomed {
            trace!(%txid, "dropping pool entry invalidated by tip change");
            self.remove(&txid);
        }
    }
}

impl PoolView for Mempool {
    fn unconfirmed_output(&self, outpoint: &Outpoint) -> Option<Utxo> {
        let entry = self.entries.get(&outpoint.txid)?;
        let output = entry.tx.outputs.get(outpoint.vout as usize)?;
        // An output already spent within the pool is not available.
        if self.by_outpoint.contains_key(outpoint) {
            return None;
        }
        Some(Utxo::new(
            outpoint.clone(),
            output.value,
            output.script_pub_key.clone(),
            entry.tx.coin_type,
            UNCONFIRMED_HEIGHT,
            false,
        ))
    }

    fn spends_outpoint(&self, outpoint: &Outpoint) -> bool {
        self.by_outpoint.contains_key(outpoint)
    }
}

impl Default for Mempool {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Convenience for tests and callers that track supply by denomination.
pub fn pool_fee_total(pool: &Mempool, coin_type: CoinType) -> u64 {
    pool.iter().filter(|e| e.tx.coin_type == coin_type).map(|e| e.fee).sum()
}
