//! The node facade.
//!
//! [`Node`] composes the chain store, mempool, fee estimator, consensus
//! engine, persistence, and mining sessions behind the boundary the outer
//! runtime (RPC, P2P, CLI) talks to.
//!
//! Locking discipline: the chain store sits behind one `RwLock` — block
//! apply/revert takes the write lock, so a reader sees the pre-apply or
//! post-apply state and never a partial one. The mempool is a single
//! `Mutex` (its queue and conflict index move together). Lock order is
//! always store before mempool; no path acquires them the other way
//! around. After a fatal storage error the node flips read-only and
//! refuses further writes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{error, info, warn};

use byc_consensus::engine::{AcceptOutcome, ConsensusEngine};
use byc_consensus::miner::{Miner, MinerStats, MiningHandle, Publisher};
use byc_core::block::{Block, ChainTip};
use byc_core::chain_state::{ChainStore, MemoryChainStore};
use byc_core::coin::CoinType;
use byc_core::constants::MAX_TEMPLATE_TXS;
use byc_core::error::{ChainStateError, StorageError, ValidationError};
use byc_core::fee::{FeeEstimator, FeePriority};
use byc_core::hash::Hash256;
use byc_core::mempool::Mempool;
use byc_core::traits::{NoPool, UtxoView};
use byc_core::types::{Outpoint, Transaction};
use byc_core::utxo_set::Utxo;
use byc_core::validation::{self, ValidationContext};
use byc_core::BycError;

use crate::config::NodeConfig;
use crate::storage::FileStore;

/// Identifier for a running mining session.
pub type SessionId = u64;

/// Approximate runtime counters. Relaxed atomics — observability only.
#[derive(Debug, Default)]
pub struct NodeMetrics {
    pub blocks_connected: AtomicU64,
    pub reorgs: AtomicU64,
    pub transactions_accepted: AtomicU64,
    /// Consensus-invalid submissions, a peer-misbehavior signal.
    pub misbehavior: AtomicU64,
}

/// A running node.
pub struct Node {
    store: Arc<RwLock<MemoryChainStore>>,
    mempool: Arc<Mutex<Mempool>>,
    fees: Arc<Mutex<FeeEstimator>>,
    engine: Arc<ConsensusEngine<MemoryChainStore>>,
    files: FileStore,
    config: NodeConfig,
    metrics: NodeMetrics,
    sessions: Mutex<HashMap<SessionId, MiningHandle>>,
    next_session: AtomicU64,
    /// Set after a fatal storage error; all writes refuse while set.
    read_only: AtomicBool,
    /// Root of the last verified snapshot, checked on the integrity cadence.
    last_integrity_root: Mutex<Hash256>,
}

impl Node {
    /// Open a node: load the snapshot (primary or backup), replay stored
    /// blocks above the snapshot if any, and wire up the engine.
    pub fn open(config: NodeConfig) -> Result<Arc<Self>, BycError> {
        let files = FileStore::open(&config.data_dir)
            .map_err(BycError::from)?;

        let mut chain = MemoryChainStore::new();

        // Replay persisted blocks in height order. The snapshot is a
        // startup accelerator for the UTXO set; replay rebuilds
        // block-level state either way, so replay wins on conflict.
        let heights = files.stored_heights().map_err(BycError::from)?;
        for height in &heights {
            let block = files
                .read_block(*height)
                .map_err(BycError::from)?
                .ok_or(StorageError::BlockFileMissing(*height))
                .map_err(BycError::from)?;
            chain.connect_block(&block).map_err(BycError::from)?;
        }

        if heights.is_empty() {
            if let Some(payload) = files.read_snapshot().map_err(BycError::from)? {
                chain.restore_utxos(&payload).map_err(BycError::from)?;
                info!(utxos = chain.utxo_count(), "UTXO set restored from snapshot");
            }
        }

        let root = chain.utxo_integrity_root();
        let store = Arc::new(RwLock::new(chain));
        let fees = Arc::new(Mutex::new(FeeEstimator::new()));
        let mempool = Arc::new(Mutex::new(Mempool::new(
            config.mempool_max_size,
            config.min_fee_rate,
        )));
        let engine =
            Arc::new(ConsensusEngine::new(Arc::clone(&store), Arc::clone(&fees)));

        let tip = store.read().tip();
        info!(height = tip.height, tip = %tip.hash, "node opened");

        Ok(Arc::new(Self {
            store,
            mempool,
            fees,
            engine,
            files,
            config,
            metrics: NodeMetrics::default(),
            sessions: Mutex::new(HashMap::new()),
            next_session: AtomicU64::new(1),
            read_only: AtomicBool::new(false),
            last_integrity_root: Mutex::new(root),
        }))
    }

    pub fn metrics(&self) -> &NodeMetrics {
        &self.metrics
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only.load(Ordering::Relaxed)
    }

    fn ensure_writable(&self) -> Result<(), BycError> {
        if self.is_read_only() {
            return Err(StorageError::ReadOnly.into());
        }
        Ok(())
    }

    /// Flip read-only after an unrecoverable storage failure.
    fn enter_read_only(&self, reason: &str) {
        if !self.read_only.swap(true, Ordering::Relaxed) {
            error!(reason, "fatal storage error; chain state is now read-only");
        }
    }

    fn now() -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }

    // ------------------------------------------------------------------
    // Read-only boundary
    // ------------------------------------------------------------------

    pub fn query_utxo(&self, outpoint: &Outpoint) -> Option<Utxo> {
        self.store.read().utxo(outpoint)
    }

    pub fn balance(&self, address: &str, coin_type: CoinType) -> u64 {
        self.store.read().balance(address, coin_type)
    }

    pub fn best_block(&self) -> (Hash256, u64) {
        let tip = self.store.read().tip();
        (tip.hash, tip.height)
    }

    pub fn tip(&self) -> ChainTip {
        self.store.read().tip()
    }

    pub fn get_block(&self, hash: &Hash256) -> Option<Block> {
        self.store.read().block(hash)
    }

    pub fn get_block_at(&self, height: u64) -> Option<Block> {
        self.store.read().block_at(height)
    }

    pub fn supply(&self, coin_type: CoinType) -> u64 {
        self.store.read().supply(coin_type)
    }

    pub fn mempool_len(&self) -> usize {
        self.mempool.lock().len()
    }

    /// Fee quote for a hypothetical transaction size.
    pub fn estimate_fee(&self, size: usize, priority: FeePriority) -> u64 {
        self.fees.lock().estimate_fee(size, priority)
    }

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    /// Decode, validate, and admit a transaction. Returns its hash.
    pub fn submit_transaction(&self, bytes: &[u8]) -> Result<Hash256, BycError> {
        self.ensure_writable()?;

        let tx = Transaction::decode(bytes)?;
        self.submit_decoded(tx)
    }

    /// Validate and admit an already-decoded transaction.
    pub fn submit_decoded(&self, tx: Transaction) -> Result<Hash256, BycError> {
        self.ensure_writable()?;

        // Store read lock, then the mempool mutex: the fixed order.
        let store = self.store.read();
        let tip = store.tip();
        let tip_timestamp =
            store.header(&tip.hash).map(|h| h.timestamp).unwrap_or(0);
        let fees = self.fees.lock().clone();
        let ctx = ValidationContext {
            tip_height: tip.height,
            tip_timestamp,
            fees: &fees,
        };

        let mut pool = self.mempool.lock();
        let view = StoreView { store: &*store };
        let validated = validation::validate_transaction(&tx, &view, &*pool, &ctx)
            .inspect_err(|err| {
                if !matches!(err, ValidationError::Structure(_)) {
                    self.metrics.misbehavior.fetch_add(1, Ordering::Relaxed);
                }
            })?;

        let txid = pool.insert(tx, validated.fee, Self::now())?;
        let fullness = pool.fullness();
        drop(pool);
        drop(store);

        self.fees.lock().set_mempool_fullness(fullness);
        self.metrics.transactions_accepted.fetch_add(1, Ordering::Relaxed);
        Ok(txid)
    }

    // ------------------------------------------------------------------
    // Blocks
    // ------------------------------------------------------------------

    /// Accept a block from any source: extend, side-chain, or reorg. On
    /// success the block is persisted, confirmed transactions leave the
    /// pool, and survivors are revalidated against the new tip.
    pub fn accept_block(&self, block: &Block) -> Result<AcceptOutcome, BycError> {
        self.ensure_writable()?;

        let outcome = self.engine.accept_block(block).inspect_err(|err| {
            if !matches!(err, BycError::Decode(_)) {
                self.metrics.misbehavior.fetch_add(1, Ordering::Relaxed);
            }
        })?;

        match &outcome {
            AcceptOutcome::Extended => {
                self.metrics.blocks_connected.fetch_add(1, Ordering::Relaxed);
                self.persist_from(block.header.height)?;
                self.mempool.lock().remove_confirmed(block);
            }
            AcceptOutcome::SideChain => {}
            AcceptOutcome::Reorganized { reverted, applied } => {
                self.metrics.reorgs.fetch_add(1, Ordering::Relaxed);
                self.metrics.blocks_connected.fetch_add(*applied as u64, Ordering::Relaxed);
                let tip = self.tip();
                let fork_height = tip.height + 1 - *applied as u64;
                let old_tip_height = fork_height - 1 + *reverted as u64;
                // Drop stale files above the new tip, rewrite the branch.
                for height in (tip.height + 1)..=old_tip_height {
                    self.storage_write(|files| files.remove_block(height))?;
                }
                self.persist_from(fork_height)?;
                self.refresh_pool_after_reorg();
            }
        }

        if self.config.integrity_check_interval > 0 {
            let height = self.tip().height;
            if height > 0 && height % self.config.integrity_check_interval == 0 {
                self.run_integrity_check();
            }
        }

        Ok(outcome)
    }

    /// Persist main-chain blocks from `from_height` through the tip.
    fn persist_from(&self, from_height: u64) -> Result<(), BycError> {
        let store = self.store.read();
        let tip_height = store.tip().height;
        for height in from_height..=tip_height {
            let block = store
                .block_at(height)
                .ok_or(ChainStateError::BlockNotFound(format!("height {height}")))?;
            self.storage_write(|files| files.write_block(&block))?;
        }
        Ok(())
    }

    /// Run a storage write, flipping read-only on failure.
    fn storage_write(
        &self,
        op: impl FnOnce(&FileStore) -> Result<(), StorageError>,
    ) -> Result<(), BycError> {
        op(&self.files).inspect_err(|_| self.enter_read_only("storage write failed"))?;
        Ok(())
    }

    /// Revalidate every pool entry against the new tip, silently dropping
    /// the ones the reorg invalidated.
    fn refresh_pool_after_reorg(&self) {
        let store = self.store.read();
        let tip = store.tip();
        let tip_timestamp = store.header(&tip.hash).map(|h| h.timestamp).unwrap_or(0);
        let fees = self.fees.lock().clone();
        let ctx = ValidationContext {
            tip_height: tip.height,
            tip_timestamp,
            fees: &fees,
        };
        let view = StoreView { store: &*store };
        let mut pool = self.mempool.lock();
        pool.retain_valid(|tx| {
            validation::validate_transaction(tx, &view, &NoPool, &ctx).is_ok()
        });
    }

    /// Round-trip the UTXO set through its canonical snapshot and compare
    /// rolling hashes. Divergence means the primary map and its index no
    /// longer agree, which is fatal.
    fn run_integrity_check(&self) {
        let (root, snapshot) = {
            let store = self.store.read();
            (store.utxo_integrity_root(), store.snapshot_utxos())
        };
        let ok = byc_core::UtxoSet::restore(&snapshot)
            .map(|set| set.integrity_check(&root).is_ok())
            .unwrap_or(false);
        if ok {
            *self.last_integrity_root.lock() = root;
        } else {
            self.enter_read_only("UTXO integrity check failed");
        }
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    /// Canonical snapshot bytes of the current UTXO set.
    pub fn snapshot_utxos(&self) -> Vec<u8> {
        self.store.read().snapshot_utxos()
    }

    /// Persist the current UTXO snapshot to disk.
    pub fn save_snapshot(&self) -> Result<(), BycError> {
        self.ensure_writable()?;
        let payload = self.snapshot_utxos();
        self.storage_write(|files| files.write_snapshot(&payload))?;
        *self.last_integrity_root.lock() = self.store.read().utxo_integrity_root();
        Ok(())
    }

    /// Replace the in-memory UTXO set from snapshot bytes.
    pub fn restore_utxos(&self, bytes: &[u8]) -> Result<(), BycError> {
        self.ensure_writable()?;
        self.store.write().restore_utxos(bytes)?;
        *self.last_integrity_root.lock() = self.store.read().utxo_integrity_root();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Mining
    // ------------------------------------------------------------------

    /// Start a mining session paying `address` in `coin_type`.
    pub fn start_mining(
        self: &Arc<Self>,
        address: [u8; 20],
        coin_type: CoinType,
    ) -> Result<SessionId, BycError> {
        self.ensure_writable()?;

        let pool = Arc::clone(&self.mempool);
        let pending = Arc::new(move || pool.lock().best(MAX_TEMPLATE_TXS, Self::now()));

        let node = Arc::clone(self);
        let publish: Publisher = Arc::new(move |block: &Block| {
            node.accept_block(block).map(|_| ())
        });

        let miner = Miner::with_publisher(
            Arc::clone(&self.engine),
            address,
            coin_type,
            pending,
            publish,
        );
        let handle = miner.spawn();
        let id = self.next_session.fetch_add(1, Ordering::Relaxed);
        info!(session = id, coin = %coin_type, "mining session started");
        self.sessions.lock().insert(id, handle);
        Ok(id)
    }

    /// Stop a mining session. Returns false for an unknown id.
    pub fn stop_mining(&self, id: SessionId) -> bool {
        let handle = self.sessions.lock().remove(&id);
        match handle {
            Some(handle) => {
                handle.stop();
                info!(session = id, "mining session stopped");
                true
            }
            None => false,
        }
    }

    /// Stats for a running session.
    pub fn mining_stats(&self, id: SessionId) -> Option<(u64, u64)> {
        let sessions = self.sessions.lock();
        sessions.get(&id).map(|h| {
            let stats: &MinerStats = h.stats();
            (
                stats.hashes.load(Ordering::Relaxed),
                stats.blocks_found.load(Ordering::Relaxed),
            )
        })
    }

    /// Stop all sessions (shutdown path).
    pub fn shutdown(&self) {
        let handles: Vec<MiningHandle> = {
            let mut sessions = self.sessions.lock();
            sessions.drain().map(|(_, handle)| handle).collect()
        };
        for handle in handles {
            handle.stop();
        }
        if !self.is_read_only() {
            if let Err(err) = self.save_snapshot() {
                warn!(%err, "failed to persist snapshot at shutdown");
            }
        }
    }
}

/// A locked store exposed as a [`UtxoView`].
struct StoreView<'a> {
    store: &'a MemoryChainStore,
}

impl UtxoView for StoreView<'_> {
    fn utxo(&self, outpoint: &Outpoint) -> Option<Utxo> {
        self.store.utxo(outpoint)
    }
}
