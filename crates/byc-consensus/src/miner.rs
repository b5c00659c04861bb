//! The proof-of-work miner.
//!
//! A mining session cycles `Idle → Preparing → Hashing → Found →
//! Publishing → Idle`. The hash loop is CPU-bound and cooperative: it
//! checks its cancellation flag and the chain tip every
//! [`MINER_CANCEL_INTERVAL`] nonces, abandons the template when the tip
//! moves, and rolls the header timestamp forward (bounded by local time
//! plus [`MAX_FUTURE_BLOCK_TIME`]) when the nonce space is exhausted.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use byc_core::block::{Block, BlockHeader};
use byc_core::chain_state::ChainStore;
use byc_core::coin::CoinType;
use byc_core::constants::{MAX_FUTURE_BLOCK_TIME, MINER_CANCEL_INTERVAL};
use byc_core::types::Transaction;

use crate::engine::ConsensusEngine;

/// Miner lifecycle states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MinerState {
    Idle,
    Preparing,
    Hashing,
    Found,
    Publishing,
}

/// Why a nonce search stopped without a solution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchStop {
    /// The cancellation flag was raised.
    Cancelled,
    /// The chain tip moved; the template is stale.
    TipChanged,
    /// The timestamp could not roll further without outrunning the clock.
    Exhausted,
}

/// Counters shared with whoever is watching the miner.
#[derive(Debug, Default)]
pub struct MinerStats {
    pub hashes: AtomicU64,
    pub blocks_found: AtomicU64,
    pub templates_discarded: AtomicU64,
}

/// Search the nonce space for a header hash at or below the target.
///
/// Scans nonce 0..=u32::MAX, checking `cancel` and `tip_changed` every
/// [`MINER_CANCEL_INTERVAL`] iterations. On exhaustion the timestamp is
/// bumped by one second — never past `now() + MAX_FUTURE_BLOCK_TIME` —
/// and the scan restarts from nonce zero.
pub fn search(
    header: &mut BlockHeader,
    cancel: &AtomicBool,
    tip_changed: impl Fn() -> bool,
    now: impl Fn() -> u64,
    stats: &MinerStats,
) -> Result<(), SearchStop> {
    search_inner(header, cancel, tip_changed, now, stats, MINER_CANCEL_INTERVAL, u32::MAX)
}

/// The search loop with its scan width and check cadence exposed, so the
/// exhaustion and cancellation paths stay testable.
fn search_inner(
    header: &mut BlockHeader,
    cancel: &AtomicBool,
    tip_changed: impl Fn() -> bool,
    now: impl Fn() -> u64,
    stats: &MinerStats,
    check_interval: u32,
    max_nonce: u32,
) -> Result<(), SearchStop> {
    loop {
        let mut nonce: u32 = 0;
        loop {
            header.nonce = nonce;
            if header.meets_target() {
                stats.hashes.fetch_add(1, Ordering::Relaxed);
                return Ok(());
            }
            if nonce % check_interval == check_interval - 1 {
                stats.hashes.fetch_add(check_interval as u64, Ordering::Relaxed);
                if cancel.load(Ordering::Relaxed) {
                    return Err(SearchStop::Cancelled);
                }
                if tip_changed() {
                    return Err(SearchStop::TipChanged);
                }
            }
            if nonce == max_nonce {
                break;
            }
            nonce += 1;
        }

        // Nonce space exhausted: roll the timestamp and start over.
        if cancel.load(Ordering::Relaxed) {
            return Err(SearchStop::Cancelled);
        }
        if tip_changed() {
            return Err(SearchStop::TipChanged);
        }
        let horizon = now().saturating_add(MAX_FUTURE_BLOCK_TIME);
        if header.timestamp >= horizon {
            return Err(SearchStop::Exhausted);
        }
        header.timestamp += 1;
        debug!(timestamp = header.timestamp, "nonce space exhausted; rolling timestamp");
    }
}

/// A handle to a running mining session.
///
/// Dropping the handle does not stop the worker; call
/// [`MiningHandle::stop`] (or let the node do it).
pub struct MiningHandle {
    cancel: Arc<AtomicBool>,
    stats: Arc<MinerStats>,
    state: Arc<parking_lot::Mutex<MinerState>>,
    worker: Option<std::thread::JoinHandle<()>>,
}

impl MiningHandle {
    pub fn stats(&self) -> &MinerStats {
        &self.stats
    }

    pub fn state(&self) -> MinerState {
        *self.state.lock()
    }

    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    /// Raise the cancellation flag and wait for the worker to exit.
    pub fn stop(mut self) {
        self.cancel.store(true, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// Delivers a solved block into the chain. The node's publisher persists
/// the block and purges the mempool; the default publishes straight
/// through the engine.
pub type Publisher = Arc<dyn Fn(&Block) -> Result<(), byc_core::BycError> + Send + Sync>;

/// The mining loop driver.
pub struct Miner<S: ChainStore + 'static> {
    engine: Arc<ConsensusEngine<S>>,
    payout_address: [u8; 20],
    coin_type: CoinType,
    /// Pending-transaction source consulted when preparing each template.
    pending: Arc<dyn Fn() -> Vec<Transaction> + Send + Sync>,
    publish: Publisher,
}

impl<S: ChainStore + 'static> Miner<S> {
    /// A miner that publishes solved blocks through the engine alone.
    pub fn new(
        engine: Arc<ConsensusEngine<S>>,
        payout_address: [u8; 20],
        coin_type: CoinType,
        pending: Arc<dyn Fn() -> Vec<Transaction> + Send + Sync>,
    ) -> Self {
        let publish_engine = Arc::clone(&engine);
        let publish: Publisher = Arc::new(move |block| publish_engine.apply_block(block));
        Self::with_publisher(engine, payout_address, coin_type, pending, publish)
    }

    /// A miner with a custom publish pathway.
    pub fn with_publisher(
        engine: Arc<ConsensusEngine<S>>,
        payout_address: [u8; 20],
        coin_type: CoinType,
        pending: Arc<dyn Fn() -> Vec<Transaction> + Send + Sync>,
        publish: Publisher,
    ) -> Self {
        Self { engine, payout_address, coin_type, pending, publish }
    }

    /// Run one full cycle: prepare a template, search it, publish on
    /// success. Returns the published block, or `None` if the search was
    /// cancelled or the template went stale (the caller loops).
    pub fn mine_one(&self, cancel: &AtomicBool, stats: &MinerStats) -> Option<Block> {
        self.mine_cycle(cancel, stats, &parking_lot::Mutex::new(MinerState::Idle))
    }

    fn mine_cycle(
        &self,
        cancel: &AtomicBool,
        stats: &MinerStats,
        state: &parking_lot::Mutex<MinerState>,
    ) -> Option<Block> {
        *state.lock() = MinerState::Preparing;
        let pending = (self.pending)();
        let mut block = match self.engine.build_template(
            &self.payout_address,
            self.coin_type,
            &pending,
        ) {
            Ok(block) => block,
            Err(err) => {
                warn!(%err, "failed to build block template");
                *state.lock() = MinerState::Idle;
                return None;
            }
        };
        let template_tip = block.header.prev_hash;
        debug!(
            height = block.header.height,
            txs = block.transactions.len(),
            "template prepared",
        );

        *state.lock() = MinerState::Hashing;
        let engine = &self.engine;
        let result = search(
            &mut block.header,
            cancel,
            || engine.tip().hash != template_tip,
            || {
                std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_secs()
            },
            stats,
        );

        match result {
            Ok(()) => {}
            Err(SearchStop::Cancelled) => {
                *state.lock() = MinerState::Idle;
                return None;
            }
            Err(SearchStop::TipChanged) | Err(SearchStop::Exhausted) => {
                // The template went stale; the next cycle rebuilds it.
                stats.templates_discarded.fetch_add(1, Ordering::Relaxed);
                debug!("discarding stale template");
                *state.lock() = MinerState::Idle;
                return None;
            }
        }

        *state.lock() = MinerState::Found;
        stats.blocks_found.fetch_add(1, Ordering::Relaxed);

        *state.lock() = MinerState::Publishing;
        let outcome = (self.publish)(&block);
        *state.lock() = MinerState::Idle;
        match outcome {
            Ok(()) => {
                info!(height = block.header.height, hash = %block.hash(), "block published");
                Some(block)
            }
            Err(err) => {
                warn!(%err, "mined block rejected at publish");
                None
            }
        }
    }

    /// Spawn the session worker: mine blocks until cancelled.
    pub fn spawn(self) -> MiningHandle {
        let cancel = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(MinerStats::default());
        let state = Arc::new(parking_lot::Mutex::new(MinerState::Idle));
        let worker_cancel = Arc::clone(&cancel);
        let worker_stats = Arc::clone(&stats);
        let worker_state = Arc::clone(&state);
        let worker = std::thread::Builder::new()
            .name("byc-miner".into())
            .spawn(move || {
                while !worker_cancel.load(Ordering::Relaxed) {
                    self.mine_cycle(&worker_cancel, &worker_stats, &worker_state);
                }
                debug!("mining session stopped");
            })
            .expect("spawning the miner thread cannot fail");
        MiningHandle { cancel, stats, state, worker: Some(worker) }
    }
}
