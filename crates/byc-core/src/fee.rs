//! Fee policy.
//!
//! The minimum fee for a transaction is
//!
//! ```text
//! ceil(base_fee + size · per_byte · load · mempool · size_m · priority · age)
//! ```
//!
//! where every multiplier is a float clamped to `[0.8, 2.0]`, derived from
//! rolling averages the estimator maintains: block interval (network
//! load), block size (size pressure), mempool fullness, and the oldest
//! spent input's age. Cross-chain Antion transfers additionally pay at
//! least `ceil(total_output / 1000)`.

use std::collections::VecDeque;

use crate::coin::CoinType;
use crate::constants::{
    BASE_FEE, BLOCK_TIME_SECS, CROSS_CHAIN_FEE_DIVISOR, FEE_PER_BYTE, MAX_BLOCK_SIZE,
};

/// Bounds for every fee multiplier.
pub const MULTIPLIER_MIN: f64 = 0.8;
pub const MULTIPLIER_MAX: f64 = 2.0;

/// Blocks in the rolling averages.
const WINDOW: usize = 32;

/// Caller-selected urgency, the priority multiplier input.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FeePriority {
    Low,
    #[default]
    Normal,
    High,
}

impl FeePriority {
    fn multiplier(self) -> f64 {
        match self {
            FeePriority::Low => MULTIPLIER_MIN,
            FeePriority::Normal => 1.0,
            FeePriority::High => MULTIPLIER_MAX,
        }
    }
}

fn clamp(value: f64) -> f64 {
    value.clamp(MULTIPLIER_MIN, MULTIPLIER_MAX)
}

/// Rolling network statistics feeding the fee multipliers.
#[derive(Debug, Clone)]
pub struct FeeEstimator {
    block_intervals: VecDeque<u64>,
    block_sizes: VecDeque<usize>,
    /// Mempool fill fraction in `[0, 1]`, refreshed by the pool.
    mempool_fullness: f64,
}

impl FeeEstimator {
    pub fn new() -> Self {
        Self {
            block_intervals: VecDeque::with_capacity(WINDOW),
            block_sizes: VecDeque::with_capacity(WINDOW),
            mempool_fullness: 0.0,
        }
    }

    /// Record an applied block's interval to its parent and its size.
    pub fn record_block(&mut self, interval_secs: u64, size_bytes: usize) {
        if self.block_intervals.len() == WINDOW {
            self.block_intervals.pop_front();
        }
        self.block_intervals.push_back(interval_secs);
        if self.block_sizes.len() == WINDOW {
            self.block_sizes.pop_front();
        }
        self.block_sizes.push_back(size_bytes);
    }

    /// Refresh the mempool fill fraction (clamped into `[0, 1]`).
    pub fn set_mempool_fullness(&mut self, fraction: f64) {
        self.mempool_fullness = fraction.clamp(0.0, 1.0);
    }

    fn avg_interval(&self) -> f64 {
        if self.block_intervals.is_empty() {
            return BLOCK_TIME_SECS as f64;
        }
        let sum: u64 = self.block_intervals.iter().sum();
        sum as f64 / self.block_intervals.len() as f64
    }

    fn avg_block_size(&self) -> f64 {
        if self.block_sizes.is_empty() {
            return 0.0;
        }
        let sum: usize = self.block_sizes.iter().sum();
        sum as f64 / self.block_sizes.len() as f64
    }

    /// Blocks arriving faster than the target signal demand for space.
    fn network_load_multiplier(&self) -> f64 {
        clamp(BLOCK_TIME_SECS as f64 / self.avg_interval().max(1.0))
    }

    /// Fuller recent blocks push fees up.
    fn size_multiplier(&self) -> f64 {
        clamp(MULTIPLIER_MIN + 1.2 * (self.avg_block_size() / MAX_BLOCK_SIZE as f64))
    }

    fn mempool_multiplier(&self) -> f64 {
        clamp(MULTIPLIER_MIN + 1.2 * self.mempool_fullness)
    }

    /// Old inputs earn a discount; freshly created ones pay a premium.
    fn utxo_age_multiplier(&self, oldest_input_age_blocks: u64) -> f64 {
        clamp(1.2 - oldest_input_age_blocks as f64 / 5_000.0)
    }

    /// Minimum fee in smallest units for a transaction of `size` bytes
    /// whose oldest spent input is `oldest_input_age_blocks` old.
    pub fn min_fee(
        &self,
        size: usize,
        oldest_input_age_blocks: u64,
        priority: FeePriority,
    ) -> u64 {
        let variable = size as f64
            * FEE_PER_BYTE
            * self.network_load_multiplier()
            * self.mempool_multiplier()
            * self.size_multiplier()
            * priority.multiplier()
            * self.utxo_age_multiplier(oldest_input_age_blocks);
        (BASE_FEE as f64 + variable).ceil() as u64
    }

    /// Fee quote for a hypothetical transaction, for external callers.
    /// Uses a fresh-input age of zero (the conservative case).
    pub fn estimate_fee(&self, size: usize, priority: FeePriority) -> u64 {
        self.min_fee(size, 0, priority)
    }
}

impl Default for FeeEstimator {
    fn default() -> Self {
        Self::new()
    }
}

/// Fee floor for cross-chain Antion transfers: `ceil(total_output / 1000)`.
pub fn cross_chain_min_fee(total_output: u64) -> u64 {
    total_output.div_ceil(CROSS_CHAIN_FEE_DIVISOR)
}

/// Whether a transaction of this coin type is a cross-chain transfer.
pub fn is_cross_chain(coin_type: CoinType) -> bool {
    coin_type == CoinType::Antion
}
