//! Protocol constants. All monetary values are integer smallest units of
//! their coin type (1 Leah is the smallest mineable unit).

/// Base block reward at height 1, in whole units of the mined coin type.
pub const INITIAL_REWARD: u64 = 50;

/// Blocks between reward halvings.
pub const HALVING_INTERVAL: u64 = 210_000;

/// Target seconds between blocks.
pub const BLOCK_TIME_SECS: u64 = 600;

/// Blocks between difficulty retargets.
pub const RETARGET_INTERVAL: u64 = 2016;

/// Confirmations required before a coinbase output may be spent.
pub const COINBASE_MATURITY: u64 = 100;

/// Number of trailing block timestamps whose median bounds a new block's
/// timestamp from below.
pub const MEDIAN_TIME_SPAN: usize = 11;

/// Maximum seconds a block timestamp may run ahead of local wall-clock time.
pub const MAX_FUTURE_BLOCK_TIME: u64 = 7200;

/// Maximum serialized transaction size in bytes (100 KiB).
pub const MAX_TX_SIZE: usize = 100 * 1024;

/// Maximum serialized block size in bytes.
pub const MAX_BLOCK_SIZE: usize = 1_048_576;

/// Maximum transactions drawn from the pool for one block template.
pub const MAX_TEMPLATE_TXS: usize = 1000;

/// Maximum script length in bytes.
pub const MAX_SCRIPT_SIZE: usize = 10_000;

/// Maximum non-push opcodes executed per script pair.
pub const MAX_SCRIPT_OPS: usize = 201;

/// Maximum script stack depth.
pub const MAX_STACK_SIZE: usize = 1000;

/// Maximum bytes of arbitrary data in a coinbase script_sig after the
/// height prefix.
pub const MAX_COINBASE_DATA: usize = 100;

/// Lock-time values below this threshold are block heights; values at or
/// above it are Unix timestamps.
pub const LOCKTIME_THRESHOLD: u32 = 500_000_000;

/// Sequence value that disables lock-time enforcement for an input.
pub const SEQUENCE_FINAL: u32 = 0xFFFF_FFFF;

/// Flat fee component in smallest units.
pub const BASE_FEE: u64 = 1;

/// Per-byte fee component in smallest units.
pub const FEE_PER_BYTE: f64 = 0.01;

/// Divisor for the cross-chain transfer fee floor: fee must be at least
/// `ceil(total_output / CROSS_CHAIN_FEE_DIVISOR)`.
pub const CROSS_CHAIN_FEE_DIVISOR: u64 = 1000;

/// Default maximum number of transactions in the mempool.
pub const DEFAULT_MEMPOOL_MAX_SIZE: usize = 5_000;

/// Default minimum fee rate (smallest units per byte) for pool admission.
pub const DEFAULT_MIN_FEE_RATE: f64 = 0.001;

/// Nonces scanned between cancellation checks in the mining loop.
pub const MINER_CANCEL_INTERVAL: u32 = 1 << 20;

/// Magic bytes prefixing the UTXO snapshot file.
pub const SNAPSHOT_MAGIC: [u8; 4] = *b"BYCU";

/// Current UTXO snapshot format version.
pub const SNAPSHOT_VERSION: u8 = 1;

/// Blocks between automatic UTXO integrity scans.
pub const INTEGRITY_CHECK_INTERVAL: u64 = 1000;

/// Attempts for retriable storage operations before surfacing the error.
pub const MAX_IO_RETRIES: u32 = 3;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_magic_spells_bycu() {
        assert_eq!(&SNAPSHOT_MAGIC, b"BYCU");
    }

    #[test]
    fn retarget_window_is_two_weeks() {
        assert_eq!(RETARGET_INTERVAL * BLOCK_TIME_SECS, 14 * 24 * 60 * 60);
    }

    #[test]
    fn locktime_threshold_matches_sequence_semantics() {
        assert!(LOCKTIME_THRESHOLD < SEQUENCE_FINAL);
    }
}
