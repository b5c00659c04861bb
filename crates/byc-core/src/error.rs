//! Error types for the BYC protocol.
use thiserror::Error;

/// Errors from decoding canonical byte streams.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unexpected end of input: needed {needed} more bytes")] UnexpectedEof { needed: usize },
    #[error("trailing bytes after decode: {0}")] TrailingBytes(usize),
    #[error("non-canonical varint encoding")] NonCanonicalVarint,
    #[error("varint exceeds u64 range")] VarintOverflow,
    #[error("unknown coin type tag: {0:?}")] UnknownCoinType(String),
    #[error("length field too large: {len} > {max}")] LengthTooLarge { len: u64, max: usize },
    #[error("invalid snapshot magic")] BadMagic,
    #[error("unsupported format version: {0}")] UnsupportedVersion(u8),
    #[error("snapshot entries not in canonical order")] UnorderedSnapshot,
    #[error("trailer hash mismatch")] TrailerMismatch,
}

/// Errors from the script interpreter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    #[error("stack underflow in {0}")] StackUnderflow(&'static str),
    #[error("stack depth exceeds {0}")] StackOverflow(usize),
    #[error("unknown opcode: {0:#04x}")] UnknownOpcode(u8),
    #[error("script exceeds {0} bytes")] ScriptTooLarge(usize),
    #[error("operation count exceeds {0}")] TooManyOps(usize),
    #[error("push data runs past end of script")] TruncatedPush,
    #[error("verify failed")] VerifyFailed,
    #[error("malformed number on stack")] BadNumber,
    #[error("lock time not yet reached")] LockTimeUnsatisfied,
    #[error("negative lock time operand")] NegativeLockTime,
    #[error("witness program mismatch")] WitnessMismatch,
    #[error("malformed multisig layout")] BadMultisig,
    #[error("script finished with false or empty stack")] EvalFalse,
}

/// Errors from key handling and signature checks.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid public key bytes")] InvalidPublicKey,
    #[error("invalid secret key bytes")] InvalidSecretKey,
    #[error("invalid signature bytes")] InvalidSignature,
    #[error("signature verification failed")] VerificationFailed,
    #[error("taproot tweak produced the point at infinity")] InvalidTweak,
}

/// Transaction validation failures, structural and contextual.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("malformed structure: {0}")] Structure(String),
    #[error("zero-value output at index {0}")] ZeroOutput(usize),
    #[error("transaction size {size} exceeds {max}")] TooLarge { size: usize, max: usize },
    #[error("stale transaction hash")] StaleHash,
    #[error("double spend of outpoint {0}")] DoubleSpend(String),
    #[error("unknown input: {0}")] UnknownInput(String),
    #[error("input {0} spends an already-consumed output")] SpentInput(String),
    #[error("immature coinbase spend at input {index}: {confirmations} of {required} confirmations")]
    Immature { index: usize, confirmations: u64, required: u64 },
    #[error("coin type mismatch at {0}")] InvalidCoinType(String),
    #[error("cross-chain transfer must use Antion on both sides")] InvalidCrossChain,
    #[error("insufficient funds: inputs {inputs} < outputs {outputs}")]
    InsufficientFunds { inputs: u64, outputs: u64 },
    #[error("fee {fee} below minimum {minimum}")] FeeTooLow { fee: u64, minimum: u64 },
    #[error("script failure on input {index}: {source}")]
    ScriptFailure { index: usize, source: ScriptError },
    #[error("lock time {lock_time} not reached")] LockTime { lock_time: u32 },
    #[error("value overflow")] ValueOverflow,
}

/// Block validation failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlockError {
    #[error("invalid proof of work")] InvalidPow,
    #[error("invalid previous hash")] InvalidPrevHash,
    #[error("invalid merkle root")] InvalidMerkleRoot,
    #[error("invalid difficulty bits: got {got:#x}, expected {expected:#x}")]
    InvalidDifficulty { got: u32, expected: u32 },
    #[error("timestamp below median of recent blocks")] TimestampTooOld,
    #[error("timestamp too far in the future: {0}s ahead")] TimestampTooFar(u64),
    #[error("block has no coinbase")] NoCoinbase,
    #[error("first transaction is not coinbase")] FirstTxNotCoinbase,
    #[error("multiple coinbase transactions")] MultipleCoinbase,
    #[error("coinbase height mismatch: script says {script}, block is {block}")]
    CoinbaseHeightMismatch { script: u64, block: u64 },
    #[error("coinbase value {got} exceeds reward plus fees {expected}")]
    InvalidReward { got: u64, expected: u64 },
    #[error("duplicate txid: {0}")] DuplicateTxid(String),
    #[error("double spend across block transactions: {0}")] DoubleSpend(String),
    #[error("oversized block: {size} > {max}")] OversizedBlock { size: usize, max: usize },
    #[error("height mismatch: expected {expected}, got {got}")] HeightMismatch { expected: u64, got: u64 },
    #[error("transaction {index}: {source}")] Transaction { index: usize, source: ValidationError },
}

/// Mempool admission failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MempoolError {
    #[error("transaction already in pool: {0}")] AlreadyExists(String),
    #[error("pool full and fee rate does not beat the lowest entry")] PoolFull,
    #[error("fee rate {rate} below pool minimum {minimum}")] FeeRateTooLow { rate: f64, minimum: f64 },
    #[error(transparent)] Validation(#[from] ValidationError),
}

/// Chain state and UTXO set failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainStateError {
    #[error("empty chain: no blocks connected")] EmptyChain,
    #[error("block not found: {0}")] BlockNotFound(String),
    #[error("duplicate block: {0}")] DuplicateBlock(String),
    #[error("unknown parent block: {0}")] UnknownParent(String),
    #[error("height mismatch: expected {expected}, got {got}")] HeightMismatch { expected: u64, got: u64 },
    #[error("undo data missing for block: {0}")] UndoDataMissing(String),
    #[error("duplicate UTXO outpoint {0}: chain state corrupt")] DuplicateUtxo(String),
    #[error("UTXO missing during apply: {0}")] MissingUtxo(String),
    #[error("supply ceiling exceeded for {coin}: {would_be} > {ceiling}")]
    SupplyExceeded { coin: &'static str, would_be: u64, ceiling: u64 },
    #[error("UTXO set integrity check failed")] IntegrityFailure,
    #[error("reorganization failed and old branch was restored: {0}")] ReorgFailed(String),
}

/// Storage-layer failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("io: {0}")] Io(String),
    #[error("snapshot corrupt and no usable backup")] SnapshotCorrupt,
    #[error("block file missing for height {0}")] BlockFileMissing(u64),
    #[error("chain state is read-only after a fatal error")] ReadOnly,
}

/// Umbrella error for the protocol crates.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BycError {
    #[error(transparent)] Decode(#[from] DecodeError),
    #[error(transparent)] Script(#[from] ScriptError),
    #[error(transparent)] Crypto(#[from] CryptoError),
    #[error(transparent)] Validation(#[from] ValidationError),
    #[error(transparent)] Block(#[from] BlockError),
    #[error(transparent)] Mempool(#[from] MempoolError),
    #[error(transparent)] ChainState(#[from] ChainStateError),
    #[error(transparent)] Storage(#[from] StorageError),
}
