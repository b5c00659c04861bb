//! # byc-consensus
//! Proof-of-work consensus for the BYC protocol: block template assembly,
//! difficulty retargeting, the nonce search with cooperative cancellation,
//! and the apply/revert pipeline with work-based fork choice.

pub mod engine;
pub mod miner;

pub use engine::{AcceptOutcome, ConsensusEngine};
pub use miner::{Miner, MinerState, MinerStats, MiningHandle, SearchStop};
