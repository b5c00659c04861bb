//! # byc-core
//! Foundation types and consensus primitives for the BYC protocol:
//! the multi-denomination transaction model, script engine, UTXO set,
//! mempool, validators, and chain state.

pub mod block;
pub mod block_validation;
pub mod chain_state;
pub mod coin;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod fee;
pub mod genesis;
pub mod hash;
pub mod mempool;
pub mod merkle;
pub mod reward;
pub mod script;
pub mod serialize;
pub mod target;
pub mod traits;
pub mod types;
pub mod utxo_set;
pub mod validation;

pub use block::{Block, BlockHeader, ChainTip};
pub use coin::{CoinClass, CoinType};
pub use error::BycError;
pub use hash::{hash160, hash256, Hash256};
pub use types::{Outpoint, Transaction, TxInput, TxOutput};
pub use utxo_set::{Utxo, UtxoSet};
