//! Test fixtures: in-memory chains, deterministic keys, signed spends,
//! and block builders that mine against the easiest target.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use byc_consensus::engine::ConsensusEngine;
use byc_core::block::{Block, BlockHeader};
use byc_core::chain_state::MemoryChainStore;
use byc_core::coin::CoinType;
use byc_core::crypto::Keypair;
use byc_core::fee::FeeEstimator;
use byc_core::hash::Hash256;
use byc_core::merkle;
use byc_core::script::sighash::signature_hash;
use byc_core::script::templates::{p2pkh_script, p2pkh_script_sig};
use byc_core::target::MAX_TARGET_BITS;
use byc_core::types::{Outpoint, Transaction, TxInput, TxOutput};

/// Fixed test clock origin.
pub const T0: u64 = 1_704_067_200;

/// A consensus engine over a fresh in-memory store with a fixed clock.
pub fn test_engine() -> Arc<ConsensusEngine<MemoryChainStore>> {
    let store = Arc::new(RwLock::new(MemoryChainStore::new()));
    let fees = Arc::new(Mutex::new(FeeEstimator::new()));
    Arc::new(ConsensusEngine::with_clock(store, fees, || T0 + 1_000_000))
}

/// A deterministic keypair derived from a single seed byte.
pub fn key(seed: u8) -> Keypair {
    Keypair::from_secret_bytes(&[seed.max(1); 32]).expect("nonzero seed is a valid secret")
}

/// The hex address form of a raw 20-byte payload.
pub fn addr(payload: &[u8; 20]) -> String {
    hex::encode(payload)
}

/// Scan nonces until the header satisfies its own target.
pub fn mine(block: &mut Block) {
    while !block.header.meets_target() {
        block.header.nonce += 1;
    }
}

/// Build and mine a block from raw parts, without engine help.
pub fn raw_block(prev: Hash256, height: u64, timestamp: u64, txs: Vec<Transaction>) -> Block {
    let hashes: Vec<Hash256> = txs.iter().map(Transaction::hash).collect();
    let mut block = Block {
        header: BlockHeader {
            version: 1,
            prev_hash: prev,
            merkle_root: merkle::merkle_root(&hashes),
            timestamp,
            difficulty_bits: MAX_TARGET_BITS,
            nonce: 0,
            height,
        },
        transactions: txs,
    };
    mine(&mut block);
    block
}

/// A coinbase paying `value` of `coin` to a raw address payload.
pub fn coinbase_to(height: u64, value: u64, payload: &[u8; 20], coin: CoinType) -> Transaction {
    Transaction::new_coinbase(height, b"", vec![TxOutput::new(value, p2pkh_script(payload))], coin)
}

/// Mine one template-built block paying `payload` and apply it.
pub fn advance(
    engine: &ConsensusEngine<MemoryChainStore>,
    payload: &[u8; 20],
    pending: &[Transaction],
) -> Block {
    let mut block = engine
        .build_template(payload, CoinType::Leah, pending)
        .expect("template build succeeds in tests");
    mine(&mut block);
    engine.apply_block(&block).expect("mined template applies in tests");
    block
}

/// Mine `n` empty blocks to a throwaway address.
pub fn advance_n(engine: &ConsensusEngine<MemoryChainStore>, n: usize) {
    for _ in 0..n {
        advance(engine, &[0xFE; 20], &[]);
    }
}

/// A one-input/one-output transaction spending `outpoint` (locked to
/// `kp`'s pubkey hash) into a plain P2PKH output for `to`.
pub fn signed_transfer(
    kp: &Keypair,
    outpoint: Outpoint,
    out_value: u64,
    to: &[u8; 20],
    coin: CoinType,
) -> Transaction {
    let spk = p2pkh_script(&kp.public_key().pubkey_hash());
    let mut tx = Transaction::new(
        1,
        vec![TxInput::new(outpoint, Vec::new())],
        vec![TxOutput::new(out_value, p2pkh_script(to))],
        0,
        coin,
    );
    let sighash = signature_hash(&tx, 0, &spk);
    tx.inputs[0].script_sig = p2pkh_script_sig(&kp.sign(&sighash), &kp.public_key().to_bytes());
    tx.refresh_hash();
    tx
}

/// The outpoint of a block's coinbase output zero.
pub fn coinbase_outpoint(block: &Block) -> Outpoint {
    Outpoint::new(block.transactions[0].hash(), 0)
}
