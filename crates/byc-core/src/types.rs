//! Transaction model: outpoints, inputs, outputs, and typed transactions.
//!
//! Canonical transaction encoding:
//!
//! ```text
//! version (4 LE) || varint(input_count) || inputs
//!                || varint(output_count) || outputs
//!                || lock_time (4 LE) || coin_type_tag
//! input:  prev_hash (32) || prev_index (4 LE) || varint(script_len) || script || sequence (4 LE)
//! output: value (8 LE) || varint(script_len) || script
//! ```
//!
//! The transaction hash is double-SHA-256 over exactly those bytes. Witness
//! stacks, when present, are appended after the coin-type tag behind a
//! `0x01` marker and never enter the hash preimage.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::coin::CoinType;
use crate::constants::{MAX_SCRIPT_SIZE, MAX_TX_SIZE, SEQUENCE_FINAL};
use crate::error::DecodeError;
use crate::hash::{hash256, Hash256};
use crate::script::templates;
use crate::serialize::{write_sized_bytes, write_varint, Reader};

/// Marker byte introducing the optional witness section.
const WITNESS_MARKER: u8 = 0x01;

/// Reference to a specific output of a previous transaction.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Outpoint {
    /// Hash of the transaction containing the referenced output.
    pub txid: Hash256,
    /// Index of the output within that transaction.
    pub vout: u32,
}

impl Outpoint {
    /// Output index marking a coinbase input.
    pub const COINBASE_VOUT: u32 = 0xFFFF_FFFF;

    pub fn new(txid: Hash256, vout: u32) -> Self {
        Self { txid, vout }
    }

    /// The null outpoint used by coinbase inputs.
    pub fn null() -> Self {
        Self { txid: Hash256::ZERO, vout: Self::COINBASE_VOUT }
    }

    pub fn is_null(&self) -> bool {
        self.txid.is_zero() && self.vout == Self::COINBASE_VOUT
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.txid.as_bytes());
        out.extend_from_slice(&self.vout.to_le_bytes());
    }

    pub fn decode(reader: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let txid = Hash256(reader.read_hash_bytes()?);
        let vout = reader.read_u32()?;
        Ok(Self { txid, vout })
    }
}

impl fmt::Display for Outpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

/// A transaction input spending a previous output.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TxInput {
    /// The outpoint being spent. Null for coinbase.
    pub previous_output: Outpoint,
    /// Unlocking script. For coinbase: varint-encoded height plus free bytes.
    pub script_sig: Vec<u8>,
    /// Sequence number; `SEQUENCE_FINAL` disables lock-time enforcement.
    pub sequence: u32,
    /// Witness stack for segwit spends; empty otherwise.
    pub witness: Vec<Vec<u8>>,
}

impl TxInput {
    pub fn new(previous_output: Outpoint, script_sig: Vec<u8>) -> Self {
        Self { previous_output, script_sig, sequence: SEQUENCE_FINAL, witness: Vec::new() }
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        self.previous_output.encode(out);
        write_sized_bytes(out, &self.script_sig);
        out.extend_from_slice(&self.sequence.to_le_bytes());
    }

    pub fn decode(reader: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let previous_output = Outpoint::decode(reader)?;
        let script_sig = reader.read_sized_bytes(MAX_SCRIPT_SIZE)?;
        let sequence = reader.read_u32()?;
        Ok(Self { previous_output, script_sig, sequence, witness: Vec::new() })
    }
}

/// A transaction output creating a new UTXO.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TxOutput {
    /// Value in smallest units. Never zero at admission.
    pub value: u64,
    /// Locking script.
    pub script_pub_key: Vec<u8>,
    /// Hex form of the script's 20- or 32-byte payload, materialized for
    /// the address index. Empty for non-standard scripts; not authoritative.
    pub address: String,
}

impl TxOutput {
    /// Build an output, materializing the address from the script.
    pub fn new(value: u64, script_pub_key: Vec<u8>) -> Self {
        let address = templates::script_address(&script_pub_key).unwrap_or_default();
        Self { value, script_pub_key, address }
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.value.to_le_bytes());
        write_sized_bytes(out, &self.script_pub_key);
    }

    pub fn decode(reader: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let value = reader.read_u64()?;
        let script_pub_key = reader.read_sized_bytes(MAX_SCRIPT_SIZE)?;
        Ok(Self::new(value, script_pub_key))
    }
}

/// A typed transaction.
///
/// The `hash` and `fee` fields are caches: `hash` is refreshed by the
/// constructors and [`refresh_hash`](Self::refresh_hash), and a transaction
/// whose cached hash disagrees with its recomputed hash is rejected at
/// validation. Equality compares consensus fields only.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub lock_time: u32,
    /// Denomination shared by every input and output.
    pub coin_type: CoinType,
    /// Free-form coinbase payload mirrored out of the coinbase script_sig
    /// (the script_sig bytes are authoritative).
    pub data: Option<Vec<u8>>,
    /// Cached fee in smallest units; authoritative fee is Σinputs − Σoutputs.
    pub fee: u64,
    hash: Hash256,
}

impl Transaction {
    /// Build a transaction and compute its hash.
    pub fn new(
        version: u32,
        inputs: Vec<TxInput>,
        outputs: Vec<TxOutput>,
        lock_time: u32,
        coin_type: CoinType,
    ) -> Self {
        let mut tx = Self {
            version,
            inputs,
            outputs,
            lock_time,
            coin_type,
            data: None,
            fee: 0,
            hash: Hash256::ZERO,
        };
        tx.refresh_hash();
        tx
    }

    /// Build a coinbase transaction for `height`.
    ///
    /// The script_sig is `varint(height) || data`, which keeps coinbase
    /// hashes unique across heights.
    pub fn new_coinbase(
        height: u64,
        data: &[u8],
        outputs: Vec<TxOutput>,
        coin_type: CoinType,
    ) -> Self {
        let mut script_sig = Vec::with_capacity(9 + data.len());
        write_varint(&mut script_sig, height);
        script_sig.extend_from_slice(data);
        let input = TxInput::new(Outpoint::null(), script_sig);
        let mut tx = Self::new(1, vec![input], outputs, 0, coin_type);
        tx.data = if data.is_empty() { None } else { Some(data.to_vec()) };
        tx
    }

    /// The cached transaction hash.
    pub fn hash(&self) -> Hash256 {
        self.hash
    }

    /// Recompute the hash from the current field values.
    pub fn computed_hash(&self) -> Hash256 {
        let mut buf = Vec::with_capacity(self.base_size());
        self.encode_base(&mut buf);
        hash256(&buf)
    }

    /// Refresh the cached hash. Must be called after mutating any field.
    pub fn refresh_hash(&mut self) {
        self.hash = self.computed_hash();
    }

    /// Whether the cached hash matches the recomputed hash.
    pub fn hash_is_fresh(&self) -> bool {
        self.hash == self.computed_hash()
    }

    /// Exactly one input spending the null outpoint.
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].previous_output.is_null()
    }

    /// Block height encoded at the front of a coinbase script_sig.
    pub fn coinbase_height(&self) -> Option<u64> {
        if !self.is_coinbase() {
            return None;
        }
        let mut reader = Reader::new(&self.inputs[0].script_sig);
        reader.read_varint().ok()
    }

    /// Sum of output values; `None` on overflow.
    pub fn total_output_value(&self) -> Option<u64> {
        self.outputs.iter().try_fold(0u64, |acc, out| acc.checked_add(out.value))
    }

    /// Whether any input carries witness data.
    pub fn has_witness(&self) -> bool {
        self.inputs.iter().any(|input| !input.witness.is_empty())
    }

    /// Serialize the hash preimage: consensus fields, no witness data.
    pub fn encode_base(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.version.to_le_bytes());
        write_varint(out, self.inputs.len() as u64);
        for input in &self.inputs {
            input.encode(out);
        }
        write_varint(out, self.outputs.len() as u64);
        for output in &self.outputs {
            output.encode(out);
        }
        out.extend_from_slice(&self.lock_time.to_le_bytes());
        self.coin_type.encode(out);
    }

    /// Serialize the full transaction, appending witness stacks when present.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.base_size());
        self.encode_base(&mut out);
        if self.has_witness() {
            out.push(WITNESS_MARKER);
            for input in &self.inputs {
                write_varint(&mut out, input.witness.len() as u64);
                for item in &input.witness {
                    write_sized_bytes(&mut out, item);
                }
            }
        }
        out
    }

    /// Decode a canonical transaction, consuming the entire input.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = Reader::new(bytes);
        let tx = Self::decode_from(&mut reader)?;
        reader.finish()?;
        Ok(tx)
    }

    fn decode_from(reader: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let version = reader.read_u32()?;
        let input_count = reader.read_count(MAX_TX_SIZE)?;
        let mut inputs = Vec::with_capacity(input_count);
        for _ in 0..input_count {
            inputs.push(TxInput::decode(reader)?);
        }
        let output_count = reader.read_count(MAX_TX_SIZE)?;
        let mut outputs = Vec::with_capacity(output_count);
        for _ in 0..output_count {
            outputs.push(TxOutput::decode(reader)?);
        }
        let lock_time = reader.read_u32()?;
        let coin_type = CoinType::decode(reader)?;

        let mut tx = Self::new(version, inputs, outputs, lock_time, coin_type);

        // Optional witness section.
        if !reader.is_empty() {
            let marker = reader.read_u8()?;
            if marker != WITNESS_MARKER {
                return Err(DecodeError::TrailingBytes(reader.remaining() + 1));
            }
            for input in &mut tx.inputs {
                let items = reader.read_count(MAX_TX_SIZE)?;
                let mut witness = Vec::with_capacity(items);
                for _ in 0..items {
                    witness.push(reader.read_sized_bytes(MAX_SCRIPT_SIZE)?);
                }
                input.witness = witness;
            }
        }

        // Mirror the coinbase payload out of the script_sig.
        if tx.is_coinbase() {
            let mut sig = Reader::new(&tx.inputs[0].script_sig);
            if sig.read_varint().is_ok() && sig.remaining() > 0 {
                let rest = sig.remaining();
                let start = tx.inputs[0].script_sig.len() - rest;
                tx.data = Some(tx.inputs[0].script_sig[start..].to_vec());
            }
        }

        Ok(tx)
    }

    /// Serialized length of the hash preimage (no witness data).
    pub fn base_size(&self) -> usize {
        let mut size = 4 + 4 + self.coin_type.encoded_len();
        size += crate::serialize::varint_len(self.inputs.len() as u64);
        for input in &self.inputs {
            size += 32 + 4 + 4;
            size += crate::serialize::varint_len(input.script_sig.len() as u64);
            size += input.script_sig.len();
        }
        size += crate::serialize::varint_len(self.outputs.len() as u64);
        for output in &self.outputs {
            size += 8;
            size += crate::serialize::varint_len(output.script_pub_key.len() as u64);
            size += output.script_pub_key.len();
        }
        size
    }

    /// Exact serialized byte length of the hash preimage.
    pub fn size(&self) -> usize {
        self.base_size()
    }

    /// Serialized length including witness data.
    pub fn total_size(&self) -> usize {
        if !self.has_witness() {
            return self.base_size();
        }
        let mut size = self.base_size() + 1;
        for input in &self.inputs {
            size += crate::serialize::varint_len(input.witness.len() as u64);
            for item in &input.witness {
                size += crate::serialize::varint_len(item.len() as u64) + item.len();
            }
        }
        size
    }

    /// Transaction weight: `base_size * 3 + total_size`.
    pub fn weight(&self) -> usize {
        self.base_size() * 3 + self.total_size()
    }
}

impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        // Caches (fee, hash mirror of consensus fields) are excluded.
        self.version == other.version
            && self.inputs == other.inputs
            && self.outputs == other.outputs
            && self.lock_time == other.lock_time
            && self.coin_type == other.coin_type
    }
}

impl Eq for Transaction {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::templates::p2pkh_script;

    fn sample_output(value: u64) -> TxOutput {
        TxOutput::new(value, p2pkh_script(&[0xAA; 20]))
    }

    fn sample_tx() -> Transaction {
        let input = TxInput::new(
            Outpoint::new(Hash256([0x11; 32]), 0),
            vec![0x01, 0x02, 0x03],
        );
        Transaction::new(1, vec![input], vec![sample_output(50)], 0, CoinType::Leah)
    }

    // --- Outpoint ---

    #[test]
    fn null_outpoint_detection() {
        assert!(Outpoint::null().is_null());
        assert!(!Outpoint::new(Hash256([1; 32]), 0).is_null());
        // Zero txid alone is not null without the sentinel vout.
        assert!(!Outpoint::new(Hash256::ZERO, 0).is_null());
    }

    #[test]
    fn outpoint_ordering_sorts_by_txid_then_vout() {
        let a = Outpoint::new(Hash256([1; 32]), 5);
        let b = Outpoint::new(Hash256([1; 32]), 6);
        let c = Outpoint::new(Hash256([2; 32]), 0);
        assert!(a < b && b < c);
    }

    // --- Coinbase ---

    #[test]
    fn coinbase_detection_and_height() {
        let cb = Transaction::new_coinbase(42, b"tag", vec![sample_output(50)], CoinType::Leah);
        assert!(cb.is_coinbase());
        assert_eq!(cb.coinbase_height(), Some(42));
        assert_eq!(cb.data.as_deref(), Some(b"tag".as_ref()));
        assert!(!sample_tx().is_coinbase());
        assert_eq!(sample_tx().coinbase_height(), None);
    }

    #[test]
    fn coinbase_hashes_differ_by_height() {
        let a = Transaction::new_coinbase(1, b"", vec![sample_output(50)], CoinType::Leah);
        let b = Transaction::new_coinbase(2, b"", vec![sample_output(50)], CoinType::Leah);
        assert_ne!(a.hash(), b.hash());
    }

    // --- Hash cache ---

    #[test]
    fn hash_is_deterministic_and_fresh() {
        let tx = sample_tx();
        assert!(tx.hash_is_fresh());
        assert_eq!(tx.hash(), tx.computed_hash());
    }

    #[test]
    fn mutation_stales_hash_until_refreshed() {
        let mut tx = sample_tx();
        tx.lock_time = 7;
        assert!(!tx.hash_is_fresh());
        tx.refresh_hash();
        assert!(tx.hash_is_fresh());
    }

    #[test]
    fn hash_commits_to_coin_type() {
        let mut a = sample_tx();
        let b = a.clone();
        a.coin_type = CoinType::Senine;
        a.refresh_hash();
        assert_ne!(a.hash(), b.hash());
    }

    // --- Canonical encoding ---

    #[test]
    fn encode_decode_round_trip() {
        let tx = sample_tx();
        let bytes = tx.encode();
        let decoded = Transaction::decode(&bytes).unwrap();
        assert_eq!(decoded, tx);
        assert_eq!(decoded.hash(), tx.hash());
    }

    #[test]
    fn coinbase_round_trip_recovers_data() {
        let cb = Transaction::new_coinbase(9, b"miner/1.0", vec![sample_output(50)], CoinType::Shiblon);
        let decoded = Transaction::decode(&cb.encode()).unwrap();
        assert_eq!(decoded, cb);
        assert_eq!(decoded.data.as_deref(), Some(b"miner/1.0".as_ref()));
        assert_eq!(decoded.coinbase_height(), Some(9));
    }

    #[test]
    fn witness_round_trip_preserves_txid() {
        let mut tx = sample_tx();
        tx.inputs[0].witness = vec![vec![0xAB; 64], vec![0xCD; 33]];
        tx.refresh_hash();
        let without: Transaction = {
            let mut t = tx.clone();
            t.inputs[0].witness.clear();
            t.refresh_hash();
            t
        };
        // Witness does not enter the hash preimage.
        assert_eq!(tx.hash(), without.hash());

        let decoded = Transaction::decode(&tx.encode()).unwrap();
        assert_eq!(decoded.inputs[0].witness, tx.inputs[0].witness);
        assert_eq!(decoded.hash(), tx.hash());
    }

    #[test]
    fn decode_rejects_trailing_garbage() {
        let mut bytes = sample_tx().encode();
        bytes.push(0xFF);
        assert!(Transaction::decode(&bytes).is_err());
    }

    #[test]
    fn decode_rejects_truncation() {
        let bytes = sample_tx().encode();
        assert!(Transaction::decode(&bytes[..bytes.len() - 1]).is_err());
    }

    // --- Sizes ---

    #[test]
    fn size_matches_encoding_length() {
        let tx = sample_tx();
        assert_eq!(tx.size(), tx.encode().len());
        assert_eq!(tx.total_size(), tx.size());
    }

    #[test]
    fn total_size_includes_witness() {
        let mut tx = sample_tx();
        tx.inputs[0].witness = vec![vec![0u8; 10]];
        tx.refresh_hash();
        assert_eq!(tx.total_size(), tx.encode().len());
        assert!(tx.total_size() > tx.size());
        assert_eq!(tx.weight(), tx.size() * 3 + tx.total_size());
    }

    // --- Values ---

    #[test]
    fn total_output_value_checks_overflow() {
        let mut tx = sample_tx();
        tx.outputs = vec![sample_output(u64::MAX), sample_output(1)];
        assert_eq!(tx.total_output_value(), None);
        tx.outputs = vec![sample_output(30), sample_output(12)];
        assert_eq!(tx.total_output_value(), Some(42));
    }

    #[test]
    fn output_materializes_address() {
        let out = sample_output(10);
        assert_eq!(out.address, hex::encode([0xAA; 20]));
    }

    #[test]
    fn equality_ignores_fee_cache() {
        let a = sample_tx();
        let mut b = sample_tx();
        b.fee = 999;
        assert_eq!(a, b);
    }
}
