//! Signature hashing.
//!
//! The sighash for input *i* is the double-SHA-256 of the transaction's
//! canonical encoding with input *i*'s script_sig replaced by the spent
//! output's script_pub_key and every other script_sig cleared. Witness
//! stacks never enter the preimage. The same sighash covers legacy,
//! pay-to-script-hash, and witness spends of the input.

use crate::hash::{hash256, Hash256};
use crate::serialize::{write_sized_bytes, write_varint};
use crate::types::Transaction;

/// Compute the signature hash for one input.
pub fn signature_hash(tx: &Transaction, input_index: usize, script_pub_key: &[u8]) -> Hash256 {
    let mut buf = Vec::with_capacity(tx.size() + script_pub_key.len());

    buf.extend_from_slice(&tx.version.to_le_bytes());

    write_varint(&mut buf, tx.inputs.len() as u64);
    for (i, input) in tx.inputs.iter().enumerate() {
        input.previous_output.encode(&mut buf);
        if i == input_index {
            write_sized_bytes(&mut buf, script_pub_key);
        } else {
            write_varint(&mut buf, 0);
        }
        buf.extend_from_slice(&input.sequence.to_le_bytes());
    }

    write_varint(&mut buf, tx.outputs.len() as u64);
    for output in &tx.outputs {
        output.encode(&mut buf);
    }

    buf.extend_from_slice(&tx.lock_time.to_le_bytes());
    tx.coin_type.encode(&mut buf);

    hash256(&buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coin::CoinType;
    use crate::hash::Hash256;
    use crate::script::templates::p2pkh_script;
    use crate::types::{Outpoint, TxInput, TxOutput};

    fn two_input_tx() -> Transaction {
        let inputs = vec![
            TxInput::new(Outpoint::new(Hash256([0x11; 32]), 0), vec![0xAA, 0xBB]),
            TxInput::new(Outpoint::new(Hash256([0x22; 32]), 1), vec![0xCC]),
        ];
        let outputs = vec![TxOutput::new(10, p2pkh_script(&[0x33; 20]))];
        Transaction::new(1, inputs, outputs, 0, CoinType::Senum)
    }

    #[test]
    fn sighash_is_deterministic() {
        let tx = two_input_tx();
        let spk = p2pkh_script(&[0x44; 20]);
        assert_eq!(signature_hash(&tx, 0, &spk), signature_hash(&tx, 0, &spk));
    }

    #[test]
    fn sighash_differs_per_input() {
        let tx = two_input_tx();
        let spk = p2pkh_script(&[0x44; 20]);
        assert_ne!(signature_hash(&tx, 0, &spk), signature_hash(&tx, 1, &spk));
    }

    #[test]
    fn sighash_ignores_existing_script_sigs() {
        let tx = two_input_tx();
        let mut stripped = tx.clone();
        stripped.inputs[0].script_sig.clear();
        stripped.inputs[1].script_sig.clear();
        stripped.refresh_hash();
        let spk = p2pkh_script(&[0x44; 20]);
        // The preimage substitutes scripts, so prior contents are irrelevant.
        assert_eq!(signature_hash(&tx, 0, &spk), signature_hash(&stripped, 0, &spk));
    }

    #[test]
    fn sighash_ignores_witness_data() {
        let tx = two_input_tx();
        let mut with_witness = tx.clone();
        with_witness.inputs[0].witness = vec![vec![0xEE; 64]];
        with_witness.refresh_hash();
        let spk = p2pkh_script(&[0x44; 20]);
        assert_eq!(signature_hash(&tx, 0, &spk), signature_hash(&with_witness, 0, &spk));
    }

    #[test]
    fn sighash_commits_to_outputs() {
        let tx = two_input_tx();
        let mut altered = tx.clone();
        altered.outputs[0].value += 1;
        altered.refresh_hash();
        let spk = p2pkh_script(&[0x44; 20]);
        assert_ne!(signature_hash(&tx, 0, &spk), signature_hash(&altered, 0, &spk));
    }

    #[test]
    fn sighash_commits_to_substituted_script() {
        let tx = two_input_tx();
        let a = p2pkh_script(&[0x44; 20]);
        let b = p2pkh_script(&[0x55; 20]);
        assert_ne!(signature_hash(&tx, 0, &a), signature_hash(&tx, 0, &b));
    }

    #[test]
    fn sighash_commits_to_coin_type() {
        let tx = two_input_tx();
        let mut other = tx.clone();
        other.coin_type = CoinType::Antion;
        other.refresh_hash();
        let spk = p2pkh_script(&[0x44; 20]);
        assert_ne!(signature_hash(&tx, 0, &spk), signature_hash(&other, 0, &spk));
    }
}
