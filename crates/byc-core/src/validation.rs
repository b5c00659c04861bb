//! Transaction validation.
//!
//! Two levels, in the usual split:
//!
//! - **Structural** ([`validate_structure`]): context-free checks on shape,
//!   sizes, and the hash cache. Applies to coinbase and regular
//!   transactions alike.
//! - **Contextual** ([`validate_transaction`]): full validation of a
//!   regular transaction against the UTXO set and the mempool — input
//!   resolution (pool outputs first, for chained unconfirmed spends),
//!   coinbase maturity, coin-type and cross-chain rules, conservation and
//!   the fee floor, script execution, and lock-time.
//!
//! Coinbase transactions are never contextually validated on their own;
//! their reward is checked during block validation.

use std::collections::HashSet;

use tracing::debug;

use crate::constants::{
    COINBASE_MATURITY, LOCKTIME_THRESHOLD, MAX_COINBASE_DATA, MAX_SCRIPT_SIZE, MAX_TX_SIZE,
    SEQUENCE_FINAL,
};
use crate::error::ValidationError;
use crate::fee::{cross_chain_min_fee, is_cross_chain, FeeEstimator, FeePriority};
use crate::script;
use crate::traits::{PoolView, UtxoView};
use crate::types::Transaction;
use crate::utxo_set::Utxo;

/// State the contextual validator reads.
pub struct ValidationContext<'a> {
    /// Height of the current best tip.
    pub tip_height: u64,
    /// Timestamp of the current best tip, for time-based lock times.
    pub tip_timestamp: u64,
    /// Fee policy state.
    pub fees: &'a FeeEstimator,
}

/// Summary of a successfully validated transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedTransaction {
    pub total_input: u64,
    pub total_output: u64,
    /// `total_input - total_output`.
    pub fee: u64,
    /// Whether the transaction is a cross-chain Antion transfer.
    pub cross_chain: bool,
}

/// Context-free structural checks.
pub fn validate_structure(tx: &Transaction) -> Result<(), ValidationError> {
    if tx.inputs.is_empty() {
        return Err(ValidationError::Structure("no inputs".into()));
    }
    if tx.outputs.is_empty() {
        return Err(ValidationError::Structure("no outputs".into()));
    }

    for (i, output) in tx.outputs.iter().enumerate() {
        if output.value == 0 {
            return Err(ValidationError::ZeroOutput(i));
        }
        if output.script_pub_key.len() > MAX_SCRIPT_SIZE {
            return Err(ValidationError::Structure(format!(
                "output {i} script exceeds {MAX_SCRIPT_SIZE} bytes",
            )));
        }
    }
    if tx.total_output_value().is_none() {
        return Err(ValidationError::ValueOverflow);
    }

    for (i, input) in tx.inputs.iter().enumerate() {
        if input.script_sig.len() > MAX_SCRIPT_SIZE {
            return Err(ValidationError::Structure(format!(
                "input {i} script exceeds {MAX_SCRIPT_SIZE} bytes",
            )));
        }
    }

    let size = tx.total_size();
    if size > MAX_TX_SIZE {
        return Err(ValidationError::TooLarge { size, max: MAX_TX_SIZE });
    }

    if !tx.hash_is_fresh() {
        return Err(ValidationError::StaleHash);
    }

    if tx.is_coinbase() {
        // Height varint plus bounded free-form data.
        let height_len = tx
            .coinbase_height()
            .map(crate::serialize::varint_len)
            .ok_or_else(|| ValidationError::Structure("coinbase missing height".into()))?;
        if tx.inputs[0].script_sig.len() > height_len + MAX_COINBASE_DATA {
            return Err(ValidationError::Structure("coinbase data too large".into()));
        }
    } else {
        for (i, input) in tx.inputs.iter().enumerate() {
            if input.previous_output.is_null() {
                return Err(ValidationError::Structure(format!(
                    "null outpoint in input {i} of a non-coinbase transaction",
                )));
            }
        }
    }

    Ok(())
}

/// Full contextual validation of a regular transaction.
///
/// `utxo_view` resolves confirmed outputs; `pool_view` resolves outputs of
/// unconfirmed ancestors and reports conflicting pool spends. Returns the
/// computed fee totals on success.
pub fn validate_transaction(
    tx: &Transaction,
    utxo_view: &impl UtxoView,
    pool_view: &impl PoolView,
    ctx: &ValidationContext<'_>,
) -> Result<ValidatedTransaction, ValidationError> {
    if tx.is_coinbase() {
        return Err(ValidationError::Structure(
            "coinbase cannot be validated standalone".into(),
        ));
    }

    validate_structure(tx)?;

    // Intra-transaction double spends.
    let mut seen = HashSet::with_capacity(tx.inputs.len());
    for input in &tx.inputs {
        if !seen.insert(&input.previous_output) {
            return Err(ValidationError::DoubleSpend(input.previous_output.to_string()));
        }
    }

    // Resolve every input: pool outputs first (chained unconfirmed
    // spends), then the confirmed set. A conflicting pool spend is a
    // double spend from the submitter's point of view.
    let mut spent: Vec<Utxo> = Vec::with_capacity(tx.inputs.len());
    for input in &tx.inputs {
        if pool_view.spends_outpoint(&input.previous_output) {
            return Err(ValidationError::DoubleSpend(input.previous_output.to_string()));
        }
        let utxo = pool_view
            .unconfirmed_output(&input.previous_output)
            .or_else(|| utxo_view.utxo(&input.previous_output))
            .ok_or_else(|| ValidationError::UnknownInput(input.previous_output.to_string()))?;
        spent.push(utxo);
    }

    // Coinbase maturity.
    for (i, utxo) in spent.iter().enumerate() {
        if utxo.is_coinbase && !utxo.is_mature(ctx.tip_height) {
            return Err(ValidationError::Immature {
                index: i,
                confirmations: ctx.tip_height.saturating_sub(utxo.block_height),
                required: COINBASE_MATURITY,
            });
        }
    }

    // Coin-type discipline. Outputs carry the transaction's coin type by
    // construction; inputs must match it. Antion marks a cross-chain
    // transfer; any other mixture involving Antion is invalid outright.
    let cross_chain = is_cross_chain(tx.coin_type);
    for utxo in &spent {
        if utxo.coin_type == tx.coin_type {
            continue;
        }
        if cross_chain || is_cross_chain(utxo.coin_type) {
            return Err(ValidationError::InvalidCrossChain);
        }
        return Err(ValidationError::InvalidCoinType(format!(
            "input is {}, transaction is {}",
            utxo.coin_type, tx.coin_type,
        )));
    }

    // Conservation and fees.
    let total_input = spent
        .iter()
        .try_fold(0u64, |acc, utxo| acc.checked_add(utxo.value))
        .ok_or(ValidationError::ValueOverflow)?;
    let total_output = tx.total_output_value().ok_or(ValidationError::ValueOverflow)?;
    if total_input < total_output {
        return Err(ValidationError::InsufficientFunds {
            inputs: total_input,
            outputs: total_output,
        });
    }
    let fee = total_input - total_output;

    let oldest_age = spent
        .iter()
        .map(|utxo| ctx.tip_height.saturating_sub(utxo.block_height))
        .max()
        .unwrap_or(0);
    let mut minimum = ctx.fees.min_fee(tx.size(), oldest_age, FeePriority::Normal);
    if cross_chain {
        minimum = minimum.max(cross_chain_min_fee(total_output));
    }
    if fee < minimum {
        return Err(ValidationError::FeeTooLow { fee, minimum });
    }

    // Script execution per input.
    for (i, utxo) in spent.iter().enumerate() {
        script::verify_spend(tx, i, &utxo.script_pub_key)
            .map_err(|source| ValidationError::ScriptFailure { index: i, source })?;
    }

    // Lock time: enforced unless every input opts out with a final
    // sequence. Values below the threshold are heights, above it, times.
    if tx.lock_time > 0 && tx.inputs.iter().any(|input| input.sequence != SEQUENCE_FINAL) {
        let reached = if tx.lock_time < LOCKTIME_THRESHOLD {
            ctx.tip_height >= tx.lock_time as u64
        } else {
            ctx.tip_timestamp >= tx.lock_time as u64
        };
        if !reached {
            return Err(ValidationError::LockTime { lock_time: tx.lock_time });
        }
    }

    debug!(txid = %tx.hash(), fee, cross_chain, "transaction validated");

    Ok(ValidatedTransaction { total_input, total_output, fee, cross_chain })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coin::CoinType;
    use crate::crypto::Keypair;
    use crate::hash::Hash256;
    use crate::script::sighash::signature_hash;
    use crate::script::templates::{p2pkh_script, p2pkh_script_sig};
    use crate::traits::NoPool;
    use crate::types::{Outpoint, TxInput, TxOutput};
    use std::collections::HashMap;

    fn outpoint(seed: u8) -> Outpoint {
        Outpoint::new(Hash256([seed; 32]), 0)
    }

    fn utxo_for(kp: &Keypair, op: &Outpoint, value: u64, coin: CoinType, height: u64) -> Utxo {
        Utxo::new(
            op.clone(),
            value,
            p2pkh_script(&kp.public_key().pubkey_hash()),
            coin,
            height,
            false,
        )
    }

    /// One-input, one-output signed transaction.
    fn signed_tx(
        kp: &Keypair,
        op: Outpoint,
        spk: &[u8],
        out_value: u64,
        coin: CoinType,
    ) -> Transaction {
        let input = TxInput::new(op, Vec::new());
        let output = TxOutput::new(out_value, p2pkh_script(&[0xBB; 20]));
        let mut tx = Transaction::new(1, vec![input], vec![output], 0, coin);
        let sighash = signature_hash(&tx, 0, spk);
        let sig = kp.sign(&sighash);
        tx.inputs[0].script_sig = p2pkh_script_sig(&sig, &kp.public_key().to_bytes());
        tx.refresh_hash();
        tx
    }

    fn ctx(fees: &FeeEstimator) -> ValidationContext<'_> {
        ValidationContext { tip_height: 500, tip_timestamp: 1_700_000_000, fees }
    }

    // ------------------------------------------------------------------
    // Structural validation
    // ------------------------------------------------------------------

    #[test]
    fn structure_rejects_empty_inputs_and_outputs() {
        let out = TxOutput::new(5, p2pkh_script(&[0xAA; 20]));
        let no_inputs = Transaction::new(1, vec![], vec![out.clone()], 0, CoinType::Leah);
        assert!(matches!(
            validate_structure(&no_inputs),
            Err(ValidationError::Structure(_)),
        ));

        let input = TxInput::new(outpoint(1), vec![]);
        let no_outputs = Transaction::new(1, vec![input], vec![], 0, CoinType::Leah);
        assert!(matches!(
            validate_structure(&no_outputs),
            Err(ValidationError::Structure(_)),
        ));
    }

    #[test]
    fn structure_rejects_zero_value_output() {
        let input = TxInput::new(outpoint(1), vec![]);
        let outputs = vec![
            TxOutput::new(5, p2pkh_script(&[0xAA; 20])),
            TxOutput::new(0, p2pkh_script(&[0xBB; 20])),
        ];
        let tx = Transaction::new(1, vec![input], outputs, 0, CoinType::Leah);
        assert_eq!(validate_structure(&tx), Err(ValidationError::ZeroOutput(1)));
    }

    #[test]
    fn structure_rejects_oversized_tx() {
        let input = TxInput::new(outpoint(1), vec![0; MAX_SCRIPT_SIZE]);
        let inputs: Vec<TxInput> = (0..11)
            .map(|i| {
                let mut inp = input.clone();
                inp.previous_output = outpoint(i as u8 + 1);
                inp
            })
            .collect();
        let tx = Transaction::new(
            1,
            inputs,
            vec![TxOutput::new(5, p2pkh_script(&[0xAA; 20]))],
            0,
            CoinType::Leah,
        );
        assert!(matches!(validate_structure(&tx), Err(ValidationError::TooLarge { .. })));
    }

    #[test]
    fn structure_rejects_stale_hash() {
        let input = TxInput::new(outpoint(1), vec![]);
        let mut tx = Transaction::new(
            1,
            vec![input],
            vec![TxOutput::new(5, p2pkh_script(&[0xAA; 20]))],
            0,
            CoinType::Leah,
        );
        tx.lock_time = 9; // mutate without refresh
        assert_eq!(validate_structure(&tx), Err(ValidationError::StaleHash));
    }

    #[test]
    fn structure_accepts_coinbase_and_bounds_its_data() {
        let cb = Transaction::new_coinbase(
            7,
            &[0xAB; MAX_COINBASE_DATA],
            vec![TxOutput::new(50, p2pkh_script(&[0xAA; 20]))],
            CoinType::Leah,
        );
        assert!(validate_structure(&cb).is_ok());

        let oversized = Transaction::new_coinbase(
            7,
            &[0xAB; MAX_COINBASE_DATA + 1],
            vec![TxOutput::new(50, p2pkh_script(&[0xAA; 20]))],
            CoinType::Leah,
        );
        assert!(matches!(
            validate_structure(&oversized),
            Err(ValidationError::Structure(_)),
        ));
    }

    #[test]
    fn structure_rejects_null_outpoint_in_regular_tx() {
        let inputs = vec![
            TxInput::new(outpoint(1), vec![]),
            TxInput::new(Outpoint::null(), vec![]),
        ];
        let tx = Transaction::new(
            1,
            inputs,
            vec![TxOutput::new(5, p2pkh_script(&[0xAA; 20]))],
            0,
            CoinType::Leah,
        );
        assert!(matches!(validate_structure(&tx), Err(ValidationError::Structure(_))));
    }

    // ------------------------------------------------------------------
    // Contextual validation
    // ------------------------------------------------------------------

    #[test]
    fn valid_spend_passes_and_reports_fee() {
        let kp = Keypair::generate();
        let op = outpoint(1);
        let utxo = utxo_for(&kp, &op, 1000, CoinType::Leah, 10);
        let tx = signed_tx(&kp, op.clone(), &utxo.script_pub_key, 900, CoinType::Leah);

        let mut view = HashMap::new();
        view.insert(op, utxo);
        let fees = FeeEstimator::new();
        let result = validate_transaction(&tx, &view, &NoPool, &ctx(&fees)).unwrap();
        assert_eq!(result.total_input, 1000);
        assert_eq!(result.total_output, 900);
        assert_eq!(result.fee, 100);
        assert!(!result.cross_chain);
    }

    #[test]
    fn unknown_input_is_reported() {
        let kp = Keypair::generate();
        let tx = signed_tx(&kp, outpoint(1), &p2pkh_script(&[0u8; 20]), 10, CoinType::Leah);
        let view: HashMap<Outpoint, Utxo> = HashMap::new();
        let fees = FeeEstimator::new();
        assert!(matches!(
            validate_transaction(&tx, &view, &NoPool, &ctx(&fees)),
            Err(ValidationError::UnknownInput(_)),
        ));
    }

    #[test]
    fn intra_tx_double_spend_is_rejected() {
        let kp = Keypair::generate();
        let op = outpoint(1);
        let utxo = utxo_for(&kp, &op, 1000, CoinType::Leah, 10);
        let inputs = vec![TxInput::new(op.clone(), vec![]), TxInput::new(op.clone(), vec![])];
        let tx = Transaction::new(
            1,
            inputs,
            vec![TxOutput::new(5, p2pkh_script(&[0xAA; 20]))],
            0,
            CoinType::Leah,
        );
        let mut view = HashMap::new();
        view.insert(op, utxo);
        let fees = FeeEstimator::new();
        assert!(matches!(
            validate_transaction(&tx, &view, &NoPool, &ctx(&fees)),
            Err(ValidationError::DoubleSpend(_)),
        ));
    }

    #[test]
    fn immature_coinbase_spend_is_rejected_until_maturity() {
        let kp = Keypair::generate();
        let op = outpoint(1);
        let mut utxo = utxo_for(&kp, &op, 1000, CoinType::Leah, 450);
        utxo.is_coinbase = true;
        let tx = signed_tx(&kp, op.clone(), &utxo.script_pub_key.clone(), 900, CoinType::Leah);

        let mut view = HashMap::new();
        view.insert(op.clone(), utxo.clone());
        let fees = FeeEstimator::new();

        // Tip 500, created at 450: 50 confirmations, needs 100.
        assert!(matches!(
            validate_transaction(&tx, &view, &NoPool, &ctx(&fees)),
            Err(ValidationError::Immature { index: 0, confirmations: 50, required: 100 }),
        ));

        // At tip 550 the spend is exactly mature.
        let mature_ctx =
            ValidationContext { tip_height: 550, tip_timestamp: 1_700_000_000, fees: &fees };
        assert!(validate_transaction(&tx, &view, &NoPool, &mature_ctx).is_ok());
    }

    #[test]
    fn coin_type_mismatch_is_rejected() {
        let kp = Keypair::generate();
        let op = outpoint(1);
        let utxo = utxo_for(&kp, &op, 1000, CoinType::Senine, 10);
        let tx = signed_tx(&kp, op.clone(), &utxo.script_pub_key.clone(), 900, CoinType::Leah);
        let mut view = HashMap::new();
        view.insert(op, utxo);
        let fees = FeeEstimator::new();
        assert!(matches!(
            validate_transaction(&tx, &view, &NoPool, &ctx(&fees)),
            Err(ValidationError::InvalidCoinType(_)),
        ));
    }

    #[test]
    fn antion_inputs_require_antion_transaction() {
        let kp = Keypair::generate();
        let op = outpoint(1);
        let utxo = utxo_for(&kp, &op, 1000, CoinType::Antion, 10);
        let tx = signed_tx(&kp, op.clone(), &utxo.script_pub_key.clone(), 900, CoinType::Leah);
        let mut view = HashMap::new();
        view.insert(op, utxo);
        let fees = FeeEstimator::new();
        assert_eq!(
            validate_transaction(&tx, &view, &NoPool, &ctx(&fees)).unwrap_err(),
            ValidationError::InvalidCrossChain,
        );
    }

    #[test]
    fn leah_inputs_cannot_fund_antion_outputs() {
        let kp = Keypair::generate();
        let op = outpoint(1);
        let utxo = utxo_for(&kp, &op, 1000, CoinType::Leah, 10);
        let tx = signed_tx(&kp, op.clone(), &utxo.script_pub_key.clone(), 900, CoinType::Antion);
        let mut view = HashMap::new();
        view.insert(op, utxo);
        let fees = FeeEstimator::new();
        assert_eq!(
            validate_transaction(&tx, &view, &NoPool, &ctx(&fees)).unwrap_err(),
            ValidationError::InvalidCrossChain,
        );
    }

    #[test]
    fn cross_chain_transfer_pays_the_extra_floor() {
        let kp = Keypair::generate();
        let op = outpoint(1);
        let utxo = utxo_for(&kp, &op, 100_000, CoinType::Antion, 10);
        let spk = utxo.script_pub_key.clone();
        let fees = FeeEstimator::new();

        // 90,000 out => floor is ceil(90,000/1000) = 90. Fee of 10,000 passes.
        let tx = signed_tx(&kp, op.clone(), &spk, 90_000, CoinType::Antion);
        let mut view = HashMap::new();
        view.insert(op.clone(), utxo.clone());
        let result = validate_transaction(&tx, &view, &NoPool, &ctx(&fees)).unwrap();
        assert!(result.cross_chain);
        assert_eq!(result.fee, 10_000);

        // Fee one below the floor fails.
        let tight = signed_tx(&kp, op.clone(), &spk, 99_911, CoinType::Antion);
        // floor = ceil(99,911/1000) = 100; fee = 89.
        assert!(matches!(
            validate_transaction(&tight, &view, &NoPool, &ctx(&fees)),
            Err(ValidationError::FeeTooLow { fee: 89, .. }),
        ));
    }

    #[test]
    fn insufficient_funds_is_rejected() {
        let kp = Keypair::generate();
        let op = outpoint(1);
        let utxo = utxo_for(&kp, &op, 100, CoinType::Leah, 10);
        let tx = signed_tx(&kp, op.clone(), &utxo.script_pub_key.clone(), 200, CoinType::Leah);
        let mut view = HashMap::new();
        view.insert(op, utxo);
        let fees = FeeEstimator::new();
        assert_eq!(
            validate_transaction(&tx, &view, &NoPool, &ctx(&fees)).unwrap_err(),
            ValidationError::InsufficientFunds { inputs: 100, outputs: 200 },
        );
    }

    #[test]
    fn wrong_signature_fails_script_stage() {
        let owner = Keypair::generate();
        let thief = Keypair::generate();
        let op = outpoint(1);
        let utxo = utxo_for(&owner, &op, 1000, CoinType::Leah, 10);
        // Signed by the wrong key against the owner's script.
        let tx = signed_tx(&thief, op.clone(), &utxo.script_pub_key.clone(), 900, CoinType::Leah);
        let mut view = HashMap::new();
        view.insert(op, utxo);
        let fees = FeeEstimator::new();
        assert!(matches!(
            validate_transaction(&tx, &view, &NoPool, &ctx(&fees)),
            Err(ValidationError::ScriptFailure { index: 0, .. }),
        ));
    }

    #[test]
    fn lock_time_by_height_is_enforced() {
        let kp = Keypair::generate();
        let op = outpoint(1);
        let utxo = utxo_for(&kp, &op, 1000, CoinType::Leah, 10);
        let spk = utxo.script_pub_key.clone();

        let input = TxInput { sequence: 0, ..TxInput::new(op.clone(), Vec::new()) };
        let output = TxOutput::new(900, p2pkh_script(&[0xBB; 20]));
        let mut tx = Transaction::new(1, vec![input], vec![output], 600, CoinType::Leah);
        let sighash = signature_hash(&tx, 0, &spk);
        tx.inputs[0].script_sig = p2pkh_script_sig(&kp.sign(&sighash), &kp.public_key().to_bytes());
        tx.refresh_hash();

        let mut view = HashMap::new();
        view.insert(op, utxo);
        let fees = FeeEstimator::new();

        // Tip height 500 < lock_time 600.
        assert_eq!(
            validate_transaction(&tx, &view, &NoPool, &ctx(&fees)).unwrap_err(),
            ValidationError::LockTime { lock_time: 600 },
        );

        // Reaches validity at height 600.
        let later = ValidationContext { tip_height: 600, tip_timestamp: 0, fees: &fees };
        assert!(validate_transaction(&tx, &view, &NoPool, &later).is_ok());
    }

    #[test]
    fn final_sequences_disable_lock_time() {
        let kp = Keypair::generate();
        let op = outpoint(1);
        let utxo = utxo_for(&kp, &op, 1000, CoinType::Leah, 10);
        // Default sequence is final; lock_time far in the future.
        let tx = {
            let input = TxInput::new(op.clone(), Vec::new());
            let output = TxOutput::new(900, p2pkh_script(&[0xBB; 20]));
            let mut tx = Transaction::new(1, vec![input], vec![output], 400_000, CoinType::Leah);
            let sighash = signature_hash(&tx, 0, &utxo.script_pub_key);
            tx.inputs[0].script_sig =
                p2pkh_script_sig(&kp.sign(&sighash), &kp.public_key().to_bytes());
            tx.refresh_hash();
            tx
        };
        let mut view = HashMap::new();
        view.insert(op, utxo);
        let fees = FeeEstimator::new();
        assert!(validate_transaction(&tx, &view, &NoPool, &ctx(&fees)).is_ok());
    }

    #[test]
    fn lock_time_by_timestamp_uses_tip_time() {
        let kp = Keypair::generate();
        let op = outpoint(1);
        let utxo = utxo_for(&kp, &op, 1000, CoinType::Leah, 10);
        let spk = utxo.script_pub_key.clone();

        let input = TxInput { sequence: 0, ..TxInput::new(op.clone(), Vec::new()) };
        let output = TxOutput::new(900, p2pkh_script(&[0xBB; 20]));
        let mut tx =
            Transaction::new(1, vec![input], vec![output], 1_800_000_000, CoinType::Leah);
        let sighash = signature_hash(&tx, 0, &spk);
        tx.inputs[0].script_sig = p2pkh_script_sig(&kp.sign(&sighash), &kp.public_key().to_bytes());
        tx.refresh_hash();

        let mut view = HashMap::new();
        view.insert(op, utxo);
        let fees = FeeEstimator::new();

        // Tip timestamp 1.7e9 < lock 1.8e9.
        assert!(matches!(
            validate_transaction(&tx, &view, &NoPool, &ctx(&fees)),
            Err(ValidationError::LockTime { .. }),
        ));

        let later =
            ValidationContext { tip_height: 500, tip_timestamp: 1_800_000_001, fees: &fees };
        assert!(validate_transaction(&tx, &view, &NoPool, &later).is_ok());
    }

    #[test]
    fn coinbase_rejected_from_standalone_validation() {
        let cb = Transaction::new_coinbase(
            1,
            b"",
            vec![TxOutput::new(50, p2pkh_script(&[0xAA; 20]))],
            CoinType::Leah,
        );
        let view: HashMap<Outpoint, Utxo> = HashMap::new();
        let fees = FeeEstimator::new();
        assert!(matches!(
            validate_transaction(&cb, &view, &NoPool, &ctx(&fees)),
            Err(ValidationError::Structure(_)),
        ));
    }
}
