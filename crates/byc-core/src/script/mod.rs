//! Stack-machine script engine.
//!
//! Scripts are byte strings interpreted over a stack of byte values. A
//! spend is authorized by executing the input's script_sig concatenated
//! with the spent output's script_pub_key; the run must finish without
//! error and leave a truthy top-of-stack. Pay-to-script-hash and witness
//! programs get their second-stage execution in [`verify_spend`].

mod interpreter;
mod opcodes;
pub mod sighash;
pub mod templates;

pub use interpreter::{is_truthy, Interpreter, ScriptContext};
pub use opcodes::*;

use crate::error::ScriptError;
use crate::hash::{hash160, hash256};
use crate::types::Transaction;

/// Authorize one input of a transaction against the output it spends.
///
/// Runs `script_sig || script_pub_key` through the interpreter, then the
/// second-stage rules:
/// - P2SH: the last script_sig push is re-executed as the redeem script
///   over the remaining pushed values;
/// - witness v0, 20-byte program: `witness = [sig, pubkey]`, verified as
///   the implied pay-to-pubkey-hash;
/// - witness v0, 32-byte program: the last witness item is the script,
///   bound by `hash256(script)`, executed over the preceding items.
pub fn verify_spend(
    tx: &Transaction,
    input_index: usize,
    prev_script_pub_key: &[u8],
) -> Result<(), ScriptError> {
    let input = &tx.inputs[input_index];
    let ctx = ScriptContext {
        sighash: sighash::signature_hash(tx, input_index, prev_script_pub_key),
        lock_time: tx.lock_time,
        sequence: input.sequence,
    };

    // Witness programs bypass the concatenated run: the script_sig must be
    // empty and the witness carries the authorization.
    if let Some((version, program)) = templates::witness_program(prev_script_pub_key) {
        if version != 0 {
            return Err(ScriptError::WitnessMismatch);
        }
        if !input.script_sig.is_empty() {
            return Err(ScriptError::WitnessMismatch);
        }
        return match program.len() {
            20 => verify_p2wpkh(&ctx, &input.witness, program),
            32 => verify_p2wsh(&ctx, &input.witness, program),
            _ => Err(ScriptError::WitnessMismatch),
        };
    }

    let mut combined = Vec::with_capacity(input.script_sig.len() + prev_script_pub_key.len());
    combined.extend_from_slice(&input.script_sig);
    combined.extend_from_slice(prev_script_pub_key);

    let mut vm = Interpreter::new();
    vm.eval(&combined, &ctx)?;
    if !vm.final_result() {
        return Err(ScriptError::EvalFalse);
    }

    // Second stage for pay-to-script-hash.
    if templates::is_p2sh(prev_script_pub_key) {
        let mut pushes = interpreter::collect_pushes(&input.script_sig)?;
        let redeem = pushes.pop().ok_or(ScriptError::StackUnderflow("P2SH redeem"))?;
        let mut vm = Interpreter::with_stack(pushes);
        vm.eval(&redeem, &ctx)?;
        if !vm.final_result() {
            return Err(ScriptError::EvalFalse);
        }
    }

    Ok(())
}

fn verify_p2wpkh(
    ctx: &ScriptContext,
    witness: &[Vec<u8>],
    program: &[u8],
) -> Result<(), ScriptError> {
    let [sig, pubkey] = witness else {
        return Err(ScriptError::WitnessMismatch);
    };
    if hash160(pubkey).as_slice() != program {
        return Err(ScriptError::WitnessMismatch);
    }
    crate::crypto::verify_ecdsa(pubkey, &ctx.sighash, sig)
        .map_err(|_| ScriptError::VerifyFailed)
}

fn verify_p2wsh(
    ctx: &ScriptContext,
    witness: &[Vec<u8>],
    program: &[u8],
) -> Result<(), ScriptError> {
    let (script, stack_items) =
        witness.split_last().ok_or(ScriptError::StackUnderflow("P2WSH script"))?;
    if hash256(script).as_bytes().as_slice() != program {
        return Err(ScriptError::WitnessMismatch);
    }
    let mut vm = Interpreter::with_stack(stack_items.to_vec());
    vm.eval(script, ctx)?;
    if !vm.final_result() {
        return Err(ScriptError::EvalFalse);
    }
    Ok(())
}
