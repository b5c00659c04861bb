//! Standard script templates and matchers.

use super::interpreter::encode_num;
use super::opcodes::*;

/// Append a minimal push of `data`.
pub fn push_data(out: &mut Vec<u8>, data: &[u8]) {
    match data.len() {
        0 => out.push(OP_0),
        1 if data[0] >= 1 && data[0] <= 16 => out.push(OP_1 + data[0] - 1),
        len if len <= MAX_DIRECT_PUSH as usize => {
            out.push(len as u8);
            out.extend_from_slice(data);
        }
        len if len <= u8::MAX as usize => {
            out.push(OP_PUSHDATA1);
            out.push(len as u8);
            out.extend_from_slice(data);
        }
        len if len <= u16::MAX as usize => {
            out.push(OP_PUSHDATA2);
            out.extend_from_slice(&(len as u16).to_le_bytes());
            out.extend_from_slice(data);
        }
        len => {
            out.push(OP_PUSHDATA4);
            out.extend_from_slice(&(len as u32).to_le_bytes());
            out.extend_from_slice(data);
        }
    }
}

/// `OP_DUP OP_HASH160 <20 bytes> OP_EQUALVERIFY OP_CHECKSIG`
pub fn p2pkh_script(pubkey_hash: &[u8; 20]) -> Vec<u8> {
    let mut script = Vec::with_capacity(25);
    script.push(OP_DUP);
    script.push(OP_HASH160);
    push_data(&mut script, pubkey_hash);
    script.push(OP_EQUALVERIFY);
    script.push(OP_CHECKSIG);
    script
}

/// `OP_HASH160 <20 bytes> OP_EQUAL`
pub fn p2sh_script(script_hash: &[u8; 20]) -> Vec<u8> {
    let mut script = Vec::with_capacity(23);
    script.push(OP_HASH160);
    push_data(&mut script, script_hash);
    script.push(OP_EQUAL);
    script
}

/// `<M> <pk1>..<pkN> <N> OP_CHECKMULTISIG`
pub fn multisig_script(m: u8, pubkeys: &[[u8; 33]]) -> Vec<u8> {
    let mut script = Vec::new();
    push_data(&mut script, &encode_num(m as u64));
    for pubkey in pubkeys {
        push_data(&mut script, pubkey);
    }
    push_data(&mut script, &encode_num(pubkeys.len() as u64));
    script.push(OP_CHECKMULTISIG);
    script
}

/// `<lock_time> OP_CHECKLOCKTIMEVERIFY OP_DROP` followed by the standard
/// pay-to-pubkey-hash tail.
pub fn cltv_script(lock_time: u32, pubkey_hash: &[u8; 20]) -> Vec<u8> {
    let mut script = Vec::new();
    push_data(&mut script, &encode_num(lock_time as u64));
    script.push(OP_CHECKLOCKTIMEVERIFY);
    script.push(OP_DROP);
    script.push(OP_DUP);
    script.push(OP_HASH160);
    push_data(&mut script, pubkey_hash);
    script.push(OP_EQUALVERIFY);
    script.push(OP_CHECKSIG);
    script
}

/// Witness v0 pay-to-pubkey-hash: `OP_0 <20 bytes>`.
pub fn p2wpkh_script(pubkey_hash: &[u8; 20]) -> Vec<u8> {
    let mut script = Vec::with_capacity(22);
    script.push(OP_0);
    push_data(&mut script, pubkey_hash);
    script
}

/// Witness v0 pay-to-script-hash: `OP_0 <32 bytes>`.
pub fn p2wsh_script(script_hash: &[u8]) -> Vec<u8> {
    let mut script = Vec::with_capacity(34);
    script.push(OP_0);
    push_data(&mut script, script_hash);
    script
}

/// Unlocking script for pay-to-pubkey-hash: `<sig> <pubkey>`.
pub fn p2pkh_script_sig(sig: &[u8], pubkey: &[u8]) -> Vec<u8> {
    let mut script = Vec::with_capacity(2 + sig.len() + pubkey.len());
    push_data(&mut script, sig);
    push_data(&mut script, pubkey);
    script
}

/// Unlocking script for P2SH-wrapped multisig:
/// `<sig1>..<sigM> <redeem script>`.
pub fn p2sh_multisig_script_sig(sigs: &[&[u8]], redeem_script: &[u8]) -> Vec<u8> {
    let mut script = Vec::new();
    for sig in sigs {
        push_data(&mut script, sig);
    }
    push_data(&mut script, redeem_script);
    script
}

/// Match `OP_DUP OP_HASH160 <20> OP_EQUALVERIFY OP_CHECKSIG`.
pub fn is_p2pkh(script: &[u8]) -> bool {
    script.len() == 25
        && script[0] == OP_DUP
        && script[1] == OP_HASH160
        && script[2] == 20
        && script[23] == OP_EQUALVERIFY
        && script[24] == OP_CHECKSIG
}

/// Match `OP_HASH160 <20> OP_EQUAL`.
pub fn is_p2sh(script: &[u8]) -> bool {
    script.len() == 23 && script[0] == OP_HASH160 && script[1] == 20 && script[22] == OP_EQUAL
}

/// Match a witness program: `OP_0 <20 or 32 bytes>`. Returns the version
/// and the program payload.
pub fn witness_program(script: &[u8]) -> Option<(u8, &[u8])> {
    if script.len() < 2 || script[0] != OP_0 {
        return None;
    }
    let len = script[1] as usize;
    if (len == 20 || len == 32) && script.len() == 2 + len {
        Some((0, &script[2..]))
    } else {
        None
    }
}

/// The indexable payload of a standard script, as lowercase hex: the
/// pubkey hash for P2PKH/P2WPKH, the script hash for P2SH/P2WSH, and the
/// pubkey hash for the time-locked template. `None` for anything else.
pub fn script_address(script: &[u8]) -> Option<String> {
    if is_p2pkh(script) {
        return Some(hex::encode(&script[3..23]));
    }
    if is_p2sh(script) {
        return Some(hex::encode(&script[2..22]));
    }
    if let Some((_, program)) = witness_program(script) {
        return Some(hex::encode(program));
    }
    if let Some(payload) = cltv_payload(script) {
        return Some(hex::encode(payload));
    }
    None
}

/// The pubkey hash inside a time-locked template, if `script` is one.
fn cltv_payload(script: &[u8]) -> Option<&[u8]> {
    // Tail: OP_DUP OP_HASH160 <20> OP_EQUALVERIFY OP_CHECKSIG (25 bytes);
    // head: a pushed number, OP_CHECKLOCKTIMEVERIFY, OP_DROP.
    if script.len() < 28 || script[script.len() - 25] != OP_DUP {
        return None;
    }
    let tail = &script[script.len() - 25..];
    let head = &script[..script.len() - 25];
    if !is_p2pkh(tail) {
        return None;
    }
    let [.., cltv, drop] = head else { return None };
    if *cltv != OP_CHECKLOCKTIMEVERIFY || *drop != OP_DROP {
        return None;
    }
    Some(&tail[3..23])
}
