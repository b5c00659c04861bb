//! The script virtual machine.

use crate::constants::{MAX_SCRIPT_OPS, MAX_SCRIPT_SIZE, MAX_STACK_SIZE, SEQUENCE_FINAL};
use crate::error::ScriptError;
use crate::hash::{hash160, Hash256};

use super::opcodes::*;

/// Per-spend context the interpreter needs for signature and lock-time
/// opcodes.
#[derive(Clone, Debug)]
pub struct ScriptContext {
    /// Signature hash for the input being authorized.
    pub sighash: Hash256,
    /// The spending transaction's lock_time.
    pub lock_time: u32,
    /// The spending input's sequence number.
    pub sequence: u32,
}

/// Cast a stack value to boolean: false when empty, all-zero, or negative
/// zero (all-zero with a 0x80 sign byte at the end).
pub fn is_truthy(value: &[u8]) -> bool {
    for (i, byte) in value.iter().enumerate() {
        if *byte != 0 {
            return !(i == value.len() - 1 && *byte == 0x80);
        }
    }
    false
}

/// Decode a minimally-ranged script number: little-endian with a sign bit
/// in the top byte, at most `max_len` bytes.
fn decode_num(value: &[u8], max_len: usize) -> Result<i64, ScriptError> {
    if value.len() > max_len {
        return Err(ScriptError::BadNumber);
    }
    if value.is_empty() {
        return Ok(0);
    }
    let mut result: i64 = 0;
    for (i, byte) in value.iter().enumerate() {
        let b = if i == value.len() - 1 { byte & 0x7F } else { *byte };
        result |= (b as i64) << (8 * i);
    }
    if value[value.len() - 1] & 0x80 != 0 {
        result = -result;
    }
    Ok(result)
}

/// Encode a non-negative number as a minimal script number.
pub fn encode_num(value: u64) -> Vec<u8> {
    if value == 0 {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut rest = value;
    while rest > 0 {
        out.push((rest & 0xFF) as u8);
        rest >>= 8;
    }
    // A set top bit would read back as negative; pad with a zero byte.
    if out.last().is_some_and(|b| b & 0x80 != 0) {
        out.push(0);
    }
    out
}

/// Collect the values pushed by a push-only script (a P2SH script_sig).
pub fn collect_pushes(script: &[u8]) -> Result<Vec<Vec<u8>>, ScriptError> {
    let mut pushes = Vec::new();
    let mut pc = 0;
    while pc < script.len() {
        let op = script[pc];
        pc += 1;
        if !is_push_opcode(op) {
            return Err(ScriptError::BadMultisig);
        }
        let (data, next) = read_push(script, pc, op)?;
        pushes.push(data);
        pc = next;
    }
    Ok(pushes)
}

/// Decode the payload of a push opcode starting right after the opcode
/// byte. Returns the data and the position after it.
fn read_push(script: &[u8], pc: usize, op: u8) -> Result<(Vec<u8>, usize), ScriptError> {
    let (len, mut pos) = match op {
        OP_0 => (0usize, pc),
        1..=MAX_DIRECT_PUSH => (op as usize, pc),
        OP_PUSHDATA1 => {
            let b = *script.get(pc).ok_or(ScriptError::TruncatedPush)?;
            (b as usize, pc + 1)
        }
        OP_PUSHDATA2 => {
            let bytes = script.get(pc..pc + 2).ok_or(ScriptError::TruncatedPush)?;
            (u16::from_le_bytes(bytes.try_into().expect("2 bytes")) as usize, pc + 2)
        }
        OP_PUSHDATA4 => {
            let bytes = script.get(pc..pc + 4).ok_or(ScriptError::TruncatedPush)?;
            (u32::from_le_bytes(bytes.try_into().expect("4 bytes")) as usize, pc + 4)
        }
        _ => {
            // OP_1..OP_16 push their constant.
            let n = small_int(op).ok_or(ScriptError::UnknownOpcode(op))?;
            return Ok((vec![n], pc));
        }
    };
    let data = script.get(pos..pos + len).ok_or(ScriptError::TruncatedPush)?.to_vec();
    pos += len;
    Ok((data, pos))
}

/// The stack machine. One instance runs one script (or one concatenated
/// script_sig‖script_pub_key pair).
pub struct Interpreter {
    stack: Vec<Vec<u8>>,
    op_count: usize,
}

impl Interpreter {
    pub fn new() -> Self {
        Self { stack: Vec::new(), op_count: 0 }
    }

    /// Start execution with a pre-seeded stack (P2SH redeem, P2WSH).
    pub fn with_stack(stack: Vec<Vec<u8>>) -> Self {
        Self { stack, op_count: 0 }
    }

    /// Whether execution left a truthy top-of-stack.
    pub fn final_result(&self) -> bool {
        self.stack.last().is_some_and(|top| is_truthy(top))
    }

    pub fn stack(&self) -> &[Vec<u8>] {
        &self.stack
    }

    fn pop(&mut self, op: &'static str) -> Result<Vec<u8>, ScriptError> {
        self.stack.pop().ok_or(ScriptError::StackUnderflow(op))
    }

    fn push(&mut self, value: Vec<u8>) -> Result<(), ScriptError> {
        if self.stack.len() >= MAX_STACK_SIZE {
            return Err(ScriptError::StackOverflow(MAX_STACK_SIZE));
        }
        self.stack.push(value);
        Ok(())
    }

    /// Execute a script to completion. The stack persists across calls so
    /// callers can inspect or chain executions.
    pub fn eval(&mut self, script: &[u8], ctx: &ScriptContext) -> Result<(), ScriptError> {
        if script.len() > MAX_SCRIPT_SIZE {
            return Err(ScriptError::ScriptTooLarge(MAX_SCRIPT_SIZE));
        }

        let mut pc = 0;
        while pc < script.len() {
            let op = script[pc];
            pc += 1;

            if is_push_opcode(op) {
                let (data, next) = read_push(script, pc, op)?;
                pc = next;
                self.push(data)?;
                continue;
            }

            self.op_count += 1;
            if self.op_count > MAX_SCRIPT_OPS {
                return Err(ScriptError::TooManyOps(MAX_SCRIPT_OPS));
            }

            match op {
                OP_DUP => {
                    let top = self.stack.last().cloned().ok_or(ScriptError::StackUnderflow("OP_DUP"))?;
                    self.push(top)?;
                }
                OP_DROP => {
                    self.pop("OP_DROP")?;
                }
                OP_HASH160 => {
                    let top = self.pop("OP_HASH160")?;
                    self.push(hash160(&top).to_vec())?;
                }
                OP_EQUAL => {
                    let a = self.pop("OP_EQUAL")?;
                    let b = self.pop("OP_EQUAL")?;
                    self.push(if a == b { vec![1] } else { Vec::new() })?;
                }
                OP_EQUALVERIFY => {
                    let a = self.pop("OP_EQUALVERIFY")?;
                    let b = self.pop("OP_EQUALVERIFY")?;
                    if a != b {
                        return Err(ScriptError::VerifyFailed);
                    }
                }
                OP_CHECKSIG => {
                    let pubkey = self.pop("OP_CHECKSIG")?;
                    let sig = self.pop("OP_CHECKSIG")?;
                    let ok = crate::crypto::verify_ecdsa(&pubkey, &ctx.sighash, &sig).is_ok();
                    self.push(if ok { vec![1] } else { Vec::new() })?;
                }
                OP_CHECKMULTISIG => self.op_checkmultisig(ctx)?,
                OP_CHECKLOCKTIMEVERIFY => {
                    let top = self.stack.last().ok_or(ScriptError::StackUnderflow(
                        "OP_CHECKLOCKTIMEVERIFY",
                    ))?;
                    let required = decode_num(top, 5)?;
                    if required < 0 {
                        return Err(ScriptError::NegativeLockTime);
                    }
                    if required as u64 > ctx.lock_time as u64 {
                        return Err(ScriptError::LockTimeUnsatisfied);
                    }
                    if ctx.sequence == SEQUENCE_FINAL {
                        return Err(ScriptError::LockTimeUnsatisfied);
                    }
                }
                other => return Err(ScriptError::UnknownOpcode(other)),
            }
        }

        Ok(())
    }

    /// Pop N, then N pubkeys, then M, then M signatures; succeed when every
    /// signature matches a distinct pubkey scanned in order.
    fn op_checkmultisig(&mut self, ctx: &ScriptContext) -> Result<(), ScriptError> {
        let n = decode_num(&self.pop("OP_CHECKMULTISIG")?, 4)?;
        if !(0..=20).contains(&n) {
            return Err(ScriptError::BadMultisig);
        }
        let mut pubkeys = Vec::with_capacity(n as usize);
        for _ in 0..n {
            pubkeys.push(self.pop("OP_CHECKMULTISIG")?);
        }
        let m = decode_num(&self.pop("OP_CHECKMULTISIG")?, 4)?;
        if m < 0 || m > n {
            return Err(ScriptError::BadMultisig);
        }
        let mut sigs = Vec::with_capacity(m as usize);
        for _ in 0..m {
            sigs.push(self.pop("OP_CHECKMULTISIG")?);
        }

        // Pubkeys were popped top-first; restore script order so signatures
        // must appear in the same relative order as their keys.
        pubkeys.reverse();
        sigs.reverse();

        let mut key_idx = 0;
        let mut matched = 0;
        for sig in &sigs {
            while key_idx < pubkeys.len() {
                let candidate = &pubkeys[key_idx];
                key_idx += 1;
                if crate::crypto::verify_ecdsa(candidate, &ctx.sighash, sig).is_ok() {
                    matched += 1;
                    break;
                }
            }
        }

        self.push(if matched == sigs.len() { vec![1] } else { Vec::new() })?;
        Ok(())
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}
