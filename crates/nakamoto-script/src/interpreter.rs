mod multisig;
mod sig;
mod verify;

use crate::constants::{MAX_SCRIPT_ELEMENT_SIZE, SEQUENCE_LOCKTIME_DISABLE_FLAG};
use crate::error::Error;
use crate::flags::RuleForks;
use crate::num::ScriptNum;
use crate::operation::Operation;
use crate::program::Program;
use crate::signature_checker::SignatureChecker;
use crate::stack::StackError;
use bitcoin::hashes::{hash160, ripemd160, sha1, sha256, sha256d, Hash};

pub use self::sig::{is_valid_signature_encoding, SignatureEncodingError};
pub use self::verify::{verify_input, verify_script};

/// Runs `program` until the script is exhausted or an operation fails.
///
/// A branch left open at the end of the script fails the evaluation here, before any
/// verdict is drawn from the stack.
pub fn run(program: &mut Program, checker: &mut impl SignatureChecker) -> Result<(), Error> {
    if program.is_invalid() {
        return Err(Error::InvalidOperation);
    }

    let script = program.script().clone();

    if script.is_oversized() {
        return Err(Error::ScriptSize);
    }

    if script.is_unspendable() {
        return Err(Error::OpReturn);
    }

    for (index, operation) in script.operations().iter().enumerate() {
        if operation.is_oversized() {
            return Err(Error::PushSize);
        }

        // Disabled opcodes fail even inside an unexecuted branch.
        if operation.is_disabled() {
            return Err(disabled(operation));
        }

        program.increment_operation_count(operation)?;

        if program.is_executable(operation) {
            execute(program, checker, operation, index)?;
        }

        if program.is_stack_overflow() {
            return Err(Error::StackSize);
        }
    }

    if !program.is_closed() {
        return Err(Error::UnbalancedConditional);
    }

    Ok(())
}

fn disabled(operation: &Operation) -> Error {
    match operation.opcode() {
        Some(opcode) => Error::DisabledOpcode(opcode),
        None => Error::BadOpcode(operation.code()),
    }
}

fn execute(
    program: &mut Program,
    checker: &mut impl SignatureChecker,
    operation: &Operation,
    index: usize,
) -> Result<(), Error> {
    use crate::opcode::Opcode::*;

    let Some(opcode) = operation.opcode() else {
        return Err(Error::BadOpcode(operation.code()));
    };

    if operation.is_payload() {
        if operation.data().len() > MAX_SCRIPT_ELEMENT_SIZE {
            return Err(Error::PushSize);
        }
        program.stack_mut().push(operation.data().to_vec());
        return Ok(());
    }

    let forks = program.forks();
    let stack = program.stack_mut();

    match opcode {
        // Handled above.
        OP_0 | OP_PUSHBYTES_1 | OP_PUSHBYTES_2 | OP_PUSHBYTES_3 | OP_PUSHBYTES_4
        | OP_PUSHBYTES_5 | OP_PUSHBYTES_6 | OP_PUSHBYTES_7 | OP_PUSHBYTES_8 | OP_PUSHBYTES_9
        | OP_PUSHBYTES_10 | OP_PUSHBYTES_11 | OP_PUSHBYTES_12 | OP_PUSHBYTES_13
        | OP_PUSHBYTES_14 | OP_PUSHBYTES_15 | OP_PUSHBYTES_16 | OP_PUSHBYTES_17
        | OP_PUSHBYTES_18 | OP_PUSHBYTES_19 | OP_PUSHBYTES_20 | OP_PUSHBYTES_21
        | OP_PUSHBYTES_22 | OP_PUSHBYTES_23 | OP_PUSHBYTES_24 | OP_PUSHBYTES_25
        | OP_PUSHBYTES_26 | OP_PUSHBYTES_27 | OP_PUSHBYTES_28 | OP_PUSHBYTES_29
        | OP_PUSHBYTES_30 | OP_PUSHBYTES_31 | OP_PUSHBYTES_32 | OP_PUSHBYTES_33
        | OP_PUSHBYTES_34 | OP_PUSHBYTES_35 | OP_PUSHBYTES_36 | OP_PUSHBYTES_37
        | OP_PUSHBYTES_38 | OP_PUSHBYTES_39 | OP_PUSHBYTES_40 | OP_PUSHBYTES_41
        | OP_PUSHBYTES_42 | OP_PUSHBYTES_43 | OP_PUSHBYTES_44 | OP_PUSHBYTES_45
        | OP_PUSHBYTES_46 | OP_PUSHBYTES_47 | OP_PUSHBYTES_48 | OP_PUSHBYTES_49
        | OP_PUSHBYTES_50 | OP_PUSHBYTES_51 | OP_PUSHBYTES_52 | OP_PUSHBYTES_53
        | OP_PUSHBYTES_54 | OP_PUSHBYTES_55 | OP_PUSHBYTES_56 | OP_PUSHBYTES_57
        | OP_PUSHBYTES_58 | OP_PUSHBYTES_59 | OP_PUSHBYTES_60 | OP_PUSHBYTES_61
        | OP_PUSHBYTES_62 | OP_PUSHBYTES_63 | OP_PUSHBYTES_64 | OP_PUSHBYTES_65
        | OP_PUSHBYTES_66 | OP_PUSHBYTES_67 | OP_PUSHBYTES_68 | OP_PUSHBYTES_69
        | OP_PUSHBYTES_70 | OP_PUSHBYTES_71 | OP_PUSHBYTES_72 | OP_PUSHBYTES_73
        | OP_PUSHBYTES_74 | OP_PUSHBYTES_75 | OP_PUSHDATA1 | OP_PUSHDATA2 | OP_PUSHDATA4 => {}

        // Constants
        OP_1NEGATE | OP_1 | OP_2 | OP_3 | OP_4 | OP_5 | OP_6 | OP_7 | OP_8 | OP_9 | OP_10
        | OP_11 | OP_12 | OP_13 | OP_14 | OP_15 | OP_16 => {
            let value = opcode.small_number().unwrap_or_default();
            stack.push_num(value);
        }

        // Flow control
        OP_NOP => {}
        OP_IF | OP_NOTIF => {
            let mut value = false;
            if program.is_succeeding() {
                value = program.stack_mut().pop_bool()?;
                if opcode == OP_NOTIF {
                    value = !value;
                }
            }
            program.open(value);
        }
        OP_ELSE => program.negate()?,
        OP_ENDIF => program.close()?,
        OP_VERIFY => {
            if !stack.pop_bool()? {
                return Err(Error::Verify(opcode));
            }
        }
        OP_RETURN => return Err(Error::OpReturn),

        // Stack
        OP_TOALTSTACK => {
            let value = stack.pop()?;
            program.alternate_mut().push(value);
        }
        OP_FROMALTSTACK => {
            let value = program
                .alternate_mut()
                .pop()
                .map_err(|_| Error::InvalidAltStackOperation)?;
            program.stack_mut().push(value);
        }
        OP_2DROP => stack.drop(2)?,
        OP_2DUP => stack.dup(2)?,
        OP_3DUP => stack.dup(3)?,
        OP_2OVER => stack.over(2)?,
        OP_2ROT => stack.rot(2)?,
        OP_2SWAP => stack.swap(2)?,
        OP_IFDUP => {
            if stack.peek_bool()? {
                stack.dup(1)?;
            }
        }
        OP_DEPTH => {
            let depth = stack.len() as i64;
            stack.push_num(depth);
        }
        OP_DROP => stack.drop(1)?,
        OP_DUP => stack.dup(1)?,
        OP_NIP => stack.nip()?,
        OP_OVER => stack.over(1)?,
        OP_PICK | OP_ROLL => {
            let n = stack.pop_num(ScriptNum::MAX_NUM_SIZE)?.value();
            if n < 0 || n >= stack.len() as i64 {
                return Err(StackError::InvalidOperation.into());
            }
            let value = if opcode == OP_PICK {
                stack.top(n as usize)?.clone()
            } else {
                stack.remove(n as usize)?
            };
            stack.push(value);
        }
        OP_ROT => stack.rot(1)?,
        OP_SWAP => stack.swap(1)?,
        OP_TUCK => stack.tuck()?,

        // Splice
        OP_SIZE => {
            let size = stack.last()?.len() as i64;
            stack.push_num(size);
        }

        // Bitwise logic
        OP_EQUAL => {
            let equal = stack.pop()? == stack.pop()?;
            stack.push_bool(equal);
        }
        OP_EQUALVERIFY => {
            if stack.pop()? != stack.pop()? {
                return Err(Error::Verify(opcode));
            }
        }

        // Arithmetic
        OP_1ADD | OP_1SUB | OP_NEGATE | OP_ABS | OP_NOT | OP_0NOTEQUAL => {
            let n = stack.pop_num(ScriptNum::MAX_NUM_SIZE)?;
            let result = match opcode {
                OP_1ADD => (n + 1.into())?,
                OP_1SUB => (n - 1.into())?,
                OP_NEGATE => (-n)?,
                OP_ABS => n.abs(),
                OP_NOT => n.is_zero().into(),
                _ => (!n.is_zero()).into(),
            };
            stack.push_num(result);
        }
        OP_ADD | OP_SUB | OP_BOOLAND | OP_BOOLOR | OP_NUMEQUAL | OP_NUMEQUALVERIFY
        | OP_NUMNOTEQUAL | OP_LESSTHAN | OP_GREATERTHAN | OP_LESSTHANOREQUAL
        | OP_GREATERTHANOREQUAL | OP_MIN | OP_MAX => {
            // [v2 v1]
            let v1 = stack.pop_num(ScriptNum::MAX_NUM_SIZE)?;
            let v2 = stack.pop_num(ScriptNum::MAX_NUM_SIZE)?;
            let result: ScriptNum = match opcode {
                OP_ADD => (v2 + v1)?,
                OP_SUB => (v2 - v1)?,
                OP_BOOLAND => (!v1.is_zero() && !v2.is_zero()).into(),
                OP_BOOLOR => (!v1.is_zero() || !v2.is_zero()).into(),
                OP_NUMEQUAL | OP_NUMEQUALVERIFY => (v1 == v2).into(),
                OP_NUMNOTEQUAL => (v1 != v2).into(),
                OP_LESSTHAN => (v2 < v1).into(),
                OP_GREATERTHAN => (v2 > v1).into(),
                OP_LESSTHANOREQUAL => (v2 <= v1).into(),
                OP_GREATERTHANOREQUAL => (v2 >= v1).into(),
                OP_MIN => v1.min(v2),
                _ => v1.max(v2),
            };
            if opcode == OP_NUMEQUALVERIFY {
                if result.is_zero() {
                    return Err(Error::Verify(opcode));
                }
            } else {
                stack.push_num(result);
            }
        }
        OP_WITHIN => {
            // [x min max]
            let max = stack.pop_num(ScriptNum::MAX_NUM_SIZE)?;
            let min = stack.pop_num(ScriptNum::MAX_NUM_SIZE)?;
            let x = stack.pop_num(ScriptNum::MAX_NUM_SIZE)?;
            stack.push_bool((min..max).contains(&x));
        }

        // Crypto
        OP_RIPEMD160 => {
            let hash = ripemd160::Hash::hash(&stack.pop()?);
            stack.push(hash.to_byte_array().to_vec());
        }
        OP_SHA1 => {
            let hash = sha1::Hash::hash(&stack.pop()?);
            stack.push(hash.to_byte_array().to_vec());
        }
        OP_SHA256 => {
            let hash = sha256::Hash::hash(&stack.pop()?);
            stack.push(hash.to_byte_array().to_vec());
        }
        OP_HASH160 => {
            let hash = hash160::Hash::hash(&stack.pop()?);
            stack.push(hash.to_byte_array().to_vec());
        }
        OP_HASH256 => {
            let hash = sha256d::Hash::hash(&stack.pop()?);
            stack.push(hash.to_byte_array().to_vec());
        }
        OP_CODESEPARATOR => program.set_jump_register(index),
        OP_CHECKSIG | OP_CHECKSIGVERIFY => {
            let success = sig::check_sig(program, checker)?;
            if opcode == OP_CHECKSIG {
                program.stack_mut().push_bool(success);
            } else if !success {
                return Err(Error::Verify(opcode));
            }
        }
        OP_CHECKMULTISIG | OP_CHECKMULTISIGVERIFY => {
            let success = multisig::check_multisig(program, checker)?;
            if opcode == OP_CHECKMULTISIG {
                program.stack_mut().push_bool(success);
            } else if !success {
                return Err(Error::Verify(opcode));
            }
        }

        // Locktime
        OP_CHECKLOCKTIMEVERIFY => {
            // Behaves as OP_NOP2 until BIP65.
            if !forks.contains(RuleForks::BIP65) {
                return Ok(());
            }

            // The operand stays on the stack. Five bytes cover the full u32 lock time range.
            let lock_time = ScriptNum::from_bytes(
                stack.last()?,
                false,
                ScriptNum::LOCKTIME_NUM_SIZE,
            )?;

            if lock_time.is_negative() {
                return Err(Error::NegativeLocktime);
            }

            if !checker.check_lock_time(lock_time) {
                return Err(Error::UnsatisfiedLocktime);
            }
        }
        OP_CHECKSEQUENCEVERIFY => {
            // Behaves as OP_NOP3 until BIP112.
            if !forks.contains(RuleForks::BIP112) {
                return Ok(());
            }

            let sequence = ScriptNum::from_bytes(
                stack.last()?,
                false,
                ScriptNum::LOCKTIME_NUM_SIZE,
            )?;

            if sequence.is_negative() {
                return Err(Error::NegativeLocktime);
            }

            // A disabled relative lock time is a no-op, leaving room for future soft forks.
            if sequence.value() & i64::from(SEQUENCE_LOCKTIME_DISABLE_FLAG) == 0
                && !checker.check_sequence(sequence)
            {
                return Err(Error::UnsatisfiedLocktime);
            }
        }

        OP_NOP1 | OP_NOP4 | OP_NOP5 | OP_NOP6 | OP_NOP7 | OP_NOP8 | OP_NOP9 | OP_NOP10 => {}

        // Reserved words fail when executed, VERIF and VERNOTIF even inside a false branch.
        OP_RESERVED | OP_VER | OP_VERIF | OP_VERNOTIF | OP_RESERVED1 | OP_RESERVED2 => {
            return Err(Error::BadOpcode(opcode.to_u8()));
        }

        OP_CAT | OP_SUBSTR | OP_LEFT | OP_RIGHT | OP_INVERT | OP_AND | OP_OR | OP_XOR
        | OP_2MUL | OP_2DIV | OP_MUL | OP_DIV | OP_MOD | OP_LSHIFT | OP_RSHIFT => {
            return Err(Error::DisabledOpcode(opcode));
        }
    }

    Ok(())
}
