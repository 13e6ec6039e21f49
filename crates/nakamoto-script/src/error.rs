use crate::constants::{
    MAX_OPS_PER_SCRIPT, MAX_PUBKEYS_PER_MULTISIG, MAX_SCRIPT_ELEMENT_SIZE, MAX_SCRIPT_SIZE,
    MAX_STACK_SIZE,
};
use crate::interpreter::SignatureEncodingError;
use crate::num::NumError;
use crate::opcode::Opcode;
use crate::stack::StackError;

/// Script error type.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    /// The script bytes did not decode into a well-formed operation stream.
    #[error("script contains an invalid operation")]
    InvalidOperation,
    /// The script evaluated without error but terminated with a false top stack element.
    #[error("script terminated with a false stack element")]
    EvalFalse,
    #[error("OP_RETURN encountered")]
    OpReturn,
    #[error("input index {0} out of range")]
    InputIndex(usize),

    // Max sizes.
    #[error("script exceeds the maximum size ({MAX_SCRIPT_SIZE} bytes)")]
    ScriptSize,
    #[error("pushed element exceeds MAX_SCRIPT_ELEMENT_SIZE ({MAX_SCRIPT_ELEMENT_SIZE})")]
    PushSize,
    #[error("operation count exceeded ({MAX_OPS_PER_SCRIPT} per script)")]
    OpCount,
    /// Stack and altstack combined depth is over the limit.
    #[error("stack size exceeded ({MAX_STACK_SIZE})")]
    StackSize,
    #[error("invalid number of signatures, expected in the range of [0, {0}]")]
    SigCount(i64),
    #[error("invalid number of pubkeys, expected in the range of [0, {MAX_PUBKEYS_PER_MULTISIG}]")]
    PubkeyCount,

    // Failed verify operations.
    #[error("{0} failed")]
    Verify(Opcode),

    // Logical/Format/Canonical errors.
    #[error("attempt to execute undefined or reserved opcode 0x{0:02x}")]
    BadOpcode(u8),
    #[error("attempt to execute disabled opcode {0}")]
    DisabledOpcode(Opcode),
    /// An OP_ELSE or OP_ENDIF without a matching OP_IF/OP_NOTIF, or the end of the script
    /// reached with a branch still open.
    #[error("unbalanced conditional")]
    UnbalancedConditional,
    #[error("invalid alt stack operation")]
    InvalidAltStackOperation,
    #[error(transparent)]
    Stack(#[from] StackError),
    #[error(transparent)]
    Num(#[from] NumError),

    // CHECKLOCKTIMEVERIFY and CHECKSEQUENCEVERIFY
    #[error("negative locktime")]
    NegativeLocktime,
    #[error("required lock time has not been reached")]
    UnsatisfiedLocktime,

    // Signatures.
    #[error("invalid signature encoding: {0}")]
    SignatureEncoding(#[from] SignatureEncodingError),
    #[error("multisig dummy argument has length {0} instead of 0")]
    SigNullDummy(usize),

    // Two stage and witness evaluation.
    #[error("input script of a pay-to-script-hash spend is not push only")]
    SigPushOnly,
    #[error("stack is not clean after evaluation")]
    CleanStack,
    #[error("native witness program cannot also have an input script")]
    WitnessMalleated,
    #[error("input script must be exactly a push of the witness redeem script")]
    WitnessMalleatedP2SH,
    #[error("witness provided for a non-witness script")]
    WitnessUnexpected,
    #[error("witness program witness empty")]
    WitnessProgramWitnessEmpty,
    #[error("witness program mismatch")]
    WitnessProgramMismatch,
    #[error("witness program wrong length")]
    WitnessProgramWrongLength,
}
