//! # Bitcoin Script
//!
//! Decoding, classification and evaluation of Bitcoin scripts.
//!
//! A [`Script`] is a sequence of [`Operation`]s. Evaluation runs a [`Program`], the machine
//! state for a single script, through the interpreter. [`verify_input`] chains the programs
//! of one transaction input: input script, previous output script and, when the output
//! calls for it, the P2SH redeem script and the witness v0 script.

mod constants;
mod error;
mod flags;
pub mod interpreter;
mod num;
pub mod opcode;
mod operation;
mod program;
mod script;
mod signature_checker;
mod stack;


pub use self::constants::*;
pub use self::error::Error;
pub use self::flags::{RuleForks, ScriptVersion};
pub use self::interpreter::{
    is_valid_signature_encoding, verify_input, verify_script, SignatureEncodingError,
};
pub use self::num::{NumError, ScriptNum};
pub use self::opcode::Opcode;
pub use self::operation::{Operation, OperationError};
pub use self::program::Program;
pub use self::script::{Script, ScriptPattern, WitnessProgram};
pub use self::signature_checker::{
    NoSignatureCheck, SignatureChecker, TransactionSignatureChecker,
};
pub use self::stack::{cast_to_bool, Stack, StackError};
