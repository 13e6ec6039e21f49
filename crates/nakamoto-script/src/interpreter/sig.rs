use crate::error::Error;
use crate::flags::{RuleForks, ScriptVersion};
use crate::operation::Operation;
use crate::program::Program;
use crate::script::Script;
use crate::signature_checker::SignatureChecker;

/// Strict DER violations, see BIP66.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureEncodingError {
    #[error("DER encoded signature is too short")]
    TooShort,
    #[error("DER encoded signature is too long")]
    TooLong,
    #[error("signature does not have the expected ASN.1 sequence ID")]
    InvalidSequenceId,
    #[error("signature length")]
    InvalidDataLength,
    #[error("R integer marker")]
    InvalidIntegerIdR,
    #[error("R length is zero")]
    ZeroLengthR,
    #[error("R is negative")]
    NegativeR,
    #[error("R value has too much padding")]
    TooMuchPaddingR,
    #[error("S integer marker")]
    InvalidIntegerIdS,
    #[error("S length is zero")]
    ZeroLengthS,
    #[error("S is negative")]
    NegativeS,
    #[error("S value has too much padding")]
    TooMuchPaddingS,
}

/// Checks the strict DER layout of a signature followed by its sighash byte:
///
/// `0x30 [total-length] 0x02 [R-length] [R] 0x02 [S-length] [S] [sighash-type]`
pub fn is_valid_signature_encoding(sig: &[u8]) -> Result<(), SignatureEncodingError> {
    if sig.len() < 9 {
        return Err(SignatureEncodingError::TooShort);
    }

    if sig.len() > 73 {
        return Err(SignatureEncodingError::TooLong);
    }

    if sig[0] != 0x30 {
        return Err(SignatureEncodingError::InvalidSequenceId);
    }

    // The length covers everything but the sequence header and the sighash byte.
    if sig[1] as usize != sig.len() - 3 {
        return Err(SignatureEncodingError::InvalidDataLength);
    }

    let len_r = sig[3] as usize;

    // S length must still be inside the signature.
    if 5 + len_r >= sig.len() {
        return Err(SignatureEncodingError::InvalidDataLength);
    }

    let len_s = sig[5 + len_r] as usize;

    if len_r + len_s + 7 != sig.len() {
        return Err(SignatureEncodingError::InvalidDataLength);
    }

    if sig[2] != 0x02 {
        return Err(SignatureEncodingError::InvalidIntegerIdR);
    }

    if len_r == 0 {
        return Err(SignatureEncodingError::ZeroLengthR);
    }

    if sig[4] & 0x80 != 0 {
        return Err(SignatureEncodingError::NegativeR);
    }

    // Leading zero only allowed when the next byte would read as negative.
    if len_r > 1 && sig[4] == 0x00 && sig[5] & 0x80 == 0 {
        return Err(SignatureEncodingError::TooMuchPaddingR);
    }

    if sig[len_r + 4] != 0x02 {
        return Err(SignatureEncodingError::InvalidIntegerIdS);
    }

    if len_s == 0 {
        return Err(SignatureEncodingError::ZeroLengthS);
    }

    if sig[len_r + 6] & 0x80 != 0 {
        return Err(SignatureEncodingError::NegativeS);
    }

    if len_s > 1 && sig[len_r + 6] == 0x00 && sig[len_r + 7] & 0x80 == 0 {
        return Err(SignatureEncodingError::TooMuchPaddingS);
    }

    Ok(())
}

/// Signature encoding rules in force for `program`. The empty signature is always allowed
/// as a compact way to fail a check.
pub(super) fn check_signature_encoding(program: &Program, sig: &[u8]) -> Result<(), Error> {
    if !sig.is_empty() && program.is_enabled(RuleForks::BIP66) {
        is_valid_signature_encoding(sig)?;
    }
    Ok(())
}

/// Script code committed to by the signatures of the current check.
///
/// Unversioned scripts drop every signature being checked and all code separators, witness
/// scripts sign the subscript as is.
pub(super) fn script_code(program: &Program, signatures: &[Vec<u8>]) -> Script {
    let subscript = program.subscript();

    match program.version() {
        ScriptVersion::Unversioned => signatures
            .iter()
            .fold(subscript, |script, sig| {
                script.find_and_delete(&Operation::push(sig.clone()))
            })
            .without_code_separators(),
        ScriptVersion::Zero => subscript,
    }
}

/// `[sig pubkey] -> bool`
pub(super) fn check_sig(
    program: &mut Program,
    checker: &mut impl SignatureChecker,
) -> Result<bool, Error> {
    let public_key = program.stack_mut().pop()?;
    let signature = program.stack_mut().pop()?;

    let script_code = script_code(program, std::slice::from_ref(&signature));

    check_signature_encoding(program, &signature)?;

    Ok(checker.check_signature(&signature, &public_key, &script_code, program.version()))
}
