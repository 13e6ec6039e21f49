use super::sig::{check_signature_encoding, script_code};
use crate::constants::MAX_PUBKEYS_PER_MULTISIG;
use crate::error::Error;
use crate::flags::RuleForks;
use crate::num::ScriptNum;
use crate::program::Program;
use crate::signature_checker::SignatureChecker;

/// `([sig ...] num_of_signatures [pubkey ...] num_of_pubkeys -- bool)`
pub(super) fn check_multisig(
    program: &mut Program,
    checker: &mut impl SignatureChecker,
) -> Result<bool, Error> {
    let keys_count = program
        .stack_mut()
        .pop_num(ScriptNum::MAX_NUM_SIZE)?
        .value();
    if !(0..=MAX_PUBKEYS_PER_MULTISIG).contains(&keys_count) {
        return Err(Error::PubkeyCount);
    }

    let keys_count = keys_count as usize;
    program.increment_multisig_public_keys(keys_count)?;

    let mut keys = Vec::with_capacity(keys_count);
    for _ in 0..keys_count {
        keys.push(program.stack_mut().pop()?);
    }

    let sigs_count = program
        .stack_mut()
        .pop_num(ScriptNum::MAX_NUM_SIZE)?
        .value();
    if sigs_count < 0 || sigs_count as usize > keys_count {
        return Err(Error::SigCount(keys_count as i64));
    }

    let sigs_count = sigs_count as usize;
    let mut sigs = Vec::with_capacity(sigs_count);
    for _ in 0..sigs_count {
        sigs.push(program.stack_mut().pop()?);
    }

    // One extra element is consumed by consensus, it must be empty under BIP147.
    let dummy = program.stack_mut().pop()?;
    if program.is_enabled(RuleForks::BIP147) && !dummy.is_empty() {
        return Err(Error::SigNullDummy(dummy.len()));
    }

    let script_code = script_code(program, &sigs);
    let version = program.version();

    let mut success = true;
    let mut checked_keys = 0;
    let mut satisfied_sigs = 0;

    while satisfied_sigs < sigs.len() && success {
        let key = &keys[checked_keys];
        let sig = &sigs[satisfied_sigs];

        check_signature_encoding(program, sig)?;

        if checker.check_signature(sig, key, &script_code, version) {
            satisfied_sigs += 1;
        }

        checked_keys += 1;

        // Give up once the remaining keys can no longer satisfy the remaining signatures.
        success = keys.len() - checked_keys >= sigs.len() - satisfied_sigs;
    }

    Ok(success)
}
