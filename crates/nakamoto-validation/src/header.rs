//! Block header validation.

use crate::chain_state::ChainState;
use bitcoin::block::{Header as BitcoinHeader, ValidationError};
use bitcoin::{BlockHash, Target};
use nakamoto_script::RuleForks;

/// 2 hours
pub const MAX_FUTURE_BLOCK_TIME: u32 = 2 * 60 * 60;

/// Block header error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Block's difficulty is invalid.
    #[error("Incorrect proof-of-work: {{ got: {got:?}, expected: {expected:?} }}")]
    BadDifficultyBits { got: Target, expected: Target },
    /// Block's target is easier than the network allows.
    #[error("Target {got:?} exceeds the proof-of-work limit {limit:?}")]
    TargetAboveLimit { got: Target, limit: Target },
    /// Block's proof-of-work is invalid.
    #[error("proof-of-work validation failed: {0:?}")]
    InvalidProofOfWork(ValidationError),
    /// Block's timestamp is too far in the future.
    #[error("Block time is too far in the future")]
    TooFarInFuture,
    /// Block's timestamp is too old.
    #[error("Time is the median time of last 11 blocks or before")]
    TimeTooOld,
    /// Block version was retired by an activated soft fork.
    #[error("Block version {version} is obsolete, at least {required} is required")]
    OldVersion { version: i32, required: i32 },
    /// Block hash differs from the checkpoint at its height.
    #[error("Block hash {got} does not match checkpoint {expected}")]
    CheckpointMismatch { got: BlockHash, expected: BlockHash },
}

/// Context free header checks.
///
/// - Check proof of work.
/// - Time is not greater than 2 hours from `now`.
///
/// https://github.com/bitcoin/bitcoin/blob/6f9db1ebcab4064065ccd787161bf2b87e03cc1f/src/validation.cpp#L3964
pub fn check_header(header: &BitcoinHeader, now: u32) -> Result<(), Error> {
    header
        .validate_pow(header.target())
        .map_err(Error::InvalidProofOfWork)?;

    if header.time > now.saturating_add(MAX_FUTURE_BLOCK_TIME) {
        return Err(Error::TooFarInFuture);
    }

    Ok(())
}

/// Header checks against the chain state the header extends.
///
/// https://github.com/bitcoin/bitcoin/blob/6f9db1ebcab4064065ccd787161bf2b87e03cc1f/src/validation.cpp#L4146
pub fn accept_header(header: &BitcoinHeader, state: &ChainState) -> Result<(), Error> {
    let required = minimum_version(state.forks());
    if header.version.to_consensus() < required {
        return Err(Error::OldVersion {
            version: header.version.to_consensus(),
            required,
        });
    }

    if header.time <= state.median_time_past() {
        return Err(Error::TimeTooOld);
    }

    if let Some(limit) = state.pow_limit() {
        let got = header.target();
        if got > limit {
            return Err(Error::TargetAboveLimit { got, limit });
        }
    }

    if let Some(expected_bits) = state.work_required() {
        if header.bits != expected_bits {
            return Err(Error::BadDifficultyBits {
                got: header.target(),
                expected: Target::from_compact(expected_bits),
            });
        }
    }

    if let Some(expected) = state.checkpoint() {
        let got = header.block_hash();
        if got != expected {
            return Err(Error::CheckpointMismatch { got, expected });
        }
    }

    Ok(())
}

// Reject blocks with outdated version once the fork retiring it has activated.
fn minimum_version(forks: RuleForks) -> i32 {
    if forks.contains(RuleForks::BIP65) {
        4
    } else if forks.contains(RuleForks::BIP66) {
        3
    } else if forks.contains(RuleForks::BIP34) {
        2
    } else {
        1
    }
}
