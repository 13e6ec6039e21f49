//! Transaction validation.
//!
//! - [`check_transaction`]: context free sanity checks.
//! - [`accept_transaction`]: checks against the chain state and the resolved previous outputs.
//! - [`connect_transaction`]: script verification of every input.

use crate::chain_state::ChainState;
use crate::coin::SpentOutputs;
use crate::{MAX_BLOCK_SIGOPS, MAX_BLOCK_SIZE};
use bitcoin::absolute::{LockTime, LOCK_TIME_THRESHOLD};
use bitcoin::{Amount, OutPoint, Transaction};
use nakamoto_script::{
    RuleForks, Script, SEQUENCE_LOCKTIME_DISABLE_FLAG, SEQUENCE_LOCKTIME_MASK,
    SEQUENCE_LOCKTIME_TYPE_FLAG,
};
use std::collections::HashSet;
use std::sync::Arc;

// MinCoinbaseScriptLen is the minimum length a coinbase script can be.
const MIN_COINBASE_SCRIPT_LEN: usize = 2;

// MaxCoinbaseScriptLen is the maximum length a coinbase script can be.
const MAX_COINBASE_SCRIPT_LEN: usize = 100;

// Relative time locks count in units of 512 seconds.
const SEQUENCE_LOCKTIME_GRANULARITY: u32 = 9;

/// Transaction verification error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("Transaction has no inputs")]
    EmptyInput,
    #[error("Transaction has no outputs")]
    EmptyOutput,
    #[error("Transaction is too large")]
    BadTransactionLength,
    #[error("Output value ({0}) is too large")]
    OutputValueTooLarge(Amount),
    #[error("Total output value ({0}) is too large")]
    TotalOutputValueTooLarge(Amount),
    #[error("Transaction contains duplicate inputs at index {0}")]
    DuplicateTxInput(usize),
    #[error(
        "Coinbase transaction script length of {0} is out of range \
        (min: {MIN_COINBASE_SCRIPT_LEN}, max: {MAX_COINBASE_SCRIPT_LEN})"
    )]
    BadCoinbaseScriptSigLength(usize),
    #[error("Transaction input refers to previous output that is null")]
    BadTxInput,
    #[error("Transaction is not final")]
    NonFinal,
    #[error("Too many sigops: {0}")]
    TooManySigops(usize),
    #[error("Previous output {0} is not available")]
    MissingInput(OutPoint),
    #[error("Input {input_index} spends a coinbase output only {depth} blocks deep")]
    PrematureCoinbaseSpend { input_index: usize, depth: u32 },
    #[error("Input {0} is locked by its relative lock-time")]
    SequenceLocked(usize),
    #[error("Total input value is out of range")]
    InputValueOverflow,
    #[error("Input value {input_value} is less than output value {output_value}")]
    SpendExceedsValue {
        input_value: Amount,
        output_value: Amount,
    },
    #[error("Input {input_index} failed script verification: {source}")]
    Script {
        input_index: usize,
        source: nakamoto_script::Error,
    },
}

/// Checks the transaction without any chain context.
pub fn check_transaction(tx: &Transaction) -> Result<(), Error> {
    if tx.input.is_empty() {
        return Err(Error::EmptyInput);
    }

    if tx.output.is_empty() {
        return Err(Error::EmptyOutput);
    }

    if tx.base_size() > MAX_BLOCK_SIZE {
        return Err(Error::BadTransactionLength);
    }

    let mut total_output_value = Amount::ZERO;
    tx.output.iter().try_for_each(|txout| {
        if txout.value > Amount::MAX_MONEY {
            return Err(Error::OutputValueTooLarge(txout.value));
        }

        total_output_value = total_output_value
            .checked_add(txout.value)
            .ok_or(Error::TotalOutputValueTooLarge(Amount::MAX))?;

        if total_output_value > Amount::MAX_MONEY {
            return Err(Error::TotalOutputValueTooLarge(total_output_value));
        }

        Ok(())
    })?;

    // Check for duplicate inputs.
    let mut seen_inputs = HashSet::new();
    for (index, txin) in tx.input.iter().enumerate() {
        if !seen_inputs.insert(txin.previous_output) {
            return Err(Error::DuplicateTxInput(index));
        }
    }

    // Coinbase script length must be between min and max length.
    if tx.is_coinbase() {
        let script_sig_len = tx.input[0].script_sig.len();

        if !(MIN_COINBASE_SCRIPT_LEN..=MAX_COINBASE_SCRIPT_LEN).contains(&script_sig_len) {
            return Err(Error::BadCoinbaseScriptSigLength(script_sig_len));
        }
    } else {
        // Previous transaction outputs referenced by the inputs to this
        // transaction must not be null.
        if tx.input.iter().any(|txin| txin.previous_output.is_null()) {
            return Err(Error::BadTxInput);
        }
    }

    Ok(())
}

pub fn is_final(tx: &Transaction, height: u32, block_time: u32) -> bool {
    if tx.lock_time == LockTime::ZERO {
        return true;
    }

    let lock_time = if tx.lock_time.to_consensus_u32() < LOCK_TIME_THRESHOLD {
        height
    } else {
        block_time
    };

    if tx.lock_time.to_consensus_u32() < lock_time {
        return true;
    }

    tx.input.iter().all(|txin| txin.sequence.is_final())
}

/// Checks the transaction against `state` and the outputs it spends.
///
/// With `pool` set the transaction is validated for relay: it must be final at the chain
/// tip and stay within the sigop limit on its own. Inside a block both are checked for the
/// block as a whole instead.
pub fn accept_transaction(
    tx: &Transaction,
    state: &ChainState,
    spent: &SpentOutputs,
    pool: bool,
) -> Result<(), Error> {
    if pool {
        if !is_final(tx, state.height(), state.median_time_past()) {
            return Err(Error::NonFinal);
        }

        let sigops = signature_operations(tx, state.is_enabled(RuleForks::BIP16), spent);
        if sigops > MAX_BLOCK_SIGOPS {
            return Err(Error::TooManySigops(sigops));
        }
    }

    if tx.is_coinbase() {
        return Ok(());
    }

    for (input_index, txin) in tx.input.iter().enumerate() {
        let coin = spent
            .get(&txin.previous_output)
            .ok_or(Error::MissingInput(txin.previous_output))?;

        if coin.is_coinbase {
            let depth = state.height().saturating_sub(coin.height);
            if depth < state.coinbase_maturity() {
                return Err(Error::PrematureCoinbaseSpend { input_index, depth });
            }
        }
    }

    // https://github.com/bitcoin/bitcoin/blob/6f9db1ebcab4064065ccd787161bf2b87e03cc1f/src/consensus/tx_verify.cpp#L39
    if state.is_enabled(RuleForks::BIP68) && tx.version.0 as u32 >= 2 {
        check_sequence_locks(tx, state, spent)?;
    }

    let input_value = total_input_value(tx, spent)?;
    let output_value = total_output_value(tx);

    if input_value < output_value {
        return Err(Error::SpendExceedsValue {
            input_value,
            output_value,
        });
    }

    Ok(())
}

// Every input must be buried deep enough for its relative lock-time, a lock is satisfied
// once the block is above the last height or time at which the input is still locked.
fn check_sequence_locks(
    tx: &Transaction,
    state: &ChainState,
    spent: &SpentOutputs,
) -> Result<(), Error> {
    for (input_index, txin) in tx.input.iter().enumerate() {
        let sequence = txin.sequence.to_consensus_u32();

        if sequence & SEQUENCE_LOCKTIME_DISABLE_FLAG != 0 {
            continue;
        }

        let coin = spent
            .get(&txin.previous_output)
            .ok_or(Error::MissingInput(txin.previous_output))?;

        let masked_sequence = i64::from(sequence & SEQUENCE_LOCKTIME_MASK);

        let locked = if sequence & SEQUENCE_LOCKTIME_TYPE_FLAG != 0 {
            let min_time = i64::from(coin.median_time_past)
                + (masked_sequence << SEQUENCE_LOCKTIME_GRANULARITY)
                - 1;
            min_time >= i64::from(state.median_time_past())
        } else {
            let min_height = i64::from(coin.height) + masked_sequence - 1;
            min_height >= i64::from(state.height())
        };

        if locked {
            tracing::trace!(
                txid = %tx.compute_txid(),
                input_index,
                sequence,
                "Input is still locked by BIP68"
            );
            return Err(Error::SequenceLocked(input_index));
        }
    }

    Ok(())
}

/// Verifies the scripts of every input in order, the first failure wins.
pub fn connect_transaction(
    tx: &Arc<Transaction>,
    state: &ChainState,
    spent: &SpentOutputs,
) -> Result<(), Error> {
    if tx.is_coinbase() {
        return Ok(());
    }

    for (input_index, txin) in tx.input.iter().enumerate() {
        let coin = spent
            .get(&txin.previous_output)
            .ok_or(Error::MissingInput(txin.previous_output))?;

        let prevout_script = Script::from(coin.output.script_pubkey.as_script());

        nakamoto_script::verify_input(
            tx,
            input_index,
            state.forks(),
            &prevout_script,
            coin.output.value.to_sat(),
        )
        .map_err(|source| Error::Script {
            input_index,
            source,
        })?;
    }

    Ok(())
}

/// Sum of the values of the outputs spent by `tx`.
pub fn total_input_value(tx: &Transaction, spent: &SpentOutputs) -> Result<Amount, Error> {
    if tx.is_coinbase() {
        return Ok(Amount::ZERO);
    }

    tx.input.iter().try_fold(Amount::ZERO, |total, txin| {
        let coin = spent
            .get(&txin.previous_output)
            .ok_or(Error::MissingInput(txin.previous_output))?;

        total
            .checked_add(coin.output.value)
            .filter(|total| *total <= Amount::MAX_MONEY)
            .ok_or(Error::InputValueOverflow)
    })
}

/// Sum of the output values, saturating at [`Amount::MAX`].
pub fn total_output_value(tx: &Transaction) -> Amount {
    tx.output.iter().fold(Amount::ZERO, |total, txout| {
        total.checked_add(txout.value).unwrap_or(Amount::MAX)
    })
}

/// Fee paid by `tx`, zero for a coinbase.
pub fn fees(tx: &Transaction, spent: &SpentOutputs) -> Result<Amount, Error> {
    if tx.is_coinbase() {
        return Ok(Amount::ZERO);
    }

    let input_value = total_input_value(tx, spent)?;
    let output_value = total_output_value(tx);

    input_value
        .checked_sub(output_value)
        .ok_or(Error::SpendExceedsValue {
            input_value,
            output_value,
        })
}

/// Legacy sigops of `tx`, plus the sigops of the P2SH redeem scripts it reveals when
/// `bip16` is active.
///
/// Inputs whose previous output is not in `spent` contribute no P2SH sigops.
pub fn signature_operations(tx: &Transaction, bip16: bool, spent: &SpentOutputs) -> usize {
    let legacy = tx
        .input
        .iter()
        .map(|txin| Script::from(txin.script_sig.as_script()).signature_operations(false))
        .chain(
            tx.output.iter().map(|txout| {
                Script::from(txout.script_pubkey.as_script()).signature_operations(false)
            }),
        )
        .fold(0usize, usize::saturating_add);

    if !bip16 || tx.is_coinbase() {
        return legacy;
    }

    tx.input
        .iter()
        .filter_map(|txin| {
            let coin = spent.get(&txin.previous_output)?;
            let prevout_script = Script::from(coin.output.script_pubkey.as_script());

            prevout_script.is_pay_to_script_hash().then(|| {
                prevout_script
                    .embedded_signature_operations(&Script::from(txin.script_sig.as_script()))
            })
        })
        .fold(legacy, usize::saturating_add)
}
