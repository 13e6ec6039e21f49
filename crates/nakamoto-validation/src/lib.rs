//! # Bitcoin Consensus Validation
//!
//! Transaction and block validation on top of [`nakamoto_script`].
//!
//! Validation is split into phases of increasing cost and context:
//!
//! - `check`: context free sanity checks.
//! - `accept`: checks against a [`ChainState`] and the resolved [`SpentOutputs`].
//! - `connect`: script verification of every input.
//!
//! The crate does no I/O. Callers supply the chain state, derived from [`ChainParams`] or
//! built directly, and the previous outputs spent by the block.

pub mod block;
mod chain_params;
mod chain_state;
mod coin;
pub mod header;
mod locator;
mod merkle;
mod subsidy;
pub mod transaction;


pub use self::block::{Block, Validation};
pub use self::chain_params::ChainParams;
pub use self::chain_state::ChainState;
pub use self::coin::{Coin, SpentOutputs};
pub use self::header::{accept_header, check_header, MAX_FUTURE_BLOCK_TIME};
pub use self::locator::{locator_heights, locator_size};
pub use self::merkle::{merkle_root, transaction_merkle_root, witness_merkle_root};
pub use self::subsidy::{
    block_subsidy, block_subsidy_with_interval, block_value, INITIAL_SUBSIDY,
    SUBSIDY_HALVING_INTERVAL,
};
pub use self::transaction::{
    accept_transaction, check_transaction, connect_transaction, fees, is_final,
    signature_operations, total_input_value, total_output_value,
};
pub use nakamoto_script::RuleForks;

/// Maximum serialized size of a block, witness data excluded.
pub const MAX_BLOCK_SIZE: usize = 1_000_000;

/// The maximum allowed weight for a block, see BIP 141 (network rule).
pub const MAX_BLOCK_WEIGHT: bitcoin::Weight = bitcoin::Weight::MAX_BLOCK;

/// Maximum number of legacy and P2SH sigops in a block.
pub const MAX_BLOCK_SIGOPS: usize = 20_000;

/// Blocks a coinbase output has to be buried under before it can be spent.
pub const COINBASE_MATURITY: u32 = 100;
