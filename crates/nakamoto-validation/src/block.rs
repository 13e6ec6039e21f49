//! Block validation.
//!
//! Validation runs in three phases, each cheaper and more self-contained than the next:
//!
//! - [`Block::check`]: context free checks on the block alone.
//! - [`Block::accept`]: checks against the [`ChainState`] the block extends, optionally
//!   including the contextual checks of every transaction.
//! - [`Block::connect`]: script verification of every transaction input.
//!
//! The aggregates derived from the transaction list are computed on first use and cached
//! until the list is replaced.

use crate::chain_state::ChainState;
use crate::coin::SpentOutputs;
use crate::subsidy::{block_subsidy_with_interval, SUBSIDY_HALVING_INTERVAL};
use crate::{header, merkle, transaction, MAX_BLOCK_SIGOPS, MAX_BLOCK_SIZE, MAX_BLOCK_WEIGHT};
use bitcoin::block::Header;
use bitcoin::consensus::encode::{self, Encodable, VarInt};
use bitcoin::hashes::{sha256d, Hash, HashEngine};
use bitcoin::{Amount, BlockHash, Network, Transaction, TxMerkleNode, Weight, Work};
use nakamoto_script::{RuleForks, Script};
use parking_lot::{Mutex, RwLock, RwLockUpgradableReadGuard};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

/// Size of a serialized block header.
const HEADER_SIZE: usize = 80;

/// OP_RETURN, push of 36 bytes, followed by the commitment header of BIP141.
const WITNESS_COMMITMENT_HEADER: [u8; 6] = [0x6a, 0x24, 0xaa, 0x21, 0xa9, 0xed];

/// Length of an output script carrying the witness commitment, trailing data excluded.
const WITNESS_COMMITMENT_SIZE: usize = 38;

/// Block verification error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Header(#[from] header::Error),
    #[error("Transaction #{index} is invalid: {source}")]
    Transaction {
        index: usize,
        source: transaction::Error,
    },
    #[error("Block size of {0} bytes exceeds the limit")]
    BlockSizeLimit(usize),
    #[error("Block weight of {0} exceeds the limit")]
    BlockWeightLimit(Weight),
    /// Block must contain at least one coinbase transaction.
    #[error("Transaction list is empty")]
    EmptyBlock,
    #[error("First transaction is not coinbase")]
    FirstNotCoinbase,
    #[error("Block contains multiple coinbase transactions")]
    ExtraCoinbases,
    #[error("Block contains duplicate transactions")]
    DuplicateTransaction,
    #[error("Block spends the same output more than once")]
    InternalDoubleSpend,
    #[error("Invalid merkle root")]
    MerkleMismatch,
    #[error("Coinbase script does not start with the block height")]
    CoinbaseHeightMismatch,
    #[error("Witness commitment does not match the witness merkle root")]
    BadWitnessCommitment,
    #[error("Block carries witness data before segwit activation")]
    UnexpectedWitness,
    #[error("Coinbase claims {claim}, more than the block reward {reward}")]
    CoinbaseValueLimit { claim: Amount, reward: Amount },
    #[error("Block contains non-final transactions")]
    BlockNonFinal,
    #[error("Block has {0} sigops, more than allowed")]
    BlockEmbeddedSigopLimit(usize),
    /// A contextual check was requested without a chain state attached.
    #[error("Operation failed: no chain state attached")]
    OperationFailed,
}

/// Chain state and timing of the latest validation phases.
#[derive(Debug, Clone, Default)]
pub struct Validation {
    pub state: Option<Arc<ChainState>>,
    pub start_check: Option<Instant>,
    pub start_accept: Option<Instant>,
    pub start_connect: Option<Instant>,
}

/// Bitcoin block under validation.
#[derive(Debug)]
pub struct Block {
    header: Header,
    transactions: Vec<Arc<Transaction>>,
    total_inputs: RwLock<Option<usize>>,
    non_coinbase_inputs: RwLock<Option<usize>>,
    validation: Mutex<Validation>,
}

impl Clone for Block {
    fn clone(&self) -> Self {
        Self {
            header: self.header,
            transactions: self.transactions.clone(),
            total_inputs: RwLock::new(*self.total_inputs.read()),
            non_coinbase_inputs: RwLock::new(*self.non_coinbase_inputs.read()),
            validation: Mutex::new(self.validation.lock().clone()),
        }
    }
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.header == other.header && self.transactions == other.transactions
    }
}

impl Eq for Block {}

impl From<bitcoin::Block> for Block {
    fn from(block: bitcoin::Block) -> Self {
        Self::new(
            block.header,
            block.txdata.into_iter().map(Arc::new).collect(),
        )
    }
}

impl Block {
    /// Constructs a new instance of [`Block`].
    pub fn new(header: Header, transactions: Vec<Arc<Transaction>>) -> Self {
        Self {
            header,
            transactions,
            total_inputs: RwLock::new(None),
            non_coinbase_inputs: RwLock::new(None),
            validation: Mutex::new(Validation::default()),
        }
    }

    pub fn genesis_mainnet() -> Self {
        bitcoin::constants::genesis_block(Network::Bitcoin).into()
    }

    pub fn genesis_testnet() -> Self {
        bitcoin::constants::genesis_block(Network::Testnet).into()
    }

    pub fn genesis_regtest() -> Self {
        bitcoin::constants::genesis_block(Network::Regtest).into()
    }

    /// Decodes a block in its network serialization.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, encode::Error> {
        encode::deserialize::<bitcoin::Block>(bytes).map(Into::into)
    }

    /// Network serialization of the block, witness data included.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.serialized_size());

        self.header
            .consensus_encode(&mut bytes)
            .expect("in-memory writers don't error; qed");
        VarInt(self.transactions.len() as u64)
            .consensus_encode(&mut bytes)
            .expect("in-memory writers don't error; qed");
        for tx in &self.transactions {
            tx.consensus_encode(&mut bytes)
                .expect("in-memory writers don't error; qed");
        }

        bytes
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn transactions(&self) -> &[Arc<Transaction>] {
        &self.transactions
    }

    pub fn coinbase(&self) -> Option<&Arc<Transaction>> {
        self.transactions.first()
    }

    /// Replaces the transaction list, the cached aggregates are recomputed on next use.
    pub fn set_transactions(&mut self, transactions: Vec<Arc<Transaction>>) {
        self.transactions = transactions;
        *self.total_inputs.get_mut() = None;
        *self.non_coinbase_inputs.get_mut() = None;
    }

    pub fn hash(&self) -> BlockHash {
        self.header.block_hash()
    }

    /// Work represented by the block's difficulty target.
    pub fn proof(&self) -> Work {
        self.header.work()
    }

    /// Size of the block with witness data.
    pub fn serialized_size(&self) -> usize {
        self.size_with(Transaction::total_size)
    }

    /// Size of the block with witness data stripped.
    pub fn stripped_size(&self) -> usize {
        self.size_with(Transaction::base_size)
    }

    pub fn weight(&self) -> Weight {
        let weight = self.stripped_size() * (bitcoin::constants::WITNESS_SCALE_FACTOR - 1)
            + self.serialized_size();
        Weight::from_wu(weight as u64)
    }

    fn size_with(&self, tx_size: impl Fn(&Transaction) -> usize) -> usize {
        let tx_count = VarInt(self.transactions.len() as u64).size();
        HEADER_SIZE
            + tx_count
            + self
                .transactions
                .iter()
                .map(|tx| tx_size(tx.as_ref()))
                .sum::<usize>()
    }

    /// Number of inputs across all transactions, the coinbase included.
    pub fn total_inputs(&self) -> usize {
        cached(&self.total_inputs, || {
            self.transactions.iter().map(|tx| tx.input.len()).sum()
        })
    }

    /// Number of inputs across all transactions but the coinbase.
    pub fn non_coinbase_inputs(&self) -> usize {
        cached(&self.non_coinbase_inputs, || {
            self.transactions
                .iter()
                .skip(1)
                .map(|tx| tx.input.len())
                .sum()
        })
    }

    /// Legacy sigops of the block, plus the P2SH sigops when `bip16` is active.
    pub fn signature_operations(&self, bip16: bool, spent: &SpentOutputs) -> usize {
        self.transactions
            .iter()
            .map(|tx| transaction::signature_operations(tx, bip16, spent))
            .fold(0usize, usize::saturating_add)
    }

    /// Fees collected by the block.
    ///
    /// A transaction whose fee is unknown, because an input is not in `spent` or the fee
    /// is negative, counts as [`Amount::MAX`], the sum saturating as well. Such a block
    /// can't be refuted on its coinbase claim, the transaction checks reject it instead.
    pub fn fees(&self, spent: &SpentOutputs) -> Amount {
        self.transactions
            .iter()
            .map(|tx| transaction::fees(tx, spent).unwrap_or(Amount::MAX))
            .fold(Amount::ZERO, |total, fee| {
                total.checked_add(fee).unwrap_or(Amount::MAX)
            })
    }

    /// Total output value of the coinbase.
    pub fn claim(&self) -> Amount {
        self.coinbase()
            .map(|coinbase| transaction::total_output_value(coinbase))
            .unwrap_or(Amount::ZERO)
    }

    /// Maximum value the coinbase of a block at `height` may claim.
    pub fn reward(&self, height: u32, spent: &SpentOutputs) -> Amount {
        self.reward_with_interval(height, SUBSIDY_HALVING_INTERVAL, spent)
    }

    fn reward_with_interval(&self, height: u32, interval: u32, spent: &SpentOutputs) -> Amount {
        let subsidy = Amount::from_sat(block_subsidy_with_interval(height, interval));
        self.fees(spent)
            .checked_add(subsidy)
            .unwrap_or(Amount::MAX)
    }

    /// Whether a transaction other than the first one is a coinbase.
    pub fn is_extra_coinbases(&self) -> bool {
        self.transactions.iter().skip(1).any(|tx| tx.is_coinbase())
    }

    pub fn is_final(&self, height: u32, block_time: u32) -> bool {
        self.transactions
            .iter()
            .all(|tx| transaction::is_final(tx, height, block_time))
    }

    /// Whether all transaction ids are distinct.
    pub fn is_distinct_transaction_set(&self) -> bool {
        let mut seen_transactions = HashSet::with_capacity(self.transactions.len());
        self.transactions
            .iter()
            .all(|tx| seen_transactions.insert(tx.compute_txid()))
    }

    /// Whether two non-coinbase inputs spend the same output.
    pub fn is_internal_double_spend(&self) -> bool {
        let mut seen_outputs = HashSet::with_capacity(self.non_coinbase_inputs());
        !self
            .transactions
            .iter()
            .skip(1)
            .flat_map(|tx| tx.input.iter())
            .all(|txin| seen_outputs.insert(txin.previous_output))
    }

    /// Merkle root over the transaction ids, or over the witness transaction ids with the
    /// coinbase counting as zero when `witness` is set.
    pub fn generate_merkle_root(&self, witness: bool) -> sha256d::Hash {
        if witness {
            merkle::witness_merkle_root(&self.transactions).to_raw_hash()
        } else {
            merkle::transaction_merkle_root(&self.transactions).to_raw_hash()
        }
    }

    pub fn is_valid_merkle_root(&self) -> bool {
        TxMerkleNode::from_raw_hash(self.generate_merkle_root(false)) == self.header.merkle_root
    }

    /// Whether the coinbase claims no more than the fees and subsidy at the state's height.
    pub fn is_valid_coinbase_claim(&self, state: &ChainState, spent: &SpentOutputs) -> bool {
        let reward = self.reward_with_interval(
            state.height(),
            state.subsidy_halving_interval(),
            spent,
        );
        self.claim() <= reward
    }

    /// Whether the coinbase input script starts with `height`, see BIP34.
    pub fn is_valid_coinbase_script(&self, height: u32) -> bool {
        self.coinbase()
            .and_then(|coinbase| coinbase.input.first())
            .is_some_and(|txin| {
                Script::from(txin.script_sig.as_script()).is_coinbase_pattern(height)
            })
    }

    /// Checks the witness commitment of BIP141.
    ///
    /// The last coinbase output starting with the commitment header commits to the witness
    /// merkle root and the witness reserved value, the single 32 byte item of the coinbase
    /// witness. Without such an output no transaction may carry witness data.
    ///
    /// https://github.com/bitcoin/bitcoin/blob/6f9db1ebcab4064065ccd787161bf2b87e03cc1f/src/validation.cpp#L3830
    pub fn is_valid_witness_commitment(&self) -> bool {
        let Some(coinbase) = self.coinbase() else {
            return false;
        };

        let commitment = coinbase.output.iter().rev().find_map(|txout| {
            let script = txout.script_pubkey.as_bytes();
            (script.len() >= WITNESS_COMMITMENT_SIZE
                && script.starts_with(&WITNESS_COMMITMENT_HEADER))
            .then(|| &script[WITNESS_COMMITMENT_HEADER.len()..WITNESS_COMMITMENT_SIZE])
        });

        let Some(commitment) = commitment else {
            return !self.has_witness();
        };

        let Some(witness) = coinbase.input.first().map(|txin| &txin.witness) else {
            return false;
        };

        let reserved_value = match witness.iter().collect::<Vec<_>>().as_slice() {
            [reserved_value] if reserved_value.len() == 32 => *reserved_value,
            _ => return false,
        };

        let mut engine = sha256d::Hash::engine();
        engine.input(self.generate_merkle_root(true).as_byte_array());
        engine.input(reserved_value);

        sha256d::Hash::from_engine(engine).as_byte_array()[..] == *commitment
    }

    /// Whether any input carries witness data.
    pub fn has_witness(&self) -> bool {
        self.transactions
            .iter()
            .flat_map(|tx| tx.input.iter())
            .any(|txin| !txin.witness.is_empty())
    }

    /// Context free checks, `now` bounds the header timestamp.
    pub fn check(&self, now: u32) -> Result<(), Error> {
        self.validation.lock().start_check = Some(Instant::now());

        header::check_header(&self.header, now)?;

        let size = self.stripped_size();
        if size > MAX_BLOCK_SIZE {
            return Err(Error::BlockSizeLimit(size));
        }

        let weight = self.weight();
        if weight > MAX_BLOCK_WEIGHT {
            return Err(Error::BlockWeightLimit(weight));
        }

        // Transaction list must be non-empty.
        let Some(coinbase) = self.coinbase() else {
            return Err(Error::EmptyBlock);
        };

        // First transaction must be coinbase, the rest must not be.
        if !coinbase.is_coinbase() {
            return Err(Error::FirstNotCoinbase);
        }

        if self.is_extra_coinbases() {
            return Err(Error::ExtraCoinbases);
        }

        if !self.is_distinct_transaction_set() {
            return Err(Error::DuplicateTransaction);
        }

        if self.is_internal_double_spend() {
            return Err(Error::InternalDoubleSpend);
        }

        if !self.is_valid_merkle_root() {
            return Err(Error::MerkleMismatch);
        }

        for (index, tx) in self.transactions.iter().enumerate() {
            transaction::check_transaction(tx)
                .map_err(|source| Error::Transaction { index, source })?;
        }

        tracing::trace!(hash = %self.hash(), "Block checked");

        Ok(())
    }

    /// Checks the block against the chain state it extends.
    ///
    /// The header is accepted first when `header` is set. With `transactions` set the block
    /// sigop limit and every transaction's contextual checks run as well, which requires the
    /// spent outputs to be resolved.
    pub fn accept(
        &self,
        state: &ChainState,
        spent: &SpentOutputs,
        transactions: bool,
        header: bool,
    ) -> Result<(), Error> {
        self.validation.lock().start_accept = Some(Instant::now());

        if header {
            header::accept_header(&self.header, state)?;
        }

        if state.is_under_checkpoint() {
            tracing::trace!(
                hash = %self.hash(),
                height = state.height(),
                "Skipping contextual checks under checkpoint"
            );
            return Ok(());
        }

        if state.is_enabled(RuleForks::BIP34) && !self.is_valid_coinbase_script(state.height()) {
            return Err(Error::CoinbaseHeightMismatch);
        }

        if state.is_enabled(RuleForks::BIP141) {
            if !self.is_valid_witness_commitment() {
                return Err(Error::BadWitnessCommitment);
            }
        } else if self.has_witness() {
            return Err(Error::UnexpectedWitness);
        }

        if !self.is_valid_coinbase_claim(state, spent) {
            return Err(Error::CoinbaseValueLimit {
                claim: self.claim(),
                reward: self.reward_with_interval(
                    state.height(),
                    state.subsidy_halving_interval(),
                    spent,
                ),
            });
        }

        let block_time = if state.is_enabled(RuleForks::BIP113) {
            state.median_time_past()
        } else {
            self.header.time
        };

        if !self.is_final(state.height(), block_time) {
            return Err(Error::BlockNonFinal);
        }

        if transactions {
            let sigops = self.signature_operations(state.is_enabled(RuleForks::BIP16), spent);
            if sigops > MAX_BLOCK_SIGOPS {
                return Err(Error::BlockEmbeddedSigopLimit(sigops));
            }

            for (index, tx) in self.transactions.iter().enumerate() {
                transaction::accept_transaction(tx, state, spent, false)
                    .map_err(|source| Error::Transaction { index, source })?;
            }
        }

        tracing::trace!(hash = %self.hash(), height = state.height(), "Block accepted");

        Ok(())
    }

    /// Verifies the scripts of every transaction in order, the first failure wins.
    pub fn connect(&self, state: &ChainState, spent: &SpentOutputs) -> Result<(), Error> {
        let started = Instant::now();
        self.validation.lock().start_connect = Some(started);

        if state.is_under_checkpoint() {
            return Ok(());
        }

        for (index, tx) in self.transactions.iter().enumerate() {
            transaction::connect_transaction(tx, state, spent)
                .map_err(|source| Error::Transaction { index, source })?;
        }

        tracing::debug!(
            hash = %self.hash(),
            height = state.height(),
            inputs = self.non_coinbase_inputs(),
            elapsed = ?started.elapsed(),
            "Block connected"
        );

        Ok(())
    }

    /// Attaches the chain state used by [`Self::accept_attached`] and
    /// [`Self::connect_attached`].
    pub fn attach_state(&self, state: ChainState) {
        self.validation.lock().state = Some(Arc::new(state));
    }

    pub fn state(&self) -> Option<Arc<ChainState>> {
        self.validation.lock().state.clone()
    }

    /// Snapshot of the validation metadata.
    pub fn validation(&self) -> Validation {
        self.validation.lock().clone()
    }

    /// [`Self::accept`] against the attached chain state.
    pub fn accept_attached(
        &self,
        spent: &SpentOutputs,
        transactions: bool,
        header: bool,
    ) -> Result<(), Error> {
        let state = self.state().ok_or(Error::OperationFailed)?;
        self.accept(&state, spent, transactions, header)
    }

    /// [`Self::connect`] against the attached chain state.
    pub fn connect_attached(&self, spent: &SpentOutputs) -> Result<(), Error> {
        let state = self.state().ok_or(Error::OperationFailed)?;
        self.connect(&state, spent)
    }
}

// Returns the cached value, computing it once when the cache is empty. Cached reads only
// take the shared lock.
fn cached(cache: &RwLock<Option<usize>>, compute: impl FnOnce() -> usize) -> usize {
    if let Some(value) = *cache.read() {
        return value;
    }

    let guard = cache.upgradable_read();
    if let Some(value) = *guard {
        return value;
    }

    let mut guard = RwLockUpgradableReadGuard::upgrade(guard);
    let value = compute();
    *guard = Some(value);
    value
}
