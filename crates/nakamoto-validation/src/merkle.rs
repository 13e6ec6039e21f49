//! Merkle tree over the transactions of a block.

use bitcoin::hashes::{sha256d, Hash};
use bitcoin::{TxMerkleNode, Transaction, WitnessMerkleNode};
use std::sync::Arc;

/// Merkle root of `hashes`, the last hash of every level with an odd count being paired
/// with itself. Returns the zero hash for an empty list.
pub fn merkle_root(hashes: impl IntoIterator<Item = sha256d::Hash>) -> sha256d::Hash {
    bitcoin::merkle_tree::calculate_root(hashes.into_iter())
        .unwrap_or_else(sha256d::Hash::all_zeros)
}

/// Merkle root committed to by the block header.
pub fn transaction_merkle_root(transactions: &[Arc<Transaction>]) -> TxMerkleNode {
    let hashes = transactions.iter().map(|tx| tx.compute_txid().to_raw_hash());

    TxMerkleNode::from_raw_hash(merkle_root(hashes))
}

/// Merkle root of the witness transaction ids, the coinbase counting as the zero hash.
pub fn witness_merkle_root(transactions: &[Arc<Transaction>]) -> WitnessMerkleNode {
    let hashes = transactions
        .iter()
        .enumerate()
        .map(|(index, tx)| {
            if index == 0 {
                sha256d::Hash::all_zeros()
            } else {
                tx.compute_wtxid().to_raw_hash()
            }
        });

    WitnessMerkleNode::from_raw_hash(merkle_root(hashes))
}
