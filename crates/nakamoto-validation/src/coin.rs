//! Previous outputs spent by the transactions under validation.

use bitcoin::{OutPoint, Transaction, TxOut};
use std::collections::HashMap;

/// Unspent transaction output along with the context it was created in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coin {
    pub output: TxOut,
    /// Block height at which this containing transaction was included.
    pub height: u32,
    /// Whether the coin is from a coinbase transaction.
    pub is_coinbase: bool,
    /// Median time past of the block before the one containing the coin, used by
    /// time-based relative locks.
    pub median_time_past: u32,
}

impl Coin {
    pub fn new(output: TxOut, height: u32, is_coinbase: bool, median_time_past: u32) -> Self {
        Self {
            output,
            height,
            is_coinbase,
            median_time_past,
        }
    }
}

/// Resolved previous outputs, keyed by the outpoint spending them.
#[derive(Debug, Clone, Default)]
pub struct SpentOutputs(HashMap<OutPoint, Coin>);

impl SpentOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, outpoint: OutPoint, coin: Coin) -> Option<Coin> {
        self.0.insert(outpoint, coin)
    }

    pub fn get(&self, outpoint: &OutPoint) -> Option<&Coin> {
        self.0.get(outpoint)
    }

    pub fn contains(&self, outpoint: &OutPoint) -> bool {
        self.0.contains_key(outpoint)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Registers every output of `tx` as spendable, as if `tx` was included at `height`.
    pub fn add_transaction(&mut self, tx: &Transaction, height: u32, median_time_past: u32) {
        let txid = tx.compute_txid();
        let is_coinbase = tx.is_coinbase();

        for (vout, output) in tx.output.iter().enumerate() {
            self.0.insert(
                OutPoint::new(txid, vout as u32),
                Coin::new(output.clone(), height, is_coinbase, median_time_past),
            );
        }
    }
}

impl FromIterator<(OutPoint, Coin)> for SpentOutputs {
    fn from_iter<I: IntoIterator<Item = (OutPoint, Coin)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<(OutPoint, Coin)> for SpentOutputs {
    fn extend<I: IntoIterator<Item = (OutPoint, Coin)>>(&mut self, iter: I) {
        self.0.extend(iter)
    }
}
