use crate::subsidy::SUBSIDY_HALVING_INTERVAL;
use bitcoin::{BlockHash, CompactTarget, Target};
use nakamoto_script::RuleForks;

/// Snapshot of the chain context a block at `height` is validated against.
///
/// The state describes the block being validated: its height, the median time past of the
/// previous blocks and the rule forks active at that height.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainState {
    height: u32,
    median_time_past: u32,
    forks: RuleForks,
    /// Difficulty bits the block must carry, unchecked when `None`.
    work_required: Option<CompactTarget>,
    /// Easiest target the network allows.
    pow_limit: Option<Target>,
    /// Hash pinned by a checkpoint at this height.
    checkpoint: Option<BlockHash>,
    under_checkpoint: bool,
    subsidy_halving_interval: u32,
    coinbase_maturity: u32,
}

impl ChainState {
    /// Constructs a new instance of [`ChainState`].
    pub fn new(height: u32, median_time_past: u32, forks: RuleForks) -> Self {
        Self {
            height,
            median_time_past,
            forks,
            work_required: None,
            pow_limit: None,
            checkpoint: None,
            under_checkpoint: false,
            subsidy_halving_interval: SUBSIDY_HALVING_INTERVAL,
            coinbase_maturity: crate::COINBASE_MATURITY,
        }
    }

    pub fn with_work_required(mut self, bits: CompactTarget) -> Self {
        self.work_required = Some(bits);
        self
    }

    pub fn with_pow_limit(mut self, limit: Target) -> Self {
        self.pow_limit = Some(limit);
        self
    }

    pub fn with_checkpoint(mut self, hash: BlockHash) -> Self {
        self.checkpoint = Some(hash);
        self
    }

    /// Marks the height as covered by a later checkpoint, which skips the expensive
    /// contextual block checks.
    pub fn with_under_checkpoint(mut self, under_checkpoint: bool) -> Self {
        self.under_checkpoint = under_checkpoint;
        self
    }

    pub fn with_subsidy_halving_interval(mut self, interval: u32) -> Self {
        self.subsidy_halving_interval = interval;
        self
    }

    pub fn with_coinbase_maturity(mut self, maturity: u32) -> Self {
        self.coinbase_maturity = maturity;
        self
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn median_time_past(&self) -> u32 {
        self.median_time_past
    }

    pub fn forks(&self) -> RuleForks {
        self.forks
    }

    /// Whether all of `forks` are active.
    pub fn is_enabled(&self, forks: RuleForks) -> bool {
        self.forks.contains(forks)
    }

    pub fn work_required(&self) -> Option<CompactTarget> {
        self.work_required
    }

    pub fn pow_limit(&self) -> Option<Target> {
        self.pow_limit
    }

    pub fn checkpoint(&self) -> Option<BlockHash> {
        self.checkpoint
    }

    pub fn is_under_checkpoint(&self) -> bool {
        self.under_checkpoint
    }

    pub fn subsidy_halving_interval(&self) -> u32 {
        self.subsidy_halving_interval
    }

    pub fn coinbase_maturity(&self) -> u32 {
        self.coinbase_maturity
    }
}
