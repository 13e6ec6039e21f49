use crate::chain_state::ChainState;
use crate::subsidy::SUBSIDY_HALVING_INTERVAL;
use crate::COINBASE_MATURITY;
use bitcoin::consensus::Params;
use bitcoin::{BlockHash, Network};
use nakamoto_script::RuleForks;
use std::str::FromStr;

// https://github.com/bitcoin/bitcoin/blob/v0.20.0/src/chainparams.cpp#L143
const MAINNET_CHECKPOINTS: &[(u32, &str)] = &[
    (11111, "0000000069e244f73d78e8fd29ba2fd2ed618bd6fa2ee92559f542fdb26e7c1d"),
    (33333, "000000002dd5588a74784eaa7ab0507a18ad16a236e7b1ce69f00d7ddfb5d0a6"),
    (74000, "0000000000573993a3c9e41ce34471c079dcf5f52a0e824a81e7f953b8661a20"),
    (105000, "00000000000291ce28027faea320c8d2b054b2e0fe44a773f3eefb151d6bdc97"),
    (134444, "00000000000005b12ffd4cd315cd34ffd4a594f430ac814c91184a0d42d2b0fe"),
    (168000, "000000000000099e61ea72015e79632f216fe6cb33d7899acb35b75c8303b763"),
    (193000, "000000000000059f452a5f7340de6682a977387c17010ff6e6c3bd83ca8b1317"),
    (210000, "000000000000048b95347e83192f69cf0366076336c639f9b7228e9ba171342e"),
    (216116, "00000000000001b4f4b433e81ee46494af945cf96014816a4e2370f11b23df4e"),
    (225430, "00000000000001c108384350f74090433e7fcf79a606b8e797f065b130575932"),
    (250000, "000000000000003887df1f29024b06fc2200b55f8af8f35453d7be294df2d214"),
    (279000, "0000000000000001ae8c72a0b0c301f67e3afca10e819efa9041e458e9bd7e40"),
    (295000, "00000000000000004d9b4ef50f0f9d686fd69db2e03af35a100370c64632a983"),
];

/// Extended [`Params`].
#[derive(Debug, Clone)]
pub struct ChainParams {
    /// Chain params defined in rust-bitcoin, carrying the BIP16 switch time and the
    /// BIP34/BIP65/BIP66 activation heights.
    pub params: Params,
    /// Block height at which CSV (BIP68, BIP112, BIP113) becomes active.
    pub csv_height: u32,
    /// Block height at which Segwit (BIP141, BIP143, BIP147) becomes active.
    pub segwit_height: u32,
    pub subsidy_halving_interval: u32,
    pub coinbase_maturity: u32,
    /// Known good block hashes, sorted by height.
    pub checkpoints: Vec<(u32, BlockHash)>,
}

impl ChainParams {
    /// Constructs a new instance of [`ChainParams`].
    // https://github.com/bitcoin/bitcoin/blob/6f9db1ebcab4064065ccd787161bf2b87e03cc1f/src/kernel/chainparams.cpp#L71
    pub fn new(network: Network) -> Self {
        let params = Params::new(network);
        match network {
            Network::Bitcoin => Self {
                params,
                csv_height: 419328, // 000000000000000004a1b34462cb8aeebd5799177f7a29cf28f2d1961716b5b5
                segwit_height: 481824, // 0000000000000000001c8018d9cb3b742ef25114f27563e3fc4a1902167f9893
                subsidy_halving_interval: SUBSIDY_HALVING_INTERVAL,
                coinbase_maturity: COINBASE_MATURITY,
                checkpoints: parse_checkpoints(MAINNET_CHECKPOINTS),
            },
            Network::Testnet => Self {
                params,
                csv_height: 770112, // 00000000025e930139bac5c6c31a403776da130831ab85be56578f3fa75369bb
                segwit_height: 834624, // 00000000002b980fcd729daaa248fd9316a5200e9b367f4ff2c42453e84201ca
                subsidy_halving_interval: SUBSIDY_HALVING_INTERVAL,
                coinbase_maturity: COINBASE_MATURITY,
                checkpoints: Vec::new(),
            },
            Network::Regtest => Self {
                params,
                csv_height: 1,    // Always active unless overridden
                segwit_height: 0, // Always active unless overridden
                subsidy_halving_interval: 150,
                coinbase_maturity: COINBASE_MATURITY,
                checkpoints: Vec::new(),
            },
            // Signet and later test networks start with every soft fork buried.
            _ => Self {
                params,
                csv_height: 1,
                segwit_height: 1,
                subsidy_halving_interval: SUBSIDY_HALVING_INTERVAL,
                coinbase_maturity: COINBASE_MATURITY,
                checkpoints: Vec::new(),
            },
        }
    }

    pub fn network(&self) -> Network {
        self.params.network
    }

    /// Drops the checkpoints, every block is then fully validated.
    pub fn without_checkpoints(mut self) -> Self {
        self.checkpoints.clear();
        self
    }

    /// Rule forks active for a block at `height` with header time `timestamp`.
    pub fn forks_at(&self, height: u32, timestamp: u32) -> RuleForks {
        let mut forks = RuleForks::empty();

        forks.set(RuleForks::BIP16, timestamp >= self.params.bip16_time);
        forks.set(RuleForks::BIP34, height >= self.params.bip34_height);
        forks.set(RuleForks::BIP65, height >= self.params.bip65_height);
        forks.set(RuleForks::BIP66, height >= self.params.bip66_height);
        forks.set(RuleForks::CSV, height >= self.csv_height);
        forks.set(RuleForks::SEGWIT, height >= self.segwit_height);

        forks
    }

    pub fn checkpoint_at(&self, height: u32) -> Option<BlockHash> {
        self.checkpoints
            .iter()
            .find_map(|(checkpoint_height, hash)| (*checkpoint_height == height).then_some(*hash))
    }

    pub fn last_checkpoint_height(&self) -> Option<u32> {
        self.checkpoints.last().map(|(height, _)| *height)
    }

    /// Derives the [`ChainState`] of a block at `height`.
    pub fn chain_state(&self, height: u32, timestamp: u32, median_time_past: u32) -> ChainState {
        let under_checkpoint = self
            .last_checkpoint_height()
            .is_some_and(|last| height <= last);

        let state = ChainState::new(height, median_time_past, self.forks_at(height, timestamp))
            .with_under_checkpoint(under_checkpoint)
            .with_pow_limit(self.params.pow_limit)
            .with_subsidy_halving_interval(self.subsidy_halving_interval)
            .with_coinbase_maturity(self.coinbase_maturity);

        match self.checkpoint_at(height) {
            Some(hash) => state.with_checkpoint(hash),
            None => state,
        }
    }
}

fn parse_checkpoints(checkpoints: &[(u32, &str)]) -> Vec<(u32, BlockHash)> {
    checkpoints
        .iter()
        .map(|(height, hash)| {
            let hash = BlockHash::from_str(hash).expect("Checkpoint hashes are valid hex; qed");
            (*height, hash)
        })
        .collect()
}
