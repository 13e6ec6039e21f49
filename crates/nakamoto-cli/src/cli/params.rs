use clap::Parser;
use nakamoto_validation::ChainParams;

/// Bitcoin network type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum Network {
    /// Mainnet.
    Mainnet,
    /// Testnet.
    Testnet,
    /// Signet.
    Signet,
    /// Regtest.
    Regtest,
}

impl From<Network> for bitcoin::Network {
    fn from(network: Network) -> Self {
        match network {
            Network::Mainnet => bitcoin::Network::Bitcoin,
            Network::Testnet => bitcoin::Network::Testnet,
            Network::Signet => bitcoin::Network::Signet,
            Network::Regtest => bitcoin::Network::Regtest,
        }
    }
}

#[derive(Debug, Clone, Parser)]
pub struct CommonParams {
    /// Specify the chain network.
    #[arg(long, value_name = "NETWORK", default_value = "mainnet", global = true)]
    pub network: Network,

    /// Ignore the builtin checkpoints of the network.
    #[arg(long, global = true)]
    pub no_checkpoints: bool,

    /// Sets a custom logging filter (syntax: `<target>=<level>`).
    ///
    /// Log levels (least to most verbose) are `error`, `warn`, `info`, `debug`, and `trace`.
    ///
    /// By default, all targets log `info`, `RUST_LOG` is honored when no filter is given.
    ///
    /// *Example*: `--log warn,nakamoto_validation=trace`.
    #[arg(short = 'l', long, value_name = "LOG_PATTERN", num_args = 1.., global = true)]
    pub log: Vec<String>,
}

impl CommonParams {
    pub fn bitcoin_network(&self) -> bitcoin::Network {
        self.network.into()
    }

    /// Consensus parameters of the selected network.
    pub fn chain_params(&self) -> ChainParams {
        let params = ChainParams::new(self.bitcoin_network());
        if self.no_checkpoints {
            params.without_checkpoints()
        } else {
            params
        }
    }

    /// Log filter directives, `None` when no `--log` was given.
    pub fn log_filters(&self) -> Option<String> {
        if self.log.is_empty() {
            None
        } else {
            Some(self.log.join(","))
        }
    }
}
