pub mod params;

use crate::cli::params::CommonParams;
use crate::commands::chain::{Locator, Subsidy};
use crate::commands::check_block::CheckBlock;
use crate::commands::script::{DecodeScript, EvalScript};
use crate::{Error, Result};
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// Decode a raw script and print its properties.
    DecodeScript(DecodeScript),

    /// Evaluate a script without transaction context.
    EvalScript(EvalScript),

    /// Validate a serialized block.
    CheckBlock(CheckBlock),

    /// Print the block subsidy at the given height.
    Subsidy(Subsidy),

    /// Print the block locator heights for the given chain top.
    Locator(Locator),
}

#[derive(Debug, Parser)]
#[command(name = "nakamoto", version, about = "Bitcoin consensus toolbox")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[allow(missing_docs)]
    #[clap(flatten)]
    pub common_params: CommonParams,
}

/// Parse and run command line arguments
pub fn run() -> Result<()> {
    let Cli {
        command,
        common_params,
    } = Cli::parse();

    init_logging(common_params.log_filters())?;

    tracing::debug!(network = ?common_params.network, "Running command");

    match command {
        Command::DecodeScript(cmd) => cmd.run(),
        Command::EvalScript(cmd) => cmd.run(),
        Command::CheckBlock(cmd) => cmd.run(&common_params.chain_params()),
        Command::Subsidy(cmd) => cmd.run(&common_params.chain_params()),
        Command::Locator(cmd) => cmd.run(),
    }
}

// Logs go to stderr so command output stays pipeable.
fn init_logging(filters: Option<String>) -> Result<()> {
    let filter = match filters {
        Some(filters) => EnvFilter::try_new(filters),
        None => EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info")),
    }
    .map_err(|err| Error::Logging(err.to_string()))?;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|err| Error::Logging(err.to_string()))
}
