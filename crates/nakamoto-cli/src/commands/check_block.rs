use crate::commands::decode_hex;
use crate::{Error, Result};
use nakamoto_validation::{Block, ChainParams, SpentOutputs};
use std::time::{SystemTime, UNIX_EPOCH};

/// Validate a serialized block.
///
/// Without `--height` only the context free checks run. With it the block is also accepted
/// against the chain state derived from the network parameters, transaction inputs are not
/// resolved.
#[derive(Debug, clap::Args)]
pub struct CheckBlock {
    /// Hex encoded block, or `@<path>` to a file with the hex or raw bytes.
    #[arg(index = 1)]
    block: String,

    /// Height of the block in the chain.
    #[arg(long)]
    height: Option<u32>,

    /// Median time past of the previous 11 blocks, defaults to one second before the block time.
    #[arg(long)]
    median_time_past: Option<u32>,
}

impl CheckBlock {
    pub fn run(self, params: &ChainParams) -> Result<()> {
        let block = read_block(&self.block)?;

        tracing::info!(
            hash = %block.hash(),
            transactions = block.transactions().len(),
            weight = block.weight().to_wu(),
            "Checking block"
        );

        validate(&block, params, self.height, self.median_time_past, unix_time())?;

        println!("block {} is valid", block.hash());

        Ok(())
    }
}

fn read_block(input: &str) -> Result<Block> {
    let bytes = match input.strip_prefix('@') {
        Some(path) => {
            let content = std::fs::read(path)?;
            match std::str::from_utf8(&content).map(decode_hex) {
                Ok(Ok(bytes)) => bytes,
                _ => content,
            }
        }
        None => decode_hex(input)?,
    };

    Block::from_bytes(&bytes).map_err(|err| Error::Input(format!("Invalid block: {err}")))
}

fn validate(
    block: &Block,
    params: &ChainParams,
    height: Option<u32>,
    median_time_past: Option<u32>,
    now: u32,
) -> Result<()> {
    block.check(now)?;

    if let Some(height) = height {
        let time = block.header().time;
        let median_time_past = median_time_past.unwrap_or_else(|| time.saturating_sub(1));
        let state = params.chain_state(height, time, median_time_past);

        block.accept(&state, &SpentOutputs::new(), false, true)?;
    }

    Ok(())
}

fn unix_time() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_secs() as u32)
        .unwrap_or_default()
}
