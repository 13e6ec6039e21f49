use crate::Result;
use bitcoin::Amount;
use nakamoto_validation::{block_subsidy_with_interval, locator_heights, ChainParams};

/// Print the block subsidy.
#[derive(Debug, clap::Args)]
pub struct Subsidy {
    /// Block height.
    #[arg(index = 1)]
    height: u32,
}

impl Subsidy {
    pub fn run(self, params: &ChainParams) -> Result<()> {
        let subsidy = subsidy_at(params, self.height);
        println!("{} ({} sat)", subsidy, subsidy.to_sat());
        Ok(())
    }
}

fn subsidy_at(params: &ChainParams, height: u32) -> Amount {
    Amount::from_sat(block_subsidy_with_interval(
        height,
        params.subsidy_halving_interval,
    ))
}

/// Print the block locator heights.
#[derive(Debug, clap::Args)]
pub struct Locator {
    /// Height of the chain top.
    #[arg(index = 1)]
    top: u32,
}

impl Locator {
    pub fn run(self) -> Result<()> {
        let heights = locator_heights(self.top)
            .into_iter()
            .map(|height| height.to_string())
            .collect::<Vec<_>>();
        println!("{}", heights.join(" "));
        Ok(())
    }
}
