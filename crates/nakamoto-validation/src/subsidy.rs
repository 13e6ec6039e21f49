//! Block subsidy schedule.

/// Number of blocks between two subsidy halvings on every network but regtest.
pub const SUBSIDY_HALVING_INTERVAL: u32 = 210_000;

/// Subsidy of the genesis era in satoshis.
pub const INITIAL_SUBSIDY: u64 = 50 * 100_000_000;

/// Returns the amount of subsidy in satoshis at given height.
pub fn block_subsidy(height: u32) -> u64 {
    block_subsidy_with_interval(height, SUBSIDY_HALVING_INTERVAL)
}

/// Returns the block subsidy at given height and halving interval.
pub fn block_subsidy_with_interval(height: u32, subsidy_halving_interval: u32) -> u64 {
    let halvings = height / subsidy_halving_interval.max(1);
    // Force block reward to zero when right shift is undefined.
    if halvings >= 64 {
        return 0;
    }

    // Subsidy is cut in half every 210,000 blocks which will occur
    // approximately every 4 years.
    INITIAL_SUBSIDY >> halvings
}

/// Value a block at `height` may mint on top of the fees it collects.
pub fn block_value(height: u32) -> bitcoin::Amount {
    bitcoin::Amount::from_sat(block_subsidy(height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_subsidy() {
        assert_eq!(block_subsidy(0), 5_000_000_000);
        assert_eq!(block_subsidy(209_999), 5_000_000_000);
        assert_eq!(block_subsidy(210_000), 2_500_000_000);
        assert_eq!(block_subsidy(420_000), 1_250_000_000);
        assert_eq!(block_subsidy(840_000), 312_500_000);
        assert_eq!(block_subsidy(6_929_999), 1);
        assert_eq!(block_subsidy(6_930_000), 0);
    }

    #[test]
    fn test_subsidy_halves_until_exhausted() {
        for height in (0..64 * SUBSIDY_HALVING_INTERVAL).step_by(10_007) {
            assert_eq!(
                block_subsidy(height),
                block_subsidy(0) >> (height / SUBSIDY_HALVING_INTERVAL)
            );
        }

        assert_eq!(block_subsidy(64 * SUBSIDY_HALVING_INTERVAL), 0);
        assert_eq!(block_subsidy(u32::MAX), 0);
        assert_eq!(block_subsidy_with_interval(150 * 64, 150), 0);
        assert_eq!(block_subsidy_with_interval(150 * 63, 150), 0);
        assert_eq!(block_subsidy_with_interval(150, 150), 2_500_000_000);
    }

    #[test]
    fn test_block_value() {
        assert_eq!(block_value(0), bitcoin::Amount::from_btc(50.0).unwrap());
        assert_eq!(block_value(630_000).to_sat(), 625_000_000);
    }
}
