//! Block locator heights.
//!
//! A locator walks back from the tip: the ten most recent heights one by one, then with
//! a step doubling after each entry, always ending at the genesis block.

const DENSE_HEIGHTS: u32 = 10;

/// Upper bound on the number of heights [`locator_heights`] returns for `top`.
pub fn locator_size(top: u32) -> usize {
    let first_ten_or_top = top.min(DENSE_HEIGHTS);
    let remaining = top - first_ten_or_top;

    let back_off = if remaining == 0 {
        0
    } else {
        // ceil(log2(max(remaining, 2)))
        u32::BITS - (remaining.max(2) - 1).leading_zeros()
    };

    (first_ten_or_top + back_off + 1) as usize
}

/// Heights to advertise in a block locator, from `top` down to 0.
pub fn locator_heights(top: u32) -> Vec<u32> {
    let mut step = 1u32;
    let mut heights = Vec::with_capacity(locator_size(top));

    let mut height = top;
    while height > 0 {
        heights.push(height);

        if heights.len() > DENSE_HEIGHTS as usize {
            step = step.saturating_mul(2);
        }

        height = height.saturating_sub(step);
    }

    heights.push(0);

    debug_assert!(heights.len() <= locator_size(top));

    heights
}
