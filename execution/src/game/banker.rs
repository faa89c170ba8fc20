//! Banker offers.
//!
//! The banker offers a fraction of the mean remaining value. The fraction
//! starts at 10% and grows linearly with completed rounds toward 85%.

use dond_types::game::{
    BANKER_BASE_BPS, BANKER_GROWTH_BPS, BANKER_MAX_BPS, BPS_DENOMINATOR, ROUND_COUNT,
};

/// Offer factor after `rounds_completed` rounds, in basis points.
pub fn factor_bps(rounds_completed: usize) -> u64 {
    let growth = BANKER_GROWTH_BPS * rounds_completed as u64 / ROUND_COUNT as u64;
    (BANKER_BASE_BPS + growth).min(BANKER_MAX_BPS)
}

/// Offer in cents for the given remaining values (the player's case included).
/// Rounded to the nearest cent and never below one cent.
pub fn offer(remaining: &[u64], rounds_completed: usize) -> u64 {
    if remaining.is_empty() {
        return 1;
    }
    let sum: u128 = remaining.iter().map(|v| *v as u128).sum();
    let denominator = remaining.len() as u128 * BPS_DENOMINATOR as u128;
    let scaled = sum * factor_bps(rounds_completed) as u128;
    let rounded = (scaled + denominator / 2) / denominator;
    (rounded as u64).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dond_types::game::CASE_VALUES;

    #[test]
    fn test_factor_grows_and_caps() {
        assert_eq!(factor_bps(0), 1_000);
        assert_eq!(factor_bps(1), 1_833);
        assert_eq!(factor_bps(ROUND_COUNT), BANKER_MAX_BPS);
        assert_eq!(factor_bps(ROUND_COUNT * 3), BANKER_MAX_BPS);
        for rounds in 0..ROUND_COUNT {
            assert!(factor_bps(rounds) < factor_bps(rounds + 1));
        }
    }

    #[test]
    fn test_offer() {
        // Final round: 85% of the mean
        assert_eq!(offer(&[100, 300], ROUND_COUNT), 170);

        // Rounds to the nearest cent
        assert_eq!(offer(&[1_000, 1_002], ROUND_COUNT), 851);
        assert_eq!(offer(&[1_000, 1_001], ROUND_COUNT), 850);

        // Never below one cent
        assert_eq!(offer(&[1], 1), 1);
        assert_eq!(offer(&[], 1), 1);
    }

    #[test]
    fn test_offer_below_mean() {
        let sum: u64 = CASE_VALUES.iter().sum();
        let mean = sum / CASE_VALUES.len() as u64;
        for rounds in 1..=ROUND_COUNT {
            assert!(offer(&CASE_VALUES, rounds) < mean);
        }
    }
}
