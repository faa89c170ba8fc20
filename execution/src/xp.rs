//! Reward XP.
//!
//! XP is granted per finished game from a bracket on the winnings plus a bonus
//! per refused banker offer. The brackets are literal dollar ranges; amounts
//! falling between two brackets (for example $300,000.01 to $300,999.99) earn
//! no bracket XP.

use dond_types::game::{CENTS_PER_DOLLAR, REFUSAL_XP, REFUSAL_XP_PAST_NINE};

const fn dollars(amount: u64) -> u64 {
    amount * CENTS_PER_DOLLAR
}

/// Inclusive cent ranges and the XP each grants.
const BRACKETS: [(u64, u64, u64); 6] = [
    (0, dollars(50_000), 100),
    (dollars(50_001), dollars(100_000), 300),
    (dollars(100_001), dollars(300_000), 1_000),
    (dollars(301_000), dollars(500_000), 2_000),
    (dollars(500_001), dollars(1_000_000) - 1, 3_000),
    (dollars(1_000_000), u64::MAX, 5_000),
];

/// XP for the winnings bracket alone.
pub fn bracket_xp(winnings: u64) -> u64 {
    BRACKETS
        .iter()
        .find(|(low, high, _)| (*low..=*high).contains(&winnings))
        .map_or(0, |(_, _, xp)| *xp)
}

/// XP for refused banker offers. Not capped.
pub fn refusal_xp(refusals: u32, continuing_past_nine: bool) -> u64 {
    let per_refusal = if continuing_past_nine {
        REFUSAL_XP_PAST_NINE
    } else {
        REFUSAL_XP
    };
    refusals as u64 * per_refusal
}

/// Total XP for a finished game. `winnings` is in cents.
pub fn calculate_xp(winnings: u64, refusals: u32, continuing_past_nine: bool) -> u64 {
    bracket_xp(winnings) + refusal_xp(refusals, continuing_past_nine)
}
