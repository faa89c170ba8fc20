//! Level table.
//!
//! A player's tier is a pure function of cumulative XP. The *current* level is
//! the highest tier whose threshold has been reached. A tier is *completed*
//! only once the next tier's threshold is reached, so the completed level lags
//! the current level by one (the top tier is completed at its own threshold).

use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Tier {
    pub number: u8,
    pub god: &'static str,
    pub min_xp: u64,
}

const fn tier(number: u8, god: &'static str, min_xp: u64) -> Tier {
    Tier {
        number,
        god,
        min_xp,
    }
}

pub const LEVEL_COUNT: usize = 14;

pub const LEVELS: [Tier; LEVEL_COUNT] = [
    tier(0, "Hebe", 0),
    tier(1, "Hermes", 10_001),
    tier(2, "Hestia", 25_001),
    tier(3, "Demeter", 50_001),
    tier(4, "Dionysus", 100_001),
    tier(5, "Aphrodite", 175_001),
    tier(6, "Artemis", 275_001),
    tier(7, "Apollo", 400_001),
    tier(8, "Ares", 550_001),
    tier(9, "Athena", 750_001),
    tier(10, "Hephaestus", 1_000_001),
    tier(11, "Poseidon", 1_300_001),
    tier(12, "Hades", 1_650_001),
    tier(13, "Zeus", 2_000_001),
];

/// XP reported as the progress target once the top tier is reached.
pub const XP_CEILING: u64 = LEVELS[LEVEL_COUNT - 1].min_xp;

/// Normalize a raw XP value from an API input. Negative or missing XP is zero.
pub fn clamp_xp(raw: Option<i64>) -> u64 {
    raw.map_or(0, |xp| xp.max(0) as u64)
}

/// Look up a tier by number.
pub fn tier_by_number(number: u8) -> Option<&'static Tier> {
    LEVELS.get(number as usize)
}

/// Highest tier whose threshold is at most `xp`.
pub fn level_from_xp(xp: u64) -> &'static Tier {
    LEVELS
        .iter()
        .rev()
        .find(|tier| tier.min_xp <= xp)
        .unwrap_or(&LEVELS[0])
}

/// Highest completed tier, or `None` while the first non-zero threshold has
/// not been reached.
pub fn completed_level_from_xp(xp: u64) -> Option<&'static Tier> {
    let top = &LEVELS[LEVEL_COUNT - 1];
    if xp >= top.min_xp {
        return Some(top);
    }
    LEVELS
        .windows(2)
        .rev()
        .find(|pair| pair[1].min_xp <= xp)
        .map(|pair| &pair[0])
}

/// Every completed tier number in ascending order.
pub fn completed_level_numbers(xp: u64) -> Vec<u8> {
    match completed_level_from_xp(xp) {
        Some(tier) => (0..=tier.number).collect(),
        None => Vec::new(),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct XpProgress {
    pub current: Tier,
    pub next: Option<Tier>,
    /// Linear progress between `current` and `next`, 0 to 100.
    pub percent: f64,
    pub xp_needed: u64,
    pub target_xp: u64,
}

pub fn xp_progress(xp: u64) -> XpProgress {
    let current = *level_from_xp(xp);
    match LEVELS.get(current.number as usize + 1) {
        Some(next) => {
            let span = next.min_xp - current.min_xp;
            let into = xp - current.min_xp;
            XpProgress {
                current,
                next: Some(*next),
                percent: (into as f64 * 100.0 / span as f64).clamp(0.0, 100.0),
                xp_needed: next.min_xp - xp,
                target_xp: next.min_xp,
            }
        }
        None => XpProgress {
            current,
            next: None,
            percent: 100.0,
            xp_needed: 0,
            target_xp: XP_CEILING,
        },
    }
}
