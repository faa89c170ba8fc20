//! Scatter streaks.
//!
//! Consecutive games ending on the top prize build a streak. Reaching the
//! configured trigger pays a scatter bonus and starts the streak over.

use dond_types::game::TOP_PRIZE;

/// Streak after a game ending with `winnings`.
pub fn update_streak(streak: u8, winnings: u64) -> u8 {
    if winnings == TOP_PRIZE {
        streak.saturating_add(1)
    } else {
        0
    }
}

/// A trigger of zero disables the bonus.
pub fn is_triggered(streak: u8, trigger: u8) -> bool {
    trigger > 0 && streak >= trigger
}

pub fn reset_streak() -> u8 {
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_streak_builds_on_top_prize() {
        let mut streak = 0;
        for expected in 1..=3 {
            streak = update_streak(streak, TOP_PRIZE);
            assert_eq!(streak, expected);
        }
        assert!(is_triggered(streak, 3));
        assert_eq!(reset_streak(), 0);
    }

    #[test]
    fn test_other_outcome_resets() {
        assert_eq!(update_streak(2, TOP_PRIZE - 1), 0);
        assert_eq!(update_streak(2, 0), 0);
        assert_eq!(update_streak(u8::MAX, TOP_PRIZE), u8::MAX);
    }

    #[test]
    fn test_trigger() {
        assert!(!is_triggered(2, 3));
        assert!(is_triggered(3, 3));
        assert!(!is_triggered(10, 0));
    }
}
