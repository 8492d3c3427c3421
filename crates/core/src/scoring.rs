//! Score, XP and badge policy applied when an attempt is submitted.
//!
//! All rounding is half-up, done in integer arithmetic so results never depend
//! on float representation.

use crate::model::Difficulty;

/// Minimum score (inclusive) that grants the quiz's badge reward.
pub const BADGE_THRESHOLD: u8 = 80;

/// Bonus tiers as (minimum score, percent of base XP), highest first.
const BONUS_TIERS: [(u8, u32); 3] = [(90, 50), (80, 30), (70, 10)];

/// Percentage of correct answers, rounded to the nearest integer.
///
/// Returns 0 for an empty quiz.
#[must_use]
pub fn score_percent(correct: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let correct = correct.min(total) as u64;
    let total = total as u64;
    let rounded = (200 * correct + total) / (2 * total);
    u8::try_from(rounded).unwrap_or(100)
}

/// Base XP awarded for completing a quiz of the given difficulty.
#[must_use]
pub fn base_xp(difficulty: Difficulty) -> u32 {
    match difficulty {
        Difficulty::Easy | Difficulty::Unrated => 100,
        Difficulty::Medium => 150,
        Difficulty::Hard => 200,
    }
}

/// Extra XP for a high score.
#[must_use]
pub fn bonus_xp(base: u32, score: u8) -> u32 {
    BONUS_TIERS
        .iter()
        .find(|(min, _)| score >= *min)
        .map_or(0, |(_, percent)| (base * percent + 50) / 100)
}

/// Total XP for an attempt: base plus score bonus.
#[must_use]
pub fn xp_for(difficulty: Difficulty, score: u8) -> u32 {
    let base = base_xp(difficulty);
    base + bonus_xp(base, score)
}

/// The badge earned by a score, if the quiz offers one.
#[must_use]
pub fn badge_for(badge_reward: Option<&str>, score: u8) -> Option<String> {
    if score >= BADGE_THRESHOLD {
        badge_reward.map(str::to_owned)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_rounds_half_up() {
        assert_eq!(score_percent(1, 8), 13);
        assert_eq!(score_percent(2, 3), 67);
        assert_eq!(score_percent(1, 3), 33);
        assert_eq!(score_percent(0, 5), 0);
        assert_eq!(score_percent(5, 5), 100);
    }

    #[test]
    fn empty_quiz_scores_zero() {
        assert_eq!(score_percent(0, 0), 0);
    }

    #[test]
    fn hard_quiz_with_95_earns_300() {
        assert_eq!(xp_for(Difficulty::Hard, 95), 300);
    }

    #[test]
    fn easy_quiz_with_72_earns_110() {
        assert_eq!(xp_for(Difficulty::Easy, 72), 110);
    }

    #[test]
    fn medium_tiers() {
        assert_eq!(xp_for(Difficulty::Medium, 90), 225);
        assert_eq!(xp_for(Difficulty::Medium, 89), 195);
        assert_eq!(xp_for(Difficulty::Medium, 70), 165);
        assert_eq!(xp_for(Difficulty::Medium, 69), 150);
    }

    #[test]
    fn unrated_uses_default_base() {
        assert_eq!(base_xp(Difficulty::Unrated), 100);
        assert_eq!(xp_for(Difficulty::Unrated, 0), 100);
    }

    #[test]
    fn badge_threshold_is_inclusive() {
        assert_eq!(
            badge_for(Some("Networking Novice"), 80).as_deref(),
            Some("Networking Novice")
        );
        assert_eq!(badge_for(Some("Networking Novice"), 79), None);
        assert_eq!(badge_for(None, 100), None);
    }
}
