/// Awarded for clicking a live target.
pub const HIT_POINTS: u32 = 10;
/// Deducted for clicking anything else, never below zero.
pub const MISS_PENALTY: u32 = 5;
/// Length of one play-through.
pub const GAME_DURATION_SECONDS: u32 = 60;

pub struct ScoringEngine;

impl ScoringEngine {
    pub fn apply_hit(score: u32) -> u32 {
        score.saturating_add(HIT_POINTS)
    }

    pub fn apply_miss(score: u32) -> u32 {
        score.saturating_sub(MISS_PENALTY)
    }

    /// Only a strictly better score replaces the stored one.
    pub fn beats_high_score(score: u32, high_score: u32) -> bool {
        score > high_score
    }

    /// Whether the end screen shows the "new high score" banner. A tie with a
    /// non-zero stored score also shows it, even though nothing is written.
    pub fn shows_new_high_score(score: u32, high_score: u32) -> bool {
        score > 0 && score == high_score
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_and_miss() {
        assert_eq!(ScoringEngine::apply_hit(0), 10);
        assert_eq!(ScoringEngine::apply_miss(10), 5);
        assert_eq!(ScoringEngine::apply_miss(3), 0);
        assert_eq!(ScoringEngine::apply_miss(0), 0);
        assert_eq!(ScoringEngine::apply_hit(u32::MAX), u32::MAX);
    }

    #[test]
    fn test_high_score_rules() {
        assert!(ScoringEngine::beats_high_score(50, 40));
        assert!(!ScoringEngine::beats_high_score(40, 40));
        assert!(!ScoringEngine::beats_high_score(30, 40));

        assert!(ScoringEngine::shows_new_high_score(40, 40));
        assert!(!ScoringEngine::shows_new_high_score(0, 0));
        assert!(!ScoringEngine::shows_new_high_score(30, 40));
    }
}
