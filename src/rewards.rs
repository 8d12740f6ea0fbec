use serde::{Deserialize, Serialize};

/// What a streak milestone pays out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardKind {
    /// Extra AI assistant questions added to the user's bonus pool.
    BonusQuestions,
    /// Premium subscription extension in days.
    PremiumDays,
}

impl RewardKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RewardKind::BonusQuestions => "bonus_questions",
            RewardKind::PremiumDays => "premium_days",
        }
    }

    pub fn parse(s: &str) -> Option<RewardKind> {
        match s {
            "bonus_questions" => Some(RewardKind::BonusQuestions),
            "premium_days" => Some(RewardKind::PremiumDays),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakReward {
    pub streak_days: i32,
    pub kind: RewardKind,
    pub value: i64,
}

/// Milestone schedule, alternating premium days and bonus questions.
pub const STREAK_REWARDS: [StreakReward; 9] = [
    StreakReward { streak_days: 3, kind: RewardKind::PremiumDays, value: 1 },
    StreakReward { streak_days: 7, kind: RewardKind::BonusQuestions, value: 10 },
    StreakReward { streak_days: 14, kind: RewardKind::PremiumDays, value: 3 },
    StreakReward { streak_days: 21, kind: RewardKind::BonusQuestions, value: 25 },
    StreakReward { streak_days: 30, kind: RewardKind::PremiumDays, value: 7 },
    StreakReward { streak_days: 60, kind: RewardKind::BonusQuestions, value: 50 },
    StreakReward { streak_days: 90, kind: RewardKind::PremiumDays, value: 14 },
    StreakReward { streak_days: 180, kind: RewardKind::BonusQuestions, value: 100 },
    StreakReward { streak_days: 365, kind: RewardKind::PremiumDays, value: 30 },
];

pub fn reward_for_milestone(streak_days: i32) -> Option<StreakReward> {
    STREAK_REWARDS
        .iter()
        .copied()
        .find(|r| r.streak_days == streak_days)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn milestones_are_sorted_and_unique() {
        for pair in STREAK_REWARDS.windows(2) {
            assert!(pair[0].streak_days < pair[1].streak_days);
        }
    }

    #[test]
    fn milestones_alternate_reward_kinds() {
        for pair in STREAK_REWARDS.windows(2) {
            assert_ne!(pair[0].kind, pair[1].kind);
        }
    }

    #[test]
    fn thirty_day_milestone_grants_a_week_of_premium() {
        let reward = reward_for_milestone(30).unwrap();
        assert_eq!(reward.kind, RewardKind::PremiumDays);
        assert_eq!(reward.value, 7);
    }

    #[test]
    fn unknown_milestone_has_no_reward() {
        assert_eq!(reward_for_milestone(5), None);
        assert_eq!(reward_for_milestone(0), None);
    }
}
