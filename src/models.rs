use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::activity::ActivityKind;
use crate::quests::QuestType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionTier {
    Free,
    Premium,
}

impl SubscriptionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionTier::Free => "free",
            SubscriptionTier::Premium => "premium",
        }
    }

    pub fn parse(s: &str) -> Option<SubscriptionTier> {
        match s {
            "free" => Some(SubscriptionTier::Free),
            "premium" => Some(SubscriptionTier::Premium),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub subscription_type: SubscriptionTier,
    pub subscription_expires_at: Option<DateTime<Utc>>,
    pub xp_total: i64,
    pub level: i32,
    pub bonus_questions: i64,
    pub referral_count: i64,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Premium tier counts only while unexpired.
    pub fn is_premium(&self, now: DateTime<Utc>) -> bool {
        self.subscription_type == SubscriptionTier::Premium
            && self.subscription_expires_at.map_or(true, |at| at > now)
    }

    pub fn effective_tier(&self, now: DateTime<Utc>) -> SubscriptionTier {
        if self.is_premium(now) {
            SubscriptionTier::Premium
        } else {
            SubscriptionTier::Free
        }
    }
}

/// Per-user, per-day counters. Unique by (user_id, activity_date); counters
/// only ever increase within a day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityDay {
    pub user_id: Uuid,
    pub activity_date: NaiveDate,
    pub tasks_completed: i64,
    pub pomodoro_minutes: i64,
    pub ai_questions_asked: i64,
    pub materials_uploaded: i64,
    pub schedule_views: i64,
    pub exam_tasks_done: i64,
    pub flashcard_reviewed: i64,
    pub xp_earned: i64,
}

impl ActivityDay {
    pub fn counter(&self, kind: ActivityKind) -> i64 {
        match kind {
            ActivityKind::TasksCompleted => self.tasks_completed,
            ActivityKind::PomodoroMinutes => self.pomodoro_minutes,
            ActivityKind::AiQuestionsAsked => self.ai_questions_asked,
            ActivityKind::MaterialsUploaded => self.materials_uploaded,
            ActivityKind::ScheduleViews => self.schedule_views,
            ActivityKind::ExamTasksDone => self.exam_tasks_done,
            ActivityKind::FlashcardReviewed => self.flashcard_reviewed,
        }
    }
}

/// All-time per-kind totals, the achievement evaluator's input.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ActivityTotals {
    pub tasks_completed: i64,
    pub pomodoro_minutes: i64,
    pub ai_questions_asked: i64,
    pub materials_uploaded: i64,
    pub schedule_views: i64,
    pub exam_tasks_done: i64,
    pub flashcard_reviewed: i64,
    pub xp_earned: i64,
}

impl ActivityTotals {
    pub fn counter(&self, kind: ActivityKind) -> i64 {
        match kind {
            ActivityKind::TasksCompleted => self.tasks_completed,
            ActivityKind::PomodoroMinutes => self.pomodoro_minutes,
            ActivityKind::AiQuestionsAsked => self.ai_questions_asked,
            ActivityKind::MaterialsUploaded => self.materials_uploaded,
            ActivityKind::ScheduleViews => self.schedule_views,
            ActivityKind::ExamTasksDone => self.exam_tasks_done,
            ActivityKind::FlashcardReviewed => self.flashcard_reviewed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreakState {
    pub user_id: Uuid,
    pub current_streak: i32,
    pub longest_streak: i32,
    pub last_activity_date: Option<NaiveDate>,
    pub total_active_days: i32,
    pub streak_freeze_available: i32,
}

impl StreakState {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            current_streak: 0,
            longest_streak: 0,
            last_activity_date: None,
            total_active_days: 0,
            streak_freeze_available: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyQuest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub quest_date: NaiveDate,
    pub quest_type: QuestType,
    pub quest_title: String,
    pub target_value: i64,
    pub current_value: i64,
    pub xp_reward: i64,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub is_premium_only: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAchievement {
    pub user_id: Uuid,
    pub achievement_code: String,
    pub unlocked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreakRewardClaim {
    pub user_id: Uuid,
    pub streak_days: i32,
    pub reward_type: String,
    pub reward_value: i64,
    pub claimed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    pub fn parse(s: &str) -> Option<Difficulty> {
        match s {
            "easy" => Some(Difficulty::Easy),
            "medium" => Some(Difficulty::Medium),
            "hard" => Some(Difficulty::Hard),
            _ => None,
        }
    }

    /// AI output uses free-form difficulty labels; anything unrecognized
    /// lands on medium.
    pub fn parse_lenient(s: &str) -> Difficulty {
        Difficulty::parse(s.trim().to_lowercase().as_str()).unwrap_or(Difficulty::Medium)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlashcardSet {
    pub id: Uuid,
    pub user_id: Uuid,
    pub subject: String,
    pub material_ids: Vec<Uuid>,
    pub total_cards: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flashcard {
    pub id: Uuid,
    pub set_id: Uuid,
    pub question: String,
    pub answer: String,
    pub difficulty: Difficulty,
    pub topics: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Per-(user, card) SM-2 state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlashcardProgress {
    pub user_id: Uuid,
    pub flashcard_id: Uuid,
    pub ease_factor: f64,
    pub interval_days: i64,
    pub repetitions: i64,
    pub next_review_date: NaiveDate,
    pub last_reviewed_at: Option<DateTime<Utc>>,
}

/// Study material text handed to the card generator by the host app.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialInput {
    pub id: Uuid,
    pub subject: Option<String>,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn premium_expires() {
        let now = Utc::now();
        let mut user = User {
            id: Uuid::new_v4(),
            subscription_type: SubscriptionTier::Premium,
            subscription_expires_at: Some(now + Duration::days(1)),
            xp_total: 0,
            level: 1,
            bonus_questions: 0,
            referral_count: 0,
            created_at: now,
        };
        assert!(user.is_premium(now));

        user.subscription_expires_at = Some(now - Duration::seconds(1));
        assert!(!user.is_premium(now));
        assert_eq!(user.effective_tier(now), SubscriptionTier::Free);

        // No expiry on a premium account means indefinitely premium.
        user.subscription_expires_at = None;
        assert!(user.is_premium(now));
    }

    #[test]
    fn difficulty_is_lenient_only_when_asked() {
        assert_eq!(Difficulty::parse("hard"), Some(Difficulty::Hard));
        assert_eq!(Difficulty::parse("HARD"), None);
        assert_eq!(Difficulty::parse_lenient(" HARD "), Difficulty::Hard);
        assert_eq!(Difficulty::parse_lenient("impossible"), Difficulty::Medium);
    }
}
