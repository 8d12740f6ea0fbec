use std::hash::{DefaultHasher, Hash, Hasher};

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::activity::ActivityKind;
use crate::models::SubscriptionTier;

pub const FREE_QUESTS_PER_DAY: usize = 3;
pub const PREMIUM_QUESTS_PER_DAY: usize = 5;
pub const META_QUEST_XP: i64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestType {
    CompleteTasks,
    PomodoroSession,
    AskAi,
    UploadMaterial,
    DailyCheckin,
    /// Premium meta-quest: complete every other quest of the day.
    CompleteAll,
}

impl QuestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestType::CompleteTasks => "complete_tasks",
            QuestType::PomodoroSession => "pomodoro_session",
            QuestType::AskAi => "ask_ai",
            QuestType::UploadMaterial => "upload_material",
            QuestType::DailyCheckin => "daily_checkin",
            QuestType::CompleteAll => "complete_all",
        }
    }

    pub fn parse(s: &str) -> Option<QuestType> {
        match s {
            "complete_tasks" => Some(QuestType::CompleteTasks),
            "pomodoro_session" => Some(QuestType::PomodoroSession),
            "ask_ai" => Some(QuestType::AskAi),
            "upload_material" => Some(QuestType::UploadMaterial),
            "daily_checkin" => Some(QuestType::DailyCheckin),
            "complete_all" => Some(QuestType::CompleteAll),
            _ => None,
        }
    }

    pub fn is_meta(&self) -> bool {
        matches!(self, QuestType::CompleteAll)
    }
}

/// Which quest type an activity kind advances, if any.
pub fn quest_type_for_activity(kind: ActivityKind) -> Option<QuestType> {
    match kind {
        ActivityKind::TasksCompleted => Some(QuestType::CompleteTasks),
        ActivityKind::PomodoroMinutes => Some(QuestType::PomodoroSession),
        ActivityKind::AiQuestionsAsked => Some(QuestType::AskAi),
        ActivityKind::MaterialsUploaded => Some(QuestType::UploadMaterial),
        ActivityKind::ScheduleViews => Some(QuestType::DailyCheckin),
        ActivityKind::ExamTasksDone | ActivityKind::FlashcardReviewed => None,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct QuestTemplate {
    pub quest_type: QuestType,
    pub title: &'static str,
    pub target_min: i64,
    pub target_max: i64,
    pub xp_min: i64,
    pub xp_max: i64,
}

/// Fixed template pool the daily draw selects from.
pub const QUEST_TEMPLATES: [QuestTemplate; 5] = [
    QuestTemplate {
        quest_type: QuestType::CompleteTasks,
        title: "Finish your tasks",
        target_min: 2,
        target_max: 5,
        xp_min: 20,
        xp_max: 40,
    },
    QuestTemplate {
        quest_type: QuestType::PomodoroSession,
        title: "Focus with pomodoro",
        target_min: 25,
        target_max: 60,
        xp_min: 15,
        xp_max: 30,
    },
    QuestTemplate {
        quest_type: QuestType::AskAi,
        title: "Ask the assistant",
        target_min: 3,
        target_max: 10,
        xp_min: 10,
        xp_max: 25,
    },
    QuestTemplate {
        quest_type: QuestType::UploadMaterial,
        title: "Upload study material",
        target_min: 1,
        target_max: 2,
        xp_min: 20,
        xp_max: 35,
    },
    QuestTemplate {
        quest_type: QuestType::DailyCheckin,
        title: "Check your schedule",
        target_min: 1,
        target_max: 1,
        xp_min: 5,
        xp_max: 10,
    },
];

/// A quest drawn for a user-day, before persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedQuest {
    pub quest_type: QuestType,
    pub title: String,
    pub target_value: i64,
    pub xp_reward: i64,
    pub is_premium_only: bool,
}

fn seed_for(user_id: Uuid, date: NaiveDate, tier: SubscriptionTier) -> u64 {
    let mut hasher = DefaultHasher::new();
    user_id.hash(&mut hasher);
    date.hash(&mut hasher);
    tier.as_str().hash(&mut hasher);
    hasher.finish()
}

/// Draw the day's quest set. Deterministic for a given (user, date, tier);
/// the RNG is seeded per call and never shared.
pub fn generate_daily_quests(
    user_id: Uuid,
    date: NaiveDate,
    tier: SubscriptionTier,
) -> Vec<GeneratedQuest> {
    let mut rng = StdRng::seed_from_u64(seed_for(user_id, date, tier));

    let count = match tier {
        SubscriptionTier::Free => FREE_QUESTS_PER_DAY,
        SubscriptionTier::Premium => PREMIUM_QUESTS_PER_DAY,
    };

    let mut indices: Vec<usize> = (0..QUEST_TEMPLATES.len()).collect();
    indices.shuffle(&mut rng);
    indices.truncate(count);
    // Stable display order regardless of draw order.
    indices.sort_unstable();

    let mut quests: Vec<GeneratedQuest> = indices
        .into_iter()
        .map(|i| {
            let template = &QUEST_TEMPLATES[i];
            GeneratedQuest {
                quest_type: template.quest_type,
                title: template.title.to_string(),
                target_value: rng.random_range(template.target_min..=template.target_max),
                xp_reward: rng.random_range(template.xp_min..=template.xp_max),
                is_premium_only: false,
            }
        })
        .collect();

    if tier == SubscriptionTier::Premium {
        quests.push(GeneratedQuest {
            quest_type: QuestType::CompleteAll,
            title: "Complete all today's quests".to_string(),
            target_value: 1,
            xp_reward: META_QUEST_XP,
            is_premium_only: true,
        });
    }

    quests
}
