use serde::{Deserialize, Serialize};

/// Closed set of activity categories that feed the gamification pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    TasksCompleted,
    PomodoroMinutes,
    AiQuestionsAsked,
    MaterialsUploaded,
    ScheduleViews,
    ExamTasksDone,
    FlashcardReviewed,
}

pub const ALL_ACTIVITY_KINDS: [ActivityKind; 7] = [
    ActivityKind::TasksCompleted,
    ActivityKind::PomodoroMinutes,
    ActivityKind::AiQuestionsAsked,
    ActivityKind::MaterialsUploaded,
    ActivityKind::ScheduleViews,
    ActivityKind::ExamTasksDone,
    ActivityKind::FlashcardReviewed,
];

impl ActivityKind {
    /// XP credited per unit of this activity.
    pub fn xp_per_unit(&self) -> i64 {
        match self {
            ActivityKind::TasksCompleted => 15,
            ActivityKind::PomodoroMinutes => 1,
            ActivityKind::AiQuestionsAsked => 5,
            ActivityKind::MaterialsUploaded => 25,
            ActivityKind::ScheduleViews => 2,
            ActivityKind::ExamTasksDone => 10,
            ActivityKind::FlashcardReviewed => 3,
        }
    }

    /// Column name in `daily_activity`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::TasksCompleted => "tasks_completed",
            ActivityKind::PomodoroMinutes => "pomodoro_minutes",
            ActivityKind::AiQuestionsAsked => "ai_questions_asked",
            ActivityKind::MaterialsUploaded => "materials_uploaded",
            ActivityKind::ScheduleViews => "schedule_views",
            ActivityKind::ExamTasksDone => "exam_tasks_done",
            ActivityKind::FlashcardReviewed => "flashcard_reviewed",
        }
    }

    /// Parse an activity kind. Unknown kinds are an error, never a default.
    pub fn parse(kind: &str) -> Option<ActivityKind> {
        match kind {
            "tasks_completed" => Some(ActivityKind::TasksCompleted),
            "pomodoro_minutes" => Some(ActivityKind::PomodoroMinutes),
            "ai_questions_asked" => Some(ActivityKind::AiQuestionsAsked),
            "materials_uploaded" => Some(ActivityKind::MaterialsUploaded),
            "schedule_views" => Some(ActivityKind::ScheduleViews),
            "exam_tasks_done" => Some(ActivityKind::ExamTasksDone),
            "flashcard_reviewed" => Some(ActivityKind::FlashcardReviewed),
            _ => None,
        }
    }
}
