use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::models::ActivityTotals;

/// Closed set of unlock predicates. The evaluator matches exhaustively;
/// adding a kind is a code change, not data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementKind {
    StreakDays,
    TasksCompleted,
    PomodoroMinutes,
    AiQuestions,
    MaterialsUploaded,
    ExamTasksDone,
    LevelReached,
    Referrals,
    FirstLogin,
    NightActivity,
    MorningActivity,
}

impl RequirementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequirementKind::StreakDays => "streak_days",
            RequirementKind::TasksCompleted => "tasks_completed",
            RequirementKind::PomodoroMinutes => "pomodoro_minutes",
            RequirementKind::AiQuestions => "ai_questions",
            RequirementKind::MaterialsUploaded => "materials_uploaded",
            RequirementKind::ExamTasksDone => "exam_tasks_done",
            RequirementKind::LevelReached => "level_reached",
            RequirementKind::Referrals => "referrals",
            RequirementKind::FirstLogin => "first_login",
            RequirementKind::NightActivity => "night_activity",
            RequirementKind::MorningActivity => "morning_activity",
        }
    }

    pub fn parse(s: &str) -> Option<RequirementKind> {
        match s {
            "streak_days" => Some(RequirementKind::StreakDays),
            "tasks_completed" => Some(RequirementKind::TasksCompleted),
            "pomodoro_minutes" => Some(RequirementKind::PomodoroMinutes),
            "ai_questions" => Some(RequirementKind::AiQuestions),
            "materials_uploaded" => Some(RequirementKind::MaterialsUploaded),
            "exam_tasks_done" => Some(RequirementKind::ExamTasksDone),
            "level_reached" => Some(RequirementKind::LevelReached),
            "referrals" => Some(RequirementKind::Referrals),
            "first_login" => Some(RequirementKind::FirstLogin),
            "night_activity" => Some(RequirementKind::NightActivity),
            "morning_activity" => Some(RequirementKind::MorningActivity),
            _ => None,
        }
    }
}

/// Immutable achievement definition from the catalog seed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AchievementDef {
    pub code: String,
    pub title: String,
    pub description: String,
    pub icon: String,
    pub category: String,
    pub xp_reward: i64,
    pub requirement_type: RequirementKind,
    pub requirement_value: i64,
    pub sort_order: i32,
}

/// State the unlock predicates read. Built once per evaluation pass.
#[derive(Debug, Clone, Copy)]
pub struct UserSnapshot {
    pub longest_streak: i32,
    pub level: i32,
    pub referral_count: i64,
    pub totals: ActivityTotals,
}

impl AchievementDef {
    /// Evaluate the unlock predicate at `time_of_day` (UTC).
    pub fn is_satisfied(&self, snapshot: &UserSnapshot, time_of_day: NaiveTime) -> bool {
        let value = self.requirement_value;
        match self.requirement_type {
            RequirementKind::StreakDays => i64::from(snapshot.longest_streak) >= value,
            RequirementKind::TasksCompleted => snapshot.totals.tasks_completed >= value,
            RequirementKind::PomodoroMinutes => snapshot.totals.pomodoro_minutes >= value,
            RequirementKind::AiQuestions => snapshot.totals.ai_questions_asked >= value,
            RequirementKind::MaterialsUploaded => snapshot.totals.materials_uploaded >= value,
            RequirementKind::ExamTasksDone => snapshot.totals.exam_tasks_done >= value,
            RequirementKind::LevelReached => i64::from(snapshot.level) >= value,
            RequirementKind::Referrals => snapshot.referral_count >= value,
            RequirementKind::FirstLogin => true,
            RequirementKind::NightActivity => time_of_day.hour() < 5,
            RequirementKind::MorningActivity => (5..7).contains(&time_of_day.hour()),
        }
    }
}

/// Process-wide immutable catalog, loaded once at init.
#[derive(Debug, Clone)]
pub struct AchievementCatalog {
    defs: Vec<AchievementDef>,
}

impl AchievementCatalog {
    pub fn new(mut defs: Vec<AchievementDef>) -> Result<Self> {
        defs.sort_by_key(|d| d.sort_order);
        for (i, a) in defs.iter().enumerate() {
            if a.code.is_empty() {
                bail!("achievement at sort_order {} has an empty code", a.sort_order);
            }
            if a.xp_reward < 0 {
                bail!("achievement '{}' has negative xp_reward", a.code);
            }
            if defs[i + 1..].iter().any(|b| b.code == a.code) {
                bail!("duplicate achievement code '{}'", a.code);
            }
        }
        Ok(Self { defs })
    }

    /// Load a catalog from a JSON seed file.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading achievement seed {}", path.display()))?;
        let defs: Vec<AchievementDef> = serde_json::from_str(&raw)
            .with_context(|| format!("parsing achievement seed {}", path.display()))?;
        Self::new(defs)
    }

    pub fn defs(&self) -> &[AchievementDef] {
        &self.defs
    }

    pub fn get(&self, code: &str) -> Option<&AchievementDef> {
        self.defs.iter().find(|d| d.code == code)
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

impl Default for AchievementCatalog {
    fn default() -> Self {
        Self::new(default_defs()).expect("built-in achievement seed is valid")
    }
}

fn def(
    code: &str,
    title: &str,
    description: &str,
    icon: &str,
    category: &str,
    xp_reward: i64,
    requirement_type: RequirementKind,
    requirement_value: i64,
    sort_order: i32,
) -> AchievementDef {
    AchievementDef {
        code: code.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        icon: icon.to_string(),
        category: category.to_string(),
        xp_reward,
        requirement_type,
        requirement_value,
        sort_order,
    }
}

/// Built-in seed used when no `achievements_seed_path` is configured.
pub fn default_defs() -> Vec<AchievementDef> {
    vec![
        def("first_steps", "First Steps", "Open the app for the first time", "👋", "general", 10, RequirementKind::FirstLogin, 1, 10),
        def("streak_3", "Warming Up", "Keep a 3-day streak", "🔥", "streak", 20, RequirementKind::StreakDays, 3, 20),
        def("streak_7", "One Week Strong", "Keep a 7-day streak", "🔥", "streak", 50, RequirementKind::StreakDays, 7, 30),
        def("streak_30", "Habit Built", "Keep a 30-day streak", "🏆", "streak", 200, RequirementKind::StreakDays, 30, 40),
        def("tasks_10", "Getting Things Done", "Complete 10 tasks", "✅", "tasks", 30, RequirementKind::TasksCompleted, 10, 50),
        def("tasks_100", "Task Machine", "Complete 100 tasks", "⚙️", "tasks", 150, RequirementKind::TasksCompleted, 100, 60),
        def("pomodoro_500", "Deep Worker", "Focus for 500 pomodoro minutes", "🍅", "focus", 100, RequirementKind::PomodoroMinutes, 500, 70),
        def("curious_50", "Curious Mind", "Ask the assistant 50 questions", "💬", "ai", 75, RequirementKind::AiQuestions, 50, 80),
        def("archivist_10", "Archivist", "Upload 10 study materials", "📚", "materials", 60, RequirementKind::MaterialsUploaded, 10, 90),
        def("exam_25", "Exam Grinder", "Finish 25 exam tasks", "📝", "exams", 80, RequirementKind::ExamTasksDone, 25, 100),
        def("level_5", "Rising Star", "Reach level 5", "⭐", "level", 40, RequirementKind::LevelReached, 5, 110),
        def("level_8", "Overachiever", "Reach level 8", "🌟", "level", 50, RequirementKind::LevelReached, 8, 120),
        def("level_10", "Double Digits", "Reach level 10", "✨", "level", 100, RequirementKind::LevelReached, 10, 130),
        def("night_owl", "Night Owl", "Study between midnight and 5 AM", "🦉", "time", 25, RequirementKind::NightActivity, 1, 140),
        def("early_bird", "Early Bird", "Study between 5 and 7 AM", "🐦", "time", 25, RequirementKind::MorningActivity, 1, 150),
        def("recruiter_3", "Recruiter", "Invite 3 friends", "🤝", "social", 90, RequirementKind::Referrals, 3, 160),
    ]
}
