use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, SqliteExecutor, SqlitePool, Transaction};
use uuid::Uuid;

use crate::activity::ActivityKind;
use crate::log_db_operation;
use crate::models::*;
use crate::quests::QuestType;

/// Connection pool plus schema management. Multi-step operations run inside
/// a transaction obtained from `begin()`; SQLite's single-writer model
/// serializes the per-user row updates the gamification pipeline needs.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self> {
        // An in-memory database exists per connection, so the pool must
        // stay at one connection or later acquires see an empty schema.
        let pool = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect(database_url)
                .await?
        } else {
            SqlitePool::connect(database_url).await?
        };
        let db = Database { pool };
        db.migrate().await?;
        log_db_operation!(info, "migrate", "schema ready");
        Ok(db)
    }

    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, sqlx::Error> {
        self.pool.begin().await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                subscription_type TEXT NOT NULL DEFAULT 'free',
                subscription_expires_at TEXT,
                xp_total INTEGER NOT NULL DEFAULT 0,
                level INTEGER NOT NULL DEFAULT 1,
                bonus_questions INTEGER NOT NULL DEFAULT 0,
                referral_count INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS daily_activity (
                user_id TEXT NOT NULL,
                activity_date TEXT NOT NULL,
                tasks_completed INTEGER NOT NULL DEFAULT 0,
                pomodoro_minutes INTEGER NOT NULL DEFAULT 0,
                ai_questions_asked INTEGER NOT NULL DEFAULT 0,
                materials_uploaded INTEGER NOT NULL DEFAULT 0,
                schedule_views INTEGER NOT NULL DEFAULT 0,
                exam_tasks_done INTEGER NOT NULL DEFAULT 0,
                flashcard_reviewed INTEGER NOT NULL DEFAULT 0,
                xp_earned INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (user_id, activity_date)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_streaks (
                user_id TEXT PRIMARY KEY,
                current_streak INTEGER NOT NULL DEFAULT 0,
                longest_streak INTEGER NOT NULL DEFAULT 0,
                last_activity_date TEXT,
                total_active_days INTEGER NOT NULL DEFAULT 0,
                streak_freeze_available INTEGER NOT NULL DEFAULT 0
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS daily_quests (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                quest_date TEXT NOT NULL,
                quest_type TEXT NOT NULL,
                quest_title TEXT NOT NULL,
                target_value INTEGER NOT NULL,
                current_value INTEGER NOT NULL DEFAULT 0,
                xp_reward INTEGER NOT NULL,
                is_completed INTEGER NOT NULL DEFAULT 0,
                completed_at TEXT,
                is_premium_only INTEGER NOT NULL DEFAULT 0,
                UNIQUE (user_id, quest_date, quest_type)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_achievements (
                user_id TEXT NOT NULL,
                achievement_code TEXT NOT NULL,
                unlocked_at TEXT NOT NULL,
                PRIMARY KEY (user_id, achievement_code)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS streak_freeze_log (
                user_id TEXT NOT NULL,
                freeze_date TEXT NOT NULL,
                PRIMARY KEY (user_id, freeze_date)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS streak_reward_claims (
                user_id TEXT NOT NULL,
                streak_days INTEGER NOT NULL,
                reward_type TEXT NOT NULL,
                reward_value INTEGER NOT NULL,
                claimed_at TEXT NOT NULL,
                PRIMARY KEY (user_id, streak_days)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS flashcard_sets (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                subject TEXT NOT NULL,
                material_ids TEXT NOT NULL,
                total_cards INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS flashcards (
                id TEXT PRIMARY KEY,
                set_id TEXT NOT NULL,
                question TEXT NOT NULL,
                answer TEXT NOT NULL,
                difficulty TEXT NOT NULL DEFAULT 'medium',
                topics TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS flashcard_progress (
                user_id TEXT NOT NULL,
                flashcard_id TEXT NOT NULL,
                ease_factor REAL NOT NULL DEFAULT 2.5,
                interval_days INTEGER NOT NULL DEFAULT 0,
                repetitions INTEGER NOT NULL DEFAULT 0,
                next_review_date TEXT NOT NULL,
                last_reviewed_at TEXT,
                PRIMARY KEY (user_id, flashcard_id)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // Pool-level convenience wrappers for reads outside a transaction.

    pub async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        get_user(&self.pool, id).await
    }

    pub async fn get_streak(&self, user_id: Uuid) -> Result<Option<StreakState>> {
        get_streak(&self.pool, user_id).await
    }

    pub async fn get_activity_day(
        &self,
        user_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<ActivityDay>> {
        get_activity_day(&self.pool, user_id, date).await
    }

    pub async fn aggregate_activity(&self, user_id: Uuid) -> Result<ActivityTotals> {
        aggregate_activity(&self.pool, user_id).await
    }

    pub async fn get_daily_quests(&self, user_id: Uuid, date: NaiveDate) -> Result<Vec<DailyQuest>> {
        get_daily_quests(&self.pool, user_id, date).await
    }

    pub async fn get_unlocked_codes(&self, user_id: Uuid) -> Result<Vec<String>> {
        get_unlocked_codes(&self.pool, user_id).await
    }

    pub async fn get_claims(&self, user_id: Uuid) -> Result<Vec<StreakRewardClaim>> {
        get_claims(&self.pool, user_id).await
    }

    /// Seed a user row. Registration itself lives in the host app.
    pub async fn create_user(&self, tier: SubscriptionTier, now: DateTime<Utc>) -> Result<User> {
        let user = User {
            id: Uuid::new_v4(),
            subscription_type: tier,
            subscription_expires_at: None,
            xp_total: 0,
            level: 1,
            bonus_questions: 0,
            referral_count: 0,
            created_at: now,
        };
        sqlx::query(
            r#"
            INSERT INTO users (id, subscription_type, subscription_expires_at, xp_total,
                               level, bonus_questions, referral_count, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(user.id.to_string())
        .bind(user.subscription_type.as_str())
        .bind(user.subscription_expires_at)
        .bind(user.xp_total)
        .bind(user.level)
        .bind(user.bonus_questions)
        .bind(user.referral_count)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn set_referral_count(&self, user_id: Uuid, count: i64) -> Result<()> {
        sqlx::query("UPDATE users SET referral_count = ?1 WHERE id = ?2")
            .bind(count)
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn parse_uuid(raw: &str) -> Result<Uuid> {
    Ok(Uuid::parse_str(raw)?)
}

fn map_user(row: &SqliteRow) -> Result<User> {
    let tier: String = row.get("subscription_type");
    Ok(User {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        subscription_type: SubscriptionTier::parse(&tier)
            .ok_or_else(|| anyhow::anyhow!("unknown subscription tier '{}'", tier))?,
        subscription_expires_at: row.get("subscription_expires_at"),
        xp_total: row.get("xp_total"),
        level: row.get("level"),
        bonus_questions: row.get("bonus_questions"),
        referral_count: row.get("referral_count"),
        created_at: row.get("created_at"),
    })
}

fn map_activity_day(row: &SqliteRow) -> Result<ActivityDay> {
    Ok(ActivityDay {
        user_id: parse_uuid(&row.get::<String, _>("user_id"))?,
        activity_date: row.get("activity_date"),
        tasks_completed: row.get("tasks_completed"),
        pomodoro_minutes: row.get("pomodoro_minutes"),
        ai_questions_asked: row.get("ai_questions_asked"),
        materials_uploaded: row.get("materials_uploaded"),
        schedule_views: row.get("schedule_views"),
        exam_tasks_done: row.get("exam_tasks_done"),
        flashcard_reviewed: row.get("flashcard_reviewed"),
        xp_earned: row.get("xp_earned"),
    })
}

fn map_streak(row: &SqliteRow) -> Result<StreakState> {
    Ok(StreakState {
        user_id: parse_uuid(&row.get::<String, _>("user_id"))?,
        current_streak: row.get("current_streak"),
        longest_streak: row.get("longest_streak"),
        last_activity_date: row.get("last_activity_date"),
        total_active_days: row.get("total_active_days"),
        streak_freeze_available: row.get("streak_freeze_available"),
    })
}

fn map_quest(row: &SqliteRow) -> Result<DailyQuest> {
    let quest_type: String = row.get("quest_type");
    Ok(DailyQuest {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        user_id: parse_uuid(&row.get::<String, _>("user_id"))?,
        quest_date: row.get("quest_date"),
        quest_type: QuestType::parse(&quest_type)
            .ok_or_else(|| anyhow::anyhow!("unknown quest type '{}'", quest_type))?,
        quest_title: row.get("quest_title"),
        target_value: row.get("target_value"),
        current_value: row.get("current_value"),
        xp_reward: row.get("xp_reward"),
        is_completed: row.get("is_completed"),
        completed_at: row.get("completed_at"),
        is_premium_only: row.get("is_premium_only"),
    })
}

fn map_set(row: &SqliteRow) -> Result<FlashcardSet> {
    let material_ids: String = row.get("material_ids");
    Ok(FlashcardSet {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        user_id: parse_uuid(&row.get::<String, _>("user_id"))?,
        subject: row.get("subject"),
        material_ids: serde_json::from_str(&material_ids)?,
        total_cards: row.get("total_cards"),
        created_at: row.get("created_at"),
    })
}

fn map_card(row: &SqliteRow) -> Result<Flashcard> {
    let difficulty: String = row.get("difficulty");
    let topics: String = row.get("topics");
    Ok(Flashcard {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        set_id: parse_uuid(&row.get::<String, _>("set_id"))?,
        question: row.get("question"),
        answer: row.get("answer"),
        difficulty: Difficulty::parse(&difficulty)
            .ok_or_else(|| anyhow::anyhow!("unknown difficulty '{}'", difficulty))?,
        topics: serde_json::from_str(&topics)?,
        created_at: row.get("created_at"),
    })
}

fn map_progress(row: &SqliteRow) -> Result<FlashcardProgress> {
    Ok(FlashcardProgress {
        user_id: parse_uuid(&row.get::<String, _>("user_id"))?,
        flashcard_id: parse_uuid(&row.get::<String, _>("flashcard_id"))?,
        ease_factor: row.get("ease_factor"),
        interval_days: row.get("interval_days"),
        repetitions: row.get("repetitions"),
        next_review_date: row.get("next_review_date"),
        last_reviewed_at: row.get("last_reviewed_at"),
    })
}

fn map_claim(row: &SqliteRow) -> Result<StreakRewardClaim> {
    Ok(StreakRewardClaim {
        user_id: parse_uuid(&row.get::<String, _>("user_id"))?,
        streak_days: row.get("streak_days"),
        reward_type: row.get("reward_type"),
        reward_value: row.get("reward_value"),
        claimed_at: row.get("claimed_at"),
    })
}

// ---------------------------------------------------------------------------
// Queries. All take a generic executor so they compose into transactions.
// ---------------------------------------------------------------------------

pub(crate) async fn get_user<'e, E>(executor: E, id: Uuid) -> Result<Option<User>>
where
    E: SqliteExecutor<'e>,
{
    let row = sqlx::query("SELECT * FROM users WHERE id = ?1")
        .bind(id.to_string())
        .fetch_optional(executor)
        .await?;
    row.as_ref().map(map_user).transpose()
}

pub(crate) async fn update_user_xp<'e, E>(
    executor: E,
    id: Uuid,
    xp_total: i64,
    level: i32,
) -> Result<()>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query("UPDATE users SET xp_total = ?1, level = ?2 WHERE id = ?3")
        .bind(xp_total)
        .bind(level)
        .bind(id.to_string())
        .execute(executor)
        .await?;
    Ok(())
}

pub(crate) async fn set_subscription<'e, E>(
    executor: E,
    id: Uuid,
    tier: SubscriptionTier,
    expires_at: Option<DateTime<Utc>>,
) -> Result<()>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query("UPDATE users SET subscription_type = ?1, subscription_expires_at = ?2 WHERE id = ?3")
        .bind(tier.as_str())
        .bind(expires_at)
        .bind(id.to_string())
        .execute(executor)
        .await?;
    Ok(())
}

pub(crate) async fn add_bonus_questions<'e, E>(executor: E, id: Uuid, delta: i64) -> Result<()>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query("UPDATE users SET bonus_questions = bonus_questions + ?1 WHERE id = ?2")
        .bind(delta)
        .bind(id.to_string())
        .execute(executor)
        .await?;
    Ok(())
}

/// Atomic per-kind increment of today's ledger row, XP included.
pub(crate) async fn upsert_activity<'e, E>(
    executor: E,
    user_id: Uuid,
    date: NaiveDate,
    kind: ActivityKind,
    delta: i64,
    xp: i64,
) -> Result<()>
where
    E: SqliteExecutor<'e>,
{
    // Column names come from the closed ActivityKind enum, never from input.
    let column = kind.as_str();
    let sql = format!(
        r#"
        INSERT INTO daily_activity (user_id, activity_date, {column}, xp_earned)
        VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT (user_id, activity_date) DO UPDATE SET
            {column} = {column} + excluded.{column},
            xp_earned = xp_earned + excluded.xp_earned
        "#
    );
    sqlx::query(&sql)
        .bind(user_id.to_string())
        .bind(date)
        .bind(delta)
        .bind(xp)
        .execute(executor)
        .await?;
    Ok(())
}

pub(crate) async fn get_activity_day<'e, E>(
    executor: E,
    user_id: Uuid,
    date: NaiveDate,
) -> Result<Option<ActivityDay>>
where
    E: SqliteExecutor<'e>,
{
    let row = sqlx::query("SELECT * FROM daily_activity WHERE user_id = ?1 AND activity_date = ?2")
        .bind(user_id.to_string())
        .bind(date)
        .fetch_optional(executor)
        .await?;
    row.as_ref().map(map_activity_day).transpose()
}

pub(crate) async fn aggregate_activity<'e, E>(executor: E, user_id: Uuid) -> Result<ActivityTotals>
where
    E: SqliteExecutor<'e>,
{
    let row = sqlx::query(
        r#"
        SELECT
            COALESCE(SUM(tasks_completed), 0) AS tasks_completed,
            COALESCE(SUM(pomodoro_minutes), 0) AS pomodoro_minutes,
            COALESCE(SUM(ai_questions_asked), 0) AS ai_questions_asked,
            COALESCE(SUM(materials_uploaded), 0) AS materials_uploaded,
            COALESCE(SUM(schedule_views), 0) AS schedule_views,
            COALESCE(SUM(exam_tasks_done), 0) AS exam_tasks_done,
            COALESCE(SUM(flashcard_reviewed), 0) AS flashcard_reviewed,
            COALESCE(SUM(xp_earned), 0) AS xp_earned
        FROM daily_activity WHERE user_id = ?1
        "#,
    )
    .bind(user_id.to_string())
    .fetch_one(executor)
    .await?;

    Ok(ActivityTotals {
        tasks_completed: row.get("tasks_completed"),
        pomodoro_minutes: row.get("pomodoro_minutes"),
        ai_questions_asked: row.get("ai_questions_asked"),
        materials_uploaded: row.get("materials_uploaded"),
        schedule_views: row.get("schedule_views"),
        exam_tasks_done: row.get("exam_tasks_done"),
        flashcard_reviewed: row.get("flashcard_reviewed"),
        xp_earned: row.get("xp_earned"),
    })
}

pub(crate) async fn get_streak<'e, E>(executor: E, user_id: Uuid) -> Result<Option<StreakState>>
where
    E: SqliteExecutor<'e>,
{
    let row = sqlx::query("SELECT * FROM user_streaks WHERE user_id = ?1")
        .bind(user_id.to_string())
        .fetch_optional(executor)
        .await?;
    row.as_ref().map(map_streak).transpose()
}

pub(crate) async fn upsert_streak<'e, E>(executor: E, state: &StreakState) -> Result<()>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO user_streaks (user_id, current_streak, longest_streak,
                                  last_activity_date, total_active_days, streak_freeze_available)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ON CONFLICT (user_id) DO UPDATE SET
            current_streak = excluded.current_streak,
            longest_streak = excluded.longest_streak,
            last_activity_date = excluded.last_activity_date,
            total_active_days = excluded.total_active_days,
            streak_freeze_available = excluded.streak_freeze_available
        "#,
    )
    .bind(state.user_id.to_string())
    .bind(state.current_streak)
    .bind(state.longest_streak)
    .bind(state.last_activity_date)
    .bind(state.total_active_days)
    .bind(state.streak_freeze_available)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn get_daily_quests<'e, E>(
    executor: E,
    user_id: Uuid,
    date: NaiveDate,
) -> Result<Vec<DailyQuest>>
where
    E: SqliteExecutor<'e>,
{
    let rows = sqlx::query(
        "SELECT * FROM daily_quests WHERE user_id = ?1 AND quest_date = ?2 ORDER BY is_premium_only, quest_type",
    )
    .bind(user_id.to_string())
    .bind(date)
    .fetch_all(executor)
    .await?;
    rows.iter().map(map_quest).collect()
}

pub(crate) async fn insert_quest<'e, E>(executor: E, quest: &DailyQuest) -> Result<()>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO daily_quests (id, user_id, quest_date, quest_type, quest_title,
                                  target_value, current_value, xp_reward, is_completed,
                                  completed_at, is_premium_only)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        "#,
    )
    .bind(quest.id.to_string())
    .bind(quest.user_id.to_string())
    .bind(quest.quest_date)
    .bind(quest.quest_type.as_str())
    .bind(&quest.quest_title)
    .bind(quest.target_value)
    .bind(quest.current_value)
    .bind(quest.xp_reward)
    .bind(quest.is_completed)
    .bind(quest.completed_at)
    .bind(quest.is_premium_only)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn update_quest_progress<'e, E>(
    executor: E,
    quest_id: Uuid,
    current_value: i64,
    is_completed: bool,
    completed_at: Option<DateTime<Utc>>,
) -> Result<()>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query(
        "UPDATE daily_quests SET current_value = ?1, is_completed = ?2, completed_at = ?3 WHERE id = ?4",
    )
    .bind(current_value)
    .bind(is_completed)
    .bind(completed_at)
    .bind(quest_id.to_string())
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn get_unlocked_codes<'e, E>(executor: E, user_id: Uuid) -> Result<Vec<String>>
where
    E: SqliteExecutor<'e>,
{
    let rows = sqlx::query("SELECT achievement_code FROM user_achievements WHERE user_id = ?1")
        .bind(user_id.to_string())
        .fetch_all(executor)
        .await?;
    Ok(rows.iter().map(|r| r.get("achievement_code")).collect())
}

/// Idempotent unlock: `Ok(false)` when the achievement is already held.
pub(crate) async fn try_insert_achievement<'e, E>(
    executor: E,
    user_id: Uuid,
    code: &str,
    unlocked_at: DateTime<Utc>,
) -> Result<bool>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        "INSERT INTO user_achievements (user_id, achievement_code, unlocked_at) VALUES (?1, ?2, ?3)",
    )
    .bind(user_id.to_string())
    .bind(code)
    .bind(unlocked_at)
    .execute(executor)
    .await;
    Ok(crate::errors::absorb_unique_violation(result, "achievement unlock")?)
}

pub(crate) async fn get_freeze_dates<'e, E>(executor: E, user_id: Uuid) -> Result<Vec<NaiveDate>>
where
    E: SqliteExecutor<'e>,
{
    let rows = sqlx::query("SELECT freeze_date FROM streak_freeze_log WHERE user_id = ?1")
        .bind(user_id.to_string())
        .fetch_all(executor)
        .await?;
    Ok(rows.iter().map(|r| r.get("freeze_date")).collect())
}

/// `Ok(false)` when a freeze was already logged for that date.
pub(crate) async fn try_insert_freeze<'e, E>(
    executor: E,
    user_id: Uuid,
    date: NaiveDate,
) -> Result<bool>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query("INSERT INTO streak_freeze_log (user_id, freeze_date) VALUES (?1, ?2)")
        .bind(user_id.to_string())
        .bind(date)
        .execute(executor)
        .await;
    Ok(crate::errors::absorb_unique_violation(result, "freeze log")?)
}

pub(crate) async fn get_claims<'e, E>(executor: E, user_id: Uuid) -> Result<Vec<StreakRewardClaim>>
where
    E: SqliteExecutor<'e>,
{
    let rows =
        sqlx::query("SELECT * FROM streak_reward_claims WHERE user_id = ?1 ORDER BY streak_days")
            .bind(user_id.to_string())
            .fetch_all(executor)
            .await?;
    rows.iter().map(map_claim).collect()
}

/// `Ok(false)` when the milestone is already claimed.
pub(crate) async fn try_insert_claim<'e, E>(executor: E, claim: &StreakRewardClaim) -> Result<bool>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        INSERT INTO streak_reward_claims (user_id, streak_days, reward_type, reward_value, claimed_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(claim.user_id.to_string())
    .bind(claim.streak_days)
    .bind(&claim.reward_type)
    .bind(claim.reward_value)
    .bind(claim.claimed_at)
    .execute(executor)
    .await;
    Ok(crate::errors::absorb_unique_violation(result, "reward claim")?)
}

// Flashcard storage.

pub(crate) async fn insert_set<'e, E>(executor: E, set: &FlashcardSet) -> Result<()>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO flashcard_sets (id, user_id, subject, material_ids, total_cards, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(set.id.to_string())
    .bind(set.user_id.to_string())
    .bind(&set.subject)
    .bind(serde_json::to_string(&set.material_ids)?)
    .bind(set.total_cards)
    .bind(set.created_at)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn get_set<'e, E>(executor: E, set_id: Uuid) -> Result<Option<FlashcardSet>>
where
    E: SqliteExecutor<'e>,
{
    let row = sqlx::query("SELECT * FROM flashcard_sets WHERE id = ?1")
        .bind(set_id.to_string())
        .fetch_optional(executor)
        .await?;
    row.as_ref().map(map_set).transpose()
}

pub(crate) async fn list_sets<'e, E>(executor: E, user_id: Uuid) -> Result<Vec<FlashcardSet>>
where
    E: SqliteExecutor<'e>,
{
    let rows = sqlx::query("SELECT * FROM flashcard_sets WHERE user_id = ?1 ORDER BY created_at DESC")
        .bind(user_id.to_string())
        .fetch_all(executor)
        .await?;
    rows.iter().map(map_set).collect()
}

pub(crate) async fn update_set_card_count<'e, E>(
    executor: E,
    set_id: Uuid,
    total_cards: i64,
) -> Result<()>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query("UPDATE flashcard_sets SET total_cards = ?1 WHERE id = ?2")
        .bind(total_cards)
        .bind(set_id.to_string())
        .execute(executor)
        .await?;
    Ok(())
}

pub(crate) async fn insert_card<'e, E>(executor: E, card: &Flashcard) -> Result<()>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO flashcards (id, set_id, question, answer, difficulty, topics, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(card.id.to_string())
    .bind(card.set_id.to_string())
    .bind(&card.question)
    .bind(&card.answer)
    .bind(card.difficulty.as_str())
    .bind(serde_json::to_string(&card.topics)?)
    .bind(card.created_at)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn list_cards<'e, E>(executor: E, set_id: Uuid) -> Result<Vec<Flashcard>>
where
    E: SqliteExecutor<'e>,
{
    let rows = sqlx::query("SELECT * FROM flashcards WHERE set_id = ?1 ORDER BY created_at, id")
        .bind(set_id.to_string())
        .fetch_all(executor)
        .await?;
    rows.iter().map(map_card).collect()
}

/// A card joined with its owning set's user, for ownership checks.
pub(crate) async fn get_card_with_owner<'e, E>(
    executor: E,
    card_id: Uuid,
) -> Result<Option<(Flashcard, Uuid)>>
where
    E: SqliteExecutor<'e>,
{
    let row = sqlx::query(
        r#"
        SELECT c.*, s.user_id AS owner_id
        FROM flashcards c JOIN flashcard_sets s ON c.set_id = s.id
        WHERE c.id = ?1
        "#,
    )
    .bind(card_id.to_string())
    .fetch_optional(executor)
    .await?;

    match row {
        Some(row) => {
            let card = map_card(&row)?;
            let owner = parse_uuid(&row.get::<String, _>("owner_id"))?;
            Ok(Some((card, owner)))
        }
        None => Ok(None),
    }
}

pub(crate) async fn get_progress<'e, E>(
    executor: E,
    user_id: Uuid,
    flashcard_id: Uuid,
) -> Result<Option<FlashcardProgress>>
where
    E: SqliteExecutor<'e>,
{
    let row = sqlx::query("SELECT * FROM flashcard_progress WHERE user_id = ?1 AND flashcard_id = ?2")
        .bind(user_id.to_string())
        .bind(flashcard_id.to_string())
        .fetch_optional(executor)
        .await?;
    row.as_ref().map(map_progress).transpose()
}

pub(crate) async fn upsert_progress<'e, E>(executor: E, progress: &FlashcardProgress) -> Result<()>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO flashcard_progress (user_id, flashcard_id, ease_factor, interval_days,
                                        repetitions, next_review_date, last_reviewed_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ON CONFLICT (user_id, flashcard_id) DO UPDATE SET
            ease_factor = excluded.ease_factor,
            interval_days = excluded.interval_days,
            repetitions = excluded.repetitions,
            next_review_date = excluded.next_review_date,
            last_reviewed_at = excluded.last_reviewed_at
        "#,
    )
    .bind(progress.user_id.to_string())
    .bind(progress.flashcard_id.to_string())
    .bind(progress.ease_factor)
    .bind(progress.interval_days)
    .bind(progress.repetitions)
    .bind(progress.next_review_date)
    .bind(progress.last_reviewed_at)
    .execute(executor)
    .await?;
    Ok(())
}

/// Progress rows due for review, oldest first.
pub(crate) async fn due_progress<'e, E>(
    executor: E,
    user_id: Uuid,
    today: NaiveDate,
    limit: i64,
) -> Result<Vec<FlashcardProgress>>
where
    E: SqliteExecutor<'e>,
{
    let rows = sqlx::query(
        r#"
        SELECT * FROM flashcard_progress
        WHERE user_id = ?1 AND next_review_date <= ?2
        ORDER BY next_review_date ASC
        LIMIT ?3
        "#,
    )
    .bind(user_id.to_string())
    .bind(today)
    .bind(limit)
    .fetch_all(executor)
    .await?;
    rows.iter().map(map_progress).collect()
}

/// Due cards joined with their progress rows, oldest due date first.
pub(crate) async fn due_cards<'e, E>(
    executor: E,
    user_id: Uuid,
    today: NaiveDate,
    limit: i64,
) -> Result<Vec<(Flashcard, FlashcardProgress)>>
where
    E: SqliteExecutor<'e>,
{
    let rows = sqlx::query(
        r#"
        SELECT c.id, c.set_id, c.question, c.answer, c.difficulty, c.topics, c.created_at,
               p.user_id, p.flashcard_id, p.ease_factor, p.interval_days, p.repetitions,
               p.next_review_date, p.last_reviewed_at
        FROM flashcard_progress p JOIN flashcards c ON p.flashcard_id = c.id
        WHERE p.user_id = ?1 AND p.next_review_date <= ?2
        ORDER BY p.next_review_date ASC
        LIMIT ?3
        "#,
    )
    .bind(user_id.to_string())
    .bind(today)
    .bind(limit)
    .fetch_all(executor)
    .await?;

    rows.iter()
        .map(|row| Ok((map_card(row)?, map_progress(row)?)))
        .collect()
}

/// Delete a set with its cards and every user's progress on them.
pub(crate) async fn delete_set_cascade(
    tx: &mut Transaction<'_, Sqlite>,
    set_id: Uuid,
) -> Result<()> {
    sqlx::query(
        r#"
        DELETE FROM flashcard_progress WHERE flashcard_id IN
            (SELECT id FROM flashcards WHERE set_id = ?1)
        "#,
    )
    .bind(set_id.to_string())
    .execute(&mut **tx)
    .await?;

    sqlx::query("DELETE FROM flashcards WHERE set_id = ?1")
        .bind(set_id.to_string())
        .execute(&mut **tx)
        .await?;

    sqlx::query("DELETE FROM flashcard_sets WHERE id = ?1")
        .bind(set_id.to_string())
        .execute(&mut **tx)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SubscriptionTier;

    #[tokio::test]
    async fn migrate_and_create_user() {
        let db = Database::new("sqlite::memory:").await.unwrap();
        let user = db
            .create_user(SubscriptionTier::Free, Utc::now())
            .await
            .unwrap();
        let fetched = db.get_user(user.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, user.id);
        assert_eq!(fetched.subscription_type, SubscriptionTier::Free);
        assert_eq!(fetched.xp_total, 0);
        assert_eq!(fetched.level, 1);
    }

    #[tokio::test]
    async fn activity_upsert_accumulates() {
        let db = Database::new("sqlite::memory:").await.unwrap();
        let user = db
            .create_user(SubscriptionTier::Free, Utc::now())
            .await
            .unwrap();
        let today = NaiveDate::from_ymd_opt(2025, 3, 11).unwrap();

        upsert_activity(db.pool(), user.id, today, ActivityKind::TasksCompleted, 1, 15)
            .await
            .unwrap();
        upsert_activity(db.pool(), user.id, today, ActivityKind::TasksCompleted, 2, 30)
            .await
            .unwrap();
        upsert_activity(db.pool(), user.id, today, ActivityKind::PomodoroMinutes, 25, 25)
            .await
            .unwrap();

        let day = db.get_activity_day(user.id, today).await.unwrap().unwrap();
        assert_eq!(day.tasks_completed, 3);
        assert_eq!(day.pomodoro_minutes, 25);
        assert_eq!(day.xp_earned, 70);

        let totals = db.aggregate_activity(user.id).await.unwrap();
        assert_eq!(totals.tasks_completed, 3);
        assert_eq!(totals.xp_earned, 70);
    }

    #[tokio::test]
    async fn aggregate_spans_days() {
        let db = Database::new("sqlite::memory:").await.unwrap();
        let user = db
            .create_user(SubscriptionTier::Free, Utc::now())
            .await
            .unwrap();
        let d1 = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2025, 3, 11).unwrap();

        upsert_activity(db.pool(), user.id, d1, ActivityKind::TasksCompleted, 2, 30)
            .await
            .unwrap();
        upsert_activity(db.pool(), user.id, d2, ActivityKind::TasksCompleted, 3, 45)
            .await
            .unwrap();

        let totals = db.aggregate_activity(user.id).await.unwrap();
        assert_eq!(totals.tasks_completed, 5);
        assert_eq!(totals.xp_earned, 75);
    }

    #[tokio::test]
    async fn achievement_unlock_is_idempotent() {
        let db = Database::new("sqlite::memory:").await.unwrap();
        let user = db
            .create_user(SubscriptionTier::Free, Utc::now())
            .await
            .unwrap();

        let first = try_insert_achievement(db.pool(), user.id, "streak_7", Utc::now())
            .await
            .unwrap();
        let second = try_insert_achievement(db.pool(), user.id, "streak_7", Utc::now())
            .await
            .unwrap();
        assert!(first);
        assert!(!second);

        let codes = db.get_unlocked_codes(user.id).await.unwrap();
        assert_eq!(codes, vec!["streak_7".to_string()]);
    }

    #[tokio::test]
    async fn progress_round_trip_preserves_sm2_state() {
        let db = Database::new("sqlite::memory:").await.unwrap();
        let user = db
            .create_user(SubscriptionTier::Free, Utc::now())
            .await
            .unwrap();
        let progress = FlashcardProgress {
            user_id: user.id,
            flashcard_id: Uuid::new_v4(),
            ease_factor: 2.3600000001,
            interval_days: 17,
            repetitions: 3,
            next_review_date: NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
            last_reviewed_at: Some(Utc::now()),
        };
        upsert_progress(db.pool(), &progress).await.unwrap();

        let fetched = get_progress(db.pool(), user.id, progress.flashcard_id)
            .await
            .unwrap()
            .unwrap();
        assert!((fetched.ease_factor - progress.ease_factor).abs() <= 1e-9);
        assert_eq!(fetched.interval_days, 17);
        assert_eq!(fetched.repetitions, 3);
        assert_eq!(fetched.next_review_date, progress.next_review_date);
    }
}
