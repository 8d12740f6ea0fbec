use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{Sqlite, Transaction};
use uuid::Uuid;

use crate::achievements::{AchievementCatalog, UserSnapshot};
use crate::activity::ActivityKind;
use crate::clock::Clock;
use crate::database::{self, Database};
use crate::errors::{CoreError, CoreResult};
use crate::levels::{level_for_xp, level_progress, LevelProgress};
use crate::models::*;
use crate::quests::{self, QuestType};
use crate::rewards::{reward_for_milestone, RewardKind};
use crate::streak::{advance_on_activity, check_freeze, FreezeDenied};
use crate::{log_achievement, log_activity, log_quest};

/// What a single `record_activity` call changed, reported back to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct RecordOutcome {
    pub activity_xp: i64,
    pub quest_xp: i64,
    pub achievement_xp: i64,
    pub total_xp: i64,
    pub level: i32,
    pub current_streak: i32,
    pub completed_quests: Vec<QuestType>,
    pub unlocked_achievements: Vec<String>,
}

/// Read model for the "my progress" screen.
#[derive(Debug, Clone, Serialize)]
pub struct GamificationSummary {
    pub user_id: Uuid,
    pub xp_total: i64,
    pub level: i32,
    pub level_progress: LevelProgress,
    pub streak: StreakState,
    pub today: Option<ActivityDay>,
    pub totals: ActivityTotals,
    pub quests: Vec<DailyQuest>,
    pub unlocked_achievements: Vec<String>,
}

/// Orchestrates the activity ledger, streaks, quests, achievements and
/// streak rewards. Every mutating operation runs in one transaction, so a
/// crash mid-pipeline never leaves XP granted without its ledger row.
#[derive(Clone)]
pub struct GamificationService {
    db: Database,
    catalog: AchievementCatalog,
    clock: Clock,
}

impl GamificationService {
    pub fn new(db: Database, catalog: AchievementCatalog, clock: Clock) -> Self {
        Self { db, catalog, clock }
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Record `delta` units of an activity and run the full pipeline:
    /// ledger upsert, streak advance, quest progress, achievement passes,
    /// then a single XP/level write-back on the user row.
    pub async fn record_activity(
        &self,
        user_id: Uuid,
        kind: &str,
        delta: i64,
    ) -> CoreResult<RecordOutcome> {
        let mut tx = self.db.begin().await?;
        let outcome = self.record_activity_in(&mut tx, user_id, kind, delta).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    /// Pipeline body for callers that bundle the activity with writes of
    /// their own (the review flow commits the schedule update and its XP in
    /// one transaction). The caller owns the commit.
    pub(crate) async fn record_activity_in(
        &self,
        tx: &mut Transaction<'static, Sqlite>,
        user_id: Uuid,
        kind: &str,
        delta: i64,
    ) -> CoreResult<RecordOutcome> {
        let Some(kind) = ActivityKind::parse(kind) else {
            log_activity!(rejected, user_id = user_id, kind = kind);
            return Err(CoreError::InvalidActivityKind(kind.to_string()));
        };
        if delta <= 0 {
            return Err(CoreError::invalid("activity delta must be positive"));
        }

        let now = self.clock.now();
        let today = self.clock.today();

        let user = database::get_user(&mut **tx, user_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("user {user_id}")))?;
        let tier = user.effective_tier(now);

        let activity_xp = delta * kind.xp_per_unit();
        database::upsert_activity(&mut **tx, user_id, today, kind, delta, activity_xp).await?;
        log_activity!(
            recorded,
            user_id = user_id,
            kind = kind.as_str(),
            delta = delta,
            xp = activity_xp
        );

        // Streak advances on the first activity of the day, whatever kind.
        let streak_before = database::get_streak(&mut **tx, user_id)
            .await?
            .unwrap_or_else(|| StreakState::new(user_id));
        let advance = advance_on_activity(&streak_before, today);
        let streak = StreakState {
            current_streak: advance.current_streak,
            longest_streak: advance.longest_streak,
            last_activity_date: Some(today),
            total_active_days: advance.total_active_days,
            ..streak_before
        };
        database::upsert_streak(&mut **tx, &streak).await?;

        let (quest_xp, completed_quests) =
            self.advance_quests(tx, user_id, today, tier, kind, delta, now).await?;

        let mut xp_total = user.xp_total + activity_xp + quest_xp;
        let mut level = level_for_xp(xp_total);

        // Achievement XP can push the level over a threshold that itself
        // unlocks a level achievement, so evaluate twice and stop there.
        let mut achievement_xp = 0;
        let mut unlocked_achievements = Vec::new();
        let mut unlocked = database::get_unlocked_codes(&mut **tx, user_id).await?;
        for _pass in 0..2 {
            let totals = database::aggregate_activity(&mut **tx, user_id).await?;
            let snapshot = UserSnapshot {
                longest_streak: streak.longest_streak,
                level,
                referral_count: user.referral_count,
                totals,
            };
            let mut pass_xp = 0;
            for def in self.catalog.defs() {
                if unlocked.iter().any(|c| c == &def.code) {
                    continue;
                }
                if !def.is_satisfied(&snapshot, now.time()) {
                    continue;
                }
                if database::try_insert_achievement(&mut **tx, user_id, &def.code, now).await? {
                    log_achievement!(unlocked, user_id = user_id, code = def.code, xp = def.xp_reward);
                    pass_xp += def.xp_reward;
                    unlocked.push(def.code.clone());
                    unlocked_achievements.push(def.code.clone());
                }
            }
            if pass_xp == 0 {
                break;
            }
            achievement_xp += pass_xp;
            xp_total += pass_xp;
            level = level_for_xp(xp_total);
        }

        database::update_user_xp(&mut **tx, user_id, xp_total, level).await?;

        Ok(RecordOutcome {
            activity_xp,
            quest_xp,
            achievement_xp,
            total_xp: xp_total,
            level,
            current_streak: streak.current_streak,
            completed_quests,
            unlocked_achievements,
        })
    }

    /// Today's quest list, drawing it first if this is the first touch of
    /// the user-day. Safe to call repeatedly.
    pub async fn daily_quests(&self, user_id: Uuid) -> CoreResult<Vec<DailyQuest>> {
        let now = self.clock.now();
        let today = self.clock.today();
        let mut tx = self.db.begin().await?;
        let user = database::get_user(&mut *tx, user_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("user {user_id}")))?;
        let quests = ensure_quests(&mut tx, user_id, today, user.effective_tier(now)).await?;
        tx.commit().await?;
        Ok(quests)
    }

    /// Consume a streak freeze for today. Premium only, at most one per
    /// calendar day and one per ISO week. The freeze marks today as covered
    /// so tomorrow's activity extends the streak instead of resetting it.
    pub async fn use_streak_freeze(&self, user_id: Uuid) -> CoreResult<StreakState> {
        let now = self.clock.now();
        let today = self.clock.today();
        let mut tx = self.db.begin().await?;

        let user = database::get_user(&mut *tx, user_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("user {user_id}")))?;

        let freezes = database::get_freeze_dates(&mut *tx, user_id).await?;
        check_freeze(user.is_premium(now), today, &freezes).map_err(|denied| match denied {
            FreezeDenied::NotPremium => CoreError::NotPremium,
            FreezeDenied::AlreadyUsedToday => CoreError::AlreadyUsedToday,
            FreezeDenied::WeeklyQuotaExhausted => CoreError::WeeklyQuotaExhausted,
        })?;

        // The log row is the authoritative guard under concurrency.
        if !database::try_insert_freeze(&mut *tx, user_id, today).await? {
            return Err(CoreError::AlreadyUsedToday);
        }

        let mut streak = database::get_streak(&mut *tx, user_id)
            .await?
            .unwrap_or_else(|| StreakState::new(user_id));
        streak.last_activity_date = Some(today);
        streak.streak_freeze_available = (streak.streak_freeze_available - 1).max(0);
        database::upsert_streak(&mut *tx, &streak).await?;

        tx.commit().await?;
        Ok(streak)
    }

    /// Claim the reward for a streak milestone. Each milestone pays out at
    /// most once per user, guarded by the claims table primary key.
    pub async fn claim_streak_reward(
        &self,
        user_id: Uuid,
        streak_days: i32,
    ) -> CoreResult<StreakRewardClaim> {
        let reward = reward_for_milestone(streak_days)
            .ok_or_else(|| CoreError::invalid(format!("no reward at {streak_days} days")))?;

        let now = self.clock.now();
        let mut tx = self.db.begin().await?;

        let user = database::get_user(&mut *tx, user_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("user {user_id}")))?;

        let streak = database::get_streak(&mut *tx, user_id)
            .await?
            .unwrap_or_else(|| StreakState::new(user_id));
        if streak.current_streak < streak_days && streak.longest_streak < streak_days {
            return Err(CoreError::invalid(format!(
                "streak has not reached {streak_days} days"
            )));
        }

        let claim = StreakRewardClaim {
            user_id,
            streak_days,
            reward_type: reward.kind.as_str().to_string(),
            reward_value: reward.value,
            claimed_at: now,
        };
        if !database::try_insert_claim(&mut *tx, &claim).await? {
            return Err(CoreError::AlreadyClaimed {
                milestone: streak_days,
            });
        }

        match reward.kind {
            RewardKind::BonusQuestions => {
                database::add_bonus_questions(&mut *tx, user_id, reward.value).await?;
            }
            RewardKind::PremiumDays => {
                // Extend from the later of now and the current expiry.
                let base = user
                    .subscription_expires_at
                    .filter(|at| *at > now)
                    .unwrap_or(now);
                let expires = base + Duration::days(reward.value);
                database::set_subscription(&mut *tx, user_id, SubscriptionTier::Premium, Some(expires))
                    .await?;
            }
        }

        tx.commit().await?;
        Ok(claim)
    }

    pub async fn aggregate_activity(&self, user_id: Uuid) -> CoreResult<ActivityTotals> {
        Ok(self.db.aggregate_activity(user_id).await?)
    }

    pub async fn summary(&self, user_id: Uuid) -> CoreResult<GamificationSummary> {
        let today = self.clock.today();

        let user = self
            .db
            .get_user(user_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("user {user_id}")))?;
        let streak = self
            .db
            .get_streak(user_id)
            .await?
            .unwrap_or_else(|| StreakState::new(user_id));
        let today_row = self.db.get_activity_day(user_id, today).await?;
        let totals = self.db.aggregate_activity(user_id).await?;
        let quests = self.daily_quests(user_id).await?;
        let unlocked = self.db.get_unlocked_codes(user_id).await?;

        Ok(GamificationSummary {
            user_id,
            xp_total: user.xp_total,
            level: user.level,
            level_progress: level_progress(user.xp_total),
            streak,
            today: today_row,
            totals,
            quests,
            unlocked_achievements: unlocked,
        })
    }

    async fn advance_quests(
        &self,
        tx: &mut Transaction<'static, Sqlite>,
        user_id: Uuid,
        today: NaiveDate,
        tier: SubscriptionTier,
        kind: ActivityKind,
        delta: i64,
        now: DateTime<Utc>,
    ) -> CoreResult<(i64, Vec<QuestType>)> {
        let mut quests = ensure_quests(tx, user_id, today, tier).await?;

        let mut quest_xp = 0;
        let mut completed = Vec::new();

        if let Some(quest_type) = quests::quest_type_for_activity(kind) {
            if let Some(quest) = quests
                .iter_mut()
                .find(|q| q.quest_type == quest_type && !q.is_completed)
            {
                quest.current_value = (quest.current_value + delta).min(quest.target_value);
                if quest.current_value >= quest.target_value {
                    quest.is_completed = true;
                    quest.completed_at = Some(now);
                    quest_xp += quest.xp_reward;
                    completed.push(quest.quest_type);
                    log_quest!(
                        completed,
                        user_id = user_id,
                        quest_type = quest.quest_type.as_str(),
                        xp = quest.xp_reward
                    );
                }
                database::update_quest_progress(
                    &mut **tx,
                    quest.id,
                    quest.current_value,
                    quest.is_completed,
                    quest.completed_at,
                )
                .await?;
            }
        }

        // Premium meta-quest pays once all regular quests are done.
        let regular_done = quests
            .iter()
            .filter(|q| !q.quest_type.is_meta())
            .all(|q| q.is_completed);
        if regular_done {
            if let Some(meta) = quests
                .iter_mut()
                .find(|q| q.quest_type.is_meta() && !q.is_completed)
            {
                meta.current_value = meta.target_value;
                meta.is_completed = true;
                meta.completed_at = Some(now);
                quest_xp += meta.xp_reward;
                completed.push(meta.quest_type);
                log_quest!(
                    completed,
                    user_id = user_id,
                    quest_type = meta.quest_type.as_str(),
                    xp = meta.xp_reward
                );
                database::update_quest_progress(
                    &mut **tx,
                    meta.id,
                    meta.current_value,
                    true,
                    meta.completed_at,
                )
                .await?;
            }
        }

        Ok((quest_xp, completed))
    }
}

/// Load today's quests, drawing and persisting them if none exist yet.
/// The draw is deterministic per (user, date, tier), so a concurrent caller
/// racing past the emptiness check would insert identical rows and lose on
/// the unique key.
async fn ensure_quests(
    tx: &mut Transaction<'static, Sqlite>,
    user_id: Uuid,
    today: NaiveDate,
    tier: SubscriptionTier,
) -> CoreResult<Vec<DailyQuest>> {
    let existing = database::get_daily_quests(&mut **tx, user_id, today).await?;
    if !existing.is_empty() {
        return Ok(existing);
    }

    let drawn = quests::generate_daily_quests(user_id, today, tier);
    for generated in &drawn {
        let quest = DailyQuest {
            id: Uuid::new_v4(),
            user_id,
            quest_date: today,
            quest_type: generated.quest_type,
            quest_title: generated.title.clone(),
            target_value: generated.target_value,
            current_value: 0,
            xp_reward: generated.xp_reward,
            is_completed: false,
            completed_at: None,
            is_premium_only: generated.is_premium_only,
        };
        database::insert_quest(&mut **tx, &quest).await?;
    }
    log_quest!(generated, user_id = user_id, date = today, count = drawn.len());

    Ok(database::get_daily_quests(&mut **tx, user_id, today).await?)
}
