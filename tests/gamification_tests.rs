use chrono::{Duration, TimeZone, Utc};
use studykit::achievements::{AchievementCatalog, AchievementDef, RequirementKind};
use studykit::models::SubscriptionTier;
use studykit::quests::QuestType;
use studykit::{Clock, Database, GamificationService};

fn clock_at(y: i32, m: u32, d: u32) -> Clock {
    // Noon keeps the time-of-day achievements out of the picture.
    Clock::fixed(Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap())
}

fn service(db: &Database, clock: Clock) -> GamificationService {
    GamificationService::new(db.clone(), AchievementCatalog::default(), clock)
}

fn activity_for(quest_type: QuestType) -> &'static str {
    match quest_type {
        QuestType::CompleteTasks => "tasks_completed",
        QuestType::PomodoroSession => "pomodoro_minutes",
        QuestType::AskAi => "ai_questions_asked",
        QuestType::UploadMaterial => "materials_uploaded",
        QuestType::DailyCheckin => "schedule_views",
        QuestType::CompleteAll => panic!("meta quest has no activity"),
    }
}

#[tokio::test]
async fn unknown_activity_kind_is_rejected() {
    let db = Database::new("sqlite::memory:").await.unwrap();
    let svc = service(&db, clock_at(2025, 3, 10));
    let user = db
        .create_user(SubscriptionTier::Free, Utc::now())
        .await
        .unwrap();

    let err = svc.record_activity(user.id, "jumping_jacks", 1).await.unwrap_err();
    assert_eq!(err.kind(), "invalid_activity_kind");

    let err = svc.record_activity(user.id, "tasks_completed", 0).await.unwrap_err();
    assert_eq!(err.kind(), "invalid_argument");
}

#[tokio::test]
async fn missing_user_is_not_found() {
    let db = Database::new("sqlite::memory:").await.unwrap();
    let svc = service(&db, clock_at(2025, 3, 10));
    let err = svc
        .record_activity(uuid::Uuid::new_v4(), "tasks_completed", 1)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "not_found");
}

#[tokio::test]
async fn first_activity_awards_xp_and_starts_streak() {
    let db = Database::new("sqlite::memory:").await.unwrap();
    let svc = service(&db, clock_at(2025, 3, 10));
    let user = db
        .create_user(SubscriptionTier::Free, Utc::now())
        .await
        .unwrap();

    let outcome = svc.record_activity(user.id, "tasks_completed", 1).await.unwrap();
    assert_eq!(outcome.activity_xp, 15);
    assert_eq!(outcome.current_streak, 1);
    // One task does not finish any quest, so the only extra XP is the
    // first-login achievement.
    assert_eq!(outcome.quest_xp, 0);
    assert_eq!(outcome.unlocked_achievements, vec!["first_steps".to_string()]);
    assert_eq!(outcome.achievement_xp, 10);
    assert_eq!(outcome.total_xp, 25);
    assert_eq!(outcome.level, 1);

    let stored = db.get_user(user.id).await.unwrap().unwrap();
    assert_eq!(stored.xp_total, outcome.total_xp);
    assert_eq!(stored.level, outcome.level);
}

#[tokio::test]
async fn consecutive_days_extend_streak_and_gaps_reset() {
    let db = Database::new("sqlite::memory:").await.unwrap();
    let user = db
        .create_user(SubscriptionTier::Free, Utc::now())
        .await
        .unwrap();

    let day1 = service(&db, clock_at(2025, 3, 10));
    let day2 = service(&db, clock_at(2025, 3, 11));
    let day5 = service(&db, clock_at(2025, 3, 14));

    assert_eq!(
        day1.record_activity(user.id, "tasks_completed", 1).await.unwrap().current_streak,
        1
    );
    assert_eq!(
        day2.record_activity(user.id, "tasks_completed", 1).await.unwrap().current_streak,
        2
    );
    // Second activity on the same day changes nothing.
    assert_eq!(
        day2.record_activity(user.id, "pomodoro_minutes", 25).await.unwrap().current_streak,
        2
    );

    let streak = db.get_streak(user.id).await.unwrap().unwrap();
    assert_eq!(streak.total_active_days, 2);

    // Two missed days reset the run but not the record.
    let after_gap = day5.record_activity(user.id, "tasks_completed", 1).await.unwrap();
    assert_eq!(after_gap.current_streak, 1);
    let streak = db.get_streak(user.id).await.unwrap().unwrap();
    assert_eq!(streak.longest_streak, 2);
    assert_eq!(streak.total_active_days, 3);
}

#[tokio::test]
async fn three_day_streak_unlocks_achievement() {
    let db = Database::new("sqlite::memory:").await.unwrap();
    let user = db
        .create_user(SubscriptionTier::Free, Utc::now())
        .await
        .unwrap();

    for day in 10..12 {
        let svc = service(&db, clock_at(2025, 3, day));
        svc.record_activity(user.id, "schedule_views", 1).await.unwrap();
    }
    let outcome = service(&db, clock_at(2025, 3, 12))
        .record_activity(user.id, "schedule_views", 1)
        .await
        .unwrap();

    assert_eq!(outcome.current_streak, 3);
    assert!(outcome.unlocked_achievements.contains(&"streak_3".to_string()));
}

#[tokio::test]
async fn achievements_unlock_once() {
    let db = Database::new("sqlite::memory:").await.unwrap();
    let svc = service(&db, clock_at(2025, 3, 10));
    let user = db
        .create_user(SubscriptionTier::Free, Utc::now())
        .await
        .unwrap();

    let first = svc.record_activity(user.id, "tasks_completed", 1).await.unwrap();
    assert!(first.unlocked_achievements.contains(&"first_steps".to_string()));

    let second = svc.record_activity(user.id, "tasks_completed", 1).await.unwrap();
    assert!(second.unlocked_achievements.is_empty());
    assert_eq!(second.achievement_xp, 0);
}

#[tokio::test]
async fn achievement_xp_can_cascade_into_a_level_unlock() {
    let defs = vec![
        AchievementDef {
            code: "grinder".to_string(),
            title: "Grinder".to_string(),
            description: "Finish a task".to_string(),
            icon: "⚒".to_string(),
            category: "tasks".to_string(),
            xp_reward: 2000,
            requirement_type: RequirementKind::TasksCompleted,
            requirement_value: 1,
            sort_order: 1,
        },
        AchievementDef {
            code: "ascended".to_string(),
            title: "Ascended".to_string(),
            description: "Reach level 7".to_string(),
            icon: "🌄".to_string(),
            category: "level".to_string(),
            xp_reward: 25,
            requirement_type: RequirementKind::LevelReached,
            requirement_value: 7,
            sort_order: 2,
        },
    ];
    let db = Database::new("sqlite::memory:").await.unwrap();
    let svc = GamificationService::new(
        db.clone(),
        AchievementCatalog::new(defs).unwrap(),
        clock_at(2025, 3, 10),
    );
    let user = db
        .create_user(SubscriptionTier::Free, Utc::now())
        .await
        .unwrap();

    let outcome = svc.record_activity(user.id, "tasks_completed", 1).await.unwrap();

    // Pass one grants the task achievement; its XP lifts the user to
    // level 7, which pass two then rewards. No third pass runs.
    assert_eq!(
        outcome.unlocked_achievements,
        vec!["grinder".to_string(), "ascended".to_string()]
    );
    assert_eq!(outcome.achievement_xp, 2025);
    assert_eq!(outcome.total_xp, 2040);
    assert_eq!(outcome.level, 7);
}

#[tokio::test]
async fn daily_quest_draw_is_stable_and_sized_by_tier() {
    let db = Database::new("sqlite::memory:").await.unwrap();
    let svc = service(&db, clock_at(2025, 3, 10));
    let free = db
        .create_user(SubscriptionTier::Free, Utc::now())
        .await
        .unwrap();
    let premium = db
        .create_user(SubscriptionTier::Premium, Utc::now())
        .await
        .unwrap();

    let first = svc.daily_quests(free.id).await.unwrap();
    let second = svc.daily_quests(free.id).await.unwrap();
    assert_eq!(first.len(), 3);
    assert_eq!(
        first.iter().map(|q| q.id).collect::<Vec<_>>(),
        second.iter().map(|q| q.id).collect::<Vec<_>>()
    );

    let quests = svc.daily_quests(premium.id).await.unwrap();
    assert_eq!(quests.len(), 6);
    assert_eq!(quests.iter().filter(|q| q.quest_type.is_meta()).count(), 1);
}

#[tokio::test]
async fn quest_completes_when_target_is_reached() {
    let db = Database::new("sqlite::memory:").await.unwrap();
    let svc = service(&db, clock_at(2025, 3, 10));
    let user = db
        .create_user(SubscriptionTier::Free, Utc::now())
        .await
        .unwrap();

    let quests = svc.daily_quests(user.id).await.unwrap();
    let quest = &quests[0];
    let kind = activity_for(quest.quest_type);

    let outcome = svc
        .record_activity(user.id, kind, quest.target_value)
        .await
        .unwrap();
    assert!(outcome.completed_quests.contains(&quest.quest_type));
    assert!(outcome.quest_xp >= quest.xp_reward);

    let refreshed = svc.daily_quests(user.id).await.unwrap();
    let done = refreshed.iter().find(|q| q.id == quest.id).unwrap();
    assert!(done.is_completed);
    assert_eq!(done.current_value, done.target_value);
    assert!(done.completed_at.is_some());

    // Further activity of the same kind never reopens or over-fills it.
    svc.record_activity(user.id, kind, 100).await.unwrap();
    let again = svc.daily_quests(user.id).await.unwrap();
    let done = again.iter().find(|q| q.id == quest.id).unwrap();
    assert_eq!(done.current_value, done.target_value);
}

#[tokio::test]
async fn exam_and_review_activity_do_not_advance_quests() {
    let db = Database::new("sqlite::memory:").await.unwrap();
    let svc = service(&db, clock_at(2025, 3, 10));
    let user = db
        .create_user(SubscriptionTier::Free, Utc::now())
        .await
        .unwrap();

    let before = svc.daily_quests(user.id).await.unwrap();
    let outcome = svc.record_activity(user.id, "exam_tasks_done", 5).await.unwrap();
    assert!(outcome.completed_quests.is_empty());
    assert_eq!(outcome.quest_xp, 0);

    let after = svc.daily_quests(user.id).await.unwrap();
    for (b, a) in before.iter().zip(after.iter()) {
        assert_eq!(b.current_value, a.current_value);
    }
}

#[tokio::test]
async fn premium_meta_quest_pays_after_all_regular_quests() {
    let db = Database::new("sqlite::memory:").await.unwrap();
    let svc = service(&db, clock_at(2025, 3, 10));
    let user = db
        .create_user(SubscriptionTier::Premium, Utc::now())
        .await
        .unwrap();

    let quests = svc.daily_quests(user.id).await.unwrap();
    let regular: Vec<_> = quests.iter().filter(|q| !q.quest_type.is_meta()).collect();
    assert_eq!(regular.len(), 5);

    let mut last = None;
    for quest in &regular {
        let outcome = svc
            .record_activity(user.id, activity_for(quest.quest_type), quest.target_value)
            .await
            .unwrap();
        last = Some(outcome);
    }

    let last = last.unwrap();
    assert!(last.completed_quests.contains(&QuestType::CompleteAll));

    let refreshed = svc.daily_quests(user.id).await.unwrap();
    assert!(refreshed.iter().all(|q| q.is_completed));
}

#[tokio::test]
async fn streak_reward_claims_pay_once() {
    let db = Database::new("sqlite::memory:").await.unwrap();
    let user = db
        .create_user(SubscriptionTier::Free, Utc::now())
        .await
        .unwrap();

    for day in 10..=12 {
        let svc = service(&db, clock_at(2025, 3, day));
        svc.record_activity(user.id, "schedule_views", 1).await.unwrap();
    }
    let svc = service(&db, clock_at(2025, 3, 12));

    // 3-day milestone pays one premium day.
    let claim = svc.claim_streak_reward(user.id, 3).await.unwrap();
    assert_eq!(claim.reward_type, "premium_days");
    assert_eq!(claim.reward_value, 1);

    let upgraded = db.get_user(user.id).await.unwrap().unwrap();
    assert_eq!(upgraded.subscription_type, SubscriptionTier::Premium);
    let expires = upgraded.subscription_expires_at.unwrap();
    assert_eq!(expires, claim.claimed_at + Duration::days(1));

    let err = svc.claim_streak_reward(user.id, 3).await.unwrap_err();
    assert_eq!(err.kind(), "already_claimed");

    // No reward defined for 4 days; 7 days not reached yet.
    assert_eq!(svc.claim_streak_reward(user.id, 4).await.unwrap_err().kind(), "invalid_argument");
    assert_eq!(svc.claim_streak_reward(user.id, 7).await.unwrap_err().kind(), "invalid_argument");
}

#[tokio::test]
async fn seven_day_claim_grants_bonus_questions() {
    let db = Database::new("sqlite::memory:").await.unwrap();
    let user = db
        .create_user(SubscriptionTier::Free, Utc::now())
        .await
        .unwrap();

    for day in 10..=16 {
        let svc = service(&db, clock_at(2025, 3, day));
        svc.record_activity(user.id, "schedule_views", 1).await.unwrap();
    }

    let svc = service(&db, clock_at(2025, 3, 16));
    let claim = svc.claim_streak_reward(user.id, 7).await.unwrap();
    assert_eq!(claim.reward_type, "bonus_questions");
    assert_eq!(claim.reward_value, 10);

    let user = db.get_user(user.id).await.unwrap().unwrap();
    assert_eq!(user.bonus_questions, 10);
}

#[tokio::test]
async fn streak_freezes_are_premium_only_and_rate_limited() {
    let db = Database::new("sqlite::memory:").await.unwrap();
    let free = db
        .create_user(SubscriptionTier::Free, Utc::now())
        .await
        .unwrap();
    let premium = db
        .create_user(SubscriptionTier::Premium, Utc::now())
        .await
        .unwrap();

    // 2025-03-10 is a Monday.
    let monday = service(&db, clock_at(2025, 3, 10));
    assert_eq!(monday.use_streak_freeze(free.id).await.unwrap_err().kind(), "not_premium");

    monday.use_streak_freeze(premium.id).await.unwrap();
    assert_eq!(
        monday.use_streak_freeze(premium.id).await.unwrap_err().kind(),
        "already_used_today"
    );

    let wednesday = service(&db, clock_at(2025, 3, 12));
    assert_eq!(
        wednesday.use_streak_freeze(premium.id).await.unwrap_err().kind(),
        "weekly_quota_exhausted"
    );

    // A new ISO week opens a new quota.
    let next_monday = service(&db, clock_at(2025, 3, 17));
    next_monday.use_streak_freeze(premium.id).await.unwrap();
}

#[tokio::test]
async fn freeze_bridges_a_missed_day() {
    let db = Database::new("sqlite::memory:").await.unwrap();
    let user = db
        .create_user(SubscriptionTier::Premium, Utc::now())
        .await
        .unwrap();

    service(&db, clock_at(2025, 3, 9))
        .record_activity(user.id, "tasks_completed", 1)
        .await
        .unwrap();
    service(&db, clock_at(2025, 3, 10))
        .use_streak_freeze(user.id)
        .await
        .unwrap();
    let outcome = service(&db, clock_at(2025, 3, 11))
        .record_activity(user.id, "tasks_completed", 1)
        .await
        .unwrap();

    // Without the freeze the Tuesday activity would restart at 1.
    assert_eq!(outcome.current_streak, 2);
}

#[tokio::test]
async fn summary_reflects_the_day() {
    let db = Database::new("sqlite::memory:").await.unwrap();
    let svc = service(&db, clock_at(2025, 3, 10));
    let user = db
        .create_user(SubscriptionTier::Free, Utc::now())
        .await
        .unwrap();

    svc.record_activity(user.id, "tasks_completed", 2).await.unwrap();
    svc.record_activity(user.id, "pomodoro_minutes", 25).await.unwrap();

    let summary = svc.summary(user.id).await.unwrap();
    assert_eq!(summary.user_id, user.id);
    assert_eq!(summary.streak.current_streak, 1);
    assert_eq!(summary.quests.len(), 3);
    assert!(summary.unlocked_achievements.contains(&"first_steps".to_string()));

    let today = summary.today.unwrap();
    assert_eq!(today.tasks_completed, 2);
    assert_eq!(today.pomodoro_minutes, 25);
    assert_eq!(summary.totals.tasks_completed, 2);

    let stored = db.get_user(user.id).await.unwrap().unwrap();
    assert_eq!(summary.xp_total, stored.xp_total);
    assert_eq!(summary.level, stored.level);
}
