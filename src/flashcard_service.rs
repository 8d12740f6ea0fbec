use serde::Serialize;
use uuid::Uuid;

use crate::clock::Clock;
use crate::database::{self, Database};
use crate::errors::{CoreError, CoreResult};
use crate::gamification::GamificationService;
use crate::models::*;
use crate::sm2_scheduler::{Quality, Sm2Scheduler, Sm2State};

/// Cap on how many due cards one queue fetch returns unless overridden.
pub const DEFAULT_REVIEW_QUEUE_LIMIT: i64 = 50;

/// A due card paired with its scheduling state.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewItem {
    pub card: Flashcard,
    pub progress: FlashcardProgress,
}

/// What a completed review did to the card's schedule.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewOutcome {
    pub progress: FlashcardProgress,
    pub xp_awarded: i64,
}

/// Flashcard CRUD and the SM-2 review flow. Every mutation checks set
/// ownership; a foreign or missing set surfaces as not found rather than
/// leaking its existence.
#[derive(Clone)]
pub struct FlashcardService {
    db: Database,
    scheduler: Sm2Scheduler,
    gamification: GamificationService,
    clock: Clock,
    queue_limit: i64,
}

impl FlashcardService {
    pub fn new(db: Database, gamification: GamificationService, clock: Clock) -> Self {
        Self {
            db,
            scheduler: Sm2Scheduler::new(),
            gamification,
            clock,
            queue_limit: DEFAULT_REVIEW_QUEUE_LIMIT,
        }
    }

    /// Override the due-queue cap. Values below one are clamped to one.
    pub fn with_queue_limit(mut self, limit: i64) -> Self {
        self.queue_limit = limit.max(1);
        self
    }

    pub async fn create_set(
        &self,
        user_id: Uuid,
        subject: &str,
        material_ids: Vec<Uuid>,
    ) -> CoreResult<FlashcardSet> {
        if subject.trim().is_empty() {
            return Err(CoreError::invalid("subject must not be empty"));
        }
        let set = FlashcardSet {
            id: Uuid::new_v4(),
            user_id,
            subject: subject.trim().to_string(),
            material_ids,
            total_cards: 0,
            created_at: self.clock.now(),
        };
        database::insert_set(self.db.pool(), &set).await?;
        Ok(set)
    }

    /// Add a hand-written card to a set. The owner gets an initial progress
    /// row due today, same as generated cards.
    pub async fn add_card(
        &self,
        user_id: Uuid,
        set_id: Uuid,
        question: &str,
        answer: &str,
        difficulty: Difficulty,
        topics: Vec<String>,
    ) -> CoreResult<Flashcard> {
        if question.trim().is_empty() || answer.trim().is_empty() {
            return Err(CoreError::invalid("question and answer must not be empty"));
        }
        let set = self.owned_set(user_id, set_id).await?;

        let card = Flashcard {
            id: Uuid::new_v4(),
            set_id: set.id,
            question: question.trim().to_string(),
            answer: answer.trim().to_string(),
            difficulty,
            topics,
            created_at: self.clock.now(),
        };

        let mut tx = self.db.begin().await?;
        database::insert_card(&mut *tx, &card).await?;
        database::upsert_progress(
            &mut *tx,
            &FlashcardProgress {
                user_id,
                flashcard_id: card.id,
                ease_factor: crate::sm2_scheduler::INITIAL_EASE,
                interval_days: 0,
                repetitions: 0,
                next_review_date: self.clock.today(),
                last_reviewed_at: None,
            },
        )
        .await?;
        database::update_set_card_count(&mut *tx, set.id, set.total_cards + 1).await?;
        tx.commit().await?;

        Ok(card)
    }

    pub async fn list_sets(&self, user_id: Uuid) -> CoreResult<Vec<FlashcardSet>> {
        Ok(database::list_sets(self.db.pool(), user_id).await?)
    }

    pub async fn get_set(&self, user_id: Uuid, set_id: Uuid) -> CoreResult<FlashcardSet> {
        self.owned_set(user_id, set_id).await
    }

    pub async fn list_cards(&self, user_id: Uuid, set_id: Uuid) -> CoreResult<Vec<Flashcard>> {
        self.owned_set(user_id, set_id).await?;
        Ok(database::list_cards(self.db.pool(), set_id).await?)
    }

    /// Delete a set, its cards and their progress rows in one transaction.
    pub async fn delete_set(&self, user_id: Uuid, set_id: Uuid) -> CoreResult<()> {
        self.owned_set(user_id, set_id).await?;
        let mut tx = self.db.begin().await?;
        database::delete_set_cascade(&mut tx, set_id).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Cards due today or earlier, oldest first.
    pub async fn review_queue(&self, user_id: Uuid) -> CoreResult<Vec<ReviewItem>> {
        let today = self.clock.today();
        let due = database::due_cards(self.db.pool(), user_id, today, self.queue_limit).await?;
        Ok(due
            .into_iter()
            .map(|(card, progress)| ReviewItem { card, progress })
            .collect())
    }

    /// Grade a card review and advance its SM-2 schedule. Also feeds a
    /// `flashcard_reviewed` activity into the gamification pipeline, so XP,
    /// streak and quest progress stay uniform across event sources. The
    /// schedule update and the activity commit together; if XP recording
    /// fails the card keeps its previous schedule.
    pub async fn review_card(
        &self,
        user_id: Uuid,
        flashcard_id: Uuid,
        quality: i64,
    ) -> CoreResult<ReviewOutcome> {
        let quality = Quality::from_int(quality)
            .ok_or_else(|| CoreError::invalid("quality must be between 0 and 5"))?;

        let now = self.clock.now();
        let today = self.clock.today();

        let (_, owner) = database::get_card_with_owner(self.db.pool(), flashcard_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("flashcard {flashcard_id}")))?;
        if owner != user_id {
            return Err(CoreError::not_found(format!("flashcard {flashcard_id}")));
        }

        let existing = database::get_progress(self.db.pool(), user_id, flashcard_id).await?;
        let state = existing
            .as_ref()
            .map(|p| Sm2State {
                ease_factor: p.ease_factor,
                interval_days: p.interval_days,
                repetitions: p.repetitions,
            })
            .unwrap_or_default();

        let outcome = self.scheduler.review(&state, quality, today);
        let progress = FlashcardProgress {
            user_id,
            flashcard_id,
            ease_factor: outcome.state.ease_factor,
            interval_days: outcome.state.interval_days,
            repetitions: outcome.state.repetitions,
            next_review_date: outcome.next_review_date,
            last_reviewed_at: Some(now),
        };
        let mut tx = self.db.begin().await?;
        database::upsert_progress(&mut *tx, &progress).await?;
        let record = self
            .gamification
            .record_activity_in(&mut tx, user_id, "flashcard_reviewed", 1)
            .await?;
        tx.commit().await?;

        Ok(ReviewOutcome {
            progress,
            xp_awarded: record.activity_xp + record.quest_xp + record.achievement_xp,
        })
    }

    async fn owned_set(&self, user_id: Uuid, set_id: Uuid) -> CoreResult<FlashcardSet> {
        let set = database::get_set(self.db.pool(), set_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("flashcard set {set_id}")))?;
        if set.user_id != user_id {
            return Err(CoreError::not_found(format!("flashcard set {set_id}")));
        }
        Ok(set)
    }
}
