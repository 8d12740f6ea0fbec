use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::clock::Clock;
use crate::database::{self, Database};
use crate::errors::{CoreError, CoreResult};
use crate::llm_provider::{JsonResponseParser, LlmProvider};
use crate::models::*;

pub const CARDS_PER_SET: usize = 10;
pub const MAX_MATERIAL_CHARS: usize = 6_000;

const SYSTEM_PROMPT: &str = "You are a study assistant that writes flashcards. \
Respond with JSON only, no commentary.";

/// One card as the model is asked to emit it. Difficulty and topics are
/// optional so a sloppy reply still yields usable cards.
#[derive(Debug, Deserialize)]
struct RawCard {
    #[serde(default)]
    question: String,
    #[serde(default)]
    answer: String,
    #[serde(default)]
    difficulty: Option<String>,
    #[serde(default)]
    topics: Vec<String>,
}

/// Turns study-material text into a persisted flashcard set via the LLM.
#[derive(Clone)]
pub struct CardGenerator {
    db: Database,
    provider: LlmProvider,
    clock: Clock,
}

impl CardGenerator {
    pub fn new(db: Database, provider: LlmProvider, clock: Clock) -> Self {
        Self { db, provider, clock }
    }

    /// Generate a set of up to ten cards from the given materials and
    /// persist set, cards and initial progress rows in one transaction.
    /// The cached card count is written last so it always matches the
    /// children that actually landed.
    pub async fn generate_set(
        &self,
        user_id: Uuid,
        materials: &[MaterialInput],
    ) -> CoreResult<(FlashcardSet, Vec<Flashcard>)> {
        if materials.is_empty() {
            return Err(CoreError::invalid("at least one material is required"));
        }

        let user = self
            .db
            .get_user(user_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("user {user_id}")))?;

        let subject = choose_subject(materials);
        let aggregated = aggregate_text(materials);

        let prompt = build_prompt(&subject, &aggregated);
        let response = self
            .provider
            .complete("generate_cards", Some(SYSTEM_PROMPT), &prompt)
            .await?;
        let cards = parse_cards(&response)?;

        let material_ids = materials.iter().map(|m| m.id).collect();
        self.persist_set(user.id, subject, material_ids, cards).await
    }

    /// Write set, cards and initial progress rows in one transaction.
    /// The cached card count goes last so it always matches the children
    /// that actually landed.
    async fn persist_set(
        &self,
        user_id: Uuid,
        subject: String,
        material_ids: Vec<Uuid>,
        cards: Vec<RawCard>,
    ) -> CoreResult<(FlashcardSet, Vec<Flashcard>)> {
        let now = self.clock.now();
        let today = self.clock.today();

        let set = FlashcardSet {
            id: Uuid::new_v4(),
            user_id,
            subject,
            material_ids,
            total_cards: 0,
            created_at: now,
        };

        let mut tx = self.db.begin().await?;
        database::insert_set(&mut *tx, &set).await?;

        let mut persisted = Vec::with_capacity(cards.len());
        for raw in cards {
            let card = Flashcard {
                id: Uuid::new_v4(),
                set_id: set.id,
                question: raw.question,
                answer: raw.answer,
                difficulty: raw
                    .difficulty
                    .as_deref()
                    .map(Difficulty::parse_lenient)
                    .unwrap_or(Difficulty::Medium),
                topics: raw.topics,
                created_at: now,
            };
            database::insert_card(&mut *tx, &card).await?;
            database::upsert_progress(
                &mut *tx,
                &FlashcardProgress {
                    user_id,
                    flashcard_id: card.id,
                    ease_factor: crate::sm2_scheduler::INITIAL_EASE,
                    interval_days: 0,
                    repetitions: 0,
                    next_review_date: today,
                    last_reviewed_at: None,
                },
            )
            .await?;
            persisted.push(card);
        }

        let total = persisted.len() as i64;
        database::update_set_card_count(&mut *tx, set.id, total).await?;
        tx.commit().await?;

        let set = FlashcardSet {
            total_cards: total,
            ..set
        };
        Ok((set, persisted))
    }
}

/// First non-empty material subject, or a generic fallback.
fn choose_subject(materials: &[MaterialInput]) -> String {
    materials
        .iter()
        .find_map(|m| m.subject.as_deref().map(str::trim).filter(|s| !s.is_empty()))
        .unwrap_or("General")
        .to_string()
}

fn aggregate_text(materials: &[MaterialInput]) -> String {
    let mut combined = String::new();
    for material in materials {
        if combined.len() >= MAX_MATERIAL_CHARS {
            break;
        }
        if !combined.is_empty() {
            combined.push_str("\n\n");
        }
        combined.push_str(material.text.trim());
    }
    if combined.len() > MAX_MATERIAL_CHARS {
        // Truncate on a char boundary.
        let mut cut = MAX_MATERIAL_CHARS;
        while !combined.is_char_boundary(cut) {
            cut -= 1;
        }
        combined.truncate(cut);
    }
    combined
}

fn build_prompt(subject: &str, text: &str) -> String {
    format!(
        "Create exactly {CARDS_PER_SET} flashcards about \"{subject}\" from the study material below.\n\
         Return a JSON array of exactly {CARDS_PER_SET} objects with fields \
         \"question\", \"answer\", \"difficulty\" (easy, medium or hard) and optional \"topics\".\n\n\
         Study material:\n{text}"
    )
}

/// Parse the model reply into at most ten usable cards. Non-array replies
/// fail outright; entries missing question or answer are dropped.
fn parse_cards(response: &str) -> CoreResult<Vec<RawCard>> {
    let value: Value = JsonResponseParser::parse(response)?;
    let Value::Array(items) = value else {
        return Err(CoreError::BadAiOutput(
            "expected a JSON array of cards".to_string(),
        ));
    };

    let mut cards = Vec::new();
    for item in items {
        let Ok(card) = serde_json::from_value::<RawCard>(item) else {
            continue;
        };
        if card.question.trim().is_empty() || card.answer.trim().is_empty() {
            continue;
        }
        cards.push(card);
        if cards.len() == CARDS_PER_SET {
            break;
        }
    }

    if cards.is_empty() {
        return Err(CoreError::BadAiOutput(
            "no usable cards in response".to_string(),
        ));
    }
    Ok(cards)
}
