pub mod achievements;
pub mod activity;
pub mod card_generator;
pub mod clock;
pub mod config;
pub mod database;
pub mod errors;
pub mod flashcard_service;
pub mod gamification;
pub mod levels;
pub mod llm_provider;
pub mod logging;
pub mod models;
pub mod quests;
pub mod rewards;
pub mod sm2_scheduler;
pub mod streak;

pub use achievements::AchievementCatalog;
pub use activity::ActivityKind;
pub use card_generator::CardGenerator;
pub use clock::Clock;
pub use config::Config;
pub use database::Database;
pub use errors::{CoreError, CoreResult};
pub use flashcard_service::FlashcardService;
pub use gamification::{GamificationService, GamificationSummary, RecordOutcome};
pub use llm_provider::{JsonResponseParser, LlmProvider};
pub use models::*;
pub use sm2_scheduler::Sm2Scheduler;
