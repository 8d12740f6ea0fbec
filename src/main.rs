use std::path::Path;

use anyhow::Result;
use studykit::achievements::AchievementCatalog;
use studykit::card_generator::CardGenerator;
use studykit::log_system_event;
use studykit::logging::setup_logging;
use studykit::{Config, Database, FlashcardService, GamificationService, LlmProvider};

/// Boots the core against the configured environment: loads and validates
/// configuration, runs migrations, seeds the achievement catalog and wires
/// the services. The host application embeds the same setup; running the
/// binary directly is a deployment smoke check.
#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    let _guard = setup_logging(&config.logging)?;

    config.validate()?;
    log_system_event!(startup, component = "main", "configuration loaded");

    let db = Database::new(&config.database.url).await?;
    log_system_event!(startup, component = "main", "database migrated");

    let catalog = match &config.achievements_seed_path {
        Some(path) => AchievementCatalog::load_from_path(Path::new(path))?,
        None => AchievementCatalog::default(),
    };
    log_system_event!(
        startup,
        component = "main",
        format!("achievement catalog loaded ({} entries)", catalog.len())
    );

    let clock = config.clock();
    let gamification = GamificationService::new(db.clone(), catalog, clock);
    let provider = LlmProvider::new(&config.llm)?;
    let _generator = CardGenerator::new(db.clone(), provider, clock);
    let _flashcards = FlashcardService::new(db, gamification, clock)
        .with_queue_limit(config.review_queue_limit);

    log_system_event!(startup, component = "main", "services ready");
    Ok(())
}
