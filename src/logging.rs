//! Standardized logging macros plus subscriber setup for host binaries.
//!
//! The macros pin field names so log queries stay consistent across the
//! gamification and flashcard pipelines.

use anyhow::Result;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;

/// Log activity-ledger events with consistent fields.
#[macro_export]
macro_rules! log_activity {
    (recorded, user_id = $user_id:expr, kind = $kind:expr, delta = $delta:expr, xp = $xp:expr) => {
        tracing::info!(
            component = "gamification",
            user_id = %$user_id,
            activity_kind = $kind,
            delta = $delta,
            xp_awarded = $xp,
            "Activity recorded"
        );
    };
    (rejected, user_id = $user_id:expr, kind = $kind:expr) => {
        tracing::warn!(
            component = "gamification",
            user_id = %$user_id,
            activity_kind = %$kind,
            "Activity rejected: unknown kind"
        );
    };
}

/// Log daily-quest generation and progress.
#[macro_export]
macro_rules! log_quest {
    (generated, user_id = $user_id:expr, date = $date:expr, count = $count:expr) => {
        tracing::info!(
            component = "quests",
            user_id = %$user_id,
            quest_date = %$date,
            quest_count = $count,
            "Daily quests generated"
        );
    };
    (completed, user_id = $user_id:expr, quest_type = $quest_type:expr, xp = $xp:expr) => {
        tracing::info!(
            component = "quests",
            user_id = %$user_id,
            quest_type = $quest_type,
            xp_awarded = $xp,
            "Quest completed"
        );
    };
}

/// Log achievement unlocks.
#[macro_export]
macro_rules! log_achievement {
    (unlocked, user_id = $user_id:expr, code = $code:expr, xp = $xp:expr) => {
        tracing::info!(
            component = "achievements",
            user_id = %$user_id,
            achievement_code = %$code,
            xp_awarded = $xp,
            "Achievement unlocked"
        );
    };
}

/// Log LLM calls with provider context.
#[macro_export]
macro_rules! log_llm_operation {
    (start, $operation:expr, model = $model:expr, prompt_length = $len:expr) => {
        tracing::info!(
            component = "llm",
            operation = $operation,
            model = %$model,
            prompt_length = $len,
            "LLM request started"
        );
    };
    (success, $operation:expr, response_length = $len:expr) => {
        tracing::info!(
            component = "llm",
            operation = $operation,
            response_length = $len,
            "LLM request completed"
        );
    };
    (error, $operation:expr, error = $error:expr) => {
        tracing::error!(
            component = "llm",
            operation = $operation,
            error = %$error,
            "LLM request failed"
        );
    };
}

/// Log database operations.
#[macro_export]
macro_rules! log_db_operation {
    (info, $operation:expr, $msg:expr) => {
        tracing::info!(
            component = "database",
            operation = $operation,
            "Database operation: {}",
            $msg
        );
    };
    (error, $operation:expr, error = $error:expr) => {
        tracing::error!(
            component = "database",
            operation = $operation,
            error = %$error,
            "Database operation failed"
        );
    };
}

/// Log startup/shutdown/configuration events.
#[macro_export]
macro_rules! log_system_event {
    (startup, component = $component:expr, $msg:expr) => {
        tracing::info!(
            event_type = "startup",
            component = $component,
            "System event: {}",
            $msg
        );
    };
    (config, $msg:expr) => {
        tracing::info!(event_type = "configuration", "System event: {}", $msg);
    };
}

/// Install console + daily-rolling file logging. The returned guard must be
/// held for the process lifetime or buffered file output is lost.
pub fn setup_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

    let registry = tracing_subscriber::registry().with(env_filter);

    let mut guard = None;
    if config.file_enabled {
        std::fs::create_dir_all(&config.log_directory)?;
        let file_appender = tracing_appender::rolling::daily(&config.log_directory, "studykit.log");
        let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);
        guard = Some(file_guard);

        if config.console_enabled {
            registry
                .with(tracing_subscriber::fmt::layer().with_target(true))
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_target(true)
                        .with_ansi(false)
                        .with_writer(non_blocking_file),
                )
                .init();
        } else {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_target(true)
                        .with_ansi(false)
                        .with_writer(non_blocking_file),
                )
                .init();
        }
    } else if config.console_enabled {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init();
    } else {
        registry.init();
    }

    info!(
        log_directory = %config.log_directory,
        file_enabled = config.file_enabled,
        "Logging initialized"
    );

    Ok(guard)
}
