use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::env;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::flashcard_service::DEFAULT_REVIEW_QUEUE_LIMIT;
use crate::log_system_event;

pub const DEFAULT_LLM_TIMEOUT_SECONDS: u64 = 25;

/// Complete core configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub logging: LoggingConfig,
    pub achievements_seed_path: Option<String>,
    /// Cap on one due-queue fetch.
    pub review_queue_limit: i64,
    /// Fixed "now" for tests; RFC 3339.
    pub clock_now_override: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub schema: Option<String>,
}

/// Outbound OpenAI-compatible endpoint configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file_enabled: bool,
    pub console_enabled: bool,
    pub log_directory: String,
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        log_system_event!(config, "Loading core configuration from environment");

        let config = Config {
            database: DatabaseConfig::from_env()?,
            llm: LlmConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
            achievements_seed_path: env::var("ACHIEVEMENTS_SEED_PATH").ok(),
            review_queue_limit: parse_review_queue_limit()?,
            clock_now_override: parse_clock_override()?,
        };

        log_system_event!(config, "Configuration loaded successfully");
        config.log_configuration_summary();

        Ok(config)
    }

    /// Clock the services should run on.
    pub fn clock(&self) -> Clock {
        match self.clock_now_override {
            Some(at) => Clock::fixed(at),
            None => Clock::default(),
        }
    }

    fn log_configuration_summary(&self) {
        info!(
            database_url_masked = %mask_sensitive_data(&self.database.url),
            database_schema = ?self.database.schema,
            llm_endpoint = %self.llm.endpoint,
            llm_model = %self.llm.model,
            llm_timeout_seconds = self.llm.timeout_seconds,
            achievements_seed_path = ?self.achievements_seed_path,
            review_queue_limit = self.review_queue_limit,
            clock_fixed = self.clock_now_override.is_some(),
            log_level = %self.logging.level,
            "Configuration summary"
        );
    }

    pub fn validate(&self) -> Result<()> {
        if !self.database.url.contains("sqlite:") && !self.database.url.contains("postgres://") {
            return Err(anyhow!(
                "DATABASE_URL must start with 'sqlite:' or 'postgres://'"
            ));
        }

        if self.llm.timeout_seconds == 0 {
            return Err(anyhow!("LLM_TIMEOUT_SECONDS must be greater than 0"));
        }

        if self.review_queue_limit <= 0 {
            return Err(anyhow!("REVIEW_QUEUE_LIMIT must be greater than 0"));
        }

        if self.llm.api_key.is_empty() || self.llm.api_key == "your-api-key" {
            warn!("LLM API key appears to be placeholder or empty - card generation may not work");
        }

        if !["trace", "debug", "info", "warn", "error"]
            .contains(&self.logging.level.to_lowercase().as_str())
        {
            warn!(
                "Invalid log level '{}', using 'info' as fallback",
                self.logging.level
            );
        }

        Ok(())
    }
}

fn parse_review_queue_limit() -> Result<i64> {
    match env::var("REVIEW_QUEUE_LIMIT") {
        Ok(raw) => raw.parse::<i64>().map_err(|_| {
            anyhow!("Invalid REVIEW_QUEUE_LIMIT value: '{}'. Must be a number", raw)
        }),
        Err(_) => Ok(DEFAULT_REVIEW_QUEUE_LIMIT),
    }
}

fn parse_clock_override() -> Result<Option<DateTime<Utc>>> {
    match env::var("CLOCK_NOW_OVERRIDE") {
        Ok(raw) => {
            let parsed = DateTime::parse_from_rfc3339(&raw)
                .map_err(|e| anyhow!("Invalid CLOCK_NOW_OVERRIDE '{}': {}", raw, e))?;
            Ok(Some(parsed.with_timezone(&Utc)))
        }
        Err(_) => Ok(None),
    }
}

impl DatabaseConfig {
    fn from_env() -> Result<Self> {
        let url = env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:studykit.db".to_string());
        let schema = env::var("DATABASE_SCHEMA").ok();
        Ok(DatabaseConfig { url, schema })
    }
}

impl LlmConfig {
    fn from_env() -> Result<Self> {
        let endpoint =
            env::var("LLM_ENDPOINT").unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let api_key = env::var("LLM_API_KEY").unwrap_or_else(|_| "your-api-key".to_string());
        let model = env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());

        let timeout_seconds = match env::var("LLM_TIMEOUT_SECONDS") {
            Ok(raw) => raw.parse::<u64>().map_err(|_| {
                anyhow!("Invalid LLM_TIMEOUT_SECONDS value: '{}'. Must be a number", raw)
            })?,
            Err(_) => DEFAULT_LLM_TIMEOUT_SECONDS,
        };

        Ok(LlmConfig {
            endpoint,
            api_key,
            model,
            timeout_seconds,
        })
    }
}

impl LoggingConfig {
    fn from_env() -> Result<Self> {
        let level = env::var("RUST_LOG").unwrap_or_else(|_| "info,studykit=debug".to_string());

        let file_enabled = env::var("LOG_FILE_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse::<bool>()
            .unwrap_or(true);

        let console_enabled = env::var("LOG_CONSOLE_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse::<bool>()
            .unwrap_or(true);

        let log_directory = env::var("LOG_DIRECTORY").unwrap_or_else(|_| "logs".to_string());

        Ok(LoggingConfig {
            level,
            file_enabled,
            console_enabled,
            log_directory,
        })
    }
}

/// Mask sensitive data in configuration for safe logging.
fn mask_sensitive_data(data: &str) -> String {
    if data.len() <= 8 {
        "*".repeat(data.len())
    } else {
        format!("{}***{}", &data[..4], &data[data.len() - 4..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_sensitive_data() {
        assert_eq!(mask_sensitive_data("short"), "*****");
        assert_eq!(mask_sensitive_data("sqlite:studykit.db"), "sqli***t.db");
        assert_eq!(mask_sensitive_data("sk-1234567890abcdef"), "sk-1***cdef");
    }

    #[test]
    fn test_config_validation() {
        let config = Config {
            database: DatabaseConfig {
                url: "sqlite:test.db".to_string(),
                schema: None,
            },
            llm: LlmConfig {
                endpoint: "https://api.openai.com/v1".to_string(),
                api_key: "sk-valid-key".to_string(),
                model: "gpt-4o-mini".to_string(),
                timeout_seconds: 25,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file_enabled: true,
                console_enabled: true,
                log_directory: "logs".to_string(),
            },
            achievements_seed_path: None,
            review_queue_limit: DEFAULT_REVIEW_QUEUE_LIMIT,
            clock_now_override: None,
        };

        assert!(config.validate().is_ok());

        let mut bad_db = config.clone();
        bad_db.database.url = "mysql://nope".to_string();
        assert!(bad_db.validate().is_err());

        let mut bad_timeout = config.clone();
        bad_timeout.llm.timeout_seconds = 0;
        assert!(bad_timeout.validate().is_err());

        let mut bad_queue = config.clone();
        bad_queue.review_queue_limit = 0;
        assert!(bad_queue.validate().is_err());
    }

    #[test]
    fn test_clock_override_builds_fixed_clock() {
        let at = DateTime::parse_from_rfc3339("2025-03-11T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let config = Config {
            database: DatabaseConfig {
                url: "sqlite::memory:".to_string(),
                schema: None,
            },
            llm: LlmConfig {
                endpoint: "https://api.openai.com/v1".to_string(),
                api_key: "k".to_string(),
                model: "m".to_string(),
                timeout_seconds: 25,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file_enabled: false,
                console_enabled: true,
                log_directory: "logs".to_string(),
            },
            achievements_seed_path: None,
            review_queue_limit: DEFAULT_REVIEW_QUEUE_LIMIT,
            clock_now_override: Some(at),
        };

        let clock = config.clock();
        assert!(clock.is_fixed());
        assert_eq!(clock.now(), at);
    }
}
