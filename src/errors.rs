use tracing::warn;

/// Error surface of the core. The surrounding web layer maps `kind()` codes
/// onto HTTP statuses; the core never sees HTTP.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid activity kind: {0}")]
    InvalidActivityKind(String),

    #[error("AI returned unusable output: {0}")]
    BadAiOutput(String),

    #[error("streak reward for {milestone} days already claimed")]
    AlreadyClaimed { milestone: i32 },

    #[error("streak freeze already used today")]
    AlreadyUsedToday,

    #[error("streak freeze weekly quota exhausted")]
    WeeklyQuotaExhausted,

    #[error("premium subscription required")]
    NotPremium,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("upstream service unavailable: {0}")]
    Unavailable(String),

    #[error("database error: {0}")]
    Database(sqlx::Error),

    #[error("internal error: {0}")]
    Internal(anyhow::Error),
}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        if is_unique_violation(&err) {
            CoreError::Conflict(err.to_string())
        } else {
            CoreError::Database(err)
        }
    }
}

impl From<anyhow::Error> for CoreError {
    fn from(err: anyhow::Error) -> Self {
        // Database helpers return anyhow; unwrap their sqlx root so a lost
        // unique-key race still reports as a conflict, not an internal error.
        match err.downcast::<sqlx::Error>() {
            Ok(db_err) => CoreError::from(db_err),
            Err(other) => CoreError::Internal(other),
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Stable machine-readable code per variant.
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::NotFound(_) => "not_found",
            CoreError::Forbidden(_) => "forbidden",
            CoreError::InvalidArgument(_) => "invalid_argument",
            CoreError::InvalidActivityKind(_) => "invalid_activity_kind",
            CoreError::BadAiOutput(_) => "bad_ai_output",
            CoreError::AlreadyClaimed { .. } => "already_claimed",
            CoreError::AlreadyUsedToday => "already_used_today",
            CoreError::WeeklyQuotaExhausted => "weekly_quota_exhausted",
            CoreError::NotPremium => "not_premium",
            CoreError::Conflict(_) => "conflict",
            CoreError::Unavailable(_) => "unavailable",
            CoreError::Database(_) | CoreError::Internal(_) => "internal",
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        CoreError::NotFound(what.into())
    }

    pub fn invalid(what: impl Into<String>) -> Self {
        CoreError::InvalidArgument(what.into())
    }
}

/// True if the error is a unique-constraint violation. Idempotent grants
/// (achievement unlocks, freeze logs, reward claims) absorb these instead
/// of failing.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = db_err.message().to_lowercase();
            db_err.code().as_deref() == Some("2067")
                || db_err.code().as_deref() == Some("1555")
                || db_err.code().as_deref() == Some("23505")
                || msg.contains("unique constraint")
        }
        _ => false,
    }
}

/// Run an insert whose unique key makes it idempotent: `Ok(true)` if the row
/// was inserted, `Ok(false)` if it already existed.
pub fn absorb_unique_violation(
    result: Result<sqlx::sqlite::SqliteQueryResult, sqlx::Error>,
    context: &str,
) -> Result<bool, sqlx::Error> {
    match result {
        Ok(_) => Ok(true),
        Err(err) if is_unique_violation(&err) => {
            warn!(context = context, "duplicate insert absorbed");
            Ok(false)
        }
        Err(err) => Err(err),
    }
}
