use thiserror::Error;

#[cfg(test)]
pub mod memory;

/// Store-neutral failure kinds, shared by the Postgres repos and the
/// in-memory store used by tests.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("data store unavailable: {0}")]
    Unavailable(String),

    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    #[error("referenced row does not exist")]
    ForeignKeyViolation,

    #[error("data store error: {0}")]
    Other(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

// Postgres SQLSTATE codes
const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::WorkerCrashed => StoreError::Unavailable(e.to_string()),
            sqlx::Error::Database(ref db) => match db.code().as_deref() {
                Some(UNIQUE_VIOLATION) => StoreError::UniqueViolation {
                    constraint: db.constraint().unwrap_or_default().to_string(),
                },
                Some(FOREIGN_KEY_VIOLATION) => StoreError::ForeignKeyViolation,
                _ => StoreError::Other(e.to_string()),
            },
            other => StoreError::Other(other.to_string()),
        }
    }
}
