use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{collection} record {id} not found")]
    NotFound { collection: &'static str, id: i64 },
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
    #[error("schema upgrade to version {version} failed: {source}")]
    Migration {
        version: u32,
        #[source]
        source: sqlx::Error,
    },
    #[error("database schema version {found} is newer than supported version {supported}")]
    SchemaTooNew { found: u32, supported: u32 },
    #[error("invalid {collection} record {id}: {reason}")]
    InvalidRecord {
        collection: &'static str,
        id: i64,
        reason: String,
    },
    #[error(transparent)]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation()
                || db_err.is_check_violation()
                || db_err.is_foreign_key_violation()
            {
                return StoreError::ConstraintViolation(db_err.message().to_string());
            }
        }
        StoreError::Database(err)
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
