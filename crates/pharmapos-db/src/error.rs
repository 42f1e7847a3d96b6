//! # Storage Error Types
//!
//! Error types for registry and database operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError (this module) ← Adds context and categorization               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  API layer maps variants onto status codes                             │
//! │                                                                         │
//! │  Callers can tell apart: validation, missing rows, conflicts,          │
//! │  stock shortfalls, connection trouble and post-decrement write         │
//! │  failures (the reconciliation class).                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use pharmapos_core::{CoreError, TenantError, ValidationError};
use thiserror::Error;

/// Storage operation errors.
///
/// These errors wrap sqlx errors and provide additional context
/// for debugging and user feedback.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in the tenant's database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation (duplicate slug, email, invoice id).
    #[error("Conflict on {field}: '{value}' already exists")]
    Conflict { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// A sale line asked for more units than the batch holds.
    ///
    /// Raised from the conditional decrement, never from a read-check-write
    /// cycle, so it is trustworthy under concurrency.
    #[error("Insufficient stock on batch {batch_id}: requested {requested}")]
    InsufficientStock { batch_id: String, requested: i64 },

    /// An entity name was registered twice with different shapes.
    ///
    /// The registry refuses to silently adopt either shape; the process has
    /// two disagreeing definitions and that is a deploy bug.
    #[error("Schema mismatch for entity '{entity}' in tenant '{tenant}'")]
    SchemaMismatch { entity: String, tenant: String },

    /// Opening the tenant database failed.
    ///
    /// The registry caches nothing in this case; the next call retries.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// A write failed after stock was already moved.
    ///
    /// Inside a transaction this is rolled back and harmless. Logged at error
    /// level with the ids involved so a commit-time failure can be reconciled
    /// by hand.
    #[error("Persistence failure after stock movement: {context}")]
    Persistence {
        context: String,
        #[source]
        source: sqlx::Error,
    },

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Transaction could not be started or committed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Configuration error (bad env values, unusable data dir).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Domain error bubbled up from pharmapos-core.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a Conflict error.
    pub fn conflict(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::Conflict {
            field: field.into(),
            value: value.into(),
        }
    }

    /// True for the conflict class (duplicate keys).
    pub fn is_conflict(&self) -> bool {
        matches!(self, DbError::Conflict { .. })
    }

    /// True when the underlying cause is a missing row.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DbError::NotFound { .. })
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // SQLite error messages for constraints:
                // UNIQUE constraint: "UNIQUE constraint failed: <table>.<column>"
                // FK constraint: "FOREIGN KEY constraint failed"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::Conflict {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<ValidationError> for DbError {
    fn from(err: ValidationError) -> Self {
        DbError::Core(CoreError::Validation(err))
    }
}

impl From<TenantError> for DbError {
    fn from(err: TenantError) -> Self {
        DbError::Core(CoreError::Tenant(err))
    }
}

/// Result type for storage operations.
pub type DbResult<T> = Result<T, DbError>;
