use thiserror::Error;

/// Failure modes of one table migration. Nothing here is retried
/// automatically; rows flushed by earlier chunks stay committed in the
/// target, so re-running a partially failed job is not idempotent unless the
/// target enforces uniqueness.
#[derive(Debug, Error)]
pub enum MigrateError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("source query failed: {0}")]
    SourceQuery(String),

    #[error("source read failed at row {row_index}: {message}")]
    SourceRead { row_index: u64, message: String },

    #[error("target write failed: {0}")]
    TargetWrite(String),

    /// Caller-requested stop, distinct from an operational failure.
    #[error("migration cancelled")]
    Cancelled,
}

impl MigrateError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, MigrateError::Cancelled)
    }
}
