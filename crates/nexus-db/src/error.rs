use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

/// Failures surfaced by the stores. Everything except `Storage` is the
/// caller's fault and safe to show to them.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("entrepreneur not found")]
    TargetNotFound,

    #[error("request already sent")]
    DuplicateRequest,

    #[error("email already registered")]
    EmailTaken,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("storage failure: {0}")]
    Storage(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(err.into())
    }
}

/// True when `err` is a UNIQUE constraint violation.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}
