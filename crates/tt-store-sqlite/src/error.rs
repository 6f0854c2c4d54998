//! Error type for `tt-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A domain-level failure: validation, uniqueness or a dangling reference.
  #[error(transparent)]
  Core(#[from] tt_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("decode error: {0}")]
  Decode(String),
}

impl From<Error> for tt_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::Core(core) => core,
      other => tt_core::Error::StoreUnavailable(Box::new(other)),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The `table.column` named by a UNIQUE constraint failure, if that is what
/// `err` is.
pub(crate) fn unique_violation(err: &tokio_rusqlite::Error) -> Option<&str> {
  match err {
    tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(e, Some(msg)))
      if e.code == rusqlite::ErrorCode::ConstraintViolation =>
    {
      msg.strip_prefix("UNIQUE constraint failed: ")
    }
    _ => None,
  }
}
