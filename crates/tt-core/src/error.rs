//! Error taxonomy shared by every layer of tt.

use thiserror::Error;

use crate::{thing::ThingId, user::UserId};

#[derive(Debug, Error)]
pub enum Error {
  // ── Validation ──────────────────────────────────────────────────────────
  #[error("invalid things type: {0:?}")]
  BadThingsType(String),

  #[error("invalid order: {0:?}")]
  BadOrderBy(String),

  #[error("invalid direction: {0:?}")]
  BadOrderDirection(String),

  #[error("missing required field: {0}")]
  MissingField(&'static str),

  // ── Integrity ───────────────────────────────────────────────────────────
  #[error("a user named {0:?} already exists")]
  DuplicateName(String),

  #[error("a user with email {0:?} already exists")]
  DuplicateEmail(String),

  #[error("no user found with id {0}")]
  NoSuchUser(UserId),

  #[error("no thing found with id {0}")]
  NoSuchThing(ThingId),

  #[error("user {user} is already subscribed to thing {thing}")]
  AlreadySubscribed { user: UserId, thing: ThingId },

  // ── Connectivity ────────────────────────────────────────────────────────
  #[error("store unavailable: {0}")]
  StoreUnavailable(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// `true` for errors caused by the caller's input, as opposed to a failure
  /// of the store itself.
  pub fn is_client_error(&self) -> bool {
    !matches!(self, Self::StoreUnavailable(_))
  }

  /// `true` for uniqueness violations.
  pub fn is_conflict(&self) -> bool {
    matches!(
      self,
      Self::DuplicateName(_) | Self::DuplicateEmail(_) | Self::AlreadySubscribed { .. }
    )
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
