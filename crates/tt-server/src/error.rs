//! HTTP error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{debug, error};

/// An error returned by a handler.
#[derive(Debug, Error)]
pub enum ApiError {
  /// Input that failed to parse before reaching the store.
  #[error("bad request: {0}")]
  BadRequest(String),

  #[error(transparent)]
  Core(#[from] tt_core::Error),
}

impl ApiError {
  /// Lift a store's own error type into the shared taxonomy.
  pub fn store<E: Into<tt_core::Error>>(e: E) -> Self { Self::Core(e.into()) }

  pub fn status(&self) -> StatusCode {
    match self {
      Self::BadRequest(_) => StatusCode::BAD_REQUEST,
      Self::Core(e) if e.is_conflict() => StatusCode::CONFLICT,
      Self::Core(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
      Self::Core(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      error!(error = %self, "request failed");
    } else {
      debug!(error = %self, %status, "rejected request");
    }
    (status, self.to_string()).into_response()
  }
}

#[cfg(test)]
mod tests {
  use tt_core::Error as CoreError;

  use super::*;

  #[test]
  fn maps_errors_to_statuses() {
    let cases = [
      (ApiError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
      (CoreError::BadOrderBy("x".into()).into(), StatusCode::BAD_REQUEST),
      (CoreError::MissingField("reason").into(), StatusCode::BAD_REQUEST),
      (CoreError::NoSuchUser(3).into(), StatusCode::BAD_REQUEST),
      (CoreError::DuplicateName("a".into()).into(), StatusCode::CONFLICT),
      (CoreError::DuplicateEmail("a".into()).into(), StatusCode::CONFLICT),
      (CoreError::AlreadySubscribed { user: 1, thing: 2 }.into(), StatusCode::CONFLICT),
      (
        CoreError::StoreUnavailable("disk on fire".into()).into(),
        StatusCode::INTERNAL_SERVER_ERROR,
      ),
    ];
    for (error, status) in cases {
      assert_eq!(error.status(), status, "{error}");
    }
  }
}
