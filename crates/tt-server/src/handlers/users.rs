//! Handlers for `/users` endpoints.
//!
//! | Method   | Path          | Notes |
//! |----------|---------------|-------|
//! | `POST`   | `/users`      | Body: `{"name":"alice","email":"alice@example.com"}`; 409 on duplicates |
//! | `DELETE` | `/users/{id}` | Also drops the user's subscriptions |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use tt_core::{Error as CoreError, store::ThingStore, user::UserId};

use crate::{AppState, error::ApiError};

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  #[serde(default)]
  pub name:  String,
  #[serde(default)]
  pub email: String,
}

/// `POST /users`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ThingStore + Clone + 'static,
{
  let name = body.name.trim();
  let email = body.email.trim();
  if name.is_empty() {
    return Err(CoreError::MissingField("name").into());
  }
  if email.is_empty() {
    return Err(CoreError::MissingField("email").into());
  }

  let user = state
    .store
    .create_user(name.to_owned(), email.to_owned())
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(user)))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /users/{id}`
pub async fn delete<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<UserId>,
) -> Result<StatusCode, ApiError>
where
  S: ThingStore + Clone + 'static,
{
  state.store.delete_user(id).await.map_err(ApiError::store)?;
  Ok(StatusCode::OK)
}
