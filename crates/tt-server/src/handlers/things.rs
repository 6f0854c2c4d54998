//! Handlers for `/things` endpoints.
//!
//! | Method   | Path           | Notes |
//! |----------|----------------|-------|
//! | `GET`    | `/things`      | `?sort=&dir=&type=&page=&per_page=`; HTML rows |
//! | `POST`   | `/things`      | Form or JSON body; replies with the new row and pushes it to listeners |
//! | `DELETE` | `/things/{id}` | Also drops the thing's subscriptions |

use axum::{
  Form,
  Json,
  extract::{FromRequest, Path, Query, Request, State},
  http::{HeaderValue, StatusCode, header},
  response::{Html, IntoResponse, Response},
};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::warn;
use tt_core::{
  Error as CoreError,
  query::ListParams,
  store::ThingStore,
  thing::{NewThing, ThingId, ThingsType},
  user::UserId,
};

use super::LAST_PAGE_HEADER;
use crate::{AppState, error::ApiError, render};

// ─── List ─────────────────────────────────────────────────────────────────────

/// Raw query string. Everything arrives as text so that bad values reach
/// the translator instead of failing extraction.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListQuery {
  pub sort:     String,
  pub dir:      String,
  #[serde(rename = "type")]
  pub kind:     String,
  pub page:     String,
  pub per_page: String,
}

impl From<ListQuery> for ListParams {
  fn from(q: ListQuery) -> Self {
    Self {
      filter_on_type:  q.kind,
      order_by:        q.sort,
      order_direction: q.dir,
      page:            count(&q.page),
      things_per_page: count(&q.per_page),
    }
  }
}

/// Non-numeric counts disable pagination rather than failing the request.
fn count(s: &str) -> i64 { s.trim().parse().unwrap_or(0) }

/// `GET /things`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  Query(q): Query<ListQuery>,
) -> Result<Response, ApiError>
where
  S: ThingStore + Clone + 'static,
{
  let query = ListParams::from(q).translate()?;
  let result = state.store.get_things(&query).await.map_err(ApiError::store)?;

  let mut response = Html(render::thing_rows(&result.things)).into_response();
  if query.page.is_some() {
    response
      .headers_mut()
      .insert(LAST_PAGE_HEADER, HeaderValue::from(result.last_page));
  }
  Ok(response)
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// Submitted fields of a new thing, all as text.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateBody {
  pub address:     String,
  #[serde(rename = "type")]
  pub kind:        String,
  pub description: String,
  pub reason:      String,
  /// `YYYY-MM-DD`
  pub remove:      String,
  pub creator:     String,
}

impl CreateBody {
  fn into_new_thing(self) -> Result<NewThing, ApiError> {
    let kind = ThingsType::parse(self.kind.trim())?;

    let remove = self.remove.trim();
    if remove.is_empty() {
      return Err(CoreError::MissingField("remove").into());
    }
    let remove = NaiveDate::parse_from_str(remove, "%Y-%m-%d").map_err(|_| {
      ApiError::BadRequest(format!("invalid remove date {remove:?}, expected YYYY-MM-DD"))
    })?;

    let creator = self.creator.trim();
    if creator.is_empty() {
      return Err(CoreError::MissingField("creator").into());
    }
    let creator = creator
      .parse::<UserId>()
      .map_err(|_| ApiError::BadRequest(format!("invalid creator id {creator:?}")))?;

    let input = NewThing {
      address: self.address,
      kind,
      description: self.description,
      reason: self.reason,
      remove,
      creator,
    };
    input.validate()?;
    Ok(input)
  }
}

/// Accepts [`CreateBody`] as either `application/json` or a URL-encoded
/// form, picked by `Content-Type`.
pub struct CreateInput(pub CreateBody);

impl<St> FromRequest<St> for CreateInput
where
  St: Send + Sync,
{
  type Rejection = Response;

  async fn from_request(req: Request, state: &St) -> Result<Self, Self::Rejection> {
    let is_json = req
      .headers()
      .get(header::CONTENT_TYPE)
      .and_then(|v| v.to_str().ok())
      .is_some_and(|ct| ct.starts_with("application/json"));

    if is_json {
      let Json(body) = Json::<CreateBody>::from_request(req, state)
        .await
        .map_err(IntoResponse::into_response)?;
      Ok(Self(body))
    } else {
      let Form(body) = Form::<CreateBody>::from_request(req, state)
        .await
        .map_err(IntoResponse::into_response)?;
      Ok(Self(body))
    }
  }
}

/// `POST /things`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  CreateInput(body): CreateInput,
) -> Result<Html<String>, ApiError>
where
  S: ThingStore + Clone + 'static,
{
  let input = body.into_new_thing()?;
  let thing = state.store.create_thing(input).await.map_err(ApiError::store)?;
  let row = render::thing_row(&thing);

  // The thing is committed; a shut-down broadcaster only costs the push.
  if let Err(e) = state.publisher.publish(render::SseEvent::new_thing(&row)).await {
    warn!(thing = thing.id, error = %e, "new thing not pushed to listeners");
  }

  Ok(Html(row))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /things/{id}`
pub async fn delete<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<ThingId>,
) -> Result<StatusCode, ApiError>
where
  S: ThingStore + Clone + 'static,
{
  state.store.delete_thing(id).await.map_err(ApiError::store)?;
  Ok(StatusCode::OK)
}
