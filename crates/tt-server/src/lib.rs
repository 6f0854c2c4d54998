//! HTTP layer for tt.
//!
//! Exposes an axum [`Router`] backed by any [`ThingStore`], plus the
//! [`broadcast`] machinery that pushes newly created things to
//! `GET /things/listen` subscribers as server-sent events.

pub mod broadcast;
pub mod error;
pub mod handlers;
pub mod render;

pub use error::ApiError;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{delete, get, post},
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tt_core::{query::Collation, store::ThingStore};

use broadcast::{Broadcaster, Publisher};
use handlers::{listen, things, users};
use render::SseEvent;

/// Events published but not yet fanned out before publishers wait.
const PUBLISH_QUEUE: usize = 64;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, layered from defaults, `config.toml` and
/// `TT_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
  /// `host:port` to listen on.
  pub url:                   String,
  pub store_path:            PathBuf,
  /// Ordering of text sort keys.
  pub collation:             Collation,
  /// Undelivered events each SSE listener may buffer before the oldest is
  /// dropped.
  pub listener_buffer:       usize,
  /// How long in-flight requests may take to finish on shutdown.
  pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      url:                   "localhost:8000".into(),
      store_path:            "tt.sqlite".into(),
      collation:             Collation::default(),
      listener_buffer:       16,
      shutdown_timeout_secs: 10,
    }
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState<S: ThingStore> {
  pub store:       Arc<S>,
  pub broadcaster: Broadcaster<SseEvent>,
  pub publisher:   Publisher<SseEvent>,
}

impl<S: ThingStore> AppState<S> {
  /// Wrap `store` and start the broadcast processor. Must be called from
  /// within a tokio runtime.
  pub fn new(store: S, config: &ServerConfig) -> Self {
    let broadcaster = Broadcaster::new(config.listener_buffer);
    let publisher = broadcaster.start(PUBLISH_QUEUE);
    Self { store: Arc::new(store), broadcaster, publisher }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the axum [`Router`] for tt.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: ThingStore + Clone + 'static,
{
  Router::new()
    .route("/things", get(things::list::<S>).post(things::create::<S>))
    .route("/things/listen", get(listen::handler::<S>))
    .route("/things/{id}", delete(things::delete::<S>))
    .route("/users", post(users::create::<S>))
    .route("/users/{id}", delete(users::delete::<S>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}
