//! `GET /things/listen`: a server-sent event stream of newly created things.

use std::convert::Infallible;

use axum::{
  extract::State,
  response::sse::{Event, KeepAlive, Sse},
};
use futures::{Stream, stream};
use tt_core::store::ThingStore;

use crate::AppState;

/// Register a listener for the lifetime of the connection. The stream ends
/// when the broadcaster shuts down; a client disconnect drops the listener,
/// which unregisters it.
pub async fn handler<S>(
  State(state): State<AppState<S>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
  S: ThingStore + Clone + 'static,
{
  let listener = state.broadcaster.register();

  let events = stream::unfold(listener, |mut listener| async move {
    let event = listener.recv().await?;
    Some((Ok::<_, Infallible>(event.to_event()), listener))
  });

  Sse::new(events).keep_alive(KeepAlive::default())
}
