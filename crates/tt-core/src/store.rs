//! The `ThingStore` trait.
//!
//! Implemented by storage backends (e.g. `tt-store-sqlite`). The web layer
//! depends on this abstraction, never on a concrete backend.

use std::future::Future;

use crate::{
  query::{GetThingsResult, ThingsQuery},
  thing::{NewThing, Thing, ThingId},
  user::{User, UserId},
};

/// Record store for users, things and subscribers.
///
/// Backend errors convert into [`crate::Error`], which is how callers tell
/// input problems apart from store failures.
pub trait ThingStore: Send + Sync {
  type Error: std::error::Error + Into<crate::Error> + Send + Sync + 'static;

  /// Create a user. Fails with `DuplicateName` or `DuplicateEmail` when
  /// either is already taken.
  fn create_user(
    &self,
    name: String,
    email: String,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  /// Create a thing and record its creator as its first subscriber, as one
  /// atomic step. `created` is set by the store. Fails with `NoSuchUser` if
  /// `input.creator` does not exist, in which case nothing is persisted.
  fn create_thing(
    &self,
    input: NewThing,
  ) -> impl Future<Output = Result<Thing, Self::Error>> + Send + '_;

  /// List things matching `query`, along with the last page number when the
  /// query is paginated.
  fn get_things<'a>(
    &'a self,
    query: &'a ThingsQuery,
  ) -> impl Future<Output = Result<GetThingsResult, Self::Error>> + Send + 'a;

  /// Delete a user and their subscriptions. Things they created are kept.
  fn delete_user(
    &self,
    id: UserId,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Delete a thing and its subscriptions.
  fn delete_thing(
    &self,
    id: ThingId,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Release database handles. Later calls fail.
  fn close(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
