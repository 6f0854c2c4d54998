//! Users: the people who create and subscribe to things.

use serde::{Deserialize, Serialize};

/// Auto-incrementing numeric identity of a [`User`].
pub type UserId = u32;

/// A person who can create or subscribe to things. `name` and `email` are
/// both unique across users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub id:    UserId,
  pub name:  String,
  pub email: String,
}
