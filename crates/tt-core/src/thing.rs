//! Things: the temporary resources tracked for eventual removal.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::{Error, Result, user::UserId};

/// Auto-incrementing numeric identity of a [`Thing`].
pub type ThingId = u32;

// ─── ThingsType ──────────────────────────────────────────────────────────────

/// The closed set of resource kinds a thing can be.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  AsRefStr,
  Display,
  EnumIter,
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ThingsType {
  Dir,
  File,
  Irods,
  Openstack,
  S3,
}

impl ThingsType {
  /// Parse an exact, case-sensitive type name.
  pub fn parse(s: &str) -> Result<Self> {
    Self::from_str(s).map_err(|_| Error::BadThingsType(s.to_owned()))
  }

  /// Parse a type filter, where a blank string means "no filter".
  pub fn parse_filter(s: &str) -> Result<Option<Self>> {
    if s.is_empty() {
      return Ok(None);
    }
    Self::parse(s).map(Some)
  }
}

// ─── Thing ───────────────────────────────────────────────────────────────────

/// A tracked temporary resource with a scheduled removal date.
///
/// `warned1`, `warned2` and `removed` are maintained by cleanup jobs and
/// start out unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thing {
  pub id:          ThingId,
  pub address:     String,
  #[serde(rename = "type")]
  pub kind:        ThingsType,
  pub created:     DateTime<Utc>,
  pub description: String,
  pub reason:      String,
  pub remove:      NaiveDate,
  pub warned1:     Option<DateTime<Utc>>,
  pub warned2:     Option<DateTime<Utc>>,
  pub removed:     bool,
}

/// Input for creating a thing. The store assigns `id` and `created`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewThing {
  pub address:     String,
  #[serde(rename = "type")]
  pub kind:        ThingsType,
  #[serde(default)]
  pub description: String,
  pub reason:      String,
  pub remove:      NaiveDate,
  /// Must reference an existing user; becomes the first subscriber.
  pub creator:     UserId,
}

impl NewThing {
  /// Reject blank required text fields.
  pub fn validate(&self) -> Result<()> {
    if self.address.trim().is_empty() {
      return Err(Error::MissingField("address"));
    }
    if self.reason.trim().is_empty() {
      return Err(Error::MissingField("reason"));
    }
    Ok(())
  }
}

// ─── Subscriber ──────────────────────────────────────────────────────────────

/// Links a user to a thing they want to hear about. Exactly one subscriber
/// per thing has `creator == true`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriber {
  pub user_id:  UserId,
  pub thing_id: ThingId,
  pub creator:  bool,
}

/// Which of the two removal warnings has been sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Warning {
  First,
  Second,
}
