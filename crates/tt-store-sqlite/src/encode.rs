//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings, removal dates are `YYYY-MM-DD` (which
//! sorts correctly as text) and thing types are their lowercase names.

use chrono::{DateTime, NaiveDate, Utc};
use tt_core::{
  thing::{Subscriber, Thing, ThingsType},
  user::User,
};

use crate::{Error, Result};

// ─── Ids ─────────────────────────────────────────────────────────────────────

pub fn decode_id(raw: i64) -> Result<u32> {
  u32::try_from(raw).map_err(|_| Error::Decode(format!("row id out of range: {raw}")))
}

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(format!("bad timestamp {s:?}: {e}")))
}

// ─── NaiveDate ───────────────────────────────────────────────────────────────

const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn encode_date(d: NaiveDate) -> String { d.format(DATE_FORMAT).to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, DATE_FORMAT)
    .map_err(|e| Error::Decode(format!("bad date {s:?}: {e}")))
}

// ─── ThingsType ──────────────────────────────────────────────────────────────

pub fn encode_things_type(t: ThingsType) -> &'static str {
  match t {
    ThingsType::Dir => "dir",
    ThingsType::File => "file",
    ThingsType::Irods => "irods",
    ThingsType::Openstack => "openstack",
    ThingsType::S3 => "s3",
  }
}

pub fn decode_things_type(s: &str) -> Result<ThingsType> {
  ThingsType::parse(s).map_err(|_| Error::Decode(format!("unknown things type: {s:?}")))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawThing::from_row`].
pub const THING_COLUMNS: &str =
  "id, address, type, created, description, reason, remove, warned1, warned2, removed";

/// Raw values read directly from a `things` row.
pub struct RawThing {
  pub id:          i64,
  pub address:     String,
  pub kind:        String,
  pub created:     String,
  pub description: String,
  pub reason:      String,
  pub remove:      String,
  pub warned1:     Option<String>,
  pub warned2:     Option<String>,
  pub removed:     bool,
}

impl RawThing {
  /// Read a row selected with [`THING_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:          row.get(0)?,
      address:     row.get(1)?,
      kind:        row.get(2)?,
      created:     row.get(3)?,
      description: row.get(4)?,
      reason:      row.get(5)?,
      remove:      row.get(6)?,
      warned1:     row.get(7)?,
      warned2:     row.get(8)?,
      removed:     row.get(9)?,
    })
  }

  pub fn into_thing(self) -> Result<Thing> {
    Ok(Thing {
      id:          decode_id(self.id)?,
      address:     self.address,
      kind:        decode_things_type(&self.kind)?,
      created:     decode_dt(&self.created)?,
      description: self.description,
      reason:      self.reason,
      remove:      decode_date(&self.remove)?,
      warned1:     self.warned1.as_deref().map(decode_dt).transpose()?,
      warned2:     self.warned2.as_deref().map(decode_dt).transpose()?,
      removed:     self.removed,
    })
  }
}

/// Raw values read directly from a `users` row.
pub struct RawUser {
  pub id:    i64,
  pub name:  String,
  pub email: String,
}

impl RawUser {
  pub fn into_user(self) -> Result<User> {
    Ok(User { id: decode_id(self.id)?, name: self.name, email: self.email })
  }
}

/// Raw values read directly from a `subscribers` row.
pub struct RawSubscriber {
  pub user_id:  i64,
  pub thing_id: i64,
  pub creator:  bool,
}

impl RawSubscriber {
  pub fn into_subscriber(self) -> Result<Subscriber> {
    Ok(Subscriber {
      user_id:  decode_id(self.user_id)?,
      thing_id: decode_id(self.thing_id)?,
      creator:  self.creator,
    })
  }
}
