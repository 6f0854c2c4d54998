//! [`SqliteStore`], the SQLite implementation of [`ThingStore`].

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{OptionalExtension as _, types::Value};

use tt_core::{
  Error as CoreError,
  query::{Collation, GetThingsResult, ThingsQuery},
  store::ThingStore,
  thing::{NewThing, Subscriber, Thing, ThingId, Warning},
  user::{User, UserId},
};

use crate::{
  encode::{
    RawSubscriber, RawThing, RawUser, THING_COLUMNS, decode_id, encode_date, encode_dt,
    encode_things_type,
  },
  error::unique_violation,
  query::{count_things, select_things},
  schema::SCHEMA,
  Error, Result,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A tt record store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
  collation:       Collation,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, collation: Collation::default() };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, mostly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, collation: Collation::default() };
    store.init_schema().await?;
    Ok(store)
  }

  /// Use `collation` when ordering listings by a text field.
  pub fn with_collation(mut self, collation: Collation) -> Self {
    self.collation = collation;
    self
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run a single-value `UPDATE things ... SET x = ?1 ... WHERE id = ?2`,
  /// failing with `NoSuchThing` when no row matched.
  async fn update_thing(&self, id: ThingId, sql: &'static str, value: Value) -> Result<()> {
    let changed = self
      .conn
      .call(move |conn| Ok(conn.execute(sql, rusqlite::params![value, id])?))
      .await?;

    if changed == 0 {
      return Err(CoreError::NoSuchThing(id).into());
    }
    Ok(())
  }

  // ── Users ─────────────────────────────────────────────────────────────────

  /// Look up a user by their unique name.
  pub async fn user_by_name(&self, name: &str) -> Result<Option<User>> {
    let name = name.to_owned();

    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT id, name, email FROM users WHERE name = ?1",
            rusqlite::params![name],
            |row| {
              Ok(RawUser {
                id:    row.get(0)?,
                name:  row.get(1)?,
                email: row.get(2)?,
              })
            },
          )
          .optional()?)
      })
      .await?;

    raw.map(RawUser::into_user).transpose()
  }

  // ── Things ────────────────────────────────────────────────────────────────

  /// Retrieve a thing by id. Returns `None` if not found.
  pub async fn get_thing(&self, id: ThingId) -> Result<Option<Thing>> {
    let raw: Option<RawThing> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {THING_COLUMNS} FROM things WHERE id = ?1"),
            rusqlite::params![id],
            RawThing::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawThing::into_thing).transpose()
  }

  /// Move the removal date and clear both warnings, so the warning cycle
  /// starts again.
  pub async fn extend_removal(&self, id: ThingId, remove: NaiveDate) -> Result<()> {
    self
      .update_thing(
        id,
        "UPDATE things SET remove = ?1, warned1 = NULL, warned2 = NULL WHERE id = ?2",
        Value::Text(encode_date(remove)),
      )
      .await
  }

  pub async fn update_description(&self, id: ThingId, description: String) -> Result<()> {
    self
      .update_thing(
        id,
        "UPDATE things SET description = ?1 WHERE id = ?2",
        Value::Text(description),
      )
      .await
  }

  /// Record when a removal warning was sent.
  pub async fn record_warning(
    &self,
    id: ThingId,
    warning: Warning,
    at: DateTime<Utc>,
  ) -> Result<()> {
    let sql = match warning {
      Warning::First => "UPDATE things SET warned1 = ?1 WHERE id = ?2",
      Warning::Second => "UPDATE things SET warned2 = ?1 WHERE id = ?2",
    };
    self.update_thing(id, sql, Value::Text(encode_dt(at))).await
  }

  /// Flag a thing as cleaned up. The row is kept.
  pub async fn mark_removed(&self, id: ThingId) -> Result<()> {
    self
      .update_thing(id, "UPDATE things SET removed = ?1 WHERE id = ?2", Value::Integer(1))
      .await
  }

  // ── Subscribers ───────────────────────────────────────────────────────────

  /// Subscribe a user to a thing they did not create.
  pub async fn subscribe(&self, user_id: UserId, thing_id: ThingId) -> Result<Subscriber> {
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let user_exists = tx
          .query_row("SELECT 1 FROM users WHERE id = ?1", rusqlite::params![user_id], |_| Ok(()))
          .optional()?
          .is_some();
        if !user_exists {
          return Ok(Err(CoreError::NoSuchUser(user_id)));
        }

        let thing_exists = tx
          .query_row("SELECT 1 FROM things WHERE id = ?1", rusqlite::params![thing_id], |_| Ok(()))
          .optional()?
          .is_some();
        if !thing_exists {
          return Ok(Err(CoreError::NoSuchThing(thing_id)));
        }

        let already = tx
          .query_row(
            "SELECT 1 FROM subscribers WHERE user_id = ?1 AND thing_id = ?2",
            rusqlite::params![user_id, thing_id],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if already {
          return Ok(Err(CoreError::AlreadySubscribed { user: user_id, thing: thing_id }));
        }

        tx.execute(
          "INSERT INTO subscribers (user_id, thing_id, creator) VALUES (?1, ?2, 0)",
          rusqlite::params![user_id, thing_id],
        )?;
        tx.commit()?;
        Ok(Ok(()))
      })
      .await??;

    Ok(Subscriber { user_id, thing_id, creator: false })
  }

  /// Remove a subscription. Removing one that does not exist is not an
  /// error.
  pub async fn unsubscribe(&self, user_id: UserId, thing_id: ThingId) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM subscribers WHERE user_id = ?1 AND thing_id = ?2",
          rusqlite::params![user_id, thing_id],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Everyone subscribed to `thing_id`, ordered by user id.
  pub async fn subscribers(&self, thing_id: ThingId) -> Result<Vec<Subscriber>> {
    self
      .query_subscribers(
        "SELECT user_id, thing_id, creator FROM subscribers WHERE thing_id = ?1 ORDER BY user_id",
        thing_id,
      )
      .await
  }

  /// Every thing `user_id` is subscribed to, ordered by thing id.
  pub async fn subscriptions(&self, user_id: UserId) -> Result<Vec<Subscriber>> {
    self
      .query_subscribers(
        "SELECT user_id, thing_id, creator FROM subscribers WHERE user_id = ?1 ORDER BY thing_id",
        user_id,
      )
      .await
  }

  async fn query_subscribers(&self, sql: &'static str, id: u32) -> Result<Vec<Subscriber>> {
    let raws: Vec<RawSubscriber> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
          .query_map(rusqlite::params![id], |row| {
            Ok(RawSubscriber {
              user_id:  row.get(0)?,
              thing_id: row.get(1)?,
              creator:  row.get(2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSubscriber::into_subscriber).collect()
  }
}

// ─── ThingStore impl ─────────────────────────────────────────────────────────

impl ThingStore for SqliteStore {
  type Error = Error;

  async fn create_user(&self, name: String, email: String) -> Result<User> {
    let (name_param, email_param) = (name.clone(), email.clone());

    let id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO users (name, email) VALUES (?1, ?2)",
          rusqlite::params![name_param, email_param],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await
      .map_err(|e| {
        let duplicate = match unique_violation(&e) {
          Some("users.name") => Some(CoreError::DuplicateName(name.clone())),
          Some("users.email") => Some(CoreError::DuplicateEmail(email.clone())),
          _ => None,
        };
        duplicate.map_or(Error::Database(e), Error::Core)
      })?;

    Ok(User { id: decode_id(id)?, name, email })
  }

  async fn create_thing(&self, input: NewThing) -> Result<Thing> {
    input.validate()?;

    let created = Utc::now();
    let creator = input.creator;

    let address     = input.address.clone();
    let kind        = encode_things_type(input.kind);
    let created_str = encode_dt(created);
    let description = input.description.clone();
    let reason      = input.reason.clone();
    let remove      = encode_date(input.remove);

    // The creator lookup, thing insert and subscription insert commit
    // together or not at all.
    let id: Option<i64> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let creator_exists = tx
          .query_row("SELECT 1 FROM users WHERE id = ?1", rusqlite::params![creator], |_| Ok(()))
          .optional()?
          .is_some();
        if !creator_exists {
          return Ok(None);
        }

        tx.execute(
          "INSERT INTO things (address, type, created, description, reason, remove)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![address, kind, created_str, description, reason, remove],
        )?;
        let id = tx.last_insert_rowid();

        tx.execute(
          "INSERT INTO subscribers (user_id, thing_id, creator) VALUES (?1, ?2, 1)",
          rusqlite::params![creator, id],
        )?;

        tx.commit()?;
        Ok(Some(id))
      })
      .await?;

    let id = id.ok_or(CoreError::NoSuchUser(creator))?;
    tracing::debug!(id, creator, "created thing");

    Ok(Thing {
      id:          decode_id(id)?,
      address:     input.address,
      kind:        input.kind,
      created,
      description: input.description,
      reason:      input.reason,
      remove:      input.remove,
      warned1:     None,
      warned2:     None,
      removed:     false,
    })
  }

  async fn get_things(&self, query: &ThingsQuery) -> Result<GetThingsResult> {
    let select = select_things(query, self.collation);
    let count = query.page.map(|_| count_things(query));

    let (raws, total): (Vec<RawThing>, Option<i64>) = self
      .conn
      .call(move |conn| {
        // Rows and count come from the same snapshot.
        let tx = conn.transaction()?;

        let rows = {
          let mut stmt = tx.prepare(&select.sql)?;
          stmt
            .query_map(rusqlite::params_from_iter(select.params), RawThing::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };

        let total = match count {
          Some(count) => Some(tx.query_row(
            &count.sql,
            rusqlite::params_from_iter(count.params),
            |row| row.get(0),
          )?),
          None => None,
        };

        tx.commit()?;
        Ok((rows, total))
      })
      .await?;

    let things = raws.into_iter().map(RawThing::into_thing).collect::<Result<Vec<_>>>()?;

    let last_page = match (query.page, total) {
      (Some(page), Some(total)) => page.last_page(u64::try_from(total).unwrap_or(0)),
      _ => 0,
    };

    Ok(GetThingsResult { things, last_page })
  }

  async fn delete_user(&self, id: UserId) -> Result<()> {
    let deleted = self
      .conn
      .call(move |conn| Ok(conn.execute("DELETE FROM users WHERE id = ?1", rusqlite::params![id])?))
      .await?;

    if deleted == 0 {
      tracing::debug!(id, "delete of unknown user");
    }
    Ok(())
  }

  async fn delete_thing(&self, id: ThingId) -> Result<()> {
    let deleted = self
      .conn
      .call(move |conn| Ok(conn.execute("DELETE FROM things WHERE id = ?1", rusqlite::params![id])?))
      .await?;

    if deleted == 0 {
      tracing::debug!(id, "delete of unknown thing");
    }
    Ok(())
  }

  async fn close(&self) -> Result<()> {
    self.conn.clone().close().await?;
    Ok(())
  }
}
