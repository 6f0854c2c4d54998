//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{NaiveDate, TimeZone as _, Utc};
use tt_core::{
  Error as CoreError,
  query::{Collation, ListParams, OrderBy, OrderDirection, PageRequest, ThingsQuery},
  store::ThingStore,
  thing::{NewThing, Thing, ThingsType, Warning},
  user::User,
};

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

async fn count(s: &SqliteStore, table: &'static str) -> i64 {
  s.conn
    .call(move |conn| {
      Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?)
    })
    .await
    .unwrap()
}

fn new_thing(creator: u32, address: &str, kind: ThingsType, reason: &str, remove: NaiveDate) -> NewThing {
  NewThing {
    address: address.into(),
    kind,
    description: "desc".into(),
    reason: reason.into(),
    remove,
    creator,
  }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate { NaiveDate::from_ymd_opt(y, m, d).unwrap() }

/// Two users and ten things, two per type, whose addresses and reasons all
/// sort differently to their ids. Removal dates increase with id.
async fn example_data(s: &SqliteStore) -> (User, User, Vec<Thing>) {
  let user1 = s.create_user("user1".into(), "user1@example.com".into()).await.unwrap();
  let user2 = s.create_user("user2".into(), "user2@example.com".into()).await.unwrap();

  let kinds = [
    ThingsType::Irods,
    ThingsType::Dir,
    ThingsType::S3,
    ThingsType::File,
    ThingsType::Openstack,
  ];
  let addresses = ["j", "c", "e", "i", "a", "f", "b", "g", "d", "h"];
  let reasons = ["i", "c", "g", "e", "a", "d", "f", "h", "j", "b"];

  let mut things = Vec::new();
  for (i, (address, reason)) in addresses.iter().zip(reasons).enumerate() {
    let creator = if i % 2 == 0 { user1.id } else { user2.id };
    let input = new_thing(creator, address, kinds[i / 2], reason, date(1970 + i as i32, 1, 2));
    things.push(s.create_thing(input).await.unwrap());
  }

  (user1, user2, things)
}

fn ids(things: &[Thing]) -> Vec<u32> { things.iter().map(|t| t.id).collect() }

// ─── Users ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_user_assigns_ids() {
  let s = store().await;
  let a = s.create_user("alice".into(), "alice@example.com".into()).await.unwrap();
  let b = s.create_user("bob".into(), "bob@example.com".into()).await.unwrap();

  assert_eq!(a.name, "alice");
  assert_eq!(a.email, "alice@example.com");
  assert_ne!(a.id, b.id);

  let fetched = s.user_by_name("bob").await.unwrap().unwrap();
  assert_eq!(fetched, b);
  assert!(s.user_by_name("carol").await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_user_name_fails() {
  let s = store().await;
  s.create_user("alice".into(), "a1@example.com".into()).await.unwrap();

  let err = s
    .create_user("alice".into(), "a2@example.com".into())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::DuplicateName(ref n)) if n == "alice"));
}

#[tokio::test]
async fn duplicate_user_email_fails() {
  let s = store().await;
  s.create_user("alice".into(), "shared@example.com".into()).await.unwrap();

  let err = s
    .create_user("bob".into(), "shared@example.com".into())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::DuplicateEmail(_))));
  assert_eq!(count(&s, "users").await, 1);

  // Converts to a client error for the web layer.
  assert!(CoreError::from(err).is_client_error());
}

// ─── Things ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_thing_roundtrip() {
  let s = store().await;
  let user = s.create_user("alice".into(), "alice@example.com".into()).await.unwrap();

  let input = NewThing {
    address:     "/lustre/scratch/alice/tmp".into(),
    kind:        ThingsType::Dir,
    description: "intermediate files".into(),
    reason:      "pipeline run".into(),
    remove:      date(2030, 6, 1),
    creator:     user.id,
  };

  let before = Utc::now();
  let created = s.create_thing(input.clone()).await.unwrap();
  let after = Utc::now();

  let result = s.get_things(&ThingsQuery::default()).await.unwrap();
  assert_eq!(result.last_page, 0);
  assert_eq!(result.things.len(), 1);

  let thing = &result.things[0];
  assert_eq!(thing, &created);
  assert_eq!(thing.address, input.address);
  assert_eq!(thing.kind, input.kind);
  assert_eq!(thing.description, input.description);
  assert_eq!(thing.reason, input.reason);
  assert_eq!(thing.remove, input.remove);
  assert!(thing.created >= before && thing.created <= after);
  assert!(thing.warned1.is_none() && thing.warned2.is_none());
  assert!(!thing.removed);
}

#[tokio::test]
async fn create_thing_subscribes_creator() {
  let s = store().await;
  let user = s.create_user("alice".into(), "alice@example.com".into()).await.unwrap();
  let thing = s
    .create_thing(new_thing(user.id, "a", ThingsType::File, "r", date(2030, 1, 1)))
    .await
    .unwrap();

  let subs = s.subscribers(thing.id).await.unwrap();
  assert_eq!(subs.len(), 1);
  assert_eq!(subs[0].user_id, user.id);
  assert!(subs[0].creator);
}

#[tokio::test]
async fn create_thing_with_unknown_creator_persists_nothing() {
  let s = store().await;
  example_data(&s).await;

  let things_before = count(&s, "things").await;
  let subs_before = count(&s, "subscribers").await;

  let err = s
    .create_thing(new_thing(999, "x", ThingsType::S3, "r", date(2030, 1, 1)))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::NoSuchUser(999))));

  assert_eq!(count(&s, "things").await, things_before);
  assert_eq!(count(&s, "subscribers").await, subs_before);
}

#[tokio::test]
async fn create_thing_rejects_blank_reason() {
  let s = store().await;
  let user = s.create_user("alice".into(), "alice@example.com".into()).await.unwrap();

  let err = s
    .create_thing(new_thing(user.id, "a", ThingsType::File, "", date(2030, 1, 1)))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::MissingField("reason"))));
  assert_eq!(count(&s, "things").await, 0);
}

// ─── Listing ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn get_things_defaults_to_remove_ascending() {
  let s = store().await;
  let (_, _, things) = example_data(&s).await;

  let result = s.get_things(&ThingsQuery::default()).await.unwrap();
  assert_eq!(ids(&result.things), ids(&things));
  assert_eq!(result.last_page, 0);

  let desc = ListParams { order_direction: "DESC".into(), ..Default::default() }
    .translate()
    .unwrap();
  let result = s.get_things(&desc).await.unwrap();
  let mut expected = ids(&things);
  expected.reverse();
  assert_eq!(ids(&result.things), expected);
}

#[tokio::test]
async fn get_things_sorted_by_address() {
  let s = store().await;
  example_data(&s).await;

  let query = ThingsQuery { order_by: OrderBy::Address, ..Default::default() };
  let result = s.get_things(&query).await.unwrap();

  let addresses: Vec<_> = result.things.iter().map(|t| t.address.as_str()).collect();
  assert_eq!(addresses, ["a", "b", "c", "d", "e", "f", "g", "h", "i", "j"]);
  assert_eq!(ids(&result.things), [5, 7, 2, 9, 3, 6, 8, 10, 4, 1]);
}

#[tokio::test]
async fn get_things_filtered_by_type() {
  let s = store().await;
  example_data(&s).await;

  let query = ThingsQuery { filter: Some(ThingsType::S3), ..Default::default() };
  let result = s.get_things(&query).await.unwrap();

  assert_eq!(ids(&result.things), [5, 6]);
  assert!(result.things.iter().all(|t| t.kind == ThingsType::S3));
}

#[tokio::test]
async fn pagination_covers_every_thing_once() {
  let s = store().await;
  let (_, _, things) = example_data(&s).await;

  let mut seen = Vec::new();
  for (page, expected_len) in [(1, 3), (2, 3), (3, 3), (4, 1)] {
    let query = ThingsQuery {
      page: Some(PageRequest { page, per_page: 3 }),
      ..Default::default()
    };
    let result = s.get_things(&query).await.unwrap();
    assert_eq!(result.things.len(), expected_len, "page {page}");
    assert_eq!(result.last_page, 4, "page {page}");
    seen.extend(ids(&result.things));
  }
  assert_eq!(seen, ids(&things));

  let past_end = ThingsQuery {
    page: Some(PageRequest { page: 5, per_page: 3 }),
    ..Default::default()
  };
  let result = s.get_things(&past_end).await.unwrap();
  assert!(result.things.is_empty());
  assert_eq!(result.last_page, 4);
}

#[tokio::test]
async fn sort_and_filter_compose_with_pagination() {
  let s = store().await;
  example_data(&s).await;

  // s3 things are 5 (reason "a") and 6 (reason "d"); descending by reason
  // puts 6 first, so page 2 of size 1 is thing 5.
  let query = ThingsQuery {
    filter:    Some(ThingsType::S3),
    order_by:  OrderBy::Reason,
    direction: OrderDirection::Desc,
    page:      Some(PageRequest { page: 2, per_page: 1 }),
  };
  let result = s.get_things(&query).await.unwrap();

  assert_eq!(ids(&result.things), [5]);
  assert_eq!(result.things[0].reason, "a");
  assert_eq!(result.last_page, 2);
}

#[tokio::test]
async fn collation_controls_text_ordering() {
  let s = store().await;
  let user = s.create_user("alice".into(), "alice@example.com".into()).await.unwrap();
  for address in ["a", "B", "c"] {
    s.create_thing(new_thing(user.id, address, ThingsType::File, "r", date(2030, 1, 1)))
      .await
      .unwrap();
  }

  let query = ThingsQuery { order_by: OrderBy::Address, ..Default::default() };

  let binary = s.get_things(&query).await.unwrap();
  let addresses: Vec<_> = binary.things.iter().map(|t| t.address.as_str()).collect();
  assert_eq!(addresses, ["B", "a", "c"]);

  let nocase = s.clone().with_collation(Collation::NoCase);
  let folded = nocase.get_things(&query).await.unwrap();
  let addresses: Vec<_> = folded.things.iter().map(|t| t.address.as_str()).collect();
  assert_eq!(addresses, ["a", "B", "c"]);
}

// ─── Deletion ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn delete_user_cascades_to_own_subscriptions_only() {
  let s = store().await;
  let (user1, user2, things) = example_data(&s).await;

  // user2 also follows one of user1's things.
  s.subscribe(user2.id, things[0].id).await.unwrap();
  let user2_subs = s.subscriptions(user2.id).await.unwrap();
  assert_eq!(user2_subs.len(), 6);

  s.delete_user(user1.id).await.unwrap();

  assert_eq!(count(&s, "users").await, 1);
  assert_eq!(count(&s, "things").await, 10);
  assert!(s.subscriptions(user1.id).await.unwrap().is_empty());
  assert_eq!(s.subscriptions(user2.id).await.unwrap(), user2_subs);
}

#[tokio::test]
async fn delete_thing_cascades_to_its_subscribers_only() {
  let s = store().await;
  let (_, user2, things) = example_data(&s).await;
  s.subscribe(user2.id, things[0].id).await.unwrap();

  s.delete_thing(things[0].id).await.unwrap();

  assert_eq!(count(&s, "users").await, 2);
  assert_eq!(count(&s, "things").await, 9);
  assert_eq!(count(&s, "subscribers").await, 9);
  assert!(s.subscribers(things[0].id).await.unwrap().is_empty());
  assert!(s.get_thing(things[0].id).await.unwrap().is_none());
}

#[tokio::test]
async fn deleting_unknown_rows_is_not_an_error() {
  let s = store().await;
  s.delete_user(42).await.unwrap();
  s.delete_thing(42).await.unwrap();
}

// ─── Subscriptions ───────────────────────────────────────────────────────────

#[tokio::test]
async fn subscribe_validates_references() {
  let s = store().await;
  let (user1, _, things) = example_data(&s).await;

  let err = s.subscribe(999, things[0].id).await.unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::NoSuchUser(999))));

  let err = s.subscribe(user1.id, 999).await.unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::NoSuchThing(999))));

  // user1 created things[0], so is already subscribed.
  let err = s.subscribe(user1.id, things[0].id).await.unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::AlreadySubscribed { .. })));
}

#[tokio::test]
async fn unsubscribe_removes_subscription() {
  let s = store().await;
  let (_, user2, things) = example_data(&s).await;

  let sub = s.subscribe(user2.id, things[0].id).await.unwrap();
  assert!(!sub.creator);
  assert_eq!(s.subscribers(things[0].id).await.unwrap().len(), 2);

  s.unsubscribe(user2.id, things[0].id).await.unwrap();
  let subs = s.subscribers(things[0].id).await.unwrap();
  assert_eq!(subs.len(), 1);
  assert!(subs[0].creator);
}

// ─── Maintenance ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn warnings_and_extension() {
  let s = store().await;
  let (_, _, things) = example_data(&s).await;
  let id = things[0].id;
  let at = Utc.with_ymd_and_hms(2025, 3, 4, 5, 6, 7).unwrap();

  s.record_warning(id, Warning::First, at).await.unwrap();
  s.record_warning(id, Warning::Second, at).await.unwrap();
  let thing = s.get_thing(id).await.unwrap().unwrap();
  assert_eq!(thing.warned1, Some(at));
  assert_eq!(thing.warned2, Some(at));

  s.extend_removal(id, date(2031, 1, 1)).await.unwrap();
  let thing = s.get_thing(id).await.unwrap().unwrap();
  assert_eq!(thing.remove, date(2031, 1, 1));
  assert!(thing.warned1.is_none() && thing.warned2.is_none());
}

#[tokio::test]
async fn description_and_removed_flag() {
  let s = store().await;
  let (_, _, things) = example_data(&s).await;
  let id = things[3].id;

  s.update_description(id, "kept for audit".into()).await.unwrap();
  s.mark_removed(id).await.unwrap();

  let thing = s.get_thing(id).await.unwrap().unwrap();
  assert_eq!(thing.description, "kept for audit");
  assert!(thing.removed);
}

#[tokio::test]
async fn updating_unknown_thing_fails() {
  let s = store().await;
  let err = s.mark_removed(7).await.unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::NoSuchThing(7))));
}

// ─── Lifecycle ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn closed_store_reports_unavailable() {
  let s = store().await;
  s.close().await.unwrap();

  let err = s.get_things(&ThingsQuery::default()).await.unwrap_err();
  assert!(matches!(err, Error::Database(_)));
  assert!(!CoreError::from(err).is_client_error());
}
