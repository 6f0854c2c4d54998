//! HTML fragments for things.
//!
//! Listings and live updates share the same `<tr>` markup so a page can
//! append pushed rows straight into the table it loaded.

use axum::response::sse::Event;
use quick_xml::escape::escape;
use tt_core::thing::Thing;

/// Render one thing as a table row. Every text cell is HTML-escaped.
pub fn thing_row(thing: &Thing) -> String {
  format!(
    "<tr id=\"thing-{id}\">\n  <td>{address}</td>\n  <td>{kind}</td>\n  \
     <td>{created}</td>\n  <td>{description}</td>\n  <td>{reason}</td>\n  \
     <td>{remove}</td>\n</tr>\n",
    id = thing.id,
    address = escape(thing.address.as_str()),
    kind = thing.kind,
    created = thing.created.format("%Y-%m-%d %H:%M"),
    description = escape(thing.description.as_str()),
    reason = escape(thing.reason.as_str()),
    remove = thing.remove.format("%Y-%m-%d"),
  )
}

/// Render a listing as consecutive rows.
pub fn thing_rows(things: &[Thing]) -> String { things.iter().map(thing_row).collect() }

// ─── Server-sent events ──────────────────────────────────────────────────────

/// A named event carrying a pre-rendered payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
  pub name: &'static str,
  pub data: String,
}

impl SseEvent {
  pub const NEW_THING: &'static str = "newThing";

  /// The event pushed to listeners after a thing is created.
  pub fn new_thing(row: &str) -> Self { Self { name: Self::NEW_THING, data: row.to_owned() } }

  /// Wire form. Line breaks are stripped so the payload is one `data:` line.
  pub fn to_event(&self) -> Event {
    Event::default()
      .event(self.name)
      .data(self.data.replace(['\n', '\r'], ""))
  }
}

#[cfg(test)]
mod tests {
  use chrono::{NaiveDate, TimeZone as _, Utc};
  use tt_core::thing::ThingsType;

  use super::*;

  fn thing() -> Thing {
    Thing {
      id:          4,
      address:     "s3://bucket/<key>".into(),
      kind:        ThingsType::S3,
      created:     Utc.with_ymd_and_hms(2024, 3, 5, 9, 30, 0).unwrap(),
      description: "multi\nline & \"quoted\"".into(),
      reason:      "benchmarks".into(),
      remove:      NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
      warned1:     None,
      warned2:     None,
      removed:     false,
    }
  }

  #[test]
  fn row_escapes_text_cells() {
    let row = thing_row(&thing());
    assert!(row.starts_with("<tr id=\"thing-4\">"));
    assert!(row.contains("<td>s3://bucket/&lt;key&gt;</td>"));
    assert!(row.contains("<td>s3</td>"));
    assert!(row.contains("<td>2024-03-05 09:30</td>"));
    assert!(row.contains("&amp; &quot;quoted&quot;"));
    assert!(row.contains("<td>2024-06-01</td>"));
    assert_eq!(row.matches("<td>").count(), 6);
  }

  #[test]
  fn rows_concatenate_in_order() {
    let mut second = thing();
    second.id = 9;
    let rows = thing_rows(&[thing(), second]);
    let first_at = rows.find("thing-4").unwrap();
    let second_at = rows.find("thing-9").unwrap();
    assert!(first_at < second_at);
    assert_eq!(thing_rows(&[]), "");
  }
}
