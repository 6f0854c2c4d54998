//! SQL for [`ThingsQuery`] listings.
//!
//! Only fixed identifiers are spliced into the SQL text; the type filter and
//! the page bounds are always bound as parameters.

use rusqlite::types::Value;
use tt_core::query::{Collation, OrderBy, OrderDirection, ThingsQuery};

use crate::encode::{THING_COLUMNS, encode_things_type};

/// A statement and the values for its positional parameters.
pub struct Statement {
  pub sql:    String,
  pub params: Vec<Value>,
}

fn order_column(order_by: OrderBy) -> &'static str {
  match order_by {
    OrderBy::Address => "address",
    OrderBy::Type => "type",
    OrderBy::Reason => "reason",
    OrderBy::Remove => "remove",
  }
}

fn collate(collation: Collation) -> &'static str {
  match collation {
    Collation::Binary => "BINARY",
    Collation::NoCase => "NOCASE",
  }
}

fn direction(dir: OrderDirection) -> &'static str {
  match dir {
    OrderDirection::Asc => "ASC",
    OrderDirection::Desc => "DESC",
  }
}

/// Append the WHERE clause for `query` to `sql`, pushing its parameters.
fn push_where(query: &ThingsQuery, sql: &mut String, params: &mut Vec<Value>) {
  if let Some(kind) = query.filter {
    params.push(Value::Text(encode_things_type(kind).to_owned()));
    sql.push_str(&format!(" WHERE type = ?{}", params.len()));
  }
}

/// Select the rows of one page (or all rows) of `query`.
///
/// `id` breaks ties so that consecutive pages never overlap.
pub fn select_things(query: &ThingsQuery, collation: Collation) -> Statement {
  let mut sql = format!("SELECT {THING_COLUMNS} FROM things");
  let mut params = Vec::new();

  push_where(query, &mut sql, &mut params);

  let column = order_column(query.order_by);
  let dir = direction(query.direction);
  if query.order_by.is_textual() {
    sql.push_str(&format!(" ORDER BY {column} COLLATE {} {dir}, id ASC", collate(collation)));
  } else {
    sql.push_str(&format!(" ORDER BY {column} {dir}, id ASC"));
  }

  if let Some(page) = query.page {
    params.push(Value::Integer(i64::from(page.per_page)));
    let limit_idx = params.len();
    params.push(Value::Integer(i64::try_from(page.offset()).unwrap_or(i64::MAX)));
    sql.push_str(&format!(" LIMIT ?{limit_idx} OFFSET ?{}", params.len()));
  }

  Statement { sql, params }
}

/// Count every row matching `query`'s filter, ignoring its page.
pub fn count_things(query: &ThingsQuery) -> Statement {
  let mut sql = String::from("SELECT COUNT(*) FROM things");
  let mut params = Vec::new();
  push_where(query, &mut sql, &mut params);
  Statement { sql, params }
}
