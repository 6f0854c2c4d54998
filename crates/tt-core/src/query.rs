//! Translation of request-shaped listing parameters into a validated
//! [`ThingsQuery`].
//!
//! Stores only ever see a `ThingsQuery`, so bad sort keys, directions and type
//! filters are rejected before any database work happens.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::{Error, Result, thing::{Thing, ThingsType}};

// ─── Ordering ────────────────────────────────────────────────────────────────

/// The thing fields a listing can be sorted on.
#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  AsRefStr,
  Display,
  EnumIter,
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OrderBy {
  Address,
  Type,
  Reason,
  #[default]
  Remove,
}

impl OrderBy {
  /// Parse a sort key; blank selects the default ([`OrderBy::Remove`]).
  pub fn parse(s: &str) -> Result<Self> {
    if s.is_empty() {
      return Ok(Self::default());
    }
    Self::from_str(s).map_err(|_| Error::BadOrderBy(s.to_owned()))
  }

  /// `true` for keys whose values are free-form text, where collation
  /// matters.
  pub fn is_textual(self) -> bool { !matches!(self, Self::Remove) }
}

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  AsRefStr,
  Display,
  EnumIter,
  EnumString,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum OrderDirection {
  #[default]
  Asc,
  Desc,
}

impl OrderDirection {
  /// Parse `ASC` or `DESC` exactly; blank selects [`OrderDirection::Asc`].
  pub fn parse(s: &str) -> Result<Self> {
    if s.is_empty() {
      return Ok(Self::default());
    }
    Self::from_str(s).map_err(|_| Error::BadOrderDirection(s.to_owned()))
  }
}

/// How text sort keys compare.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collation {
  /// Case-sensitive byte order.
  #[default]
  Binary,
  /// ASCII case-insensitive order.
  NoCase,
}

// ─── Pagination ──────────────────────────────────────────────────────────────

/// A 1-based page of `per_page` things. Both fields are at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
  pub page:     u32,
  pub per_page: u32,
}

impl PageRequest {
  /// Number of rows to skip before this page starts.
  pub fn offset(self) -> u64 { u64::from(self.page - 1) * u64::from(self.per_page) }

  /// The highest page that returns at least one of `total` matching rows.
  pub fn last_page(self, total: u64) -> u32 {
    u32::try_from(total.div_ceil(u64::from(self.per_page))).unwrap_or(u32::MAX)
  }
}

// ─── Parameters ──────────────────────────────────────────────────────────────

/// Unvalidated listing parameters, shaped like the incoming request.
///
/// The default value lists every thing ordered by removal date.
#[derive(Debug, Clone, Default)]
pub struct ListParams {
  /// Blank for no filter.
  pub filter_on_type:  String,
  /// Blank for `remove`.
  pub order_by:        String,
  /// Blank for `ASC`.
  pub order_direction: String,
  /// Pagination is only applied when this and `things_per_page` are >= 1.
  pub page:            i64,
  pub things_per_page: i64,
}

/// The validated query a store executes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThingsQuery {
  pub filter:    Option<ThingsType>,
  pub order_by:  OrderBy,
  pub direction: OrderDirection,
  /// `None` returns every matching row.
  pub page:      Option<PageRequest>,
}

impl ListParams {
  /// Validate and canonicalise into a [`ThingsQuery`].
  pub fn translate(&self) -> Result<ThingsQuery> {
    let order_by = OrderBy::parse(&self.order_by)?;
    let direction = OrderDirection::parse(&self.order_direction)?;
    let filter = ThingsType::parse_filter(&self.filter_on_type)?;

    let page = (self.page >= 1 && self.things_per_page >= 1).then(|| PageRequest {
      page:     u32::try_from(self.page).unwrap_or(u32::MAX),
      per_page: u32::try_from(self.things_per_page).unwrap_or(u32::MAX),
    });

    Ok(ThingsQuery { filter, order_by, direction, page })
  }
}

/// Things returned by a listing, plus the last page that would return any
/// things at the same page size. `last_page` is 0 for unpaged queries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GetThingsResult {
  pub things:    Vec<Thing>,
  pub last_page: u32,
}
