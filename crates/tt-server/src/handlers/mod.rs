pub mod listen;
pub mod things;
pub mod users;

/// Response header carrying the last page of a paginated listing.
pub const LAST_PAGE_HEADER: &str = "x-last-page";
