//! Core types and trait definitions for tt, the temporary-things tracker.
//!
//! This crate is free of HTTP and database dependencies. The store backend
//! (`tt-store-sqlite`) and the web layer (`tt-server`) both depend on it.

pub mod error;
pub mod query;
pub mod store;
pub mod thing;
pub mod user;

pub use error::{Error, Result};
