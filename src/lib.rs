//! # Library Status
//!
//! Looks up titles in a public library catalog and reports, for each matching
//! physical copy, its display title, author, cover image and availability.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`]: Core data structures (BookRecord, SearchResult, SearchPayload)
//! - [`session`]: Handshake strategies that produce a reusable search session
//! - [`catalogs`]: Catalog front ends and their result extractors
//! - [`search`]: Single and batch search orchestration
//! - [`utils`]: HTTP client with a cookie jar, text cleanup
//! - [`config`]: Configuration management

pub mod catalogs;
pub mod config;
pub mod models;
pub mod search;
pub mod session;
pub mod utils;

// Re-export commonly used types
pub use catalogs::{Catalog, CatalogError, CatalogRegistry};
pub use models::{BookRecord, SearchResult};
pub use search::{search_for_book, search_many};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
