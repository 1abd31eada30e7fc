//! Utility modules supporting catalog searches.
//!
//! - [`HttpClient`]: HTTP client that keeps its cookie jar reachable
//! - [`cookie_pairs`]: Cookies a jar would send to a URL
//! - [`normalize`]: Collapse whitespace runs and trim
//! - [`clean`]: Normalize and strip trailing periods
//!
//! # Text Cleanup
//!
//! ```rust
//! use library_status::utils::clean;
//!
//! assert_eq!(clean("  Rowling,\n J. K. "), "Rowling, J. K");
//! assert_eq!(clean("Wait for it..."), "Wait for it...");
//! ```

mod http;
mod text;

pub use http::{cookie_pairs, HttpClient};
pub use text::{clean, normalize};
