//! Core data models for catalog searches.

mod book;
mod search;

pub use book::{
    has_excluded_format, BookRecord, BookRecordBuilder, EXCLUDED_FORMATS, STATUS_NOT_AVAILABLE,
    STATUS_UNKNOWN,
};
pub use search::{SearchPayload, SearchResult, TITLE_FIELD_SPEC};
