//! Book record model representing one catalog hit.

use serde::{Deserialize, Serialize};

/// Status used when the catalog offers no live availability lookup.
pub const STATUS_NOT_AVAILABLE: &str = "N/A";

/// Status used when a live lookup was skipped or failed.
pub const STATUS_UNKNOWN: &str = "unknown";

/// Format badges that never make it into a result set.
///
/// Electronic, video, audio and large-print editions are irrelevant for a
/// reading list that tracks physical copies.
pub const EXCLUDED_FORMATS: &[&str] = &[
    "Ebook",
    "DVD",
    "Eaudiobook",
    "RBdigital",
    "Audio Book on CD",
    "Large Print",
];

/// Returns true if any of the given format badges is excluded.
pub fn has_excluded_format<'a, I>(formats: I) -> bool
where
    I: IntoIterator<Item = &'a str>,
{
    formats
        .into_iter()
        .any(|format| EXCLUDED_FORMATS.contains(&format.trim()))
}

/// A book found in the catalog
///
/// Records are built once per search through [`BookRecordBuilder`] and are
/// read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookRecord {
    title: String,
    author: String,
    status: String,
    thumbnail_url: String,
    call_number: Option<String>,
    detail_link: Option<String>,
}

impl BookRecord {
    /// Display title, possibly carrying a `(Year: ...)` suffix
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    /// Availability text, or one of the `N/A` / `unknown` sentinels
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Cover image URL (empty when the catalog exposes none)
    pub fn thumbnail_url(&self) -> &str {
        &self.thumbnail_url
    }

    /// Shelving location code
    pub fn call_number(&self) -> Option<&str> {
        self.call_number.as_deref()
    }

    /// Link to the catalog's item page
    pub fn detail_link(&self) -> Option<&str> {
        self.detail_link.as_deref()
    }

    /// Check if the status came from a live lookup
    pub fn has_live_status(&self) -> bool {
        self.status != STATUS_NOT_AVAILABLE && self.status != STATUS_UNKNOWN
    }
}

/// Builder for constructing BookRecord objects
#[derive(Debug, Clone)]
pub struct BookRecordBuilder {
    record: BookRecord,
}

impl BookRecordBuilder {
    /// Create a new builder with the required fields
    pub fn new(title: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            record: BookRecord {
                title: title.into(),
                author: author.into(),
                status: STATUS_NOT_AVAILABLE.to_string(),
                thumbnail_url: String::new(),
                call_number: None,
                detail_link: None,
            },
        }
    }

    /// Compose the display title from a bare title and an optional year
    pub fn display_title(title: &str, year: Option<&str>) -> String {
        match year {
            Some(year) if !year.is_empty() => format!("{} (Year: {})", title, year),
            _ => title.to_string(),
        }
    }

    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.record.status = status.into();
        self
    }

    pub fn thumbnail_url(mut self, url: impl Into<String>) -> Self {
        self.record.thumbnail_url = url.into();
        self
    }

    /// Set the call number; empty values are ignored
    pub fn call_number(mut self, call_number: impl Into<String>) -> Self {
        let call_number = call_number.into();
        if !call_number.is_empty() {
            self.record.call_number = Some(call_number);
        }
        self
    }

    pub fn detail_link(mut self, link: impl Into<String>) -> Self {
        self.record.detail_link = Some(link.into());
        self
    }

    /// Build the BookRecord
    pub fn build(self) -> BookRecord {
        self.record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_builder() {
        let record = BookRecordBuilder::new("Dune (Year: 1965)", "Herbert, Frank")
            .status("Available (Current holds: 0)")
            .thumbnail_url("https://example.com/cover.jpg")
            .call_number("SF HER")
            .detail_link("https://example.com/item/1")
            .build();

        assert_eq!(record.title(), "Dune (Year: 1965)");
        assert_eq!(record.author(), "Herbert, Frank");
        assert_eq!(record.call_number(), Some("SF HER"));
        assert_eq!(record.detail_link(), Some("https://example.com/item/1"));
        assert!(record.has_live_status());
    }

    #[test]
    fn test_record_defaults() {
        let record = BookRecordBuilder::new("Dune", "Herbert, Frank")
            .call_number("")
            .build();

        assert_eq!(record.status(), STATUS_NOT_AVAILABLE);
        assert_eq!(record.thumbnail_url(), "");
        assert_eq!(record.call_number(), None);
        assert!(!record.has_live_status());
    }

    #[test]
    fn test_display_title() {
        assert_eq!(
            BookRecordBuilder::display_title("Dune", Some("1965")),
            "Dune (Year: 1965)"
        );
        assert_eq!(BookRecordBuilder::display_title("Dune", None), "Dune");
        assert_eq!(BookRecordBuilder::display_title("Dune", Some("")), "Dune");
    }

    #[test]
    fn test_excluded_formats() {
        assert!(has_excluded_format(["Book", "Ebook"]));
        assert!(has_excluded_format(["Audio Book on CD"]));
        assert!(has_excluded_format([" Large Print "]));
        assert!(!has_excluded_format(["Book", "Audiobook"]));
        assert!(!has_excluded_format(Vec::<&str>::new()));
    }
}
