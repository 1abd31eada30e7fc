//! Search request and result models.

use serde::{Deserialize, Serialize};

use super::BookRecord;

/// Field specification the legacy catalog expects for a title search.
pub const TITLE_FIELD_SPEC: &str = "TI^TITLE^SERIES^Title Processing^title";

/// Form fields POSTed to the legacy catalog's search action
///
/// Field order is preserved when the form is encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchPayload {
    fields: Vec<(String, String)>,
}

impl SearchPayload {
    /// Create an empty payload
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// The default payload: a title search across all branches, newest first
    pub fn title_search(query: &str) -> Self {
        Self::new()
            .field("query_type", "search")
            .field("searchdata1", query)
            .field("srchfield1", TITLE_FIELD_SPEC)
            .field("library", "ALL")
            .field("sort_by", "-PBYR")
    }

    /// Set a field, replacing an existing value with the same name
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
        self
    }

    /// Look up a field value
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value.as_str())
    }

    /// Fields in insertion order, ready for form encoding
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }
}

impl Default for SearchPayload {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of one title search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// The query as given by the caller
    pub query: String,

    /// Matching books in catalog order
    pub records: Vec<BookRecord>,

    /// Raw results page, kept for debugging or caching by the caller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_content: Option<String>,
}

impl SearchResult {
    /// Create a result with records
    pub fn new(query: impl Into<String>, records: Vec<BookRecord>) -> Self {
        Self {
            query: query.into(),
            records,
            page_content: None,
        }
    }

    /// A result with no records, used when the search could not run
    pub fn empty(query: impl Into<String>) -> Self {
        Self::new(query, Vec::new())
    }

    /// Attach the raw page
    pub fn with_page_content(mut self, page_content: impl Into<String>) -> Self {
        self.page_content = Some(page_content.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}
