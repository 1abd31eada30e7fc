//! Cleanup of text fragments scraped from catalog markup.

use regex::Regex;
use std::sync::OnceLock;

static WHITESPACE: OnceLock<Regex> = OnceLock::new();

fn whitespace() -> &'static Regex {
    WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("static regex"))
}

/// Collapse runs of whitespace to a single space and trim both ends.
///
/// ```
/// use library_status::utils::normalize;
///
/// assert_eq!(normalize("  The \n\t Hobbit  "), "The Hobbit");
/// assert_eq!(normalize(""), "");
/// ```
pub fn normalize(text: &str) -> String {
    whitespace().replace_all(text, " ").trim().to_string()
}

/// [`normalize`], then drop a trailing sentence period.
///
/// Catalog fields are often punctuated like bibliographic records
/// (`"Tolkien, J. R. R."`). Stripping repeats until the text no longer ends in
/// a lone period, so the result is stable under reapplication. Ellipses are
/// kept.
///
/// ```
/// use library_status::utils::clean;
///
/// assert_eq!(clean(" Tolkien, J. R. R. "), "Tolkien, J. R. R");
/// assert_eq!(clean("Wait for it..."), "Wait for it...");
/// ```
pub fn clean(text: &str) -> String {
    let mut text = normalize(text);
    while ends_with_lone_period(&text) {
        text.pop();
        let trimmed_len = text.trim_end().len();
        text.truncate(trimmed_len);
    }
    text
}

fn ends_with_lone_period(text: &str) -> bool {
    let mut chars = text.chars().rev();
    chars.next() == Some('.') && chars.next() != Some('.')
}
