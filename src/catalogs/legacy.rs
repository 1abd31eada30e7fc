//! Legacy catalog front end.
//!
//! Searches are POSTed to the action URL of the search form, which carries
//! the session. A search with exactly one hit lands directly on that title's
//! "Item Details" page instead of a hit list.

use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use std::sync::OnceLock;
use url::Url;

use super::{resolve_link, Catalog, CatalogCapabilities, CatalogError, MarkupMismatch};
use crate::config::HttpConfig;
use crate::models::{has_excluded_format, BookRecord, BookRecordBuilder, SearchPayload};
use crate::session::{DiscoveryEstablisher, SearchSession, SessionError, SessionEstablisher};
use crate::utils::{clean, normalize};

/// Title fragments the legacy catalog uses for editions that never qualify
pub const EXCLUDED_TITLE_MARKERS: &[&str] = &["[electronic resource]", "[Large print edition.]"];

const DETAIL_HEADING: &str = "Item Details";

struct Selectors {
    heading: Selector,
    row: Selector,
    label: Selector,
    value: Selector,
    script: Selector,
    entry: Selector,
    title: Selector,
    link: Selector,
    author: Selector,
    year: Selector,
    call_number: Selector,
    formats: Selector,
}

static SELECTORS: OnceLock<Selectors> = OnceLock::new();
static QUOTED_DIGITS: OnceLock<Regex> = OnceLock::new();

fn selectors() -> &'static Selectors {
    SELECTORS.get_or_init(|| {
        let parse = |css: &str| Selector::parse(css).expect("static selector");
        Selectors {
            heading: parse("h1, h2, h3"),
            row: parse("tr"),
            label: parse("th"),
            value: parse("td"),
            script: parse("script"),
            entry: parse("div.searchsum"),
            title: parse(".title"),
            link: parse("a[href]"),
            author: parse(".author"),
            year: parse(".pubdate"),
            call_number: parse(".callnum"),
            formats: parse("img.format[title]"),
        }
    })
}

/// Build the cover image URL from the catalog's image script
///
/// The script passes the ISBN list and the OCLC number as quoted digit
/// groups. The first group supplies the ISBN (the part before any comma),
/// the last one the OCLC number. Groups shorter than two characters are
/// noise. Returns `None` when fewer than two groups remain.
///
/// ```
/// use library_status::catalogs::derive_image_url;
///
/// let script = "syndeticsImg('0439064864,0439064873', 'SC', '45645123');";
/// assert_eq!(
///     derive_image_url(script, "fairfaxpl").as_deref(),
///     Some("https://secure.syndetics.com/index.aspx?isbn=0439064864/SC.GIF&client=fairfaxpl&oclc=45645123")
/// );
/// ```
pub fn derive_image_url(script: &str, client_id: &str) -> Option<String> {
    let regex = QUOTED_DIGITS.get_or_init(|| Regex::new(r#"['"]([\d,]+)['"]"#).expect("static regex"));

    let groups: Vec<&str> = regex
        .captures_iter(script)
        .filter_map(|caps| caps.get(1))
        .map(|group| group.as_str())
        .filter(|group| group.len() >= 2)
        .collect();

    if groups.len() < 2 {
        return None;
    }

    let isbn = groups[0].split(',').next().unwrap_or(groups[0]);
    let oclc = groups[groups.len() - 1];

    Some(format!(
        "https://secure.syndetics.com/index.aspx?isbn={}/SC.GIF&client={}&oclc={}",
        isbn, client_id, oclc
    ))
}

fn is_excluded(raw_title: &str, formats: &[&str]) -> bool {
    EXCLUDED_TITLE_MARKERS
        .iter()
        .any(|marker| raw_title.contains(marker))
        || has_excluded_format(formats.iter().copied())
}

fn raw_text(element: &ElementRef) -> String {
    element.text().collect::<String>()
}

fn first_image_url<'a>(scripts: impl Iterator<Item = ElementRef<'a>>, client_id: &str) -> String {
    scripts
        .filter_map(|script| derive_image_url(&raw_text(&script), client_id))
        .next()
        .unwrap_or_default()
}

/// True when a top-level heading reads "Item Details"
///
/// Headings are compared after whitespace normalization, so `"Item  Details"`
/// or a heading broken across lines still counts. Any other wording does not.
fn is_detail_page(document: &Html) -> bool {
    document
        .select(&selectors().heading)
        .any(|heading| normalize(&raw_text(&heading)) == DETAIL_HEADING)
}

/// Build the single record of an "Item Details" page
fn parse_detail_page(document: &Html, client_id: &str) -> Result<Option<BookRecord>, MarkupMismatch> {
    let s = selectors();

    let mut fields: HashMap<String, String> = HashMap::new();
    for row in document.select(&s.row) {
        let (Some(label), Some(value)) = (row.select(&s.label).next(), row.select(&s.value).next())
        else {
            continue;
        };
        let label = normalize(&raw_text(&label));
        let label = label.trim_end_matches(':').trim_end().to_string();
        fields.entry(label).or_insert_with(|| raw_text(&value));
    }

    let raw_title = fields.get("Title").ok_or(MarkupMismatch {
        position: 1,
        field: "title",
    })?;
    let formats: Vec<&str> = document
        .select(&s.formats)
        .filter_map(|img| img.value().attr("title"))
        .collect();
    if is_excluded(raw_title, &formats) {
        return Ok(None);
    }

    let author = fields.get("Author").ok_or(MarkupMismatch {
        position: 1,
        field: "author",
    })?;
    let year = fields.get("Publication Date").map(|year| clean(year));
    let title = BookRecordBuilder::display_title(&clean(raw_title), year.as_deref());

    let mut builder = BookRecordBuilder::new(title, clean(author))
        .thumbnail_url(first_image_url(document.select(&s.script), client_id));
    if let Some(call_number) = fields.get("Call Number") {
        builder = builder.call_number(clean(call_number));
    }

    Ok(Some(builder.build()))
}

/// Build the record of one hit-list entry
fn parse_entry(
    entry: &ElementRef,
    position: usize,
    base: &Url,
    client_id: &str,
) -> Result<Option<BookRecord>, MarkupMismatch> {
    let s = selectors();

    let title_element = entry.select(&s.title).next().ok_or(MarkupMismatch {
        position,
        field: "title",
    })?;
    let raw_title = raw_text(&title_element);
    let formats: Vec<&str> = entry
        .select(&s.formats)
        .filter_map(|img| img.value().attr("title"))
        .collect();
    if is_excluded(&raw_title, &formats) {
        tracing::debug!(position, ?formats, "Skipping excluded entry");
        return Ok(None);
    }

    let author = entry.select(&s.author).next().ok_or(MarkupMismatch {
        position,
        field: "author",
    })?;
    let year = entry
        .select(&s.year)
        .next()
        .map(|year| clean(&raw_text(&year)));
    let title = BookRecordBuilder::display_title(&clean(&raw_title), year.as_deref());

    let mut builder = BookRecordBuilder::new(title, clean(&raw_text(&author)))
        .thumbnail_url(first_image_url(entry.select(&s.script), client_id));
    if let Some(call_number) = entry.select(&s.call_number).next() {
        builder = builder.call_number(clean(&raw_text(&call_number)));
    }
    if let Some(href) = title_element
        .select(&s.link)
        .next()
        .and_then(|a| a.value().attr("href"))
    {
        builder = builder.detail_link(resolve_link(base, href));
    }

    Ok(Some(builder.build()))
}

/// Parse a legacy hit list or "Item Details" page into records
pub fn parse_results(html: &str, base: &Url, client_id: &str) -> Vec<BookRecord> {
    let document = Html::parse_document(html);

    if is_detail_page(&document) {
        return match parse_detail_page(&document, client_id) {
            Ok(record) => record.into_iter().collect(),
            Err(mismatch) => {
                tracing::debug!("{} on item page", mismatch);
                Vec::new()
            }
        };
    }

    let mut records = Vec::new();
    for (index, entry) in document.select(&selectors().entry).enumerate() {
        match parse_entry(&entry, index + 1, base, client_id) {
            Ok(Some(record)) => records.push(record),
            Ok(None) => {}
            Err(mismatch) => {
                tracing::debug!("{}; treating as end of results", mismatch);
                break;
            }
        }
    }
    records
}

/// Legacy front end, searched through its discovered form action
#[derive(Debug, Clone)]
pub struct LegacyCatalog {
    base: Url,
    image_client_id: String,
    establisher: DiscoveryEstablisher,
}

impl LegacyCatalog {
    pub fn new(base: Url, search_page: Url, image_client_id: impl Into<String>, http: HttpConfig) -> Self {
        Self {
            base,
            image_client_id: image_client_id.into(),
            establisher: DiscoveryEstablisher::new(search_page, http),
        }
    }
}

#[async_trait]
impl Catalog for LegacyCatalog {
    fn id(&self) -> &str {
        "legacy"
    }

    fn name(&self) -> &str {
        "Library catalog (legacy)"
    }

    fn capabilities(&self) -> CatalogCapabilities {
        CatalogCapabilities::DETAIL_PAGE
    }

    fn establisher(&self) -> &dyn SessionEstablisher {
        &self.establisher
    }

    async fn fetch_page(
        &self,
        query: &str,
        session: &SearchSession,
        payload: Option<&SearchPayload>,
    ) -> Result<String, CatalogError> {
        let action_url = session.action_url().cloned().ok_or_else(|| {
            SessionError::Unavailable("Session has no search form action".to_string())
        })?;

        let default_payload;
        let payload = match payload {
            Some(payload) => payload,
            None => {
                default_payload = SearchPayload::title_search(query);
                &default_payload
            }
        };

        tracing::debug!("Posting search to: {}", action_url);
        let response = session
            .http()
            .post(action_url)
            .form(payload.fields())
            .send()
            .await
            .map_err(|e| CatalogError::Network(format!("Failed to search catalog: {}", e)))?;

        if !response.status().is_success() {
            return Err(CatalogError::Network(format!(
                "Catalog returned status: {}",
                response.status()
            )));
        }

        response
            .text()
            .await
            .map_err(|e| CatalogError::Parse(format!("Failed to read HTML: {}", e)))
    }

    async fn extract(&self, page: &str, _session: Option<&SearchSession>) -> Vec<BookRecord> {
        parse_results(page, &self.base, &self.image_client_id)
    }
}
