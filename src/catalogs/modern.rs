//! Current catalog front end.
//!
//! Results pages list one `div.c-title-detail__container` per title. The same
//! markup is served to the headless browser and to plain HTTP clients that
//! carry the handshake cookies, so both catalogs share [`ModernExtractor`].

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;
use url::Url;

use super::{resolve_link, Catalog, CatalogCapabilities, CatalogError, MarkupMismatch};
use crate::config::{BrowserConfig, HoldsConfig, HttpConfig};
use crate::models::{
    has_excluded_format, BookRecord, BookRecordBuilder, SearchPayload, STATUS_NOT_AVAILABLE,
    STATUS_UNKNOWN,
};
use crate::session::{
    BrowserEstablisher, LightweightEstablisher, SearchSession, SessionEstablisher,
};
use crate::utils::clean;

const RESULTS_PATH: &str = "search/searchresults.aspx";
const HOLDS_PATH: &str = "search/components/ajaxhoverbibsummary.aspx";

struct Selectors {
    detail_page: Selector,
    container: Selector,
    title: Selector,
    year: Selector,
    formats: Selector,
    thumbnail: Selector,
    author: Selector,
    call_number: Selector,
    holds: Selector,
    link: Selector,
    availability: Selector,
}

static SELECTORS: OnceLock<Selectors> = OnceLock::new();

fn selectors() -> &'static Selectors {
    SELECTORS.get_or_init(|| {
        let parse = |css: &str| Selector::parse(css).expect("static selector");
        Selectors {
            detail_page: parse("div.c-title-detail-page"),
            container: parse("div.c-title-detail__container"),
            title: parse("span.nsm-e135"),
            year: parse("span.nsm-short-item.nsm-e48"),
            formats: parse("img.c-title-detail-formats__img[title]"),
            thumbnail: parse("img.c-title-detail__thumbnail[src]"),
            author: parse("span.nsm-e118"),
            call_number: parse("span.nsm-short-item.nsm-e16385"),
            holds: parse("span.nsm-short-item.nsm-e8"),
            link: parse("a[href]"),
            availability: parse("span.nsm-short-item.nsm-e"),
        }
    })
}

/// Build the keyword title-search URL for the results page
pub fn results_url(base: &Url, query: &str) -> String {
    format!(
        "{}/{}?ctx=1.1033.0.0.1&type=Keyword&term={}&by=TI&sort=RELEVANCE&limit=TOM=*&query=&page=0&searchid=1",
        base.as_str().trim_end_matches('/'),
        RESULTS_PATH,
        urlencoding::encode(query)
    )
}

/// One title scraped from a results page, before its status is known
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModernEntry {
    /// 1-based index among all entries on the page, excluded ones included
    pub position: usize,
    pub title: String,
    pub author: String,
    pub thumbnail_url: String,
    pub call_number: Option<String>,
    pub detail_link: Option<String>,
    /// Current hold count as printed next to the entry
    pub hold_count: Option<String>,
}

impl ModernEntry {
    fn into_record(self, status: String) -> BookRecord {
        let mut builder = BookRecordBuilder::new(self.title, self.author)
            .status(status)
            .thumbnail_url(self.thumbnail_url);
        if let Some(call_number) = self.call_number {
            builder = builder.call_number(call_number);
        }
        if let Some(link) = self.detail_link {
            builder = builder.detail_link(link);
        }
        builder.build()
    }
}

fn text_of(element: &ElementRef, selector: &Selector) -> Option<String> {
    element
        .select(selector)
        .next()
        .map(|found| clean(&found.text().collect::<String>()))
}

fn parse_entry(
    container: &ElementRef,
    position: usize,
    base: &Url,
) -> Result<Option<ModernEntry>, MarkupMismatch> {
    let s = selectors();

    let title = text_of(container, &s.title).ok_or(MarkupMismatch {
        position,
        field: "title",
    })?;
    let year = text_of(container, &s.year);

    let formats: Vec<&str> = container
        .select(&s.formats)
        .filter_map(|img| img.value().attr("title"))
        .collect();
    if has_excluded_format(formats.iter().copied()) {
        tracing::debug!(position, ?formats, "Skipping excluded format");
        return Ok(None);
    }

    let author = text_of(container, &s.author).ok_or(MarkupMismatch {
        position,
        field: "author",
    })?;

    let thumbnail_url = container
        .select(&s.thumbnail)
        .next()
        .and_then(|img| img.value().attr("src"))
        .map(|src| resolve_link(base, src))
        .unwrap_or_default();

    let detail_link = container
        .select(&s.link)
        .find(|a| a.select(&s.title).next().is_some())
        .and_then(|a| a.value().attr("href"))
        .map(|href| resolve_link(base, href));

    Ok(Some(ModernEntry {
        position,
        title: BookRecordBuilder::display_title(&title, year.as_deref()),
        author,
        thumbnail_url,
        call_number: text_of(container, &s.call_number).filter(|c| !c.is_empty()),
        detail_link,
        hold_count: text_of(container, &s.holds),
    }))
}

/// Parse a results page (or single-title page) into entries
///
/// Excluded formats are dropped. The scan stops at the first entry without a
/// title or author.
pub fn parse_results(html: &str, base: &Url) -> Vec<ModernEntry> {
    let document = Html::parse_document(html);
    let s = selectors();

    let limit = if document.select(&s.detail_page).next().is_some() {
        1
    } else {
        usize::MAX
    };

    let mut entries = Vec::new();
    for (index, container) in document.select(&s.container).take(limit).enumerate() {
        match parse_entry(&container, index + 1, base) {
            Ok(Some(entry)) => entries.push(entry),
            Ok(None) => {}
            Err(mismatch) => {
                tracing::debug!("{}; treating as end of results", mismatch);
                break;
            }
        }
    }
    entries
}

/// Read the availability text from a hover-summary fragment
pub fn parse_availability(html: &str) -> String {
    let document = Html::parse_fragment(html);
    document
        .select(&selectors().availability)
        .next()
        .map(|span| span.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

/// Fetch the live availability text for the entry at `position`
pub async fn get_status(
    base: &Url,
    position: usize,
    session: &SearchSession,
) -> Result<String, CatalogError> {
    let url = format!(
        "{}/{}?pos={}",
        base.as_str().trim_end_matches('/'),
        HOLDS_PATH,
        position
    );

    tracing::debug!("Fetching availability: {}", url);
    let response = session
        .http()
        .get(&url)
        .send()
        .await?
        .error_for_status()?;
    let html = response.text().await?;

    Ok(parse_availability(&html))
}

/// Turns modern results pages into records, with optional live holds
#[derive(Debug, Clone)]
pub struct ModernExtractor {
    base: Url,
    holds: HoldsConfig,
}

impl ModernExtractor {
    pub fn new(base: Url, holds: HoldsConfig) -> Self {
        Self { base, holds }
    }

    pub fn live_holds(&self) -> bool {
        self.holds.enabled
    }

    /// Parse `page` and resolve each surviving entry's status
    ///
    /// Lookups run one at a time and stop after `holds.max_lookups`; later
    /// entries, failed lookups and extraction without a session report
    /// `unknown`.
    pub async fn extract(&self, page: &str, session: Option<&SearchSession>) -> Vec<BookRecord> {
        let entries = parse_results(page, &self.base);
        let mut records = Vec::with_capacity(entries.len());
        let mut lookups = 0;

        for entry in entries {
            let status = match session {
                _ if !self.holds.enabled => STATUS_NOT_AVAILABLE.to_string(),
                Some(session) if lookups < self.holds.max_lookups => {
                    lookups += 1;
                    match get_status(&self.base, entry.position, session).await {
                        Ok(availability) => format!(
                            "{} (Current holds: {})",
                            availability,
                            entry.hold_count.as_deref().unwrap_or(STATUS_UNKNOWN)
                        ),
                        Err(e) => {
                            tracing::warn!(position = entry.position, "Hold lookup failed: {}", e);
                            STATUS_UNKNOWN.to_string()
                        }
                    }
                }
                _ => STATUS_UNKNOWN.to_string(),
            };
            records.push(entry.into_record(status));
        }

        records
    }
}

/// Current front end, driven through headless Chrome
///
/// The results page is rendered client-side, so the browser from the session
/// navigates to it and the page source is read after a short settle delay.
#[derive(Debug, Clone)]
pub struct ModernBrowserCatalog {
    base: Url,
    establisher: BrowserEstablisher,
    extractor: ModernExtractor,
}

impl ModernBrowserCatalog {
    pub fn new(base: Url, browser: BrowserConfig, http: HttpConfig, holds: HoldsConfig) -> Self {
        Self {
            establisher: BrowserEstablisher::new(base.clone(), browser, http),
            extractor: ModernExtractor::new(base.clone(), holds),
            base,
        }
    }
}

#[async_trait]
impl Catalog for ModernBrowserCatalog {
    fn id(&self) -> &str {
        "modern"
    }

    fn name(&self) -> &str {
        "Library catalog (browser)"
    }

    fn capabilities(&self) -> CatalogCapabilities {
        let mut caps = CatalogCapabilities::PAGE_CONTENT
            | CatalogCapabilities::DETAIL_PAGE
            | CatalogCapabilities::BROWSER;
        if self.extractor.live_holds() {
            caps |= CatalogCapabilities::LIVE_HOLDS;
        }
        caps
    }

    fn establisher(&self) -> &dyn SessionEstablisher {
        &self.establisher
    }

    async fn fetch_page(
        &self,
        query: &str,
        session: &SearchSession,
        _payload: Option<&SearchPayload>,
    ) -> Result<String, CatalogError> {
        let browser = session
            .browser()
            .cloned()
            .ok_or_else(|| CatalogError::Browser("Session has no browser".to_string()))?;
        let url = results_url(&self.base, query);

        tokio::task::spawn_blocking(move || browser.page_source(&url))
            .await
            .map_err(|e| CatalogError::Browser(format!("Browser task failed: {}", e)))?
            .map_err(CatalogError::Browser)
    }

    async fn extract(&self, page: &str, session: Option<&SearchSession>) -> Vec<BookRecord> {
        self.extractor.extract(page, session).await
    }
}

/// Current front end over plain HTTP
#[derive(Debug, Clone)]
pub struct ModernHttpCatalog {
    base: Url,
    establisher: LightweightEstablisher,
    extractor: ModernExtractor,
}

impl ModernHttpCatalog {
    pub fn new(base: Url, http: HttpConfig, holds: HoldsConfig) -> Self {
        Self {
            establisher: LightweightEstablisher::new(base.clone(), http),
            extractor: ModernExtractor::new(base.clone(), holds),
            base,
        }
    }
}

#[async_trait]
impl Catalog for ModernHttpCatalog {
    fn id(&self) -> &str {
        "modern-http"
    }

    fn name(&self) -> &str {
        "Library catalog (HTTP)"
    }

    fn capabilities(&self) -> CatalogCapabilities {
        let mut caps = CatalogCapabilities::PAGE_CONTENT | CatalogCapabilities::DETAIL_PAGE;
        if self.extractor.live_holds() {
            caps |= CatalogCapabilities::LIVE_HOLDS;
        }
        caps
    }

    fn establisher(&self) -> &dyn SessionEstablisher {
        &self.establisher
    }

    async fn fetch_page(
        &self,
        query: &str,
        session: &SearchSession,
        _payload: Option<&SearchPayload>,
    ) -> Result<String, CatalogError> {
        let url = results_url(&self.base, query);

        tracing::debug!("Fetching results: {}", url);
        let response = session
            .http()
            .get(&url)
            .header("Accept", "text/html")
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

    async fn extract(&self, page: &str, session: Option<&SearchSession>) -> Vec<BookRecord> {
        self.extractor.extract(page, session).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://fcplcat.fairfaxcounty.gov/").unwrap()
    }

    fn entry(title: &str, year: &str, formats: &[&str], author: Option<&str>) -> String {
        let badges: String = formats
            .iter()
            .map(|f| format!(r#"<img class="c-title-detail-formats__img" title="{}" src="/f.png">"#, f))
            .collect();
        let author = author
            .map(|a| format!(r#"<span class="nsm-e118">{}</span>"#, a))
            .unwrap_or_default();
        format!(
            r#"<div class="c-title-detail__container">
                 <img class="c-title-detail__thumbnail" src="/covers/{title}.jpg">
                 <a href="/search/title.aspx?title={title}"><span class="nsm-e135">{title}.</span></a>
                 <span class="nsm-short-item nsm-e48">{year}</span>
                 <div class="c-title-detail-formats">{badges}</div>
                 {author}
                 <span class="nsm-short-item nsm-e16385"> FIC {title} </span>
                 <span class="nsm-short-item nsm-e8">2</span>
               </div>"#
        )
    }

    fn page(entries: &[String]) -> String {
        format!("<html><body><div id=\"results\">{}</div></body></html>", entries.concat())
    }

    #[test]
    fn test_results_url() {
        let url = results_url(&base(), "The Hobbit & more");
        assert_eq!(
            url,
            "https://fcplcat.fairfaxcounty.gov/search/searchresults.aspx?ctx=1.1033.0.0.1&type=Keyword&term=The%20Hobbit%20%26%20more&by=TI&sort=RELEVANCE&limit=TOM=*&query=&page=0&searchid=1"
        );
    }

    #[test]
    fn test_parse_entry_fields() {
        let html = page(&[entry("Dune", "1965", &["Book"], Some(" Herbert,\n Frank. "))]);
        let entries = parse_results(&html, &base());

        assert_eq!(entries.len(), 1);
        let dune = &entries[0];
        assert_eq!(dune.position, 1);
        assert_eq!(dune.title, "Dune (Year: 1965)");
        assert_eq!(dune.author, "Herbert, Frank");
        assert_eq!(dune.thumbnail_url, "https://fcplcat.fairfaxcounty.gov/covers/Dune.jpg");
        assert_eq!(dune.call_number.as_deref(), Some("FIC Dune"));
        assert_eq!(
            dune.detail_link.as_deref(),
            Some("https://fcplcat.fairfaxcounty.gov/search/title.aspx?title=Dune")
        );
        assert_eq!(dune.hold_count.as_deref(), Some("2"));
    }

    #[test]
    fn test_excluded_formats_keep_order() {
        let html = page(&[
            entry("Alpha", "2001", &["Book"], Some("A")),
            entry("Beta", "2002", &["Book", "Ebook"], Some("B")),
            entry("Gamma", "2003", &["Book"], Some("C")),
            entry("Delta", "2004", &["DVD"], Some("D")),
            entry("Epsilon", "2005", &["Audio Book on CD"], Some("E")),
            entry("Zeta", "2006", &["Book"], Some("F")),
        ]);
        let entries = parse_results(&html, &base());

        let titles: Vec<&str> = entries.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["Alpha (Year: 2001)", "Gamma (Year: 2003)", "Zeta (Year: 2006)"]
        );
        let positions: Vec<usize> = entries.iter().map(|e| e.position).collect();
        assert_eq!(positions, vec![1, 3, 6]);
    }

    #[test]
    fn test_missing_author_truncates() {
        let html = page(&[
            entry("One", "2001", &["Book"], Some("A")),
            entry("Two", "2002", &["Book"], Some("B")),
            entry("Three", "2003", &["Book"], None),
            entry("Four", "2004", &["Book"], Some("D")),
            entry("Five", "2005", &["Book"], Some("E")),
        ]);
        let entries = parse_results(&html, &base());

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].title, "Two (Year: 2002)");
    }

    #[test]
    fn test_excluded_entry_without_author_does_not_truncate() {
        let html = page(&[
            entry("One", "2001", &["Ebook"], None),
            entry("Two", "2002", &["Book"], Some("B")),
        ]);
        let entries = parse_results(&html, &base());

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].position, 2);
    }

    #[test]
    fn test_missing_year_uses_bare_title() {
        let html = page(&[r#"<div class="c-title-detail__container">
                <span class="nsm-e135">Emma</span><span class="nsm-e118">Austen, Jane</span>
            </div>"#
            .to_string()]);
        let entries = parse_results(&html, &base());

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Emma");
        assert_eq!(entries[0].thumbnail_url, "");
        assert_eq!(entries[0].call_number, None);
        assert_eq!(entries[0].detail_link, None);
    }

    #[test]
    fn test_single_title_page() {
        let html = format!(
            r#"<html><body><div class="c-title-detail-page">{}</div>{}</body></html>"#,
            entry("Dune", "1965", &["Book"], Some("Herbert, Frank")),
            entry("Related", "1970", &["Book"], Some("Someone"))
        );
        let entries = parse_results(&html, &base());

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Dune (Year: 1965)");
    }

    #[test]
    fn test_no_results_page() {
        let html = "<html><body><p>Your search found no results.</p></body></html>";
        assert!(parse_results(html, &base()).is_empty());
    }

    #[test]
    fn test_parse_availability() {
        let html = r#"<div><span class="nsm-short-item nsm-e8">3</span>
            <span class="nsm-short-item nsm-e"> Checked out </span></div>"#;
        assert_eq!(parse_availability(html), "Checked out");
        assert_eq!(parse_availability("<div></div>"), "");
    }

    #[tokio::test]
    async fn test_extract_without_live_holds() {
        let extractor = ModernExtractor::new(base(), HoldsConfig::default());
        let html = page(&[entry("Dune", "1965", &["Book"], Some("Herbert, Frank"))]);

        let records = extractor.extract(&html, None).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status(), STATUS_NOT_AVAILABLE);
    }

    #[tokio::test]
    async fn test_extract_live_holds_without_session() {
        let holds = HoldsConfig {
            enabled: true,
            max_lookups: 5,
        };
        let extractor = ModernExtractor::new(base(), holds);
        let html = page(&[entry("Dune", "1965", &["Book"], Some("Herbert, Frank"))]);

        let records = extractor.extract(&html, None).await;
        assert_eq!(records[0].status(), STATUS_UNKNOWN);
    }
}
