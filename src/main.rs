use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use library_status::catalogs::{Catalog, CatalogCapabilities, CatalogRegistry};
use library_status::config::{find_config_file, get_config, load_config, Config, CONFIG_FILE_NAME};
use library_status::models::{BookRecord, SearchPayload, SearchResult};
use library_status::{search_for_book, search_many};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Library Status - Check whether books on a reading list are on the shelf
#[derive(Parser, Debug)]
#[command(name = "library-status")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Search a library catalog and report availability of physical copies", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (-v for debug, -vv for trace)
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Output format
    #[arg(long, short, value_enum, global = true, default_value_t = OutputFormat::Auto)]
    output: OutputFormat,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Catalog to search (overrides catalog.default)
    #[arg(long, global = true)]
    catalog: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for results
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Automatic based on terminal (table if TTY, JSON otherwise)
    Auto,
    /// Table format (human-readable)
    Table,
    /// JSON format (machine-readable)
    Json,
    /// Plain text format
    Plain,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search the catalog for a single title
    #[command(visible_alias = "s")]
    Search {
        /// Title to search for
        title: String,

        /// Extra or replacement form field for POST searches (name=value)
        #[arg(long = "field", value_parser = parse_field)]
        fields: Vec<(String, String)>,

        /// Write the fetched results page to this file
        #[arg(long)]
        save_page: Option<PathBuf>,
    },

    /// Check the status of many titles over one session
    Statuses {
        /// Titles to check
        titles: Vec<String>,

        /// Read titles from a file, one per line
        #[arg(long, short)]
        file: Option<PathBuf>,
    },

    /// List the configured catalogs
    Catalogs,

    /// Write a default configuration file
    InitConfig {
        /// Destination path
        #[arg(default_value = CONFIG_FILE_NAME)]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Parse a `name=value` form field
fn parse_field(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{}'", s))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("field name is empty in '{}'", s));
    }
    Ok((name.to_string(), value.to_string()))
}

/// Read titles from a reading-list file, skipping blank lines and `#` comments
fn read_titles(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read titles from {}", path.display()))?;
    Ok(parse_titles(&content))
}

fn parse_titles(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

fn build_payload(title: &str, fields: &[(String, String)]) -> Option<SearchPayload> {
    if fields.is_empty() {
        return None;
    }
    Some(
        fields
            .iter()
            .fold(SearchPayload::title_search(title), |payload, (name, value)| {
                payload.field(name.as_str(), value.as_str())
            }),
    )
}

fn load_configuration(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => match find_config_file() {
            Some(path) => load_config(&path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => get_config().context("Failed to read configuration from environment")?,
        },
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_configuration(cli.config.as_deref())?;

    // Initialize tracing based on verbosity
    let log_level = match cli.verbose {
        0 => config.logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };

    let env_filter = if cli.quiet { "error" } else { log_level };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("library_status={}", env_filter)),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Some(path) = cli.config.as_deref().map(Path::to_path_buf).or_else(find_config_file) {
        tracing::debug!("Using config file: {}", path.display());
    }

    let run = run_command(cli.command, &config, cli.catalog.as_deref(), cli.output);
    tokio::select! {
        result = run => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted");
            Ok(())
        }
    }
}

async fn run_command(
    command: Commands,
    config: &Config,
    catalog_id: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    match command {
        Commands::Search {
            title,
            fields,
            save_page,
        } => {
            let registry = CatalogRegistry::from_config(config)?;
            let catalog = select_catalog(&registry, catalog_id)?;

            let payload = build_payload(&title, &fields);
            let result = search_for_book(catalog, &title, None, payload.as_ref()).await?;

            if let Some(path) = save_page {
                match &result.page_content {
                    Some(page) => {
                        std::fs::write(&path, page)
                            .with_context(|| format!("Failed to write {}", path.display()))?;
                        tracing::info!("Saved results page to {}", path.display());
                    }
                    None => tracing::warn!(
                        catalog = catalog.id(),
                        "No page content to save for this search"
                    ),
                }
            }

            output_results(&[result], format)?;
        }

        Commands::Statuses { mut titles, file } => {
            if let Some(path) = file {
                titles.extend(read_titles(&path)?);
            }
            if titles.is_empty() {
                anyhow::bail!("No titles given; pass titles or --file");
            }

            let registry = CatalogRegistry::from_config(config)?;
            let catalog = select_catalog(&registry, catalog_id)?;

            let results = search_many(catalog, &titles).await?;
            output_results(&results, format)?;
        }

        Commands::Catalogs => {
            let registry = CatalogRegistry::from_config(config)?;
            output_catalogs(&registry, &config.catalog.default, format)?;
        }

        Commands::InitConfig { path, force } => {
            if path.exists() && !force {
                anyhow::bail!(
                    "{} already exists; use --force to overwrite",
                    path.display()
                );
            }
            Config::default().save(&path)?;
            println!("Wrote default configuration to {}", path.display());
        }
    }

    Ok(())
}

fn select_catalog<'a>(registry: &'a CatalogRegistry, id: Option<&str>) -> Result<&'a dyn Catalog> {
    let catalog = match id {
        Some(id) => registry.get_required(id)?,
        None => registry.default_catalog()?,
    };
    Ok(catalog.as_ref())
}

fn resolve_format(format: OutputFormat) -> OutputFormat {
    if format == OutputFormat::Auto {
        if std::io::stdout().is_terminal() {
            OutputFormat::Table
        } else {
            OutputFormat::Json
        }
    } else {
        format
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let kept: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        text.to_string()
    }
}

fn output_results(results: &[SearchResult], format: OutputFormat) -> Result<()> {
    match resolve_format(format) {
        OutputFormat::Json => {
            let json = if results.len() == 1 {
                serde_json::to_string_pretty(&results[0])?
            } else {
                serde_json::to_string_pretty(results)?
            };
            println!("{}", json);
        }
        OutputFormat::Plain => {
            for result in results {
                println!("{} ({} found)", result.query, result.len());
                for record in &result.records {
                    println!("  {} - {}", record.title(), record.author());
                    println!("    Status: {}", record.status());
                    if let Some(call_number) = record.call_number() {
                        println!("    Call number: {}", call_number);
                    }
                    if let Some(link) = record.detail_link() {
                        println!("    Link: {}", link);
                    }
                }
                println!();
            }
        }
        OutputFormat::Table => {
            use comfy_table::{Attribute, Cell, Table};
            let mut table = Table::new();
            table.load_preset(comfy_table::presets::UTF8_FULL);
            table.set_header(vec!["Query", "Title", "Author", "Status", "Call Number"]);

            for result in results {
                if result.is_empty() {
                    table.add_row(vec![
                        Cell::new(truncate(&result.query, 30)),
                        Cell::new("(no physical copies found)"),
                        Cell::new(""),
                        Cell::new(""),
                        Cell::new(""),
                    ]);
                }
                for record in &result.records {
                    table.add_row(vec![
                        Cell::new(truncate(&result.query, 30)),
                        Cell::new(truncate(record.title(), 50)).add_attribute(Attribute::Bold),
                        Cell::new(truncate(record.author(), 30)),
                        status_cell(record),
                        Cell::new(record.call_number().unwrap_or_default()),
                    ]);
                }
            }
            println!("{table}");
        }
        OutputFormat::Auto => unreachable!(),
    }
    Ok(())
}

/// Live availability stands out; sentinel statuses are dimmed
fn status_cell(record: &BookRecord) -> comfy_table::Cell {
    use comfy_table::{Attribute, Cell, Color};
    if record.has_live_status() {
        Cell::new(record.status()).fg(Color::Green)
    } else {
        Cell::new(record.status()).add_attribute(Attribute::Dim)
    }
}

fn capability_names(caps: CatalogCapabilities) -> Vec<&'static str> {
    let mut names = Vec::new();
    if caps.contains(CatalogCapabilities::LIVE_HOLDS) {
        names.push("live-holds");
    }
    if caps.contains(CatalogCapabilities::PAGE_CONTENT) {
        names.push("page-content");
    }
    if caps.contains(CatalogCapabilities::DETAIL_PAGE) {
        names.push("detail-page");
    }
    if caps.contains(CatalogCapabilities::BROWSER) {
        names.push("browser");
    }
    names
}

fn output_catalogs(registry: &CatalogRegistry, default_id: &str, format: OutputFormat) -> Result<()> {
    match resolve_format(format) {
        OutputFormat::Json => {
            let catalogs: Vec<serde_json::Value> = registry
                .all()
                .into_iter()
                .map(|catalog| {
                    serde_json::json!({
                        "id": catalog.id(),
                        "name": catalog.name(),
                        "default": catalog.id() == default_id,
                        "capabilities": capability_names(catalog.capabilities()),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&catalogs)?);
        }
        OutputFormat::Plain => {
            for catalog in registry.all() {
                let marker = if catalog.id() == default_id { " (default)" } else { "" };
                println!("{}{} - {}", catalog.id(), marker, catalog.name());
            }
        }
        OutputFormat::Table => {
            use comfy_table::{Cell, Table};
            let mut table = Table::new();
            table.load_preset(comfy_table::presets::UTF8_FULL);
            table.set_header(vec!["ID", "Name", "Default", "Capabilities"]);
            for catalog in registry.all() {
                table.add_row(vec![
                    Cell::new(catalog.id()),
                    Cell::new(catalog.name()),
                    Cell::new(if catalog.id() == default_id { "yes" } else { "" }),
                    Cell::new(capability_names(catalog.capabilities()).join(", ")),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Auto => unreachable!(),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_version() {
        let version = env!("CARGO_PKG_VERSION");
        assert!(!version.is_empty());
        let parts: Vec<&str> = version.split('.').collect();
        assert!(parts.len() >= 2);
        assert!(parts[0].parse::<u32>().is_ok());
    }

    #[test]
    fn test_output_format_values() {
        assert_eq!(OutputFormat::Auto as i32, 0);
        assert_eq!(OutputFormat::Table as i32, 1);
        assert_eq!(OutputFormat::Json as i32, 2);
        assert_eq!(OutputFormat::Plain as i32, 3);
    }

    #[test]
    fn test_parse_field() {
        assert_eq!(
            parse_field("library=CENTRAL").unwrap(),
            ("library".to_string(), "CENTRAL".to_string())
        );
        assert_eq!(
            parse_field("sort_by=a=b").unwrap(),
            ("sort_by".to_string(), "a=b".to_string())
        );
        assert!(parse_field("library").is_err());
        assert!(parse_field("=ALL").is_err());
    }

    #[test]
    fn test_build_payload_overrides_defaults() {
        assert!(build_payload("Dune", &[]).is_none());

        let payload = build_payload("Dune", &[("library".into(), "CENTRAL".into())]).unwrap();
        assert_eq!(payload.get("library"), Some("CENTRAL"));
        assert_eq!(payload.get("searchdata1"), Some("Dune"));
    }

    #[test]
    fn test_parse_titles() {
        let titles = parse_titles("Dune\n\n  # to read next\n  Emma  \n");
        assert_eq!(titles, vec!["Dune", "Emma"]);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("Cien años de soledad", 10), "Cien añ...");
    }

    #[test]
    fn test_cli_parses_search() {
        let cli = Cli::try_parse_from([
            "library-status",
            "--catalog",
            "legacy",
            "search",
            "Dune",
            "--field",
            "library=ALL",
        ])
        .unwrap();

        assert_eq!(cli.catalog.as_deref(), Some("legacy"));
        match cli.command {
            Commands::Search { title, fields, .. } => {
                assert_eq!(title, "Dune");
                assert_eq!(fields, vec![("library".to_string(), "ALL".to_string())]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_status_cell_keeps_status_text() {
        use library_status::models::BookRecordBuilder;

        let live = BookRecordBuilder::new("Dune", "Herbert, Frank")
            .status("Checked In (Current holds: 2)")
            .build();
        let unchecked = BookRecordBuilder::new("Dune", "Herbert, Frank").build();

        assert!(live.has_live_status());
        assert_eq!(status_cell(&live).content(), "Checked In (Current holds: 2)");
        assert!(!unchecked.has_live_status());
        assert_eq!(status_cell(&unchecked).content(), "N/A");
    }

    #[test]
    fn test_capability_names() {
        let caps = CatalogCapabilities::PAGE_CONTENT | CatalogCapabilities::BROWSER;
        assert_eq!(capability_names(caps), vec!["page-content", "browser"]);
    }
}
