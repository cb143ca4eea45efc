use rand::Rng;
use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Gleaner
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub harvest: HarvestConfig,
    #[serde(default)]
    pub pacing: PacingConfig,
    #[serde(default)]
    pub session: SessionConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(rename = "source", default)]
    pub sources: Vec<SourceConfig>,
}

/// Per-run collection limits
#[derive(Debug, Clone, Deserialize)]
pub struct HarvestConfig {
    /// Maximum number of new identifiers accepted per run
    pub quota: usize,

    /// Listing pages in a row without anything new before the walk stops
    #[serde(rename = "max-consecutive-empty-pages", default = "default_empty_pages")]
    pub max_consecutive_empty_pages: u32,

    /// Items per listing page, used to turn a total count into pages
    #[serde(rename = "page-size", default = "default_page_size")]
    pub page_size: u32,

    /// Optional ceiling on the discovered page budget
    #[serde(rename = "max-pages", default)]
    pub max_pages: Option<u32>,

    /// Number of concurrent detail workers
    #[serde(default = "default_workers")]
    pub workers: usize,
}

/// A `[min, max]` pause window in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "[u64; 2]")]
pub struct PauseRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl PauseRange {
    pub const ZERO: PauseRange = PauseRange {
        min_ms: 0,
        max_ms: 0,
    };

    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    /// Picks a uniformly random duration inside the window
    pub fn sample(&self) -> Duration {
        if self.max_ms <= self.min_ms {
            return Duration::from_millis(self.min_ms);
        }
        let ms = rand::rng().random_range(self.min_ms..=self.max_ms);
        Duration::from_millis(ms)
    }

    pub fn is_inverted(&self) -> bool {
        self.min_ms > self.max_ms
    }
}

impl From<[u64; 2]> for PauseRange {
    fn from(pair: [u64; 2]) -> Self {
        Self::new(pair[0], pair[1])
    }
}

/// Anti-blocking pacing between page and detail loads
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// Pause between consecutive listing pages
    #[serde(rename = "page-pause-ms")]
    pub page_pause_ms: PauseRange,

    /// Pause between consecutive detail fetches
    #[serde(rename = "short-pause-ms")]
    pub short_pause_ms: PauseRange,

    /// Pause used instead of the short one every `long_pause_every` successes
    #[serde(rename = "long-pause-ms")]
    pub long_pause_ms: PauseRange,

    #[serde(rename = "long-pause-every")]
    pub long_pause_every: u32,

    /// Fetches (successful or not) before a worker replaces its session
    #[serde(rename = "rotate-session-every")]
    pub rotate_session_every: u32,

    /// Total attempts per detail fetch for transient failures
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,

    /// Linear backoff step between attempts
    #[serde(rename = "retry-backoff-ms")]
    pub retry_backoff_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            page_pause_ms: PauseRange::new(2_000, 5_000),
            short_pause_ms: PauseRange::new(2_000, 5_000),
            long_pause_ms: PauseRange::new(60_000, 300_000),
            long_pause_every: 50,
            rotate_session_every: 20,
            max_attempts: 2,
            retry_backoff_ms: 5_000,
        }
    }
}

/// HTTP session settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Upper bound on a single page or detail load
    #[serde(rename = "page-load-timeout-secs")]
    pub page_load_timeout_secs: u64,

    #[serde(rename = "connect-timeout-secs")]
    pub connect_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("Gleaner/{}", env!("CARGO_PKG_VERSION")),
            page_load_timeout_secs: 20,
            connect_timeout_secs: 10,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving the per-run CSV artifacts
    pub directory: String,
}

/// Which durable store keeps the seen identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DedupBackendKind {
    #[default]
    File,
    Sqlite,
}

/// Dedup store configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    pub backend: DedupBackendKind,

    /// Directory holding `<scope>_id_history.txt` files
    pub directory: String,

    /// SQLite database used by the `sqlite` backend
    #[serde(rename = "database-path")]
    pub database_path: String,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            backend: DedupBackendKind::File,
            directory: "./state".to_string(),
            database_path: "./state/gleaner.db".to_string(),
        }
    }
}

/// Optional log file next to console output
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// Log records are appended to this file as well
    #[serde(default)]
    pub file: Option<String>,
}

/// One listing source and how to read its markup
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub name: String,

    #[serde(default)]
    pub category: Option<String>,

    /// Name of the identifier history shared by this source; defaults to `name`
    #[serde(rename = "dedup-scope", default)]
    pub dedup_scope: Option<String>,

    /// Listing page template containing `{page}`
    #[serde(rename = "listing-url")]
    pub listing_url: String,

    /// Page inspected for the page budget; defaults to listing page 1
    #[serde(rename = "entry-url", default)]
    pub entry_url: Option<String>,

    #[serde(rename = "card-selector")]
    pub card_selector: String,

    #[serde(rename = "link-selector", default)]
    pub link_selector: Option<String>,

    #[serde(rename = "link-attr", default = "default_link_attr")]
    pub link_attr: String,

    /// Regex applied to the canonical link; first capture group is the identifier
    #[serde(rename = "id-pattern")]
    pub id_pattern: String,

    #[serde(rename = "listing-ready-selector", default)]
    pub listing_ready_selector: Option<String>,

    #[serde(rename = "detail-ready-selector", default)]
    pub detail_ready_selector: Option<String>,

    #[serde(default)]
    pub budget: BudgetConfig,

    #[serde(rename = "field", default)]
    pub fields: Vec<FieldConfig>,
}

impl SourceConfig {
    pub fn scope(&self) -> &str {
        self.dedup_scope.as_deref().unwrap_or(&self.name)
    }

    /// `name` or `name/category`, used for selection and logging
    pub fn label(&self) -> String {
        match &self.category {
            Some(category) => format!("{}/{}", self.name, category),
            None => self.name.clone(),
        }
    }

    pub fn entry_url(&self) -> String {
        self.entry_url
            .clone()
            .unwrap_or_else(|| self.listing_url.replace("{page}", "1"))
    }
}

/// How the page budget is discovered
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "strategy", rename_all = "kebab-case")]
pub enum BudgetConfig {
    /// Largest integer among the texts of the matched pagination elements
    PaginationLinks { selector: String },
    /// Page count captured by `pattern` from the matched element's text
    PaginationText { selector: String, pattern: String },
    /// Total item count captured by `pattern`, divided by the page size
    TotalCount { selector: String, pattern: String },
    /// Configured page count, nothing is loaded
    Fixed { pages: u32 },
}

impl Default for BudgetConfig {
    fn default() -> Self {
        BudgetConfig::PaginationLinks {
            selector: "ul.pagination li a".to_string(),
        }
    }
}

/// Whether a field keeps the first match or joins all of them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FieldMode {
    #[default]
    First,
    All,
}

/// One extracted detail column
#[derive(Debug, Clone, Deserialize)]
pub struct FieldConfig {
    pub name: String,

    pub selector: String,

    /// Read this attribute instead of the element text
    #[serde(default)]
    pub attr: Option<String>,

    #[serde(default)]
    pub mode: FieldMode,

    #[serde(default = "default_join")]
    pub join: String,

    #[serde(rename = "strip-prefix", default)]
    pub strip_prefix: Option<String>,
}

fn default_empty_pages() -> u32 {
    5
}

fn default_page_size() -> u32 {
    20
}

fn default_workers() -> usize {
    1
}

fn default_link_attr() -> String {
    "href".to_string()
}

fn default_join() -> String {
    ". ".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pause_range_sample_within_bounds() {
        let range = PauseRange::new(10, 20);
        for _ in 0..50 {
            let d = range.sample();
            assert!(d >= Duration::from_millis(10));
            assert!(d <= Duration::from_millis(20));
        }
    }

    #[test]
    fn test_pause_range_degenerate() {
        assert_eq!(PauseRange::ZERO.sample(), Duration::ZERO);
        assert_eq!(PauseRange::new(7, 7).sample(), Duration::from_millis(7));
        assert!(PauseRange::new(9, 3).is_inverted());
    }

    #[test]
    fn test_source_defaults() {
        let source: SourceConfig = toml::from_str(
            r#"
name = "Board"
listing-url = "https://example.com/jobs?page={page}"
card-selector = "div.job a"
id-pattern = '/(\d+)\.html'
"#,
        )
        .unwrap();

        assert_eq!(source.scope(), "Board");
        assert_eq!(source.label(), "Board");
        assert_eq!(source.link_attr, "href");
        assert_eq!(source.entry_url(), "https://example.com/jobs?page=1");
        assert!(matches!(
            source.budget,
            BudgetConfig::PaginationLinks { .. }
        ));
    }

    #[test]
    fn test_budget_strategies_parse() {
        #[derive(Deserialize)]
        struct Wrapper {
            budget: BudgetConfig,
        }

        let fixed: Wrapper = toml::from_str("[budget]\nstrategy = \"fixed\"\npages = 4\n").unwrap();
        assert!(matches!(fixed.budget, BudgetConfig::Fixed { pages: 4 }));

        let text: Wrapper = toml::from_str(
            "[budget]\nstrategy = \"pagination-text\"\nselector = \"#paginate\"\npattern = '/\\s*(\\d+)\\s*trang'\n",
        )
        .unwrap();
        assert!(matches!(text.budget, BudgetConfig::PaginationText { .. }));
    }
}
