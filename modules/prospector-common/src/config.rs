use std::env;
use std::str::FromStr;

/// Run configuration loaded from environment variables. Every scalar knob
/// has a documented default; only the search matrix is required.
#[derive(Debug, Clone)]
pub struct Config {
    /// Locations half of the search matrix.
    pub locations: Vec<String>,
    /// Categories half of the search matrix.
    pub categories: Vec<String>,

    /// Size of the worker pool. Fixed at start.
    pub worker_count: usize,
    /// Cap on listings consumed per search term.
    pub max_results_per_search: usize,
    /// Politeness delay between listings, milliseconds.
    pub listing_delay_ms: u64,
    /// Politeness delay between search terms, milliseconds.
    pub search_delay_ms: u64,
    /// Good prospects rated below this are still excluded.
    pub min_rating: f64,
    /// Stop the run once this many leads were added. 0 = unbounded.
    pub target_lead_count: u32,

    /// Quality scores below this classify as a poor-quality prospect.
    pub quality_threshold: u8,
    /// External scoring attempts per URL before the failure is fatal.
    pub quality_max_attempts: u32,
    /// Base backoff between scoring retries, milliseconds. Doubles per retry.
    pub quality_backoff_ms: u64,
    /// Hard per-attempt timeout for the scoring call, seconds.
    pub quality_timeout_secs: u64,

    /// External scoring service key. Empty = use the local heuristic.
    pub pagespeed_api_key: String,
    /// Postgres connection string. Not needed for dry runs.
    pub database_url: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            locations: required_list("PROSPECTOR_LOCATIONS"),
            categories: required_list("PROSPECTOR_CATEGORIES"),
            worker_count: parsed_env("PROSPECTOR_WORKERS", 3),
            max_results_per_search: parsed_env("PROSPECTOR_MAX_RESULTS", 25),
            listing_delay_ms: parsed_env("PROSPECTOR_LISTING_DELAY_MS", 1500),
            search_delay_ms: parsed_env("PROSPECTOR_SEARCH_DELAY_MS", 4000),
            min_rating: parsed_env("PROSPECTOR_MIN_RATING", 3.0),
            target_lead_count: parsed_env("PROSPECTOR_TARGET_LEADS", 0),
            quality_threshold: parsed_env("PROSPECTOR_QUALITY_THRESHOLD", 60),
            quality_max_attempts: parsed_env("PROSPECTOR_QUALITY_ATTEMPTS", 5),
            quality_backoff_ms: parsed_env("PROSPECTOR_QUALITY_BACKOFF_MS", 2000),
            quality_timeout_secs: parsed_env("PROSPECTOR_QUALITY_TIMEOUT_SECS", 60),
            pagespeed_api_key: env::var("PAGESPEED_API_KEY").unwrap_or_default(),
            database_url: env::var("DATABASE_URL").ok(),
        }
    }
}

/// Parse a comma-separated list, trimming blanks.
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn required_list(key: &str) -> Vec<String> {
    let raw = env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"));
    let list = parse_list(&raw);
    if list.is_empty() {
        panic!("{key} must contain at least one entry");
    }
    list
}

fn parsed_env<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("{key} must be a valid number, got {raw:?}")),
        Err(_) => default,
    }
}
