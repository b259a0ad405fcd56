//! Aggregator configuration
//!
//! Loaded from an optional TOML file (`CATALOG_CONFIG_PATH`) and then
//! overridden by environment variables. Missing values fall back to defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::sources::DEFAULT_PAGE_SIZE;

/// Largest accepted virtual page. A single-kind request is served from one
/// upstream page, so a larger page could never be filled.
pub const MAX_PAGE_SIZE: usize = DEFAULT_PAGE_SIZE;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Base URL of the upstream catalog API
    pub api_base_url: String,

    /// Bearer token for the upstream API
    #[serde(skip_serializing)]
    pub api_token: Option<String>,

    /// Language requested from the upstream
    pub language: String,

    /// Items per virtual page
    pub page_size: usize,

    /// Upstream page ceiling
    pub max_native_page: u32,

    /// Ceiling for reported page estimates and accepted virtual pages
    pub max_total_pages: u32,

    /// Ceiling for reported item estimates
    pub max_total_items: u64,

    pub cache_ttl_secs: u64,

    /// Per upstream call
    pub request_timeout_secs: u64,

    /// Whole aggregation, enforced by the caller
    pub aggregate_timeout_secs: u64,

    /// Vote floor applied to rating sorts
    pub min_vote_count: u32,

    /// HTTP port for the server binary
    pub port: u16,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.themoviedb.org/3".to_string(),
            api_token: None,
            language: "en-US".to_string(),
            page_size: 20,
            max_native_page: 500,
            max_total_pages: 500,
            max_total_items: 10_000,
            cache_ttl_secs: 3600,
            request_timeout_secs: 10,
            aggregate_timeout_secs: 20,
            min_vote_count: 50,
            port: 8080,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse::<T>().ok())
}

impl AggregatorConfig {
    /// Load from TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    /// File (if `CATALOG_CONFIG_PATH` is set) then environment overrides.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        let path = std::env::var("CATALOG_CONFIG_PATH").ok();
        Self::resolve(path.as_deref().map(Path::new))
    }

    /// Explicit file (or defaults), then environment overrides.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        dotenv::dotenv().ok();
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("CATALOG_API_BASE") {
            self.api_base_url = v;
        }
        if let Ok(v) = std::env::var("CATALOG_API_TOKEN") {
            if !v.trim().is_empty() {
                self.api_token = Some(v.trim().to_string());
            }
        }
        if let Ok(v) = std::env::var("CATALOG_LANGUAGE") {
            self.language = v;
        }
        if let Some(v) = env_parse("CATALOG_PAGE_SIZE") {
            self.page_size = v;
        }
        if let Some(v) = env_parse("CATALOG_MAX_NATIVE_PAGE") {
            self.max_native_page = v;
        }
        if let Some(v) = env_parse("CATALOG_MAX_TOTAL_PAGES") {
            self.max_total_pages = v;
        }
        if let Some(v) = env_parse("CATALOG_MAX_TOTAL_ITEMS") {
            self.max_total_items = v;
        }
        if let Some(v) = env_parse("CATALOG_CACHE_TTL_SECS") {
            self.cache_ttl_secs = v;
        }
        if let Some(v) = env_parse("CATALOG_REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = v;
        }
        if let Some(v) = env_parse("CATALOG_AGGREGATE_TIMEOUT_SECS") {
            self.aggregate_timeout_secs = v;
        }
        if let Some(v) = env_parse("CATALOG_MIN_VOTE_COUNT") {
            self.min_vote_count = v;
        }
        if let Some(v) = env_parse("PORT") {
            self.port = v;
        }
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            (1..=MAX_PAGE_SIZE).contains(&self.page_size),
            "page_size must be between 1 and {}, got {}",
            MAX_PAGE_SIZE,
            self.page_size
        );
        anyhow::ensure!(self.max_native_page > 0, "max_native_page must be positive");
        anyhow::ensure!(self.max_total_pages > 0, "max_total_pages must be positive");
        anyhow::ensure!(
            self.api_base_url.starts_with("http://") || self.api_base_url.starts_with("https://"),
            "api_base_url must be an http(s) URL: {}",
            self.api_base_url
        );
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn aggregate_timeout(&self) -> Duration {
        Duration::from_secs(self.aggregate_timeout_secs)
    }
}
