use chrono::NaiveDate;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeSet;

use crate::config::AggregatorConfig;
use crate::sort::SortOption;

/// Upstream records are kept exactly as received.
pub type RawItem = Value;

/// Item categories served by the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    Movie,
    Tv,
    /// Only reachable through search; has no listing or native sort of its own.
    Person,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Movie => "movie",
            Kind::Tv => "tv",
            Kind::Person => "person",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "movie" => Some(Kind::Movie),
            "tv" => Some(Kind::Tv),
            "person" => Some(Kind::Person),
            _ => None,
        }
    }

    /// Whether the upstream exposes a sortable listing for this kind.
    pub fn has_listing(&self) -> bool {
        !matches!(self, Kind::Person)
    }
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Chronological sort key.
///
/// `Unknown` covers missing and unparsable dates and is the smallest value,
/// so it lands before every known date ascending and after them descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ChronoKey {
    #[default]
    Unknown,
    Known(NaiveDate),
}

impl ChronoKey {
    pub fn parse(s: Option<&str>) -> Self {
        s.and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
            .map(ChronoKey::Known)
            .unwrap_or(ChronoKey::Unknown)
    }

    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            ChronoKey::Known(d) => Some(*d),
            ChronoKey::Unknown => None,
        }
    }
}

impl Serialize for ChronoKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.date().serialize(serializer)
    }
}

/// Canonical comparison record for one upstream item
#[derive(Debug, Clone, Serialize)]
pub struct NormalizedItem {
    pub id: u64,
    pub kind: Kind,
    pub popularity: f64,
    pub quality: f64,
    pub chrono_key: ChronoKey,
    pub monetary_key: f64,
    pub raw: RawItem,
}

impl NormalizedItem {
    #[inline]
    pub fn identity(&self) -> (Kind, u64) {
        (self.kind, self.id)
    }
}

/// One page as reported by an upstream listing or search endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpstreamPageResult {
    #[serde(rename = "results", default)]
    pub raw_items: Vec<RawItem>,
    #[serde(rename = "total_results", default)]
    pub total_items: u64,
    #[serde(default)]
    pub total_pages: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    /// Kinds with their own listing (movie, tv).
    pub active_kinds: BTreeSet<Kind>,
    /// Keep person results on the search path.
    pub include_people: bool,
    pub search_query: Option<String>,
    /// At most three, oldest first. The first one is sent upstream.
    pub genres: Vec<u32>,
}

pub const MAX_SELECTED_GENRES: usize = 3;

impl FilterState {
    pub fn new(kinds: impl IntoIterator<Item = Kind>) -> Self {
        Self {
            active_kinds: kinds.into_iter().filter(Kind::has_listing).collect(),
            ..Self::default()
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        let query = query.into();
        let trimmed = query.trim();
        self.search_query = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
        self
    }

    pub fn with_people(mut self, include_people: bool) -> Self {
        self.include_people = include_people;
        self
    }

    pub fn with_genres(mut self, genres: impl IntoIterator<Item = u32>) -> Self {
        let mut genres: Vec<u32> = genres.into_iter().collect();
        if genres.len() > MAX_SELECTED_GENRES {
            genres.drain(..genres.len() - MAX_SELECTED_GENRES);
        }
        self.genres = genres;
        self
    }

    pub fn query(&self) -> Option<&str> {
        self.search_query.as_deref()
    }

    pub fn primary_genre(&self) -> Option<u32> {
        self.genres.first().copied()
    }

    /// Whether a search result of `kind` survives kind filtering.
    pub fn admits(&self, kind: Kind) -> bool {
        match kind {
            Kind::Person => self.include_people,
            other => self.active_kinds.contains(&other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub virtual_page: u32,
    pub page_size: usize,
    pub sort: SortOption,
    pub filter: FilterState,
}

impl PageRequest {
    pub fn new(virtual_page: u32, page_size: usize, sort: SortOption, filter: FilterState) -> Self {
        Self {
            virtual_page: virtual_page.max(1),
            page_size,
            sort,
            filter,
        }
    }

    /// Build a request from explore-style query parameters.
    pub fn from_params(params: &ExploreParams, config: &AggregatorConfig) -> Self {
        let mut kinds = Vec::with_capacity(2);
        if params.movies.unwrap_or(true) {
            kinds.push(Kind::Movie);
        }
        if params.tv.unwrap_or(true) {
            kinds.push(Kind::Tv);
        }

        let genres = params
            .genres
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .filter_map(|g| g.trim().parse::<u32>().ok());

        let filter = FilterState::new(kinds)
            .with_query(params.query.clone().unwrap_or_default())
            .with_people(params.people.unwrap_or(false))
            .with_genres(genres);

        let sort = params
            .sort
            .as_deref()
            .and_then(SortOption::parse)
            .unwrap_or_default();

        let page = params.page.unwrap_or(1).clamp(1, config.max_total_pages.max(1));

        Self::new(page, config.page_size, sort, filter)
    }
}

/// Query parameters accepted by the explore surfaces
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExploreParams {
    pub query: Option<String>,
    pub page: Option<u32>,
    pub movies: Option<bool>,
    pub tv: Option<bool>,
    pub people: Option<bool>,
    pub sort: Option<String>,
    /// Comma separated genre ids
    pub genres: Option<String>,
}

/// One virtual page of the combined catalog
#[derive(Debug, Clone, Default, Serialize)]
pub struct AggregateResult {
    pub virtual_page: u32,
    pub items: Vec<NormalizedItem>,
    pub total_items_estimate: u64,
    pub total_pages_estimate: u32,
    /// Kinds skipped because their upstream failed.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub degraded_kinds: Vec<Kind>,
}

impl AggregateResult {
    pub fn empty(virtual_page: u32) -> Self {
        Self {
            virtual_page,
            ..Self::default()
        }
    }

    pub fn is_degraded(&self) -> bool {
        !self.degraded_kinds.is_empty()
    }
}
