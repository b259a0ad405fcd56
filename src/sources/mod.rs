//! Upstream source adapters
//!
//! One `CatalogSource` per listable kind plus one `SearchSource` for the
//! multi-kind search endpoint. Adapters own their transport concerns (auth,
//! base URL, timeout) and declare their page ceiling and default sort.

pub mod cached; // Cache-checked decorators used by the engine
pub mod tmdb; // reqwest-backed adapters for the upstream catalog API

use async_trait::async_trait;

use crate::error::FetchError;
use crate::models::{Kind, UpstreamPageResult};
use crate::sort::NativeSort;

pub use cached::{CachedSearch, CachedSource};
pub use tmdb::{DiscoverSource, MultiSearchSource, TmdbClient};

/// Upstream page ceiling of the catalog API
pub const DEFAULT_MAX_PAGE: u32 = 500;

/// Items per upstream page
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Filters that change a listing response
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ListingFilter {
    pub genre: Option<u32>,
}

impl ListingFilter {
    /// Stable text form, used in cache keys.
    pub fn fingerprint(&self) -> String {
        match self.genre {
            Some(genre) => format!("genre={}", genre),
            None => String::new(),
        }
    }
}

/// A paginated, single-kind listing with one native sort key per call
#[async_trait]
pub trait CatalogSource: Send + Sync {
    fn kind(&self) -> Kind;

    fn max_page(&self) -> u32 {
        DEFAULT_MAX_PAGE
    }

    /// Nominal number of items on one native page.
    fn page_size(&self) -> usize {
        DEFAULT_PAGE_SIZE
    }

    fn default_sort(&self) -> NativeSort {
        NativeSort::POPULARITY_DESC
    }

    fn clamp_page(&self, page: u32) -> u32 {
        page.clamp(1, self.max_page().max(1))
    }

    /// Fetch one native page. An empty page is a success, not an error.
    async fn fetch_page(
        &self,
        page: u32,
        sort: &NativeSort,
        filter: &ListingFilter,
    ) -> Result<UpstreamPageResult, FetchError>;
}

/// Multi-kind search; results are mixed and carry no native sort
#[async_trait]
pub trait SearchSource: Send + Sync {
    fn max_page(&self) -> u32 {
        DEFAULT_MAX_PAGE
    }

    fn clamp_page(&self, page: u32) -> u32 {
        page.clamp(1, self.max_page().max(1))
    }

    async fn search(&self, query: &str, page: u32) -> Result<UpstreamPageResult, FetchError>;
}
