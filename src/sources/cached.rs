//! Cache-checked wrappers around source adapters
//!
//! The engine only ever talks to sources through these, so every upstream
//! page goes through `PageCache` keyed by
//! `(source, native page, native sort, query)`. Only successful responses are
//! stored.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::{CatalogSource, ListingFilter, SearchSource};
use crate::cache::{CacheKey, PageCache, SourceId};
use crate::error::FetchError;
use crate::models::{Kind, UpstreamPageResult};
use crate::sort::NativeSort;

pub struct CachedSource {
    inner: Arc<dyn CatalogSource>,
    cache: Arc<PageCache>,
}

impl CachedSource {
    pub fn new(inner: Arc<dyn CatalogSource>, cache: Arc<PageCache>) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl CatalogSource for CachedSource {
    fn kind(&self) -> Kind {
        self.inner.kind()
    }

    fn max_page(&self) -> u32 {
        self.inner.max_page()
    }

    fn page_size(&self) -> usize {
        self.inner.page_size()
    }

    fn default_sort(&self) -> NativeSort {
        self.inner.default_sort()
    }

    async fn fetch_page(
        &self,
        page: u32,
        sort: &NativeSort,
        filter: &ListingFilter,
    ) -> Result<UpstreamPageResult, FetchError> {
        let page = self.clamp_page(page);
        let key = CacheKey {
            source: SourceId::Listing(self.kind()),
            native_page: page,
            native_sort: sort.sort_by(),
            query: filter.fingerprint(),
        };

        if let Some(hit) = self.cache.get(&key) {
            debug!(kind = %self.kind(), page, sort = %key.native_sort, "listing cache hit");
            return Ok(hit);
        }

        let result = self.inner.fetch_page(page, sort, filter).await?;
        self.cache.put_default(key, result.clone());
        Ok(result)
    }
}

pub struct CachedSearch {
    inner: Arc<dyn SearchSource>,
    cache: Arc<PageCache>,
}

impl CachedSearch {
    pub fn new(inner: Arc<dyn SearchSource>, cache: Arc<PageCache>) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl SearchSource for CachedSearch {
    fn max_page(&self) -> u32 {
        self.inner.max_page()
    }

    async fn search(&self, query: &str, page: u32) -> Result<UpstreamPageResult, FetchError> {
        let page = self.clamp_page(page);
        let key = CacheKey {
            source: SourceId::Search,
            native_page: page,
            native_sort: String::new(),
            query: query.to_string(),
        };

        if let Some(hit) = self.cache.get(&key) {
            debug!(page, query, "search cache hit");
            return Ok(hit);
        }

        let result = self.inner.search(query, page).await?;
        self.cache.put_default(key, result.clone());
        Ok(result)
    }
}
