//! Aggregation engine
//!
//! Turns one `PageRequest` over the virtual, combined catalog into upstream
//! page fetches, merges what comes back and slices the requested window.
//!
//! # Phases
//!
//! ```text
//! Init -> FetchRound -> MergeAndSlice -> Sufficient ---------------------> Done
//!                                     \-> NeedBackfill -> BackfillFetch -> MergeAndSlice -> Done
//! ```
//!
//! Only the multi-kind listing path can reach `NeedBackfill`, and it does so at
//! most once per call.
//!
//! # Windowing
//!
//! With `N` active listings of `s` items per native page, one round yields
//! `items_per_round = N * s` items (about twice the page size for two kinds).
//! Virtual page `p` starts at global offset `(p - 1) * page_size`. It reads
//! the native page whose round holds that offset,
//! `offset / items_per_round + 1`, and slices `page_size` items from the
//! merged round starting at `offset mod items_per_round`. A window that runs
//! past the end of the round is topped up by the backfill round. The order is
//! exact within a round and approximate across rounds.

use futures_util::future::join_all;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::cache::PageCache;
use crate::config::AggregatorConfig;
use crate::error::{AggregateError, FetchError};
use crate::merge::{dedupe, merge_rounds, sort_items};
use crate::models::{
    AggregateResult, FilterState, Kind, NormalizedItem, PageRequest, UpstreamPageResult,
};
use crate::normalize::{normalize_mixed, normalize_page};
use crate::sort::{translate, NativeSort, SortOption};
use crate::sources::{
    CachedSearch, CachedSource, CatalogSource, DiscoverSource, ListingFilter, MultiSearchSource,
    SearchSource, TmdbClient,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Init,
    FetchRound,
    MergeAndSlice,
    Sufficient,
    NeedBackfill,
    BackfillFetch,
    Done,
}

/// Hard ceilings on reported estimates
#[derive(Debug, Clone, Copy)]
pub struct EstimateLimits {
    pub max_total_items: u64,
    pub max_total_pages: u32,
}

impl Default for EstimateLimits {
    fn default() -> Self {
        Self {
            max_total_items: 10_000,
            max_total_pages: 500,
        }
    }
}

impl EstimateLimits {
    fn items(&self, n: u64) -> u64 {
        n.min(self.max_total_items)
    }

    fn pages(&self, n: u32) -> u32 {
        n.min(self.max_total_pages)
    }
}

/// Outcome of one adapter call inside a round
struct Fetched {
    kind: Kind,
    native_page: u32,
    max_page: u32,
    result: Result<UpstreamPageResult, FetchError>,
}

struct Planned {
    source: Arc<dyn CatalogSource>,
    native_page: u32,
    sort: NativeSort,
}

pub struct AggregationEngine {
    sources: BTreeMap<Kind, Arc<dyn CatalogSource>>,
    search: Option<Arc<dyn SearchSource>>,
    cache: Arc<PageCache>,
    limits: EstimateLimits,
}

impl AggregationEngine {
    pub fn new(cache: Arc<PageCache>) -> Self {
        Self {
            sources: BTreeMap::new(),
            search: None,
            cache,
            limits: EstimateLimits::default(),
        }
    }

    /// Register a listing adapter. It is wrapped so every call is cache-checked.
    pub fn with_source(mut self, source: Arc<dyn CatalogSource>) -> Self {
        let kind = source.kind();
        let cached: Arc<dyn CatalogSource> =
            Arc::new(CachedSource::new(source, self.cache.clone()));
        self.sources.insert(kind, cached);
        self
    }

    pub fn with_search(mut self, search: Arc<dyn SearchSource>) -> Self {
        self.search = Some(Arc::new(CachedSearch::new(search, self.cache.clone())));
        self
    }

    pub fn with_limits(mut self, limits: EstimateLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Engine wired to the upstream catalog API.
    pub fn from_config(config: &AggregatorConfig, cache: Arc<PageCache>) -> anyhow::Result<Self> {
        let client = Arc::new(TmdbClient::new(config)?);
        Ok(Self::new(cache)
            .with_source(Arc::new(DiscoverSource::new(Kind::Movie, client.clone(), config)))
            .with_source(Arc::new(DiscoverSource::new(Kind::Tv, client.clone(), config)))
            .with_search(Arc::new(MultiSearchSource::new(client, config)))
            .with_limits(EstimateLimits {
                max_total_items: config.max_total_items,
                max_total_pages: config.max_total_pages,
            }))
    }

    pub fn cache(&self) -> &Arc<PageCache> {
        &self.cache
    }

    /// Same as `aggregate`, but gives up after `timeout`. In-flight upstream
    /// calls are dropped with the future; pages that already arrived stay cached.
    pub async fn aggregate_with_timeout(
        &self,
        request: &PageRequest,
        timeout: Duration,
    ) -> Result<AggregateResult, AggregateError> {
        match tokio::time::timeout(timeout, self.aggregate(request)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    page = request.virtual_page,
                    timeout_ms = timeout.as_millis() as u64,
                    "aggregation timed out"
                );
                Err(AggregateError::Timeout {
                    after_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    pub async fn aggregate(
        &self,
        request: &PageRequest,
    ) -> Result<AggregateResult, AggregateError> {
        let filter = &request.filter;
        let page = request.virtual_page.max(1);
        trace_phase(Phase::Init, page);

        if filter.active_kinds.is_empty() || request.page_size == 0 {
            debug!(page, "no active kinds, empty result");
            return Ok(AggregateResult::empty(page));
        }

        info!(
            page,
            page_size = request.page_size,
            sort = %request.sort,
            kinds = ?filter.active_kinds,
            query = filter.query().unwrap_or(""),
            "aggregating"
        );

        let single_kind = match filter.active_kinds.len() {
            1 => filter.active_kinds.iter().next().copied(),
            _ => None,
        };

        let result = match (filter.query(), single_kind) {
            (Some(query), _) => self.searched(query, page, request).await,
            (None, Some(kind)) => self.pass_through(kind, page, request).await,
            (None, None) => self.merged(page, request).await,
        };

        trace_phase(Phase::Done, page);
        result
    }

    fn listing_filter(filter: &FilterState) -> ListingFilter {
        ListingFilter {
            genre: filter.primary_genre(),
        }
    }

    /// Native sort for one adapter. A kind that cannot express the requested
    /// field is fetched in its own declared default order.
    fn native_sort(source: &dyn CatalogSource, requested: SortOption) -> NativeSort {
        let native = translate(source.kind(), requested);
        if native.fallback {
            NativeSort {
                fallback: true,
                ..source.default_sort()
            }
        } else {
            native
        }
    }

    // =========================================================================
    // SINGLE KIND
    // =========================================================================

    async fn pass_through(
        &self,
        kind: Kind,
        page: u32,
        request: &PageRequest,
    ) -> Result<AggregateResult, AggregateError> {
        let source = self.sources.get(&kind).ok_or_else(|| AggregateError::AllSourcesFailed {
            message: format!("no source registered for {}", kind),
        })?;

        let native = Self::native_sort(source.as_ref(), request.sort);
        let native_page = source.clamp_page(page);
        trace_phase(Phase::FetchRound, page);

        let fetched = source
            .fetch_page(native_page, &native, &Self::listing_filter(&request.filter))
            .await
            .map_err(|e| {
                error!(%kind, native_page, error = %e, "single source failed");
                AggregateError::AllSourcesFailed {
                    message: format!("{}: {}", kind, e),
                }
            })?;

        trace_phase(Phase::MergeAndSlice, page);
        let mut items = dedupe(normalize_page(kind, fetched.raw_items));
        // The listing already ordered the page unless it had to fall back.
        if native.fallback {
            sort_items(&mut items, request.sort);
        }
        items.truncate(request.page_size);

        Ok(AggregateResult {
            virtual_page: page,
            items,
            total_items_estimate: self.limits.items(fetched.total_items),
            total_pages_estimate: self.limits.pages(fetched.total_pages),
            degraded_kinds: Vec::new(),
        })
    }

    // =========================================================================
    // SEARCH
    // =========================================================================

    /// One search page, filtered by kind and sorted locally. No cross-page
    /// merge: search result sets are small and re-querying for a global order
    /// is not worth it, so ordering is only correct within the page.
    async fn searched(
        &self,
        query: &str,
        page: u32,
        request: &PageRequest,
    ) -> Result<AggregateResult, AggregateError> {
        let search = self.search.as_ref().ok_or_else(|| AggregateError::AllSourcesFailed {
            message: "no search source registered".to_string(),
        })?;

        trace_phase(Phase::FetchRound, page);
        let fetched = search.search(query, page).await.map_err(|e| {
            error!(page, query, error = %e, "search failed");
            AggregateError::AllSourcesFailed {
                message: format!("search: {}", e),
            }
        })?;

        trace_phase(Phase::MergeAndSlice, page);
        let filter = &request.filter;
        let mut items = dedupe(
            normalize_mixed(fetched.raw_items)
                .into_iter()
                .filter(|item| filter.admits(item.kind)),
        );
        if !request.sort.is_default() {
            sort_items(&mut items, request.sort);
        }
        items.truncate(request.page_size);

        Ok(AggregateResult {
            virtual_page: page,
            items,
            total_items_estimate: self.limits.items(fetched.total_items),
            total_pages_estimate: self.limits.pages(fetched.total_pages),
            degraded_kinds: Vec::new(),
        })
    }

    // =========================================================================
    // MULTI KIND
    // =========================================================================

    async fn fetch_round(&self, plan: &[Planned], filter: &ListingFilter) -> Vec<Fetched> {
        join_all(plan.iter().map(|p| async move {
            let result = p.source.fetch_page(p.native_page, &p.sort, filter).await;
            Fetched {
                kind: p.source.kind(),
                native_page: p.native_page,
                max_page: p.source.max_page(),
                result,
            }
        }))
        .await
    }

    async fn merged(
        &self,
        page: u32,
        request: &PageRequest,
    ) -> Result<AggregateResult, AggregateError> {
        let page_size = request.page_size;
        let sort = request.sort;
        let filter = Self::listing_filter(&request.filter);

        let sources: Vec<Arc<dyn CatalogSource>> = request
            .filter
            .active_kinds
            .iter()
            .filter_map(|kind| {
                let source = self.sources.get(kind).cloned();
                if source.is_none() {
                    warn!(%kind, "no source registered, skipping kind");
                }
                source
            })
            .collect();

        if sources.is_empty() {
            return Err(AggregateError::AllSourcesFailed {
                message: "no source registered for active kinds".to_string(),
            });
        }

        let items_per_round: usize = sources.iter().map(|s| s.page_size()).sum::<usize>().max(1);
        let offset = (page as usize - 1) * page_size;
        // The round holding the first item of the window.
        let native_page = u32::try_from(offset / items_per_round + 1).unwrap_or(u32::MAX);
        let window_start = offset % items_per_round;

        let plan: Vec<Planned> = sources
            .iter()
            .map(|source| Planned {
                source: source.clone(),
                native_page: source.clamp_page(native_page),
                sort: Self::native_sort(source.as_ref(), sort),
            })
            .collect();

        trace_phase(Phase::FetchRound, page);
        let fetched = self.fetch_round(&plan, &filter).await;

        let mut degraded_kinds = Vec::new();
        let mut failures = Vec::new();
        let mut total_items: u64 = 0;
        let mut total_pages: u32 = 0;
        let mut rounds: Vec<Vec<NormalizedItem>> = Vec::with_capacity(fetched.len());
        let mut next_plan: Vec<Planned> = Vec::new();

        for (f, planned) in fetched.into_iter().zip(plan.iter()) {
            match f.result {
                Ok(result) => {
                    total_items = total_items.saturating_add(result.total_items);
                    total_pages = total_pages.max(result.total_pages);
                    if f.native_page < result.total_pages.min(f.max_page) {
                        next_plan.push(Planned {
                            source: planned.source.clone(),
                            native_page: f.native_page + 1,
                            sort: planned.sort.clone(),
                        });
                    }
                    rounds.push(normalize_page(f.kind, result.raw_items));
                }
                Err(e) => {
                    warn!(
                        kind = %f.kind,
                        native_page = f.native_page,
                        error = %e,
                        "source failed, continuing without it"
                    );
                    failures.push(format!("{}: {}", f.kind, e));
                    degraded_kinds.push(f.kind);
                }
            }
        }

        if rounds.is_empty() {
            error!(page, native_page, "all sources failed");
            return Err(AggregateError::AllSourcesFailed {
                message: failures.join("; "),
            });
        }

        trace_phase(Phase::MergeAndSlice, page);
        let merged = merge_rounds(rounds, sort);
        let round_len = merged.len();
        let mut window: Vec<NormalizedItem> =
            merged.into_iter().skip(window_start).take(page_size).collect();

        debug!(
            page,
            native_page,
            window_start,
            round_len,
            window_len = window.len(),
            "round merged"
        );

        if window.len() >= page_size {
            trace_phase(Phase::Sufficient, page);
        } else if next_plan.is_empty() {
            debug!(page, "window short but upstream exhausted");
            trace_phase(Phase::Sufficient, page);
        } else {
            trace_phase(Phase::NeedBackfill, page);
            self.backfill(page, &mut window, &next_plan, &filter, page_size, sort).await;
        }

        Ok(AggregateResult {
            virtual_page: page,
            items: window,
            total_items_estimate: self.limits.items(total_items),
            total_pages_estimate: self.limits.pages(total_pages),
            degraded_kinds,
        })
    }

    /// Single follow-up round that tops a short window up from the next
    /// native page. New items are merged among themselves, items already in
    /// the window are skipped, and the filled window is re-sorted so the page
    /// stays ordered. Failures here never fail the call.
    async fn backfill(
        &self,
        page: u32,
        window: &mut Vec<NormalizedItem>,
        plan: &[Planned],
        filter: &ListingFilter,
        page_size: usize,
        sort: SortOption,
    ) {
        trace_phase(Phase::BackfillFetch, page);
        let fetched = self.fetch_round(plan, filter).await;

        let rounds: Vec<Vec<NormalizedItem>> = fetched
            .into_iter()
            .filter_map(|f| match f.result {
                Ok(result) => Some(normalize_page(f.kind, result.raw_items)),
                Err(e) => {
                    warn!(
                        kind = %f.kind,
                        native_page = f.native_page,
                        error = %e,
                        "backfill source failed"
                    );
                    None
                }
            })
            .collect();

        trace_phase(Phase::MergeAndSlice, page);
        let present: HashSet<(Kind, u64)> = window.iter().map(NormalizedItem::identity).collect();
        let missing = page_size.saturating_sub(window.len());
        let before = window.len();

        window.extend(
            merge_rounds(rounds, sort)
                .into_iter()
                .filter(|item| !present.contains(&item.identity()))
                .take(missing),
        );
        sort_items(window, sort);

        debug!(added = window.len() - before, window_len = window.len(), "backfill applied");
    }
}

#[inline]
fn trace_phase(phase: Phase, page: u32) {
    debug!(?phase, page, "phase");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FilterState;

    #[test]
    fn test_limits_cap_estimates() {
        let limits = EstimateLimits::default();
        assert_eq!(limits.items(1_000_000), 10_000);
        assert_eq!(limits.items(42), 42);
        assert_eq!(limits.pages(40_000), 500);
    }

    #[tokio::test]
    async fn test_empty_engine_returns_empty_for_no_kinds() {
        let engine = AggregationEngine::new(Arc::new(PageCache::new(Duration::from_secs(1))));
        let request = PageRequest::new(1, 20, SortOption::default(), FilterState::default());
        let result = engine.aggregate(&request).await.unwrap();
        assert!(result.items.is_empty());
        assert_eq!(result.total_pages_estimate, 0);
    }

    #[tokio::test]
    async fn test_missing_source_is_reported() {
        let engine = AggregationEngine::new(Arc::new(PageCache::new(Duration::from_secs(1))));
        let request = PageRequest::new(1, 20, SortOption::default(), FilterState::new([Kind::Tv]));
        let err = engine.aggregate(&request).await.unwrap_err();
        assert!(matches!(err, AggregateError::AllSourcesFailed { .. }));

        let search = PageRequest::new(
            1,
            20,
            SortOption::default(),
            FilterState::new([Kind::Tv]).with_query("lost"),
        );
        assert!(engine.aggregate(&search).await.is_err());
    }
}
