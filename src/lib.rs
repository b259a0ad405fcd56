//! Catalog Aggregator Library
//!
//! Combines independently paginated, independently sorted upstream catalogs
//! (movies, tv) into one virtual collection with global sorting, kind
//! filtering and stable pagination. See `engine` for the windowing and
//! backfill rules.

pub mod api;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod merge;
pub mod models;
pub mod normalize;
pub mod sort;
pub mod sources;

pub use cache::{CacheKey, PageCache, SourceId};
pub use config::AggregatorConfig;
pub use engine::{AggregationEngine, EstimateLimits};
pub use error::{AggregateError, FetchError};
pub use models::{
    AggregateResult, ChronoKey, ExploreParams, FilterState, Kind, NormalizedItem, PageRequest,
    RawItem, UpstreamPageResult,
};
pub use sort::{translate, NativeSort, SortDirection, SortField, SortOption};
pub use sources::{CatalogSource, ListingFilter, SearchSource};
