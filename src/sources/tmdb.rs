//! Catalog REST API adapters
//!
//! `TmdbClient` is the authenticated GET-JSON function; `DiscoverSource`
//! (one per listable kind) and `MultiSearchSource` put the adapter contracts
//! on top of it.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::{CatalogSource, ListingFilter, SearchSource};
use crate::config::AggregatorConfig;
use crate::error::FetchError;
use crate::models::{Kind, UpstreamPageResult};
use crate::sort::NativeSort;

#[derive(Clone)]
pub struct TmdbClient {
    client: Client,
    base_url: String,
    language: String,
}

impl TmdbClient {
    pub fn new(config: &AggregatorConfig) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        if let Some(token) = config.api_token.as_deref() {
            headers.insert(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {}", token)
                    .parse()
                    .context("Invalid catalog api token")?,
            );
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent("CatalogAggregator/1.0")
            .default_headers(headers)
            .build()
            .context("Failed to build TmdbClient")?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            language: config.language.clone(),
        })
    }

    #[inline]
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET `path` with `params` (plus the configured language) and decode JSON.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let url = self.url(path);
        debug!(%url, ?params, "catalog request");

        let resp = self
            .client
            .get(&url)
            .query(&[("language", self.language.as_str())])
            .query(params)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            warn!(%url, status = status.as_u16(), "catalog API error");
            return Err(FetchError::status(
                status.as_u16(),
                format!("GET {}: {}", path, text.chars().take(200).collect::<String>()),
            ));
        }

        resp.json::<T>().await.map_err(|e| {
            FetchError::transport(format!("GET {}: invalid JSON: {}", path, e))
        })
    }
}

/// `/discover/{kind}` listing for one kind
pub struct DiscoverSource {
    kind: Kind,
    client: Arc<TmdbClient>,
    max_page: u32,
    min_vote_count: u32,
}

impl DiscoverSource {
    pub fn new(kind: Kind, client: Arc<TmdbClient>, config: &AggregatorConfig) -> Self {
        Self {
            kind,
            client,
            max_page: config.max_native_page,
            min_vote_count: config.min_vote_count,
        }
    }

    fn params(
        &self,
        page: u32,
        sort: &NativeSort,
        filter: &ListingFilter,
    ) -> Vec<(&'static str, String)> {
        let mut qp: Vec<(&'static str, String)> = Vec::with_capacity(6);
        qp.push(("page", page.to_string()));
        qp.push(("sort_by", sort.sort_by()));
        if let Some(genre) = filter.genre {
            qp.push(("with_genres", genre.to_string()));
        }
        // Rating sorts are meaningless for titles with a handful of votes.
        if sort.is_quality() {
            qp.push(("vote_count.gte", self.min_vote_count.to_string()));
        }
        if self.kind == Kind::Movie {
            qp.push(("include_adult", "false".to_string()));
            qp.push(("include_video", "false".to_string()));
        }
        qp
    }
}

#[async_trait]
impl CatalogSource for DiscoverSource {
    fn kind(&self) -> Kind {
        self.kind
    }

    fn max_page(&self) -> u32 {
        self.max_page
    }

    async fn fetch_page(
        &self,
        page: u32,
        sort: &NativeSort,
        filter: &ListingFilter,
    ) -> Result<UpstreamPageResult, FetchError> {
        let page = self.clamp_page(page);
        let path = format!("/discover/{}", self.kind.as_str());
        self.client
            .get_json(&path, &self.params(page, sort, filter))
            .await
    }
}

/// `/search/multi` across movies, tv and people
pub struct MultiSearchSource {
    client: Arc<TmdbClient>,
    max_page: u32,
}

impl MultiSearchSource {
    pub fn new(client: Arc<TmdbClient>, config: &AggregatorConfig) -> Self {
        Self {
            client,
            max_page: config.max_native_page,
        }
    }
}

#[async_trait]
impl SearchSource for MultiSearchSource {
    fn max_page(&self) -> u32 {
        self.max_page
    }

    async fn search(&self, query: &str, page: u32) -> Result<UpstreamPageResult, FetchError> {
        let page = self.clamp_page(page);
        let params = [
            ("query", query.to_string()),
            ("page", page.to_string()),
            ("include_adult", "false".to_string()),
        ];
        self.client.get_json("/search/multi", &params).await
    }
}
