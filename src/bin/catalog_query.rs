//! Catalog Query
//!
//! Runs a single aggregation against the live upstream and prints the page
//! as JSON. Handy for checking ordering and page boundaries by hand.
//!
//! Usage:
//!   catalog-query --page 3 --sort vote_average.desc --no-tv
//!   catalog-query --query "heat" --people
//!
//! Environment Variables:
//!   CATALOG_API_TOKEN - Bearer token for the upstream API
//!   CATALOG_CONFIG_PATH - Path to TOML config file

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use catalog_aggregator::{
    AggregationEngine, AggregatorConfig, ExploreParams, PageCache, PageRequest,
};

#[derive(Parser, Debug)]
#[command(name = "catalog-query")]
#[command(about = "Fetch one virtual page of the combined movie/tv catalog")]
struct Args {
    /// Virtual page (1-based)
    #[arg(short, long, default_value = "1")]
    page: u32,

    /// Free-text search instead of the listings
    #[arg(short, long)]
    query: Option<String>,

    /// Sort option, e.g. popularity.desc, vote_average.asc, revenue.desc
    #[arg(short, long)]
    sort: Option<String>,

    /// Comma separated genre ids
    #[arg(short, long)]
    genres: Option<String>,

    /// Leave movies out
    #[arg(long)]
    no_movies: bool,

    /// Leave tv out
    #[arg(long)]
    no_tv: bool,

    /// Keep people in search results
    #[arg(long)]
    people: bool,

    /// Path to TOML configuration file
    #[arg(short, long, env = "CATALOG_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn")]
    log_level: String,
}

impl Args {
    fn explore_params(&self) -> ExploreParams {
        ExploreParams {
            query: self.query.clone(),
            page: Some(self.page),
            movies: Some(!self.no_movies),
            tv: Some(!self.no_tv),
            people: Some(self.people),
            sort: self.sort.clone(),
            genres: self.genres.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = AggregatorConfig::resolve(args.config.as_deref())?;
    let cache = Arc::new(PageCache::new(config.cache_ttl()));
    let engine = AggregationEngine::from_config(&config, cache)?;

    let request = PageRequest::from_params(&args.explore_params(), &config);
    info!(page = request.virtual_page, sort = %request.sort, "querying catalog");

    let result = engine
        .aggregate_with_timeout(&request, config.aggregate_timeout())
        .await?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    if result.is_degraded() {
        eprintln!(
            "warning: partial page, failed kinds: {:?}",
            result.degraded_kinds
        );
    }

    Ok(())
}
