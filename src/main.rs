mod ai;
mod catalog;
mod config;
mod fetcher;
mod listing;
mod matcher;
mod model;
mod parser;
mod resolver;
mod storage;

use ai::{AiBackend, OllamaClient};
use catalog::CatalogIndex;
use chrono::Utc;
use config::{AppConfig, load_config};
use fetcher::{HttpFetcher, PriceFetcher, download_all};
use listing::{ListingBuilder, write_listings};
use parser::PriceListParser;
use resolver::{Resolver, RunSummary, SubstitutionEngine};
use std::sync::Arc;
use storage::RunStore;
use tokio::time::{Duration, sleep};
use tracing::{error, info, warn};

const UNRESOLVED_REPORT_SIZE: usize = 10;

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt::init();

    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Panic occurred: {:?}", panic_info);
    }));

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.json".to_string());
    let config: Arc<AppConfig> = match load_config(&config_path) {
        Ok(cfg) => Arc::new(cfg),
        Err(e) => {
            error!("Config load error ({}): {}", config_path, e);
            std::process::exit(1);
        }
    };

    // Only the catalog is allowed to stop the process.
    let index = match CatalogIndex::load(&config.catalog_path, &config.matching) {
        Ok(index) => Arc::new(index),
        Err(e) => {
            error!("Catalog load error ({}): {}", config.catalog_path, e);
            std::process::exit(1);
        }
    };
    let rules = Arc::new(SubstitutionEngine::load_or_empty(&config.substitutes_path));

    let parser = match PriceListParser::new() {
        Ok(parser) => parser,
        Err(e) => {
            error!("Parser init error: {}", e);
            std::process::exit(1);
        }
    };

    let fetcher: Option<HttpFetcher> = match &config.price_base_url {
        Some(_) => match HttpFetcher::new() {
            Ok(fetcher) => Some(fetcher),
            Err(e) => {
                warn!("Price downloads disabled: {}", e);
                None
            }
        },
        None => None,
    };

    let ai_backend: Option<Arc<dyn AiBackend>> = if config.ai.enabled {
        match OllamaClient::new(&config.ai) {
            Ok(client) => {
                info!("AI fallback enabled: {} at {}", config.ai.model, config.ai.base_url);
                let backend: Arc<dyn AiBackend> = Arc::new(client);
                Some(backend)
            }
            Err(e) => {
                warn!("AI fallback disabled: {}", e);
                None
            }
        }
    } else {
        None
    };

    let store = match RunStore::new(&config.database_path) {
        Ok(store) => Some(store),
        Err(e) => {
            warn!("Run history disabled: {}", e);
            None
        }
    };

    loop {
        let context = RunContext {
            config: &config,
            index: index.clone(),
            rules: rules.clone(),
            ai_backend: ai_backend.clone(),
            parser: &parser,
            fetcher: fetcher.as_ref().map(|fetcher| fetcher as &dyn PriceFetcher),
            store: store.as_ref(),
        };
        run_once(context).await;

        let Some(interval) = config.check_interval_seconds else {
            break;
        };
        info!("Waiting {}s for the next run...", interval);
        tokio::select! {
            _ = sleep(Duration::from_secs(interval)) => {
                info!("Timer triggered.");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down.");
                break;
            }
        }
    }
}

struct RunContext<'a> {
    config: &'a AppConfig,
    index: Arc<CatalogIndex>,
    rules: Arc<SubstitutionEngine>,
    ai_backend: Option<Arc<dyn AiBackend>>,
    parser: &'a PriceListParser,
    fetcher: Option<&'a dyn PriceFetcher>,
    store: Option<&'a RunStore>,
}

/// One full pass: download, parse, resolve every item, write listings, record history.
async fn run_once(ctx: RunContext<'_>) {
    let started_at = Utc::now();
    let config = ctx.config;
    info!(
        "Starting run over {} price files ({} brands, {} models in catalog)",
        config.price_files.len(),
        ctx.index.brand_count(),
        ctx.index.model_count()
    );

    if let Some(store) = ctx.store {
        if let Ok(runs) = store.recent_runs(1) {
            if let Some(previous) = runs.first() {
                info!(
                    "Previous run #{} ({} - {}): {} items, {:.1}% resolved, {} close calls, {} AI calls",
                    previous.id,
                    previous.started_at,
                    previous.finished_at,
                    previous.total,
                    previous.coverage() * 100.0,
                    previous.close_calls,
                    previous.ai_calls
                );
            }
        }
    }

    if let (Some(fetcher), Some(base_url)) = (ctx.fetcher, &config.price_base_url) {
        match download_all(fetcher, base_url, &config.price_files, &config.downloads_dir).await {
            Ok(report) => info!(
                "Downloads: {} fresh, {} kept from earlier runs",
                report.downloaded.len(),
                report.failed.len()
            ),
            Err(e) => warn!("Download step failed: {}", e),
        }
    }

    let items = ctx.parser.parse_files(&config.downloads_dir, &config.price_files);
    info!("Resolving {} feed items...", items.len());

    let mut resolver = Resolver::new(ctx.index, ctx.rules, ctx.ai_backend, config);
    let mut builder = ListingBuilder::new(config.image_base_url.as_deref());
    let mut listings = Vec::with_capacity(items.len());

    for item in &items {
        let resolution = resolver.resolve(&item.brand, &item.model).await;
        if !resolution.is_usable() {
            if let Some(store) = ctx.store {
                if let Err(e) = store.record_unresolved(&resolution.brand, &resolution.model, Utc::now()) {
                    warn!("Failed to record unresolved pair: {}", e);
                }
            }
        }
        if let Some(listing) = builder.build(item, &resolution) {
            listings.push(listing);
        }
    }

    info!(
        "Resolved {} distinct pairs with {} index queries; {} items skipped",
        resolver.cached_entries(),
        resolver.index_queries(),
        builder.skipped()
    );

    if let Err(e) = write_listings(&config.output_path, &listings) {
        error!("Failed to write listings: {}", e);
    }

    let summary = resolver.summary();
    summary.log();
    if let Some(store) = ctx.store {
        record_run(store, started_at, &summary);
    }
}

fn record_run(store: &RunStore, started_at: chrono::DateTime<Utc>, summary: &RunSummary) {
    match store.save_run(started_at, Utc::now(), summary) {
        Ok(id) => info!("Run #{} saved", id),
        Err(e) => warn!("Failed to save run: {}", e),
    }

    match store.top_unresolved(UNRESOLVED_REPORT_SIZE) {
        Ok(entries) => {
            for entry in entries {
                info!(
                    "Unresolved x{}: {} / {} (last seen {})",
                    entry.occurrences, entry.brand, entry.model, entry.last_seen
                );
            }
        }
        Err(e) => warn!("Failed to read unresolved pairs: {}", e),
    }
}
