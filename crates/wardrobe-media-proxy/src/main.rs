//! Wardrobe Media Proxy - in-memory image cache for clothing photos
//!
//! This service fetches item photos from the storage backend once and serves
//! them from memory, and exposes the cache statistics and management
//! endpoints used by the settings screen.

mod config;
mod error;
mod server;
mod types;

use crate::config::Config;
use crate::error::Result;
use crate::server::{start_server, ServerState, SharedState};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};
use wardrobe_image_cache::{HttpFetcher, ImageCache};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env();

    init_logging(config.json_logs)?;

    info!("Starting Wardrobe Media Proxy...");
    info!("Port: {}", config.port);
    info!("Max cached images: {}", config.max_entries);
    info!("Max cache size: {} MB", config.max_bytes / (1024 * 1024));
    info!("Cache max age: {} seconds", config.max_age.as_secs());
    info!("Fetch timeout: {} seconds", config.fetch_timeout.as_secs());
    if config.upstream_hosts.is_empty() {
        warn!("IMAGE_UPSTREAM_HOSTS is not set, every image request will be refused");
    } else {
        info!("Upstream hosts: {}", config.upstream_hosts.join(", "));
    }

    let fetcher = HttpFetcher::with_timeout(config.fetch_timeout)?;
    let cache = ImageCache::new(Arc::new(fetcher), config.cache_limits());

    let state: SharedState = Arc::new(ServerState::new(cache, config.upstream_hosts.clone()));

    // Start HTTP server (blocking)
    start_server(state, config.port).await?;

    Ok(())
}

fn init_logging(json: bool) -> Result<()> {
    let env_filter = EnvFilter::from_default_env()
        .add_directive("wardrobe_media_proxy=info".parse()?)
        .add_directive("wardrobe_image_cache=info".parse()?);

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    Ok(())
}
