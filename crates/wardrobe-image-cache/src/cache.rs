//! In-memory image caching with TTL expiration and oldest-first eviction

use crate::error::ImageCacheError;
use crate::fetcher::BlobFetch;
use crate::types::{
    CacheInfo, CacheLimits, CachedImage, DisplayHandle, FetchedBlob, ImageLookup, PreloadReport,
};
use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt, Shared};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Upper bound on fetches started by a single preload batch
pub const PRELOAD_CONCURRENCY: usize = 8;

type FetchOutcome = std::result::Result<CachedImage, Arc<ImageCacheError>>;

/// A fetch shared by every caller that asked for the same URL while it ran.
///
/// The fetch runs on its own task, so it completes and clears its record
/// even when every caller waiting on it has gone away.
type InFlight = Shared<BoxFuture<'static, FetchOutcome>>;

struct CacheEntry {
    content_type: String,
    data: Bytes,
    inserted_at: Instant,
    /// Breaks ties between entries inserted at the same instant
    seq: u64,
}

impl CacheEntry {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn is_expired(&self, now: Instant, max_age: std::time::Duration) -> bool {
        now.saturating_duration_since(self.inserted_at) >= max_age
    }

    fn to_image(&self, url: &str) -> CachedImage {
        CachedImage {
            url: url.to_string(),
            content_type: self.content_type.clone(),
            data: self.data.clone(),
        }
    }
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    in_flight: HashMap<String, InFlight>,
    /// Sum of the sizes of everything in `entries`
    total_bytes: u64,
    next_seq: u64,
}

impl CacheState {
    fn remove(&mut self, url: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(url)?;
        self.total_bytes -= entry.size();
        Some(entry)
    }

    fn sweep_expired(&mut self, now: Instant, max_age: std::time::Duration) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, e)| e.is_expired(now, max_age))
            .map(|(k, _)| k.clone())
            .collect();

        for key in &expired {
            self.remove(key);
        }
        expired.len()
    }

    fn oldest_key(&self) -> Option<String> {
        self.entries
            .iter()
            .min_by_key(|(_, e)| (e.inserted_at, e.seq))
            .map(|(k, _)| k.clone())
    }

    /// Store a blob, evicting the oldest entries until it fits.
    ///
    /// Eviction order is insertion time only; reads never refresh an entry.
    fn insert(
        &mut self,
        url: &str,
        blob: FetchedBlob,
        now: Instant,
        limits: &CacheLimits,
    ) -> CachedImage {
        if self.remove(url).is_some() {
            debug!(url = %url, "Replacing cached image");
        }

        let swept = self.sweep_expired(now, limits.max_age);
        if swept > 0 {
            debug!(swept, "Swept expired images");
        }

        let size = blob.data.len() as u64;

        while self.entries.len() >= limits.max_entries
            || self.total_bytes.saturating_add(size) > limits.max_bytes
        {
            let Some(oldest) = self.oldest_key() else {
                break;
            };
            self.remove(&oldest);
            debug!(url = %oldest, "Evicted oldest cached image");
        }

        if size > limits.max_bytes {
            warn!(
                url = %url,
                size,
                max_bytes = limits.max_bytes,
                "Image exceeds the cache byte budget, caching it alone"
            );
        }

        let seq = self.next_seq;
        self.next_seq += 1;

        let entry = CacheEntry {
            content_type: blob.content_type,
            data: blob.data,
            inserted_at: now,
            seq,
        };
        let image = entry.to_image(url);

        self.entries.insert(url.to_string(), entry);
        self.total_bytes += size;

        image
    }
}

/// State shared between the cache handle and its spawned fetch tasks
struct CacheCore {
    state: RwLock<CacheState>,
    fetcher: Arc<dyn BlobFetch>,
    limits: CacheLimits,
}

impl CacheCore {
    /// Fetch `url`, store the result and retire the in-flight record.
    ///
    /// Runs to completion on a spawned task whether or not anyone is still
    /// waiting for it.
    async fn fetch_and_store(&self, url: &str) -> FetchOutcome {
        let result = self.fetcher.fetch(url).await;

        let mut state = self.state.write().await;
        // Only this task's record can exist for `url` until it is removed here
        state.in_flight.remove(url);

        match result {
            Ok(blob) => {
                let image = state.insert(url, blob, Instant::now(), &self.limits);
                debug!(
                    url = %url,
                    size = image.size(),
                    entries = state.entries.len(),
                    total_bytes = state.total_bytes,
                    "Cached image"
                );
                Ok(image)
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Image fetch failed, serving remote URL");
                Err(Arc::new(e))
            }
        }
    }
}

/// Start a detached fetch for `url` that any number of callers can await
fn spawn_fetch(core: Arc<CacheCore>, url: String) -> InFlight {
    let task = tokio::spawn({
        let core = core.clone();
        let url = url.clone();
        async move { core.fetch_and_store(&url).await }
    });

    async move {
        match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                // The task died before retiring its own record
                core.state.write().await.in_flight.remove(&url);
                error!(url = %url, error = %e, "Image fetch task failed");
                Err(Arc::new(ImageCacheError::Task(e.to_string())))
            }
        }
    }
    .boxed()
    .shared()
}

/// Count-, size- and age-bounded cache of remote images.
///
/// Constructed once by the application and shared by reference; every
/// instance is independent. Lookups must run inside a Tokio runtime.
pub struct ImageCache {
    core: Arc<CacheCore>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ImageCache {
    pub fn new(fetcher: Arc<dyn BlobFetch>, limits: CacheLimits) -> Self {
        Self {
            core: Arc::new(CacheCore {
                state: RwLock::new(CacheState::default()),
                fetcher,
                limits,
            }),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn with_default_limits(fetcher: Arc<dyn BlobFetch>) -> Self {
        Self::new(fetcher, CacheLimits::default())
    }

    pub fn limits(&self) -> CacheLimits {
        self.core.limits
    }

    /// Get a displayable handle for `url`.
    ///
    /// Never fails: when the fetch does not succeed the handle is the
    /// original URL and nothing is cached.
    pub async fn get_image(&self, url: &str) -> DisplayHandle {
        self.lookup(url).await.into_handle()
    }

    /// Like [`get_image`](Self::get_image), but reports whether the image was
    /// a hit, a fresh fetch, or a fallback together with the fetch error.
    ///
    /// Dropping the returned future does not cancel the fetch; it still
    /// completes and caches its result.
    pub async fn lookup(&self, url: &str) -> ImageLookup {
        if let Some(image) = self.fresh_entry(url).await {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(url = %url, "Cache hit");
            return ImageLookup::Hit(image);
        }

        let flight = {
            let mut state = self.core.state.write().await;
            let now = Instant::now();

            // Another caller may have filled the entry while we waited for the lock
            let expired = match state.entries.get(url) {
                Some(entry) if !entry.is_expired(now, self.core.limits.max_age) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(url = %url, "Cache hit");
                    return ImageLookup::Hit(entry.to_image(url));
                }
                Some(_) => true,
                None => false,
            };

            if expired {
                state.remove(url);
                debug!(url = %url, "Cache entry expired");
            }

            self.misses.fetch_add(1, Ordering::Relaxed);
            match state.in_flight.get(url) {
                Some(flight) => flight.clone(),
                None => {
                    let flight = spawn_fetch(self.core.clone(), url.to_string());
                    state.in_flight.insert(url.to_string(), flight.clone());
                    flight
                }
            }
        };

        match flight.await {
            Ok(image) => ImageLookup::Fetched(image),
            Err(error) => ImageLookup::Fallback {
                url: url.to_string(),
                error,
            },
        }
    }

    async fn fresh_entry(&self, url: &str) -> Option<CachedImage> {
        let state = self.core.state.read().await;
        let entry = state.entries.get(url)?;
        if entry.is_expired(Instant::now(), self.core.limits.max_age) {
            return None;
        }
        Some(entry.to_image(url))
    }

    /// Remove a single entry, returning whether it was present
    pub async fn remove_from_cache(&self, url: &str) -> bool {
        let removed = self.core.state.write().await.remove(url).is_some();
        if removed {
            debug!(url = %url, "Removed cached image");
        }
        removed
    }

    /// Drop every cached image
    pub async fn clear_cache(&self) {
        let mut state = self.core.state.write().await;
        let dropped = state.entries.len();
        state.entries.clear();
        state.total_bytes = 0;
        info!(dropped, "Cleared image cache");
    }

    /// Snapshot of the current cache contents
    pub async fn get_cache_info(&self) -> CacheInfo {
        let state = self.core.state.read().await;

        let mut ordered: Vec<(&String, &CacheEntry)> = state.entries.iter().collect();
        ordered.sort_by_key(|(_, e)| (e.inserted_at, e.seq));

        CacheInfo {
            count: state.entries.len(),
            total_bytes: state.total_bytes,
            keys: ordered.into_iter().map(|(k, _)| k.clone()).collect(),
            max_entries: self.core.limits.max_entries,
            max_bytes: self.core.limits.max_bytes,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Warm the cache for a batch of URLs.
    ///
    /// At most [`PRELOAD_CONCURRENCY`] lookups run at once; individual
    /// failures are logged and counted, never propagated.
    pub async fn preload_images<I, S>(&self, urls: I) -> PreloadReport
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let urls: Vec<S> = urls.into_iter().collect();
        let pending: Vec<_> = urls.iter().map(|url| self.lookup(url.as_ref())).collect();
        let lookups: Vec<ImageLookup> =
            stream::iter(pending)
                .buffer_unordered(PRELOAD_CONCURRENCY)
                .collect()
                .await;

        let mut report = PreloadReport {
            requested: lookups.len(),
            ..PreloadReport::default()
        };

        for lookup in lookups {
            match lookup {
                ImageLookup::Fallback { url, error } => {
                    warn!(url = %url, error = %error, "Failed to preload image");
                    report.failed += 1;
                }
                ImageLookup::Hit(_) | ImageLookup::Fetched(_) => report.cached += 1,
            }
        }

        debug!(
            requested = report.requested,
            cached = report.cached,
            failed = report.failed,
            "Preloaded images"
        );
        report
    }
}
