//! In-memory image cache for the wardrobe app
//!
//! Fetches remote clothing photos once, keeps the bytes in memory and serves
//! later requests from there. The cache is bounded by entry count, total
//! bytes and entry age; when full it evicts the oldest insertions first.
//! Failed fetches degrade to the original remote URL instead of erroring.

mod cache;
mod error;
mod fetcher;
mod types;
mod view;

pub use cache::{ImageCache, PRELOAD_CONCURRENCY};
pub use error::{ImageCacheError, Result};
pub use fetcher::{BlobFetch, HttpFetcher};
pub use types::{
    CacheInfo, CacheLimits, CacheSummary, CachedImage, DisplayHandle, FetchedBlob, ImageLookup,
    PreloadReport, DEFAULT_MAX_AGE, DEFAULT_MAX_BYTES, DEFAULT_MAX_ENTRIES,
};
pub use view::{ImageState, ImageView};
