//! Cache types

use crate::error::ImageCacheError;
use base64::Engine;
use bytes::Bytes;
use serde::Serialize;
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

/// Default maximum number of cached images
pub const DEFAULT_MAX_ENTRIES: usize = 100;

/// Default byte budget for all cached images (50 MiB)
pub const DEFAULT_MAX_BYTES: u64 = 50 * 1024 * 1024;

/// Default freshness window (24 hours)
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Capacity and freshness bounds for an [`ImageCache`](crate::ImageCache)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheLimits {
    pub max_entries: usize,
    pub max_bytes: u64,
    pub max_age: Duration,
}

impl CacheLimits {
    /// `max_entries` is clamped to at least one entry.
    pub fn new(max_entries: usize, max_bytes: u64, max_age: Duration) -> Self {
        Self {
            max_entries: max_entries.max(1),
            max_bytes,
            max_age,
        }
    }
}

impl Default for CacheLimits {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES, DEFAULT_MAX_BYTES, DEFAULT_MAX_AGE)
    }
}

/// Bytes returned by a successful fetch
#[derive(Debug, Clone)]
pub struct FetchedBlob {
    pub data: Bytes,
    pub content_type: String,
}

/// A read-only view of a cached image.
///
/// Cloning shares the underlying buffer with the cache entry, so dropping a
/// handle is all the cleanup a caller ever needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedImage {
    pub url: String,
    pub content_type: String,
    pub data: Bytes,
}

impl CachedImage {
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Encode the image as a `data:` URI
    pub fn data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.content_type,
            base64::engine::general_purpose::STANDARD.encode(&self.data)
        )
    }
}

/// Something a renderer can use directly as an image source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayHandle {
    /// Served from the in-memory cache
    Cached(CachedImage),
    /// The original remote URL, used when the fetch failed
    Remote(String),
}

impl DisplayHandle {
    /// Source string for the renderer: a `data:` URI for cached images, the
    /// untouched remote URL otherwise.
    pub fn source(&self) -> Cow<'_, str> {
        match self {
            DisplayHandle::Cached(image) => Cow::Owned(image.data_uri()),
            DisplayHandle::Remote(url) => Cow::Borrowed(url),
        }
    }

    pub fn is_cached(&self) -> bool {
        matches!(self, DisplayHandle::Cached(_))
    }

    pub fn as_cached(&self) -> Option<&CachedImage> {
        match self {
            DisplayHandle::Cached(image) => Some(image),
            DisplayHandle::Remote(_) => None,
        }
    }
}

/// How a lookup was satisfied
#[derive(Debug, Clone)]
pub enum ImageLookup {
    /// Fresh entry already in memory
    Hit(CachedImage),
    /// Fetched from the network (possibly by a concurrent caller) and cached
    Fetched(CachedImage),
    /// Fetch failed; nothing was cached
    Fallback {
        url: String,
        error: Arc<ImageCacheError>,
    },
}

impl ImageLookup {
    pub fn into_handle(self) -> DisplayHandle {
        match self {
            ImageLookup::Hit(image) | ImageLookup::Fetched(image) => DisplayHandle::Cached(image),
            ImageLookup::Fallback { url, .. } => DisplayHandle::Remote(url),
        }
    }

    pub fn is_hit(&self) -> bool {
        matches!(self, ImageLookup::Hit(_))
    }

    pub fn error(&self) -> Option<&Arc<ImageCacheError>> {
        match self {
            ImageLookup::Fallback { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Raw snapshot of the cache state
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheInfo {
    pub count: usize,
    pub total_bytes: u64,
    /// Cached URLs, oldest insertion first
    pub keys: Vec<String>,
    pub max_entries: usize,
    pub max_bytes: u64,
    pub hits: u64,
    pub misses: u64,
}

impl CacheInfo {
    /// Display-ready figures for the cache management screen
    pub fn summary(&self) -> CacheSummary {
        let utilization = if self.max_bytes == 0 {
            0.0
        } else {
            self.total_bytes as f64 / self.max_bytes as f64 * 100.0
        };

        CacheSummary {
            items_count: self.count,
            total_size_mb: round_to(self.total_bytes as f64 / BYTES_PER_MB, 2),
            entries: self.keys.clone(),
            max_items: self.max_entries,
            max_size_mb: round_to(self.max_bytes as f64 / BYTES_PER_MB, 2),
            utilization_percent: round_to(utilization, 1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSummary {
    pub items_count: usize,
    #[serde(rename = "totalSizeMB")]
    pub total_size_mb: f64,
    pub entries: Vec<String>,
    pub max_items: usize,
    #[serde(rename = "maxSizeMB")]
    pub max_size_mb: f64,
    pub utilization_percent: f64,
}

/// Outcome of a preload batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PreloadReport {
    pub requested: usize,
    pub cached: usize,
    pub failed: usize,
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(data: &'static [u8]) -> CachedImage {
        CachedImage {
            url: "https://x/shirt.png".to_string(),
            content_type: "image/png".to_string(),
            data: Bytes::from_static(data),
        }
    }

    #[test]
    fn test_default_limits() {
        let limits = CacheLimits::default();
        assert_eq!(limits.max_entries, 100);
        assert_eq!(limits.max_bytes, 52_428_800);
        assert_eq!(limits.max_age, Duration::from_secs(86_400));
    }

    #[test]
    fn test_limits_clamp_zero_entries() {
        let limits = CacheLimits::new(0, 10, Duration::from_secs(1));
        assert_eq!(limits.max_entries, 1);
    }

    #[test]
    fn test_remote_handle_source_is_original_url() {
        let handle = DisplayHandle::Remote("https://x/img.png".to_string());
        assert_eq!(handle.source(), "https://x/img.png");
        assert!(!handle.is_cached());
        assert!(handle.as_cached().is_none());
    }

    #[test]
    fn test_cached_handle_source_is_data_uri() {
        let handle = DisplayHandle::Cached(image(b"abc"));
        assert_eq!(handle.source(), "data:image/png;base64,YWJj");
        assert_eq!(handle.as_cached().map(CachedImage::size), Some(3));
    }

    #[test]
    fn test_lookup_into_handle() {
        let hit = ImageLookup::Hit(image(b"x"));
        assert!(hit.is_hit());
        assert!(hit.error().is_none());
        assert!(hit.into_handle().is_cached());

        let fallback = ImageLookup::Fallback {
            url: "https://x/img.png".to_string(),
            error: Arc::new(ImageCacheError::Status {
                url: "https://x/img.png".to_string(),
                status: 404,
            }),
        };
        assert!(fallback.error().is_some());
        assert_eq!(
            fallback.into_handle(),
            DisplayHandle::Remote("https://x/img.png".to_string())
        );
    }

    #[test]
    fn test_summary_rounding() {
        let info = CacheInfo {
            count: 2,
            total_bytes: 1_572_864 + 1_000, // 1.5 MiB plus a little
            keys: vec!["a".to_string(), "b".to_string()],
            max_entries: 100,
            max_bytes: DEFAULT_MAX_BYTES,
            hits: 0,
            misses: 2,
        };

        let summary = info.summary();
        assert_eq!(summary.items_count, 2);
        assert_eq!(summary.total_size_mb, 1.5);
        assert_eq!(summary.max_items, 100);
        assert_eq!(summary.max_size_mb, 50.0);
        assert_eq!(summary.utilization_percent, 3.0);
        assert_eq!(summary.entries, vec!["a", "b"]);
    }

    #[test]
    fn test_summary_zero_budget() {
        let info = CacheInfo {
            total_bytes: 10,
            ..CacheInfo::default()
        };
        assert_eq!(info.summary().utilization_percent, 0.0);
    }

    #[test]
    fn test_summary_serialization() {
        let summary = CacheInfo::default().summary();
        let json = serde_json::to_value(&summary).unwrap();

        assert_eq!(json["itemsCount"], 0);
        assert!(json.get("totalSizeMB").is_some());
        assert!(json.get("maxSizeMB").is_some());
        assert!(json.get("maxItems").is_some());
        assert!(json.get("utilizationPercent").is_some());
        assert!(json["entries"].as_array().unwrap().is_empty());
    }
}
