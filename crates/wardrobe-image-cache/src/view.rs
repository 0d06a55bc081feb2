//! Loading/error state for a single displayed image

use crate::cache::ImageCache;
use crate::error::ImageCacheError;
use crate::types::{DisplayHandle, ImageLookup};
use std::borrow::Cow;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone)]
pub enum ImageState {
    Loading,
    Ready(DisplayHandle),
    /// The fetch failed. The handle still points at the remote URL so the
    /// image can be rendered uncached.
    Failed {
        handle: DisplayHandle,
        error: Arc<ImageCacheError>,
    },
}

/// Binds one source URL to the cache for a view that renders it
#[derive(Debug, Clone)]
pub struct ImageView {
    url: String,
    state: ImageState,
}

impl ImageView {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            state: ImageState::Loading,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> &ImageState {
        &self.state
    }

    /// Resolve the image through the cache and settle into `Ready` or `Failed`
    pub async fn load(&mut self, cache: &ImageCache) -> &ImageState {
        self.state = match cache.lookup(&self.url).await {
            ImageLookup::Fallback { url, error } => {
                debug!(url = %url, error = %error, "Image view falling back to remote URL");
                ImageState::Failed {
                    handle: DisplayHandle::Remote(url),
                    error,
                }
            }
            lookup => ImageState::Ready(lookup.into_handle()),
        };

        &self.state
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, ImageState::Loading)
    }

    pub fn error(&self) -> Option<&ImageCacheError> {
        match &self.state {
            ImageState::Failed { error, .. } => Some(error.as_ref()),
            _ => None,
        }
    }

    /// Image source to render, `None` while loading
    pub fn source(&self) -> Option<Cow<'_, str>> {
        match &self.state {
            ImageState::Loading => None,
            ImageState::Ready(handle) | ImageState::Failed { handle, .. } => Some(handle.source()),
        }
    }
}
