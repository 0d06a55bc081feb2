//! HTTP server for image serving and cache management
//!
//! Provides /health, /image, /cache, /cache/entry and /cache/preload endpoints.

use crate::types::{
    ErrorResponse, HealthResponse, ImageQuery, PreloadRequest, RemoveResponse,
};
use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use url::Url;
use wardrobe_image_cache::{CacheSummary, CachedImage, ImageCache, ImageLookup, PreloadReport};

/// Largest batch accepted by `/cache/preload`
const MAX_PRELOAD_URLS: usize = 100;

/// Shared state for the HTTP server
pub struct ServerState {
    pub cache: ImageCache,
    /// Hosts images may be fetched from; `*` allows any host
    pub upstream_hosts: Vec<String>,
    pub started_at: DateTime<Utc>,
}

impl ServerState {
    pub fn new(cache: ImageCache, upstream_hosts: Vec<String>) -> Self {
        Self {
            cache,
            upstream_hosts,
            started_at: Utc::now(),
        }
    }

    fn allows_host(&self, host: &str) -> bool {
        self.upstream_hosts
            .iter()
            .any(|allowed| allowed == "*" || allowed.eq_ignore_ascii_case(host))
    }
}

/// Why a requested image URL was refused
#[derive(Debug, PartialEq, Eq)]
enum UrlRejection {
    Invalid(&'static str),
    HostNotAllowed(String),
}

impl IntoResponse for UrlRejection {
    fn into_response(self) -> Response {
        match self {
            UrlRejection::Invalid(msg) => error_response(StatusCode::BAD_REQUEST, msg),
            UrlRejection::HostNotAllowed(host) => {
                warn!(host = %host, "Refusing image from host outside the allowlist");
                error_response(
                    StatusCode::FORBIDDEN,
                    &format!("Images from {} are not allowed", host),
                )
            }
        }
    }
}

pub type SharedState = Arc<ServerState>;

/// Create the HTTP router
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/image", get(get_image))
        .route("/cache", get(cache_summary).delete(clear_cache))
        .route("/cache/entry", delete(remove_entry))
        .route("/cache/preload", post(preload))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(state: SharedState, port: u16) -> std::io::Result<()> {
    let router = create_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await
}

/// Health check endpoint
async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let cache = state.cache.get_cache_info().await.summary();
    let uptime_secs = (Utc::now() - state.started_at).num_seconds().max(0) as u64;

    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs,
        cache,
    })
}

/// Serve an image from the cache, fetching it on a miss.
///
/// When the upstream fetch fails the client is redirected to the original
/// URL so it can still load the image directly.
async fn get_image(State(state): State<SharedState>, Query(query): Query<ImageQuery>) -> Response {
    let url = match source_url(&state, query.url.as_deref()) {
        Ok(url) => url,
        Err(rejection) => return rejection.into_response(),
    };

    match state.cache.lookup(&url).await {
        ImageLookup::Hit(image) => image_response(image, "HIT"),
        ImageLookup::Fetched(image) => image_response(image, "MISS"),
        ImageLookup::Fallback { url, error } => {
            warn!(url = %url, error = %error, "Redirecting to uncached image");
            Response::builder()
                .status(StatusCode::TEMPORARY_REDIRECT)
                .header(header::LOCATION, url)
                .header("X-Cache", "BYPASS")
                .body(Body::empty())
                .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
    }
}

async fn cache_summary(State(state): State<SharedState>) -> Json<CacheSummary> {
    Json(state.cache.get_cache_info().await.summary())
}

async fn clear_cache(State(state): State<SharedState>) -> StatusCode {
    state.cache.clear_cache().await;
    StatusCode::NO_CONTENT
}

async fn remove_entry(
    State(state): State<SharedState>,
    Query(query): Query<ImageQuery>,
) -> Response {
    let url = match query.url.as_deref() {
        Some(url) if !url.is_empty() => url,
        _ => return error_response(StatusCode::BAD_REQUEST, "Missing url parameter"),
    };

    let removed = state.cache.remove_from_cache(url).await;
    Json(RemoveResponse { removed }).into_response()
}

/// Warm the cache for a batch of URLs.
///
/// The whole batch is refused if it is too large or any URL would be
/// refused by `/image`.
async fn preload(
    State(state): State<SharedState>,
    Json(request): Json<PreloadRequest>,
) -> Response {
    if request.urls.len() > MAX_PRELOAD_URLS {
        return error_response(
            StatusCode::BAD_REQUEST,
            &format!("At most {} urls can be preloaded at once", MAX_PRELOAD_URLS),
        );
    }

    for url in &request.urls {
        if let Err(rejection) = source_url(&state, Some(url.as_str())) {
            return rejection.into_response();
        }
    }

    let report: PreloadReport = state.cache.preload_images(&request.urls).await;
    Json(report).into_response()
}

/// Accept only absolute http(s) URLs on an allowed upstream host
fn source_url(state: &ServerState, raw: Option<&str>) -> Result<String, UrlRejection> {
    let raw = match raw {
        Some(raw) if !raw.is_empty() => raw,
        _ => return Err(UrlRejection::Invalid("Missing url parameter")),
    };

    let parsed = Url::parse(raw).map_err(|_| UrlRejection::Invalid("Invalid url parameter"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(UrlRejection::Invalid("Only http and https image URLs are supported"));
    }

    let host = parsed
        .host_str()
        .ok_or(UrlRejection::Invalid("Invalid url parameter"))?;
    if !state.allows_host(host) {
        return Err(UrlRejection::HostNotAllowed(host.to_string()));
    }

    Ok(raw.to_string())
}

fn image_response(image: CachedImage, cache_header: &'static str) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, image.content_type)
        .header(header::CACHE_CONTROL, "public, max-age=86400")
        .header("X-Cache", cache_header)
        .body(Body::from(image.data))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: msg.to_string(),
        }),
    )
        .into_response()
}
