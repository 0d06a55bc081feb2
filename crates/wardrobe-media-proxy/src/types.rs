//! Request and response bodies for the media proxy

use serde::{Deserialize, Serialize};
use wardrobe_image_cache::CacheSummary;

/// `?url=` query for image and cache-entry routes
#[derive(Debug, Deserialize)]
pub struct ImageQuery {
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PreloadRequest {
    pub urls: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RemoveResponse {
    pub removed: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub cache: CacheSummary,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wardrobe_image_cache::CacheInfo;

    #[test]
    fn test_health_response_serialization() {
        let response = HealthResponse {
            status: "ok".to_string(),
            uptime_secs: 3600,
            cache: CacheInfo::default().summary(),
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"status\":\"ok\""));
        assert!(json.contains("3600"));
        assert!(json.contains("itemsCount"));
    }

    #[test]
    fn test_preload_request_deserialization() {
        let json = r#"{"urls": ["https://x/a.png", "https://x/b.png"]}"#;
        let request: PreloadRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.urls.len(), 2);
    }

    #[test]
    fn test_image_query_optional_url() {
        let query: ImageQuery = serde_json::from_str("{}").unwrap();
        assert!(query.url.is_none());
    }
}
