use std::env;
use std::time::Duration;
use wardrobe_image_cache::{CacheLimits, DEFAULT_MAX_AGE, DEFAULT_MAX_BYTES, DEFAULT_MAX_ENTRIES};

const DEFAULT_PORT: u16 = 3001;
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Service configuration parsed from environment variables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub max_entries: usize,
    pub max_bytes: u64,
    pub max_age: Duration,
    pub fetch_timeout: Duration,
    /// Hosts the proxy may fetch images from; `*` allows any host
    pub upstream_hosts: Vec<String>,
    pub json_logs: bool,
}

impl Config {
    /// Parse configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Parse configuration from an arbitrary key lookup; unparsable values
    /// fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = lookup("PORT")
            .and_then(|s| s.parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);

        let max_entries = lookup("IMAGE_CACHE_MAX_ENTRIES")
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(DEFAULT_MAX_ENTRIES);

        let max_bytes = lookup("IMAGE_CACHE_MAX_BYTES")
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_MAX_BYTES);

        let max_age = lookup("IMAGE_CACHE_MAX_AGE_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_MAX_AGE);

        let fetch_timeout = Duration::from_secs(
            lookup("FETCH_TIMEOUT_SECS")
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS),
        );

        let upstream_hosts = lookup("IMAGE_UPSTREAM_HOSTS")
            .map(|s| parse_host_list(&s))
            .unwrap_or_default();

        // JSON format for GCP Cloud Logging
        let json_logs = lookup("LOG_FORMAT").map(|v| v == "json").unwrap_or(false);

        Self {
            port,
            max_entries,
            max_bytes,
            max_age,
            fetch_timeout,
            upstream_hosts,
            json_logs,
        }
    }

    pub fn cache_limits(&self) -> CacheLimits {
        CacheLimits::new(self.max_entries, self.max_bytes, self.max_age)
    }
}

/// Split a comma-separated host list, normalising case and dropping blanks
fn parse_host_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|host| host.trim().to_ascii_lowercase())
        .filter(|host| !host.is_empty())
        .collect()
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}
