//! Error types for the image cache

use std::fmt;

#[derive(Debug)]
pub enum ImageCacheError {
    Http(Box<reqwest::Error>),
    Status { url: String, status: u16 },
    Client(String),
    /// The spawned fetch task panicked or was aborted
    Task(String),
}

impl fmt::Display for ImageCacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageCacheError::Http(err) => write!(f, "HTTP error: {}", err),
            ImageCacheError::Status { url, status } => {
                write!(f, "Fetch of {} returned status {}", url, status)
            }
            ImageCacheError::Client(msg) => write!(f, "HTTP client error: {}", msg),
            ImageCacheError::Task(msg) => write!(f, "Fetch task failed: {}", msg),
        }
    }
}

impl std::error::Error for ImageCacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ImageCacheError::Http(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ImageCacheError {
    fn from(err: reqwest::Error) -> Self {
        ImageCacheError::Http(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, ImageCacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_display() {
        let err = ImageCacheError::Status {
            url: "https://x/img.png".to_string(),
            status: 404,
        };
        assert_eq!(
            format!("{}", err),
            "Fetch of https://x/img.png returned status 404"
        );
    }

    #[test]
    fn test_client_error_display() {
        let err = ImageCacheError::Client("tls backend unavailable".to_string());
        assert_eq!(
            format!("{}", err),
            "HTTP client error: tls backend unavailable"
        );
    }

    #[test]
    fn test_task_error_display() {
        let err = ImageCacheError::Task("task 7 panicked".to_string());
        assert_eq!(format!("{}", err), "Fetch task failed: task 7 panicked");
    }

    #[test]
    fn test_status_error_has_no_source() {
        let err = ImageCacheError::Status {
            url: "https://x".to_string(),
            status: 500,
        };
        assert!(std::error::Error::source(&err).is_none());
    }
}
