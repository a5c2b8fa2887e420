use crate::error::FetchFailure;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One fetch attempt made by the crawler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlResult {
    pub url: String,
    pub final_url: Option<String>,
    pub status_code: Option<u16>,
    pub response_time: Duration,
    pub links_found: Vec<String>,
    pub error: Option<String>,
}

impl CrawlResult {
    pub fn success(url: String, final_url: String, response_time: Duration, links_found: Vec<String>) -> Self {
        Self {
            url,
            final_url: Some(final_url),
            status_code: Some(200),
            response_time,
            links_found,
            error: None,
        }
    }

    pub fn failure(url: String, response_time: Duration, failure: &FetchFailure) -> Self {
        let (final_url, status_code) = match failure {
            FetchFailure::RedirectedAway { final_url } => (Some(final_url.clone()), None),
            FetchFailure::Status(code) => (None, Some(*code)),
            FetchFailure::Transport(_) => (None, None),
        };
        Self {
            url,
            final_url,
            status_code,
            response_time,
            links_found: Vec::new(),
            error: Some(failure.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_keeps_status() {
        let result = CrawlResult::failure(
            "http://a.test/p".to_string(),
            Duration::from_millis(5),
            &FetchFailure::Status(404),
        );
        assert!(!result.is_success());
        assert_eq!(result.status_code, Some(404));
        assert_eq!(result.error.as_deref(), Some("HTTP status 404"));
    }

    #[test]
    fn test_failure_keeps_redirect_target() {
        let result = CrawlResult::failure(
            "http://a.test/q".to_string(),
            Duration::ZERO,
            &FetchFailure::RedirectedAway {
                final_url: "https://other.test/q2".to_string(),
            },
        );
        assert_eq!(result.final_url.as_deref(), Some("https://other.test/q2"));
        assert_eq!(result.status_code, None);
    }
}
