use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid seed URL '{url}': {reason}")]
    InvalidSeed { url: String, reason: String },

    #[error("Task join error: {0}")]
    JoinError(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, ScanError>;

/// Why a single page produced no links. Never escapes the crawl loop.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    #[error("redirected off-domain to {final_url}")]
    RedirectedAway { final_url: String },

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("request failed: {0}")]
    Transport(String),
}
