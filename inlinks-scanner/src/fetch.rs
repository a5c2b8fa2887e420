use crate::error::{FetchFailure, Result};
use crate::normalize::is_same_location;
use reqwest::{Client, StatusCode};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

/// Terminal state of one GET after redirects were followed.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub final_url: Url,
    pub body: String,
}

/// A page that may contribute links to the crawl.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub final_url: Url,
    pub body: String,
}

pub type FetchOutcome = std::result::Result<FetchedPage, FetchFailure>;

/// Transport used by the crawler. Implementations follow redirects and
/// report transport problems as [`FetchFailure::Transport`].
pub trait Fetcher: Send + Sync + 'static {
    fn get(&self, url: &Url) -> impl Future<Output = std::result::Result<RawResponse, FetchFailure>> + Send;
}

/// Fetch `url` and decide whether its body may be mined for links.
///
/// An off-domain final location wins over the status code, so a redirect
/// to another site that answers 200 is still a failure.
pub async fn fetch_page<F: Fetcher>(fetcher: &F, url: &Url, base: &Url) -> FetchOutcome {
    let response = fetcher.get(url).await?;
    classify(response, base)
}

pub fn classify(response: RawResponse, base: &Url) -> FetchOutcome {
    if !is_same_location(&response.final_url, base) {
        warn!("URL redirected to an external domain: {}", response.final_url);
        return Err(FetchFailure::RedirectedAway {
            final_url: response.final_url.to_string(),
        });
    }

    if response.status != StatusCode::OK.as_u16() {
        return Err(FetchFailure::Status(response.status));
    }

    Ok(FetchedPage {
        final_url: response.final_url,
        body: response.body,
    })
}

/// reqwest-backed fetcher: fixed timeout, TLS verification, bounded
/// automatic redirects.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!(
                "inlinks/",
                env!("CARGO_PKG_VERSION"),
                " (https://github.com/trapdoorsec/inlinks)"
            ))
            .timeout(timeout)
            .connect_timeout(timeout / 2)
            .pool_max_idle_per_host(50)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(DEFAULT_MAX_REDIRECTS))
            .build()?;

        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    async fn get(&self, url: &Url) -> std::result::Result<RawResponse, FetchFailure> {
        debug!("Fetching {}", url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| FetchFailure::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let final_url = response.url().clone();

        // Bodies of pages that cannot contribute links are not downloaded.
        let body = if status == StatusCode::OK.as_u16() {
            response
                .text()
                .await
                .map_err(|e| FetchFailure::Transport(e.to_string()))?
        } else {
            String::new()
        };

        Ok(RawResponse {
            status,
            final_url,
            body,
        })
    }
}
