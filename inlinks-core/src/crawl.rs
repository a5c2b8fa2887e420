use indicatif::{ProgressBar, ProgressStyle};
use inlinks_scanner::crawler::DEFAULT_WORKERS;
use inlinks_scanner::error::Result;
use inlinks_scanner::fetch::DEFAULT_TIMEOUT_SECS;
use inlinks_scanner::{CrawlOutput, CrawlResult, Crawler, TraversalOrder};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::info;
use url::Url;

/// Options for configuring a crawl operation
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub url: String,
    pub threads: usize,
    pub max_pages: Option<usize>,
    pub max_duration: Option<Duration>,
    pub timeout: Duration,
    pub order: TraversalOrder,
    pub show_progress_bars: bool,
}

impl CrawlOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            threads: DEFAULT_WORKERS,
            max_pages: None,
            max_duration: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            order: TraversalOrder::default(),
            show_progress_bars: false,
        }
    }
}

/// Callback for human-readable crawl notices (failed pages, early stop)
pub type CrawlProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Callback for reporting individual crawl results as they come in
pub type CrawlResultCallback = Arc<dyn Fn(CrawlResult) + Send + Sync>;

/// Extract the path component from a URL
pub fn extract_url_path(url: &str) -> String {
    Url::parse(url)
        .ok()
        .map(|u| {
            let path = u.path().to_string();
            if path.is_empty() || path == "/" {
                "/".to_string()
            } else {
                path
            }
        })
        .unwrap_or_else(|| url.to_string())
}

/// Execute a crawl with the given options and return the finished graph
/// together with every fetch attempt.
pub async fn execute_crawl(
    options: CrawlOptions,
    progress_callback: Option<CrawlProgressCallback>,
    result_callback: Option<CrawlResultCallback>,
) -> Result<CrawlOutput> {
    let CrawlOptions {
        url,
        threads,
        max_pages,
        max_duration,
        timeout,
        order,
        show_progress_bars,
    } = options;

    let progress_bar = if show_progress_bars {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message("Starting crawl...");
        Some(Arc::new(pb))
    } else {
        None
    };

    // Notices are printed above the spinner rather than through it
    let notify: Option<CrawlProgressCallback> = progress_callback.map(|callback| {
        let pb = progress_bar.clone();
        let wrapped: CrawlProgressCallback = Arc::new(move |message: String| match pb {
            Some(ref pb) => pb.suspend(|| callback(message)),
            None => callback(message),
        });
        wrapped
    });

    let processed_count = Arc::new(AtomicUsize::new(0));

    let internal_progress_callback: inlinks_scanner::ProgressCallback = match progress_bar {
        Some(ref pb) => {
            let pb = pb.clone();
            let count = processed_count.clone();
            Arc::new(move |_worker_id: usize, url: String| {
                let n = count.fetch_add(1, Ordering::Relaxed) + 1;
                pb.set_message(format!(
                    "Crawling... {} pages processed ({})",
                    n,
                    extract_url_path(&url)
                ));
            })
        }
        None => {
            let count = processed_count.clone();
            Arc::new(move |_worker_id: usize, _url: String| {
                count.fetch_add(1, Ordering::Relaxed);
            })
        }
    };

    let internal_result_callback: inlinks_scanner::ResultCallback = {
        let notify = notify.clone();
        Arc::new(move |result: CrawlResult| {
            if let (Some(notify), Some(error)) = (notify.as_ref(), result.error.as_ref()) {
                notify(format!("[!] {} ({})", result.url, error));
            }
            if let Some(ref callback) = result_callback {
                callback(result);
            }
        })
    };

    let crawler = Crawler::with_timeout(timeout)?
        .with_max_pages(max_pages)
        .with_max_duration(max_duration)
        .with_order(order)
        .with_progress_callback(internal_progress_callback)
        .with_result_callback(internal_result_callback);

    let outcome = crawler.crawl(&url, threads).await;

    if let Some(ref pb) = progress_bar {
        let total = processed_count.load(Ordering::Relaxed);
        match outcome {
            Ok(_) => pb.finish_with_message(format!("Crawl complete! {} pages processed", total)),
            Err(_) => pb.finish_and_clear(),
        }
    }

    let output = outcome?;
    info!(
        "Crawled {} pages with {} links in {:?}",
        output.graph.node_count(),
        output.graph.edge_count(),
        output.elapsed
    );
    if output.stopped_early
        && let Some(ref notify) = notify
    {
        notify("[!] Crawl budget exhausted, results are partial".to_string());
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crawl_options_defaults() {
        let options = CrawlOptions::new("http://a.test/");
        assert_eq!(options.threads, DEFAULT_WORKERS);
        assert_eq!(options.timeout, Duration::from_secs(10));
        assert_eq!(options.order, TraversalOrder::BreadthFirst);
        assert!(options.max_pages.is_none());
        assert!(options.max_duration.is_none());
        assert!(!options.show_progress_bars);
    }
}
