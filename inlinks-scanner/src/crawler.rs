use crate::error::{Result, ScanError};
use crate::extract::{HtmlLinkExtractor, LinkExtractor};
use crate::fetch::{DEFAULT_TIMEOUT_SECS, Fetcher, HttpFetcher, fetch_page};
use crate::frontier::{Claim, Frontier, TraversalOrder, VisitedSet};
use crate::graph::LinkGraph;
use crate::normalize::normalize_and_filter;
use crate::result::CrawlResult;
use futures::FutureExt;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

pub const DEFAULT_WORKERS: usize = 10;

pub type ProgressCallback = Arc<dyn Fn(usize, String) + Send + Sync>;
pub type ResultCallback = Arc<dyn Fn(CrawlResult) + Send + Sync>;

/// Everything a finished crawl hands back to the caller.
#[derive(Debug, Clone)]
pub struct CrawlOutput {
    pub seed: String,
    pub graph: LinkGraph,
    pub results: Vec<CrawlResult>,
    pub elapsed: Duration,
    /// True when the page budget or the deadline cut the crawl short.
    pub stopped_early: bool,
}

/// Check that a seed is an absolute http(s) URL with a host.
pub fn validate_seed(seed: &str) -> Result<Url> {
    let seed = seed.trim();
    let invalid = |reason: &str| ScanError::InvalidSeed {
        url: seed.to_string(),
        reason: reason.to_string(),
    };

    if !seed.starts_with("http") {
        return Err(invalid("URL must start with http or https"));
    }

    let parsed = Url::parse(seed).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid("URL must start with http or https"));
    }
    if parsed.host_str().is_none() {
        return Err(invalid("URL has no host"));
    }
    Ok(parsed)
}

/// State owned by a single crawl run and shared by its workers.
struct CrawlSession {
    base: Url,
    frontier: Frontier,
    visited: VisitedSet,
    graph: Mutex<LinkGraph>,
    results: Mutex<Vec<CrawlResult>>,
    deadline: Option<Instant>,
    stopped_early: AtomicBool,
}

pub struct Crawler<F = HttpFetcher, E = HtmlLinkExtractor> {
    fetcher: Arc<F>,
    extractor: Arc<E>,
    max_pages: Option<usize>,
    max_duration: Option<Duration>,
    order: TraversalOrder,
    progress_callback: Option<ProgressCallback>,
    result_callback: Option<ResultCallback>,
}

impl Crawler {
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        Ok(Crawler::with_components(
            HttpFetcher::with_timeout(timeout)?,
            HtmlLinkExtractor,
        ))
    }
}

impl<F: Fetcher, E: LinkExtractor> Crawler<F, E> {
    pub fn with_components(fetcher: F, extractor: E) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            extractor: Arc::new(extractor),
            max_pages: None,
            max_duration: None,
            order: TraversalOrder::default(),
            progress_callback: None,
            result_callback: None,
        }
    }

    /// Stop claiming new URLs once this many fetches were attempted.
    pub fn with_max_pages(mut self, max_pages: Option<usize>) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Stop fetching once this much time has passed since the crawl began.
    pub fn with_max_duration(mut self, max_duration: Option<Duration>) -> Self {
        self.max_duration = max_duration;
        self
    }

    pub fn with_order(mut self, order: TraversalOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn with_result_callback(mut self, callback: ResultCallback) -> Self {
        self.result_callback = Some(callback);
        self
    }

    /// Crawl every page reachable from `seed` without leaving its host.
    ///
    /// Only an invalid seed is an error; per-page failures are recorded in
    /// [`CrawlOutput::results`] and the crawl carries on.
    pub async fn crawl(&self, seed: &str, workers: usize) -> Result<CrawlOutput> {
        let base = validate_seed(seed)?;
        let workers = workers.max(1);
        info!("Starting crawl of {} with {} workers", base, workers);

        let mut seed_key = base.clone();
        seed_key.set_fragment(None);
        let seed_key = seed_key.to_string();

        let started = Instant::now();
        let session = Arc::new(CrawlSession {
            base,
            frontier: Frontier::new(self.order),
            visited: VisitedSet::new(self.max_pages),
            graph: Mutex::new(LinkGraph::new()),
            results: Mutex::new(Vec::new()),
            deadline: self.max_duration.map(|budget| started + budget),
            stopped_early: AtomicBool::new(false),
        });
        session.frontier.push(seed_key.clone()).await;

        let handles: Vec<_> = (0..workers)
            .map(|worker_id| {
                let session = session.clone();
                let fetcher = self.fetcher.clone();
                let extractor = self.extractor.clone();
                let progress_cb = self.progress_callback.clone();
                let result_cb = self.result_callback.clone();

                tokio::spawn(async move {
                    debug!("Worker {} started", worker_id);
                    while let Some(url) = session.frontier.next().await {
                        let processed = AssertUnwindSafe(session.process(
                            worker_id,
                            &url,
                            fetcher.as_ref(),
                            extractor.as_ref(),
                            progress_cb.as_ref(),
                            result_cb.as_ref(),
                        ))
                        .catch_unwind()
                        .await;
                        // Release the claim even if a callback panicked, so the
                        // remaining workers can still drain the frontier.
                        session.frontier.complete().await;
                        if let Err(panic) = processed {
                            std::panic::resume_unwind(panic);
                        }
                    }
                    debug!("Worker {} finished", worker_id);
                })
            })
            .collect();

        for joined in futures::future::join_all(handles).await {
            joined?;
        }

        let graph = std::mem::take(&mut *session.graph.lock().await);
        let results = std::mem::take(&mut *session.results.lock().await);
        let stopped_early = session.stopped_early.load(Ordering::Relaxed);
        let elapsed = started.elapsed();

        info!(
            "Crawl complete. Visited {} pages, {} in graph, {} links",
            results.len(),
            graph.node_count(),
            graph.edge_count()
        );
        if stopped_early {
            warn!("Crawl stopped early by its page or time budget");
        }

        Ok(CrawlOutput {
            seed: seed_key,
            graph,
            results,
            elapsed,
            stopped_early,
        })
    }
}

impl CrawlSession {
    async fn process<F: Fetcher, E: LinkExtractor>(
        &self,
        worker_id: usize,
        url: &str,
        fetcher: &F,
        extractor: &E,
        progress_cb: Option<&ProgressCallback>,
        result_cb: Option<&ResultCallback>,
    ) {
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            debug!("Deadline passed, dropping {}", url);
            self.stopped_early.store(true, Ordering::Relaxed);
            return;
        }

        match self.visited.claim(url).await {
            Claim::Claimed => {}
            Claim::AlreadyVisited => return,
            Claim::BudgetExhausted => {
                debug!("Page budget spent, dropping {}", url);
                self.stopped_early.store(true, Ordering::Relaxed);
                return;
            }
        }

        if let Some(callback) = progress_cb {
            callback(worker_id, url.to_string());
        }
        info!("Scanning: {}", url);

        let start = Instant::now();
        let outcome = match Url::parse(url) {
            Ok(parsed) => fetch_page(fetcher, &parsed, &self.base).await,
            Err(e) => Err(crate::error::FetchFailure::Transport(e.to_string())),
        };
        let response_time = start.elapsed();

        let result = match outcome {
            Ok(page) => {
                let mut seen = HashSet::new();
                let links: Vec<String> = extractor
                    .extract_hrefs(&page.body)
                    .iter()
                    .filter_map(|href| normalize_and_filter(href, &self.base, &page.final_url))
                    .filter(|link| seen.insert(link.clone()))
                    .collect();
                debug!("Found {} links on {}", links.len(), url);

                {
                    let mut graph = self.graph.lock().await;
                    graph.add_node(url);
                    for link in &links {
                        graph.add_edge(url, link);
                    }
                }

                let fresh = self.visited.retain_unvisited(links.clone()).await;
                self.frontier.extend(fresh).await;

                CrawlResult::success(url.to_string(), page.final_url.to_string(), response_time, links)
            }
            Err(failure) => {
                warn!("Skipping {}: {}", url, failure);
                CrawlResult::failure(url.to_string(), response_time, &failure)
            }
        };

        if let Some(callback) = result_cb {
            callback(result.clone());
        }
        self.results.lock().await.push(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchFailure;
    use crate::fetch::RawResponse;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    /// In-memory site: url -> (status, final url, body). Counts every GET.
    #[derive(Default)]
    struct FakeSite {
        pages: HashMap<String, (u16, String, String)>,
        hits: StdMutex<HashMap<String, usize>>,
    }

    impl FakeSite {
        fn page(mut self, url: &str, body: &str) -> Self {
            self.pages
                .insert(url.to_string(), (200, url.to_string(), body.to_string()));
            self
        }

        fn status(mut self, url: &str, status: u16) -> Self {
            self.pages
                .insert(url.to_string(), (status, url.to_string(), String::new()));
            self
        }

        fn redirect(self, url: &str, to: &str) -> Self {
            self.moved(url, to, "<a href=\"/z\">z</a>")
        }

        fn moved(mut self, url: &str, to: &str, body: &str) -> Self {
            self.pages
                .insert(url.to_string(), (200, to.to_string(), body.to_string()));
            self
        }
    }

    impl Fetcher for Arc<FakeSite> {
        async fn get(&self, url: &Url) -> std::result::Result<RawResponse, FetchFailure> {
            *self
                .hits
                .lock()
                .unwrap()
                .entry(url.to_string())
                .or_insert(0) += 1;
            tokio::task::yield_now().await;

            match self.pages.get(url.as_str()) {
                Some((status, final_url, body)) => Ok(RawResponse {
                    status: *status,
                    final_url: Url::parse(final_url).unwrap(),
                    body: body.clone(),
                }),
                None => Err(FetchFailure::Transport("connection refused".to_string())),
            }
        }
    }

    fn hits(site: &FakeSite, url: &str) -> usize {
        site.hits.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    async fn crawl_site(site: &Arc<FakeSite>, workers: usize) -> CrawlOutput {
        Crawler::with_components(site.clone(), HtmlLinkExtractor)
            .crawl("http://a.test/", workers)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_fragment_variants_collapse_and_other_hosts_are_ignored() {
        let site = Arc::new(
            FakeSite::default()
                .page(
                    "http://a.test/",
                    r#"<a href="/x">x</a><a href="/x#frag">x again</a>
                       <a href="https://other.test/y">elsewhere</a>"#,
                )
                .page("http://a.test/x", "<p>leaf</p>"),
        );

        let output = crawl_site(&site, 2).await;
        let graph = &output.graph;

        assert_eq!(graph.out_degree("http://a.test/"), 1);
        assert!(graph.contains_edge("http://a.test/", "http://a.test/x"));
        assert!(!graph.contains_node("https://other.test/y"));
        assert!(graph.edges().iter().all(|e| !e.target.contains("other.test")));
        assert_eq!(hits(&site, "https://other.test/y"), 0);
        assert_eq!(graph.node_count(), 2);
    }

    #[tokio::test]
    async fn test_panicking_callback_does_not_stall_other_workers() {
        let site = Arc::new(
            FakeSite::default()
                .page(
                    "http://a.test/",
                    r#"<a href="/boom">boom</a><a href="/fine">fine</a>"#,
                )
                .page("http://a.test/boom", "<p>leaf</p>")
                .page("http://a.test/fine", "<p>leaf</p>"),
        );

        let crawler = Crawler::with_components(site.clone(), HtmlLinkExtractor)
            .with_progress_callback(Arc::new(|_, url: String| {
                if url.ends_with("/boom") {
                    panic!("callback failed on {}", url);
                }
            }));

        let outcome =
            tokio::time::timeout(Duration::from_secs(5), crawler.crawl("http://a.test/", 3))
                .await
                .expect("workers stalled after a callback panic");

        assert!(matches!(outcome, Err(ScanError::JoinError(_))));
        assert_eq!(hits(&site, "http://a.test/fine"), 1);
    }

    #[tokio::test]
    async fn test_not_found_page_is_not_a_node() {
        let site = Arc::new(
            FakeSite::default()
                .page(
                    "http://a.test/",
                    r#"<a href="/p">broken</a><a href="/ok">ok</a>"#,
                )
                .status("http://a.test/p", 404)
                .page("http://a.test/ok", "fine"),
        );

        let output = crawl_site(&site, 1).await;

        assert!(!output.graph.contains_node("http://a.test/p"));
        assert_eq!(output.graph.out_degree("http://a.test/p"), 0);
        assert!(output.graph.contains_node("http://a.test/ok"));
        assert!(output.graph.contains_edge("http://a.test/", "http://a.test/p"));

        let failed = output
            .results
            .iter()
            .find(|r| r.url == "http://a.test/p")
            .unwrap();
        assert_eq!(failed.status_code, Some(404));
    }

    #[tokio::test]
    async fn test_off_domain_redirect_is_a_failure() {
        let site = Arc::new(
            FakeSite::default()
                .page("http://a.test/", r#"<a href="/q">q</a>"#)
                .redirect("http://a.test/q", "https://other.test/q2"),
        );

        let output = crawl_site(&site, 1).await;

        assert!(!output.graph.contains_node("http://a.test/q"));
        assert_eq!(output.graph.out_degree("http://a.test/q"), 0);
        assert_eq!(hits(&site, "http://a.test/z"), 0);
        assert_eq!(hits(&site, "http://a.test/q"), 1);
    }

    #[tokio::test]
    async fn test_shared_links_are_fetched_once() {
        let site = Arc::new(
            FakeSite::default()
                .page(
                    "http://a.test/",
                    r#"<a href="/a">A</a><a href="/b">B</a>"#,
                )
                .page("http://a.test/a", r#"<a href="/r">r</a><a href="/s">s</a>"#)
                .page("http://a.test/b", r#"<a href="/r">r</a><a href="/s">s</a>"#)
                .page("http://a.test/r", r#"<a href="/s">s</a><a href="/">home</a>"#)
                .page("http://a.test/s", r#"<a href="/r">r</a>"#),
        );

        let output = crawl_site(&site, 4).await;

        for page in ["/", "/a", "/b", "/r", "/s"] {
            let url = format!("http://a.test{}", page);
            assert_eq!(hits(&site, &url), 1, "{} fetched more than once", url);
            assert!(output.graph.contains_node(&url));
        }
        assert!(output.graph.contains_edge("http://a.test/a", "http://a.test/r"));
        assert!(output.graph.contains_edge("http://a.test/b", "http://a.test/r"));
        assert_eq!(output.results.len(), 5);
    }

    #[tokio::test]
    async fn test_cycles_terminate_in_both_orders() {
        let site = Arc::new(
            FakeSite::default()
                .page("http://a.test/", r#"<a href="/1">1</a>"#)
                .page("http://a.test/1", r#"<a href="/2">2</a><a href="/">home</a>"#)
                .page("http://a.test/2", r#"<a href="/1">1</a><a href="/">home</a>"#),
        );

        for order in [TraversalOrder::BreadthFirst, TraversalOrder::DepthFirst] {
            let output = Crawler::with_components(site.clone(), HtmlLinkExtractor)
                .with_order(order)
                .crawl("http://a.test/", 3)
                .await
                .unwrap();
            assert_eq!(output.graph.node_count(), 3);
            assert_eq!(output.graph.edge_count(), 5);
            assert!(!output.stopped_early);
        }
    }

    #[tokio::test]
    async fn test_links_resolve_against_final_url() {
        let site = Arc::new(
            FakeSite::default()
                .page("http://a.test/", r#"<a href="/old/">old</a>"#)
                .moved("http://a.test/old/", "http://a.test/new/", r#"<a href="child">child</a>"#)
                .page("http://a.test/new/child", "leaf"),
        );

        let output = crawl_site(&site, 1).await;

        assert!(output.graph.contains_node("http://a.test/old/"));
        assert!(output.graph.contains_edge("http://a.test/old/", "http://a.test/new/child"));
    }

    #[tokio::test]
    async fn test_transport_errors_do_not_stop_the_crawl() {
        let site = Arc::new(FakeSite::default().page(
            "http://a.test/",
            r#"<a href="/unreachable">u</a><a href="/also-missing">m</a>"#,
        ));

        let output = crawl_site(&site, 2).await;

        assert_eq!(output.graph.node_count(), 1);
        assert_eq!(output.results.len(), 3);
        assert_eq!(output.results.iter().filter(|r| r.is_success()).count(), 1);
    }

    #[tokio::test]
    async fn test_page_budget_stops_crawl() {
        let mut site = FakeSite::default();
        for i in 0..10 {
            let url = if i == 0 {
                "http://a.test/".to_string()
            } else {
                format!("http://a.test/{}", i)
            };
            site = site.page(&url, &format!(r#"<a href="/{}">next</a>"#, i + 1));
        }
        let site = Arc::new(site);

        let output = Crawler::with_components(site.clone(), HtmlLinkExtractor)
            .with_max_pages(Some(3))
            .crawl("http://a.test/", 2)
            .await
            .unwrap();

        assert_eq!(output.graph.node_count(), 3);
        assert!(output.stopped_early);
    }

    #[tokio::test]
    async fn test_zero_deadline_fetches_nothing() {
        let site = Arc::new(FakeSite::default().page("http://a.test/", "home"));

        let output = Crawler::with_components(site.clone(), HtmlLinkExtractor)
            .with_max_duration(Some(Duration::ZERO))
            .crawl("http://a.test/", 1)
            .await
            .unwrap();

        assert!(output.graph.is_empty());
        assert!(output.stopped_early);
        assert_eq!(hits(&site, "http://a.test/"), 0);
    }

    #[tokio::test]
    async fn test_invalid_seed_is_rejected_before_crawling() {
        let site = Arc::new(FakeSite::default());
        let crawler = Crawler::with_components(site.clone(), HtmlLinkExtractor);

        for seed in ["a.test", "ftp://a.test/", "httpx://a.test/", "http://"] {
            let err = crawler.crawl(seed, 1).await.unwrap_err();
            assert!(matches!(err, ScanError::InvalidSeed { .. }), "{} accepted", seed);
        }
        assert!(site.hits.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_seed_fragment_is_dropped() {
        let site = Arc::new(FakeSite::default().page("http://a.test/", "home"));
        let output = Crawler::with_components(site.clone(), HtmlLinkExtractor)
            .crawl("http://a.test/#intro", 1)
            .await
            .unwrap();
        assert_eq!(output.seed, "http://a.test/");
        assert!(output.graph.contains_node("http://a.test/"));
    }

    #[tokio::test]
    async fn test_callbacks_fire_per_attempt() {
        let site = Arc::new(
            FakeSite::default()
                .page("http://a.test/", r#"<a href="/x">x</a><a href="/p">p</a>"#)
                .page("http://a.test/x", "x")
                .status("http://a.test/p", 500),
        );

        let progress: Arc<StdMutex<Vec<String>>> = Arc::new(StdMutex::new(Vec::new()));
        let finished: Arc<StdMutex<Vec<CrawlResult>>> = Arc::new(StdMutex::new(Vec::new()));
        let progress_clone = progress.clone();
        let finished_clone = finished.clone();

        Crawler::with_components(site, HtmlLinkExtractor)
            .with_progress_callback(Arc::new(move |_worker, url| {
                progress_clone.lock().unwrap().push(url);
            }))
            .with_result_callback(Arc::new(move |result| {
                finished_clone.lock().unwrap().push(result);
            }))
            .crawl("http://a.test/", 2)
            .await
            .unwrap();

        assert_eq!(progress.lock().unwrap().len(), 3);
        let finished = finished.lock().unwrap();
        assert_eq!(finished.len(), 3);
        assert_eq!(finished.iter().filter(|r| !r.is_success()).count(), 1);
    }

    /// End-to-end over real HTTP with several workers
    #[tokio::test]
    async fn test_link_discovery_over_http() {
        let mock_server = MockServer::start().await;

        let mut root_html = String::from("<html><body>");
        for i in 1..=10 {
            root_html.push_str(&format!(r#"<a href="/page{}">Page {}</a>"#, i, i));
        }
        root_html.push_str(r#"<a href="/logo.png">logo</a></body></html>"#);

        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string(root_html),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        for i in 1..=10 {
            Mock::given(method("GET"))
                .and(path(format!("/page{}", i)))
                .respond_with(
                    ResponseTemplate::new(200)
                        .insert_header("content-type", "text/html")
                        .set_body_string(r#"<a href="/">home</a><a href="/page1">first</a>"#)
                        .set_delay(Duration::from_millis(10)),
                )
                .expect(1)
                .mount(&mock_server)
                .await;
        }

        let crawler = Crawler::new().unwrap();
        let output = crawler.crawl(&mock_server.uri(), 4).await.unwrap();

        assert_eq!(output.graph.node_count(), 11);
        assert_eq!(output.graph.edge_count(), 10 + 10 * 2);
        assert!(output.graph.nodes().iter().all(|url| !url.ends_with(".png")));
        // `expect(1)` on every mock verifies at-most-once fetching on drop
    }
}
