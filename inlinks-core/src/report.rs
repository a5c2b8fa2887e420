// Report generation from a finished crawl

use crate::crawl::extract_url_path;
use crate::rank::{compute_rank, node_sizes};
use inlinks_scanner::{CrawlOutput, LinkEdge, LinkGraph};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";

/// Scale from node size to Graphviz width in inches.
const DOT_INCHES_PER_SIZE: f64 = 25.0;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ReportError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
    Dot,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            "dot" | "graphviz" => Some(ReportFormat::Dot),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteReport {
    pub seed: String,
    pub generated_at: String,
    pub summary: ReportSummary,
    /// Sorted by rank, highest first.
    pub nodes: Vec<RankedPage>,
    pub edges: Vec<LinkEdge>,
    pub failures: Vec<FailedPage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSummary {
    pub pages_crawled: usize,
    pub pages_failed: usize,
    pub edges: usize,
    pub dangling_targets: usize,
    pub elapsed_ms: u64,
    pub stopped_early: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedPage {
    pub url: String,
    pub rank: f64,
    pub size: f64,
    pub in_degree: usize,
    pub out_degree: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedPage {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    pub error: String,
}

pub fn build_report(output: &CrawlOutput) -> SiteReport {
    let graph = &output.graph;
    let scores = compute_rank(graph);
    let sizes = node_sizes(&scores);

    let mut nodes: Vec<RankedPage> = scores
        .iter()
        .map(|(url, rank)| RankedPage {
            url: url.clone(),
            rank: *rank,
            size: sizes.get(url).copied().unwrap_or_default(),
            in_degree: graph.in_degree(url),
            out_degree: graph.out_degree(url),
        })
        .collect();
    nodes.sort_by(|a, b| b.rank.total_cmp(&a.rank).then_with(|| a.url.cmp(&b.url)));

    let mut edges = graph.edges();
    edges.sort();

    let failures: Vec<FailedPage> = output
        .results
        .iter()
        .filter(|result| !result.is_success())
        .map(|result| FailedPage {
            url: result.url.clone(),
            status_code: result.status_code,
            error: result.error.clone().unwrap_or_default(),
        })
        .collect();

    SiteReport {
        seed: output.seed.clone(),
        generated_at: chrono::Utc::now().to_rfc3339(),
        summary: ReportSummary {
            pages_crawled: graph.node_count(),
            pages_failed: failures.len(),
            edges: graph.edge_count(),
            dangling_targets: graph.dangling_targets().len(),
            elapsed_ms: u64::try_from(output.elapsed.as_millis()).unwrap_or(u64::MAX),
            stopped_early: output.stopped_early,
        },
        nodes,
        edges,
        failures,
    }
}

/// Build the report for `output` and render it in `format`.
pub fn render_report(output: &CrawlOutput, format: ReportFormat) -> Result<String> {
    let report = build_report(output);
    match format {
        ReportFormat::Text => Ok(generate_text_report(&report)),
        ReportFormat::Json => generate_json_report(&report),
        ReportFormat::Dot => Ok(generate_dot_report(&output.graph, &report)),
    }
}

pub fn generate_text_report(report: &SiteReport) -> String {
    let mut out = String::new();

    out.push_str(RULE);
    out.push_str("                              INLINKS SITE REPORT\n");
    out.push_str(RULE);
    out.push('\n');

    let summary = &report.summary;
    out.push_str("# Summary:\n");
    out.push_str(&format!("  Seed:             {}\n", report.seed));
    out.push_str(&format!("  Generated:        {}\n", report.generated_at));
    out.push_str(&format!("  Pages crawled:    {}\n", summary.pages_crawled));
    out.push_str(&format!("  Pages failed:     {}\n", summary.pages_failed));
    out.push_str(&format!("  Links recorded:   {}\n", summary.edges));
    out.push_str(&format!("  Dangling targets: {}\n", summary.dangling_targets));
    out.push_str(&format!(
        "  Elapsed:          {:.2}s\n",
        summary.elapsed_ms as f64 / 1000.0
    ));
    if summary.stopped_early {
        out.push_str("  Crawl stopped early: budget exhausted\n");
    }
    out.push('\n');

    out.push_str(RULE);
    out.push_str("# Pages by rank:\n\n");
    if report.nodes.is_empty() {
        out.push_str("  (no pages crawled)\n");
    } else {
        out.push_str(&format!(
            "  {:>8}  {:>5}  {:>4}  {:>4}  {}\n",
            "RANK", "SIZE", "IN", "OUT", "PATH"
        ));
        for page in &report.nodes {
            out.push_str(&format!(
                "  {:>8.5}  {:>5.1}  {:>4}  {:>4}  {}\n",
                page.rank,
                page.size,
                page.in_degree,
                page.out_degree,
                extract_url_path(&page.url)
            ));
        }
    }
    out.push('\n');

    if !report.failures.is_empty() {
        out.push_str(RULE);
        out.push_str("# Failed pages:\n\n");
        for failure in &report.failures {
            out.push_str(&format!(
                "  {} {} {}\n",
                status_label(failure.status_code),
                extract_url_path(&failure.url),
                failure.error
            ));
        }
        out.push('\n');
    }

    out.push_str(RULE);
    out.push_str("\nGenerated by inlinks - internal link graph crawler\n");

    out
}

fn status_label(status_code: Option<u16>) -> String {
    status_code.map_or_else(|| "ERR".to_string(), |code| code.to_string())
}

pub fn generate_json_report(report: &SiteReport) -> Result<String> {
    let json_report = serde_json::json!({
        "metadata": {
            "generator": "inlinks",
            "version": env!("CARGO_PKG_VERSION"),
            "generated_at": report.generated_at,
            "format": "json"
        },
        "site": report
    });

    Ok(serde_json::to_string_pretty(&json_report)?)
}

/// Graphviz export of the fetched subgraph. Node width follows the node
/// size and the label carries the path and rank score.
pub fn generate_dot_report(graph: &LinkGraph, report: &SiteReport) -> String {
    let pages: HashMap<&str, &RankedPage> = report
        .nodes
        .iter()
        .map(|page| (page.url.as_str(), page))
        .collect();

    graph.to_dot_with(|url| match pages.get(url) {
        Some(page) => format!(
            "label = \"{}\\nrank {:.4}\" tooltip = \"{}\" width = {:.2} ",
            extract_url_path(url),
            page.rank,
            url,
            page.size / DOT_INCHES_PER_SIZE
        ),
        None => format!("label = \"{}\" ", extract_url_path(url)),
    })
}

pub fn save_report(content: &str, path: &Path) -> Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}
