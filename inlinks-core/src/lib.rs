pub mod crawl;
pub mod rank;
pub mod report;

use colored::Colorize;

pub use crawl::{CrawlOptions, CrawlProgressCallback, CrawlResultCallback, execute_crawl, extract_url_path};
pub use rank::{RankConfig, RankScores, compute_rank, compute_rank_with, node_sizes};
pub use report::{ReportError, ReportFormat, SiteReport, build_report, render_report, save_report};

const BANNER: &str = r#"
    ╔══════════════════════════════════════════════════╗
    ║  ██╗███╗   ██╗██╗     ██╗███╗   ██╗██╗  ██╗███████╗ ║
    ║  ██║████╗  ██║██║     ██║████╗  ██║██║ ██╔╝██╔════╝ ║
    ║  ██║██╔██╗ ██║██║     ██║██╔██╗ ██║█████╔╝ ███████╗ ║
    ║  ██║██║╚██╗██║██║     ██║██║╚██╗██║██╔═██╗ ╚════██║ ║
    ║  ██║██║ ╚████║███████╗██║██║ ╚████║██║  ██╗███████║ ║
    ║  ╚═╝╚═╝  ╚═══╝╚══════╝╚═╝╚═╝  ╚═══╝╚═╝  ╚═╝╚══════╝ ║
    ╚══════════════════════════════════════════════════╝"#;

pub fn print_banner() {
    println!("{}", BANNER.bright_cyan().bold());
    println!(
        "      {} {}\n",
        "internal link graph crawler".bright_white(),
        format!("v{}", env!("CARGO_PKG_VERSION")).bright_black()
    );
}
