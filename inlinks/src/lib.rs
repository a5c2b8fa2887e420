pub mod commands;
pub mod handlers;

// Re-export commonly used handler functions for convenience
pub use handlers::{
    handle_crawl, highlight_report, init_logging, log_level, parse_format, parse_seed, read_seed,
    resolve_output_path,
};

// Re-export crawl functionality from inlinks-core
pub use inlinks_core::crawl::{CrawlOptions, CrawlProgressCallback, execute_crawl, extract_url_path};
