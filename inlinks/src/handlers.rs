use anyhow::{Context, Result, anyhow, bail};
use clap::ArgMatches;
use colored::Colorize;
use inlinks_core::crawl::{CrawlOptions, CrawlProgressCallback, execute_crawl};
use inlinks_core::report::{ReportFormat, render_report, save_report};
use inlinks_scanner::{TraversalOrder, validate_seed};
use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::Level;

/// Pick the log level for the given flags. Console output stays quiet
/// unless asked for; a log file records INFO and up by default.
pub fn log_level(verbose: bool, quiet: bool, to_file: bool) -> Level {
    if verbose {
        Level::DEBUG
    } else if quiet {
        Level::ERROR
    } else if to_file {
        Level::INFO
    } else {
        Level::WARN
    }
}

/// Install the global tracing subscriber, writing to stderr or to a
/// freshly truncated log file.
pub fn init_logging(verbose: bool, quiet: bool, log_file: Option<&Path>) -> Result<()> {
    let level = log_level(verbose, quiet, log_file.is_some());
    let builder = tracing_subscriber::fmt().with_max_level(level).with_target(false);

    match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create log file {}", path.display()))?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.with_writer(io::stderr).try_init(),
    }
    .map_err(|e| anyhow!("failed to initialise logging: {}", e))
}

/// Validate a seed URL given on the command line or at the prompt.
pub fn parse_seed(input: &str) -> Result<String> {
    let seed = input.trim();
    validate_seed(seed)?;
    Ok(seed.to_string())
}

/// Ask for the seed URL on `output` and read one line from `input`.
pub fn read_seed<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> Result<String> {
    write!(output, "{} ", "Enter the seed URL:".bright_cyan().bold())?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        bail!("no seed URL given");
    }
    parse_seed(&line)
}

pub fn resolve_output_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

pub fn parse_format(raw: &str) -> Result<ReportFormat> {
    ReportFormat::from_str(raw).ok_or_else(|| anyhow!("unsupported report format '{}'", raw))
}

/// Colour section headings and notices of a text report for the terminal.
/// Saved reports stay plain.
pub fn highlight_report(report: &str) -> String {
    report
        .lines()
        .map(|line| {
            if line.starts_with("# ") {
                line.bright_blue().bold().to_string()
            } else if line.trim_start().starts_with("Crawl stopped early") {
                line.yellow().to_string()
            } else {
                line.to_string()
            }
        })
        .map(|line| line + "\n")
        .collect()
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

pub async fn handle_crawl(sub_matches: &ArgMatches, quiet: bool) -> Result<()> {
    let seed = match sub_matches.get_one::<String>("url") {
        Some(url) => parse_seed(url)?,
        None => {
            let stdin = io::stdin();
            read_seed(&mut stdin.lock(), &mut io::stdout())?
        }
    };

    let threads = *sub_matches.get_one::<usize>("threads").unwrap_or(&10);
    let max_pages = sub_matches.get_one::<usize>("max-pages").copied();
    let max_duration = sub_matches
        .get_one::<u64>("max-time")
        .map(|secs| Duration::from_secs(*secs));
    let timeout = Duration::from_secs(*sub_matches.get_one::<u64>("timeout").unwrap_or(&10));
    let order = if sub_matches.get_flag("depth-first") {
        TraversalOrder::DepthFirst
    } else {
        TraversalOrder::BreadthFirst
    };
    let format = parse_format(
        sub_matches
            .get_one::<String>("format")
            .map(String::as_str)
            .unwrap_or("text"),
    )?;
    let output_path = sub_matches
        .get_one::<String>("output")
        .map(|raw| resolve_output_path(raw));

    if !quiet {
        print_divider();
        println!("{} {}", "Crawling".bright_white().bold(), seed.bright_white());
        println!("  {} {}", "Workers:".blue(), threads);
        println!(
            "  {} {}",
            "Order:".blue(),
            match order {
                TraversalOrder::BreadthFirst => "breadth-first",
                TraversalOrder::DepthFirst => "depth-first",
            }
        );
        if let Some(max_pages) = max_pages {
            println!("  {} {}", "Page budget:".blue(), max_pages);
        }
        if let Some(max_duration) = max_duration {
            println!("  {} {}s", "Time budget:".blue(), max_duration.as_secs());
        }
        print_divider();
        println!();
    }

    let options = CrawlOptions {
        url: seed,
        threads,
        max_pages,
        max_duration,
        timeout,
        order,
        show_progress_bars: !quiet,
    };

    let progress_callback: Option<CrawlProgressCallback> = if quiet {
        None
    } else {
        Some(Arc::new(|msg: String| {
            eprintln!("{}", msg.yellow());
        }))
    };

    let output = execute_crawl(options, progress_callback, None)
        .await
        .context("crawl failed")?;

    let report = render_report(&output, format).context("failed to render report")?;

    match output_path {
        Some(path) => {
            save_report(&report, &path)
                .with_context(|| format!("failed to save report to {}", path.display()))?;
            if !quiet {
                println!(
                    "\n{} Report saved to {}",
                    "✓".green().bold(),
                    path.display().to_string().bright_white()
                );
            }
        }
        None => {
            if !quiet {
                println!("\n{} Crawl complete!\n", "✓".green().bold());
            }
            match format {
                ReportFormat::Text => print!("{}", highlight_report(&report)),
                _ => print!("{}", report),
            }
        }
    }

    Ok(())
}
