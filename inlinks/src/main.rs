use colored::Colorize;
use inlinks::commands::command_argument_builder;
use inlinks::handlers::{handle_crawl, init_logging, resolve_output_path};
use inlinks_core::print_banner;

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");
    let verbose = chosen_command.get_flag("verbose");
    let log_file = chosen_command
        .get_one::<String>("log-file")
        .map(|raw| resolve_output_path(raw));

    if let Err(e) = init_logging(verbose, quiet, log_file.as_deref()) {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }

    match chosen_command.subcommand() {
        Some(("crawl", primary_command)) => {
            if let Err(e) = handle_crawl(primary_command, quiet).await {
                eprintln!("{} {:#}", "✗".red().bold(), e);
                std::process::exit(1);
            }
        }
        // No subcommand provided, just show the banner
        None => {}
        _ => unreachable!("clap should ensure we don't get here"),
    }
}
