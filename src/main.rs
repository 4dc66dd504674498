//! ripple-search command-line entry point.

use clap::{Parser, Subcommand};
use ripple_search::config::load_config_with_hash;
use ripple_search::query::QueryEngine;
use ripple_search::scheduler::{install_ctrl_c_handler, Scheduler, ShutdownSignal};
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ripple-search")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "A darknet search engine: crawler, indexer, and ranked query tool")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to the TOML configuration file.
    #[arg(long, short = 'c', value_name = "PATH", default_value = "ripple.toml")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output.
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the crawl/rank scheduler until interrupted.
    Crawl,
    /// Run a single query and print results.
    Query {
        text: String,
        #[arg(short, long)]
        k: Option<usize>,
    },
    /// Start an interactive query REPL.
    Repl,
}

const EXIT_OK: i32 = 0;
const EXIT_BAD_CONFIG: i32 = 2;
const EXIT_SIGINT: i32 = 130;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    let code = run(cli).await;
    std::process::exit(code);
}

async fn run(cli: Cli) -> i32 {
    tracing::info!(path = %cli.config.display(), "loading configuration");
    let (config, hash) = match load_config_with_hash(&cli.config) {
        Ok(pair) => pair,
        Err(e) => {
            tracing::error!(error = %e, "failed to load configuration");
            return EXIT_BAD_CONFIG;
        }
    };
    tracing::info!(hash, "configuration loaded");

    let scheduler = match Scheduler::new(config) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "failed to initialize scheduler");
            return EXIT_BAD_CONFIG;
        }
    };

    match cli.command {
        Command::Crawl => run_crawl(scheduler).await,
        Command::Query { text, k } => run_query(&scheduler, &text, k),
        Command::Repl => run_repl(&scheduler),
    }
}

async fn run_crawl(scheduler: Scheduler) -> i32 {
    let shutdown = ShutdownSignal::new();
    install_ctrl_c_handler(shutdown.clone());

    match scheduler.run(shutdown.clone()).await {
        Ok(()) => {
            if shutdown.is_triggered() {
                EXIT_SIGINT
            } else {
                EXIT_OK
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "scheduler aborted");
            EXIT_BAD_CONFIG
        }
    }
}

fn run_query(scheduler: &Scheduler, text: &str, k: Option<usize>) -> i32 {
    let snapshot = scheduler.build_snapshot_now();
    let engine = QueryEngine::new(&scheduler.store.docs, &scheduler.store.index);
    let top_k = k.unwrap_or(10);

    match engine.query(text, top_k, &snapshot) {
        Ok(results) => {
            print_results(&results);
            EXIT_OK
        }
        Err(e) => {
            tracing::error!(error = %e, "query failed");
            EXIT_BAD_CONFIG
        }
    }
}

fn run_repl(scheduler: &Scheduler) -> i32 {
    println!("ripple-search repl. Commands: `query <text>`, `exit`.");
    let engine = QueryEngine::new(&scheduler.store.docs, &scheduler.store.index);

    let stdin = std::io::stdin();
    loop {
        print!("> ");
        let _ = std::io::stdout().flush();

        let mut line = String::new();
        if stdin.read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" {
            break;
        }

        let text = line.strip_prefix("query ").unwrap_or(line);
        // Snapshot fresh on every query so the REPL reflects newly-crawled
        // data without waiting for the next `rank_refresh_s` tick.
        let snapshot = scheduler.build_snapshot_now();
        match engine.query(text, 10, &snapshot) {
            Ok(results) => print_results(&results),
            Err(e) => eprintln!("query error: {e}"),
        }
    }

    EXIT_OK
}

fn print_results(results: &[ripple_search::query::QueryResult]) {
    if results.is_empty() {
        println!("No results");
        return;
    }
    for (rank, result) in results.iter().enumerate() {
        println!("{:>3}. {:.4}  {}", rank + 1, result.score, result.url);
    }
}

fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("ripple_search=info,warn"),
            1 => EnvFilter::new("ripple_search=debug,info"),
            2 => EnvFilter::new("ripple_search=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}
