//! Command line front end for answer extraction.
//!
//! Usage:
//!   $ aisearch why is the sky blue
//!   $ aisearch --headless --timeout-ms 45000 what causes tides

use std::env;
use std::process::ExitCode;

use aisearch_rs::config::{SearchConfig, Verbosity};
use aisearch_rs::extractor::extract_one;
use clap::Parser;

#[derive(Parser)]
#[command(
    name = "aisearch",
    author,
    version,
    about = "Extract the AI-generated answer for a search query"
)]
struct Cli {
    /// Words of the query; everything positional is joined into one query.
    #[arg(trailing_var_arg = true)]
    query: Vec<String>,

    /// Run the browser without a visible window.
    #[arg(long)]
    headless: bool,

    /// Overall per-query deadline in milliseconds.
    #[arg(long, value_name = "MS")]
    timeout_ms: Option<u64>,

    /// Enable detailed pipeline diagnostics.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_env_logger();

    let cli = Cli::parse();
    let query = cli.query.join(" ");
    if query.trim().is_empty() {
        println!("Usage: aisearch \"your question\"");
        return ExitCode::FAILURE;
    }

    let mut config = match SearchConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {err}");
            return ExitCode::FAILURE;
        }
    };
    config.headless = config.headless || cli.headless;
    if let Some(timeout_ms) = cli.timeout_ms {
        config.timeout_ms = timeout_ms;
    }
    config.verbose = verbosity_from_count(cli.verbose);

    let result = extract_one(&query, config).await;

    if result.success {
        if let Some(text) = &result.text {
            println!("{text}");
        }
        if let Some(sources) = result.sources.as_deref().filter(|s| !s.is_empty()) {
            println!("\nSources:");
            for (index, source) in sources.iter().enumerate() {
                println!("{}. {}", index + 1, source.title);
                println!("   {} ({})", source.url, source.domain);
            }
        }
        ExitCode::SUCCESS
    } else {
        let error = result.error.as_deref().unwrap_or("unknown error");
        eprintln!("Error: {error}");
        ExitCode::FAILURE
    }
}

fn verbosity_from_count(count: u8) -> Verbosity {
    if count == 0 {
        Verbosity::Medium
    } else {
        Verbosity::Detailed
    }
}

fn init_env_logger() {
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }

    let _ = env_logger::Builder::from_env(env_logger::Env::default())
        .format_timestamp_secs()
        .try_init();
}
