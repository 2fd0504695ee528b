//! codedox - crawl documentation sites, extract code snippets, search them.
//!
//! A tool for crawling documentation, extracting and annotating code
//! blocks, and serving them over HTTP and MCP.

mod cli;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (before anything else)
    let _ = dotenvy::dotenv();

    // Initialize logging based on verbosity
    let default_filter = if cli::is_verbose() {
        "codedox=info"
    } else {
        "codedox=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Run CLI
    let exit_code = cli::run().await;
    std::process::exit(exit_code);
}
