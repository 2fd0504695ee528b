//! Command-line surface: a thin `clap` layer over `AppContext` and the
//! same `JobManager`/`SearchService`/`upload` functions the HTTP and MCP
//! surfaces call, so `codedox crawl start` and `POST /crawl/init` can never
//! drift in validation behavior.
//!
//! Grounded on the teacher's `cli::commands::run` dispatch: a `clap::Parser`
//! root, one `Commands` variant per area, and `console::style` for status
//! output. Exit codes follow the contract in the specification: 0 success,
//! 1 usage/validation, 2 runtime/infra failure, 130 cancelled.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::style;
use uuid::Uuid;

use codedox::app::AppContext;
use codedox::config::Config;
use codedox::error::CodeDoxError;
use codedox::jobs::NewJobParams;
use codedox::models::JobStatus;
use codedox::upload::{ingest_file, UploadFile};

const EXIT_OK: i32 = 0;
const EXIT_USAGE: i32 = 1;
const EXIT_RUNTIME: i32 = 2;
const EXIT_CANCELLED: i32 = 130;

#[derive(Parser)]
#[command(name = "codedox")]
#[command(about = "Crawl, extract, and serve code snippets from documentation")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup, before
/// `Cli::parse()` has a chance to run).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database schema
    Init {
        /// Record a failing migration as skipped instead of aborting
        #[arg(long)]
        drop: bool,
    },

    /// Run the HTTP API, the stdio MCP server, or both
    Serve {
        /// Run only the stdio MCP server (for an MCP client's subprocess transport)
        #[arg(long)]
        mcp: bool,
        /// Run only the HTTP API (default when neither flag is given)
        #[arg(long)]
        api: bool,
    },

    /// Manage crawl jobs
    Crawl {
        #[command(subcommand)]
        command: CrawlCommands,
    },

    /// Ingest one file directly, bypassing the crawl pipeline
    Upload {
        /// File to ingest
        path: PathBuf,
        /// URL recorded against the ingested document (defaults to a `file://` path)
        #[arg(long)]
        source_url: Option<String>,
        /// Source name to ingest into (defaults to the file stem)
        #[arg(long)]
        name: Option<String>,
    },

    /// Full-text search stored code snippets
    Search {
        /// Search query
        query: String,
        /// Source id, name, or name prefix to scope the search to
        #[arg(short, long)]
        source: Option<String>,
        /// Maximum number of results
        #[arg(short, long)]
        limit: Option<u32>,
    },
}

#[derive(Subcommand)]
enum CrawlCommands {
    /// Start a new crawl job
    Start {
        /// Library/source name this crawl belongs to
        name: String,
        /// One or more URLs to start crawling from
        urls: Vec<String>,
        /// Link hops to follow from a start URL (0-3)
        #[arg(long, default_value = "2")]
        depth: i32,
        /// Restrict the crawl to this domain
        #[arg(long)]
        domain: Option<String>,
        /// Only crawl pages matching one of these glob patterns
        #[arg(long = "url-patterns")]
        url_patterns: Vec<String>,
        /// In-flight page fetches for this job
        #[arg(long)]
        concurrent: Option<i32>,
        /// Stop after this many pages
        #[arg(long)]
        max_pages: Option<i32>,
    },

    /// Show a job's status
    Status {
        /// Job id
        id: Uuid,
    },

    /// List jobs, most recent first
    List {
        /// Filter by status (pending, running, completed, failed, cancelled)
        #[arg(long)]
        status: Option<String>,
    },

    /// Cancel a running or pending job
    Cancel {
        /// Job id
        id: Uuid,
    },

    /// Resume a failed, cancelled, or stalled job
    Resume {
        /// Job id
        id: Uuid,
    },

    /// Report whether the crawl subsystem can reach the database
    Health,
}

pub async fn run() -> i32 {
    let cli = Cli::parse();
    match dispatch(cli).await {
        Ok(()) => EXIT_OK,
        Err(e) => {
            eprintln!("{} {}", style("error:").red().bold(), e);
            classify_exit(&e)
        }
    }
}

fn classify_exit(e: &anyhow::Error) -> i32 {
    match e.downcast_ref::<CodeDoxError>() {
        Some(CodeDoxError::Cancelled) => EXIT_CANCELLED,
        Some(CodeDoxError::Validation(_)) => EXIT_USAGE,
        _ => EXIT_RUNTIME,
    }
}

async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    let config = Config::from_env();

    match cli.command {
        Commands::Init { drop } => cmd_init(config, drop).await,
        Commands::Serve { mcp, api } => cmd_serve(config, mcp, api).await,
        Commands::Crawl { command } => cmd_crawl(config, command).await,
        Commands::Upload { path, source_url, name } => cmd_upload(config, path, source_url, name).await,
        Commands::Search { query, source, limit } => cmd_search(config, query, source, limit).await,
    }
}

/// Every command but `init` needs the schema already in place, so each
/// bootstraps through this helper instead of duplicating the migration call.
async fn bootstrap_with_schema(config: Config) -> anyhow::Result<AppContext> {
    let ctx = AppContext::bootstrap(config)?;
    let mut conn = ctx.repos.pool().get().await?;
    codedox::repository::migrations::run(&mut conn, false).await?;
    Ok(ctx)
}

async fn cmd_init(config: Config, drop: bool) -> anyhow::Result<()> {
    println!("{} Running database migrations...", style("->").cyan());
    let ctx = AppContext::bootstrap(config)?;
    let mut conn = ctx.repos.pool().get().await?;
    let applied = codedox::repository::migrations::run(&mut conn, drop).await?;
    println!("  {} {} migration(s) applied", style("OK").green(), applied);
    Ok(())
}

async fn cmd_serve(config: Config, mcp: bool, api: bool) -> anyhow::Result<()> {
    let ctx = bootstrap_with_schema(config).await?;

    if mcp && !api {
        println!("{} starting stdio MCP server", style("->").cyan());
        return codedox::mcp::serve_stdio(ctx).await;
    }

    let host = ctx.config.api_host.clone();
    let port = ctx.config.api_port;
    println!("{} starting HTTP API at http://{host}:{port}", style("->").cyan());
    println!("  Press Ctrl+C to stop");
    codedox::server::serve(ctx, &host, port).await
}

async fn cmd_crawl(config: Config, command: CrawlCommands) -> anyhow::Result<()> {
    let ctx = bootstrap_with_schema(config).await?;

    match command {
        CrawlCommands::Start { name, urls, depth, domain, url_patterns, concurrent, max_pages } => {
            let job = ctx
                .job_manager
                .create_and_start(NewJobParams {
                    name,
                    start_urls: urls,
                    max_depth: depth,
                    include_patterns: url_patterns,
                    exclude_patterns: Vec::new(),
                    domain_filter: domain,
                    max_concurrent_crawls: concurrent,
                    max_pages,
                })
                .await?;
            let view = ctx.job_manager.view(&job);
            println!("{} crawl job {} started ({})", style("OK").green(), view.id, view.status);
        }
        CrawlCommands::Status { id } => {
            let job = ctx.job_manager.get(id).await?;
            let view = ctx.job_manager.view(&job);
            print_job(&view);
        }
        CrawlCommands::List { status } => {
            let status = status
                .map(|s| {
                    JobStatus::from_str(&s)
                        .ok_or_else(|| CodeDoxError::Validation(format!("unknown status '{s}'")))
                })
                .transpose()?;
            let jobs = ctx.job_manager.list(status).await?;
            if jobs.is_empty() {
                println!("no jobs found");
            }
            for job in &jobs {
                let view = ctx.job_manager.view(job);
                println!(
                    "{:<38} {:<10} {:<10} pages={:<6} snippets={}",
                    view.id, view.status, view.phase, view.pages_crawled, view.snippets_extracted
                );
            }
        }
        CrawlCommands::Cancel { id } => {
            let job = ctx.job_manager.cancel(id).await?;
            println!("{} job {} is now {}", style("OK").green(), job.id, job.status.as_str());
        }
        CrawlCommands::Resume { id } => {
            let job = ctx.job_manager.resume(id).await?;
            println!("{} job {} resumed, now {}", style("OK").green(), job.id, job.status.as_str());
        }
        CrawlCommands::Health => {
            ctx.repos.pool().get().await?;
            println!("{} database reachable", style("OK").green());
        }
    }
    Ok(())
}

fn print_job(view: &codedox::jobs::JobView) {
    println!("{:<20} {}", "id:", view.id);
    println!("{:<20} {}", "name:", view.name);
    println!("{:<20} {}", "status:", view.status);
    println!("{:<20} {}", "phase:", view.phase);
    println!("{:<20} {}", "pages crawled:", view.pages_crawled);
    println!("{:<20} {}", "pages skipped:", view.pages_skipped_unchanged);
    println!("{:<20} {}", "snippets:", view.snippets_extracted);
    println!("{:<20} {}", "failed pages:", view.failed_pages);
    if let Some(err) = &view.error_message {
        println!("{:<20} {}", "error:", err);
    }
}

async fn cmd_upload(config: Config, path: PathBuf, source_url: Option<String>, name: Option<String>) -> anyhow::Result<()> {
    let ctx = bootstrap_with_schema(config).await?;
    if !ctx.config.uploads_enabled {
        return Err(CodeDoxError::Validation("uploads are disabled (CODE_UPLOADS_ENABLED=false)".to_string()).into());
    }

    let content = std::fs::read_to_string(&path)
        .map_err(|e| CodeDoxError::Validation(format!("could not read {}: {e}", path.display())))?;
    let source_name = name.unwrap_or_else(|| {
        path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_else(|| "upload".to_string())
    });
    let url = source_url.unwrap_or_else(|| format!("file://{}", path.display()));

    let outcome = ingest_file(
        &ctx.repos,
        std::sync::Arc::clone(&ctx.annotator),
        codedox::config::DEFAULT_ANNOTATOR_BATCH_SIZE,
        ctx.config.llm_num_parallel,
        &source_name,
        None,
        UploadFile { url, content_type: None, content },
    )
    .await?;

    println!(
        "{} ingested {} into '{}' ({} snippets)",
        style("OK").green(),
        outcome.document.url,
        source_name,
        outcome.snippets_extracted
    );
    Ok(())
}

async fn cmd_search(config: Config, query: String, source: Option<String>, limit: Option<u32>) -> anyhow::Result<()> {
    let ctx = bootstrap_with_schema(config).await?;

    let source_id = match &source {
        Some(s) if !s.trim().is_empty() => Some(ctx.repos.sources.resolve_library(s).await?.id),
        _ => None,
    };
    let filters = codedox::repository::SearchFilters {
        source_id,
        language: None,
        limit: limit.unwrap_or(ctx.config.search_default_max_results as u32) as i64,
        offset: 0,
    };
    let (snippets, total) = ctx.repos.snippets.search(&query, &filters).await?;

    println!("{} result(s) (showing {})", total, snippets.len());
    for snippet in &snippets {
        println!("{:<38} {:<12} {}", snippet.id, snippet.language, snippet.title);
    }
    Ok(())
}
