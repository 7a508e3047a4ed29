mod acl;
mod corpus;
mod engine;
mod error;
mod index;
mod output;
mod query;
mod schema;
mod text;

use acl::AuthorityFilter;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use engine::{SearchEngine, SearchRequest};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "ftsq")]
#[command(about = "Structured full-text query engine over JSON corpus files")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a query against a corpus file
    Search {
        /// Corpus description (JSON)
        #[arg(short, long)]
        corpus: PathBuf,

        /// Query text
        query: String,

        /// Maximum rows to return
        #[arg(long, default_value_t = 100)]
        rows: usize,

        /// Pagination offset
        #[arg(long, default_value_t = 0)]
        start: usize,

        /// Sort specification, e.g. "@cm:created desc"
        #[arg(long)]
        sort: Option<String>,

        /// Query locale, e.g. "en_GB"
        #[arg(long)]
        locale: Option<String>,

        /// Authority filter: JSON document or legacy |AUTHORITY:… string
        #[arg(long)]
        authority: Option<String>,

        /// Execution deadline in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },
    /// Show corpus statistics
    Stats {
        /// Corpus description (JSON)
        #[arg(short, long)]
        corpus: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env(),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Search {
            corpus,
            query,
            rows,
            start,
            sort,
            locale,
            authority,
            timeout_ms,
            json,
            no_color,
        } => {
            let (_, store) = corpus::load_corpus(&corpus)?;
            let snapshot = store.snapshot();

            let mut request = SearchRequest::new(query).rows(rows).start(start);
            if let Some(sort) = sort {
                request = request.sort(sort);
            }
            if let Some(locale) = locale {
                request = request.locale(locale);
            }
            if let Some(spec) = authority {
                request = request.filter(parse_authority(&spec)?);
            }
            if let Some(ms) = timeout_ms {
                request = request.timeout(Duration::from_millis(ms));
            }

            let engine = SearchEngine::new();
            let response = engine
                .search(&snapshot, &request)
                .context("query execution failed")?;

            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                output::print_results(&snapshot, &response, !no_color)?;
            }
        }
        Commands::Stats { corpus } => {
            let (schema, store) = corpus::load_corpus(&corpus)?;
            let snapshot = store.snapshot();
            println!("documents: {}", snapshot.universe().len());
            println!(
                "text properties in default set: {}",
                schema.default_text_properties().len()
            );
        }
    }
    Ok(())
}

/// Accept either the structured JSON filter or the legacy filter-query
/// syntax.
fn parse_authority(spec: &str) -> Result<AuthorityFilter> {
    if spec.trim_start().starts_with('{') && !spec.trim_start().starts_with("{!afts}") {
        return AuthorityFilter::from_json(spec).context("parsing JSON authority filter");
    }
    AuthorityFilter::from_legacy(spec).context("parsing legacy authority filter")
}
