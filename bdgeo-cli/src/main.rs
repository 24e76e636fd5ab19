//! bdgeo CLI
//!
//! Serves, exports, and searches the Bangladesh administrative hierarchy.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use bdgeo_api::{ApiConfig, ApiServer};
use bdgeo_core::traits::HierarchyStore;
use bdgeo_core::types::{Named, SearchScope};
use bdgeo_store::{export_dataset, DocumentStore, MemoryStore};

/// bdgeo - Bangladesh division, district, upazila and union lookup
#[derive(Parser)]
#[command(name = "bdgeo")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the API server
    Serve {
        /// Port to listen on (defaults to PORT or 3000)
        #[arg(short, long)]
        port: Option<u16>,
        /// Bind address
        #[arg(short, long, default_value = "0.0.0.0")]
        bind: String,
        /// Document-store directory (defaults to the embedded dataset)
        #[arg(long, env = "GEO_DATA_DIR")]
        data_dir: Option<PathBuf>,
    },

    /// Write the dataset as document collections
    Export {
        /// Output directory
        #[arg(short, long)]
        out: PathBuf,
        /// Copy from this document store instead of the embedded dataset
        #[arg(long)]
        from: Option<PathBuf>,
    },

    /// Search names and Bangla names
    Search {
        /// Search term (at least 2 characters)
        term: String,
        /// Level to search: all, divisions, districts, upazilas, unions
        #[arg(short = 't', long = "type", default_value = "all")]
        scope: String,
        /// Document-store directory (defaults to the embedded dataset)
        #[arg(long, env = "GEO_DATA_DIR")]
        data_dir: Option<PathBuf>,
        /// Print raw JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "bdgeo=debug,info"
    } else {
        "bdgeo=info,warn"
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    if cli.log_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    match cli.command {
        Commands::Serve { port, bind, data_dir } => cmd_serve(port, &bind, data_dir).await,
        Commands::Export { out, from } => cmd_export(&out, from.as_deref()).await,
        Commands::Search {
            term,
            scope,
            data_dir,
            json,
        } => cmd_search(&term, &scope, data_dir.as_deref(), json).await,
    }
}

/// Opens a document store if a directory is given, else the embedded dataset.
async fn open_store(data_dir: Option<&Path>, timeout: Duration) -> Result<Arc<dyn HierarchyStore>> {
    Ok(match data_dir {
        Some(dir) => Arc::new(
            DocumentStore::connect(dir, timeout)
                .await
                .with_context(|| format!("Failed to open document store at {}", dir.display()))?,
        ),
        None => Arc::new(MemoryStore::embedded().context("Embedded dataset is invalid")?),
    })
}

/// Run the API server
async fn cmd_serve(port: Option<u16>, bind: &str, data_dir: Option<PathBuf>) -> Result<()> {
    let mut config = ApiConfig::from_env();
    if let Some(port) = port {
        config.port = port;
    }
    if data_dir.is_some() {
        config.data_dir = data_dir;
    }
    let port = config.port;

    let addr: SocketAddr = format!("{}:{}", bind, port)
        .parse()
        .with_context(|| format!("Invalid bind address {bind}:{port}"))?;
    let server = ApiServer::from_config(config)
        .await
        .context("Failed to initialize the hierarchy store")?;

    println!("{}", "Starting Bangladesh geo API server...".cyan().bold());
    println!("   {} http://{}", "Listening on:".green(), addr);
    println!("   {} http://{}/geo/v2.0/divisions", "Divisions:".dimmed(), addr);
    println!("   {} http://{}/health", "Health check:".dimmed(), addr);
    println!("\n   Press Ctrl+C to stop.\n");

    server.run(addr).await.context("Server failed")?;
    Ok(())
}

/// Export the dataset as document collections
async fn cmd_export(out: &Path, from: Option<&Path>) -> Result<()> {
    let dataset = match from {
        Some(dir) => DocumentStore::connect(dir, Duration::from_secs(30))
            .await
            .with_context(|| format!("Failed to open document store at {}", dir.display()))?
            .snapshot()
            .await
            .context("Failed to read document store")?,
        None => MemoryStore::embedded()
            .context("Embedded dataset is invalid")?
            .dataset(),
    };

    export_dataset(&dataset, out)
        .await
        .with_context(|| format!("Failed to export to {}", out.display()))?;

    let counts = dataset.counts();
    info!(dir = %out.display(), "Exported dataset");
    println!("{} {}", "Exported to:".green().bold(), out.display());
    println!("   {} {}", "Divisions:".dimmed(), counts.divisions);
    println!("   {} {}", "Districts:".dimmed(), counts.districts);
    println!("   {} {}", "Upazilas:".dimmed(), counts.upazilas);
    println!("   {} {}", "Unions:".dimmed(), counts.unions);

    Ok(())
}

/// Search the hierarchy
async fn cmd_search(term: &str, scope: &str, data_dir: Option<&Path>, json: bool) -> Result<()> {
    let scope: SearchScope = scope.parse()?;
    let store = open_store(data_dir, Duration::from_secs(5)).await?;
    let results = store.search(term, scope).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    println!(
        "{} \"{}\" ({} matches)",
        "Search results for".cyan().bold(),
        term.trim(),
        results.total()
    );

    print_matches("Divisions", results.divisions.as_deref());
    print_matches("Districts", results.districts.as_deref());
    print_matches("Upazilas", results.upazilas.as_deref());
    print_matches("Unions", results.unions.as_deref());

    Ok(())
}

fn print_matches<T: Named>(label: &str, items: Option<&[T]>) {
    let Some(items) = items else {
        return;
    };

    println!("\n{} {}", label.yellow().bold(), format!("({})", items.len()).dimmed());
    if items.is_empty() {
        println!("   {}", "none".dimmed());
    }
    for item in items {
        println!(
            "   {:>6}  {}  {}",
            item.id().dimmed(),
            item.name().green(),
            item.local_name()
        );
    }
}
