//! mediashelf - Self-hosted tracker for books, movies and TV shows
//!
//! Stores each user's collection, answers filtered/sorted list queries,
//! computes reading and watching statistics and serves public share links.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod api;
mod auth;
mod config;
mod db;
mod error;
mod models;
mod query;
mod stats;

use config::Config;
use stats::Statistics;

#[derive(Parser)]
#[command(name = "mediashelf")]
#[command(about = "Self-hosted tracker for books, movies and TV shows")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server
    Serve {
        /// Config file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Bind address (overrides config)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// List registered accounts
    Users {
        /// Config file path
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print collection statistics for an account
    Stats {
        /// Email address of the account
        #[arg(short, long)]
        email: String,

        /// Config file path
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Initialize a new config file
    Init {
        /// Output path for config file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("mediashelf=info,tower_http=info")
            }),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, port, bind } => {
            let mut cfg = Config::resolve(config.as_deref())?;

            // Override with CLI args
            if let Some(p) = port {
                cfg.server.port = p;
            }
            if let Some(b) = bind {
                cfg.server.bind = b;
            }

            run_server(cfg).await
        }

        Commands::Users { config } => {
            let cfg = Config::resolve(config.as_deref())?;
            let db = db::Database::open(&cfg.database.path).context("Failed to open database")?;

            let users = db.list_users()?;
            if users.is_empty() {
                println!("No accounts yet.");
                println!("Create one with: POST /api/v1/auth/signup");
                return Ok(());
            }

            println!("Registered accounts:");
            println!();
            for (user, items) in users {
                println!(
                    "  {} - {} items (since {})",
                    user.email,
                    items,
                    user.created_at.format("%Y-%m-%d")
                );
            }
            Ok(())
        }

        Commands::Stats { email, config } => {
            let cfg = Config::resolve(config.as_deref())?;
            let db = db::Database::open(&cfg.database.path).context("Failed to open database")?;

            let Some(user) = db.find_user_by_email(&email.trim().to_lowercase())? else {
                println!("No account found for '{}'.", email);
                return Ok(());
            };

            let items = db.fetch_all(&user.id)?;
            print_statistics(&user.email, &Statistics::compute(&items));
            Ok(())
        }

        Commands::Init { output } => {
            let path = output.unwrap_or_else(|| PathBuf::from("config.toml"));
            let cfg = Config::default();
            cfg.save_to(&path)?;

            println!("Created config file: {}", path.display());
            println!();
            println!("Next steps:");
            println!(
                "  1. Start the server: mediashelf serve --config {}",
                path.display()
            );
            println!("  2. Create an account: POST /api/v1/auth/signup");

            Ok(())
        }
    }
}

async fn run_server(config: Config) -> Result<()> {
    let db = db::Database::open(&config.database.path).context("Failed to open database")?;

    let state = api::AppState::new(db, config.clone());
    let app = api::create_router(state);

    let addr = format!("{}:{}", config.server.bind, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("mediashelf server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn print_statistics(email: &str, stats: &Statistics) {
    println!("Statistics for {}", email);
    println!();
    println!("  Books read:           {}", stats.books_read);
    println!("  Movies watched:       {}", stats.movies_watched);
    println!("  TV shows completed:   {}", stats.tv_shows_completed);
    println!("  Currently reading:    {}", stats.currently_reading);
    println!("  Currently watching:   {}", stats.currently_watching);
    println!("  Watch time (movies):  {}h", stats.total_runtime_hours);
    println!("  Average rating:       {:.1}", stats.average_rating);
    println!("  Completed this year:  {}", stats.completed_this_year);
    println!("  Completed this month: {}", stats.completed_this_month);
    println!("  Bookmarked:           {}", stats.bookmarked_items);
    println!("  Total items:          {}", stats.total_items);
}
