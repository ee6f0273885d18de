use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mirrorwatch::config::Config;
use mirrorwatch::mirror::SearchOrder;
use mirrorwatch::probe::ProbeDepth;

mod commands;

use commands::RunArgs;

#[derive(Parser)]
#[command(
    name = "mirrorwatch",
    version,
    about = "Per-channel mirror failover and auto-restore for IPTV playlists",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true)]
    log_format: Option<String>,

    /// TOML configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fail over broken resources and restore displaced ones
    Run {
        /// Catalog file, or a directory to search for one
        catalog: PathBuf,

        /// Report intended changes without writing, publishing or notifying
        #[arg(long)]
        dry_run: bool,

        /// Lowest mirror id
        #[arg(long)]
        min: Option<u32>,

        /// Highest mirror id
        #[arg(long)]
        max: Option<u32>,

        /// Home mirror id (defaults to the first resource's mirror)
        #[arg(long)]
        home: Option<u32>,

        /// Candidate order (descending, weighted-random, forced)
        #[arg(long)]
        order: Option<SearchOrder>,

        /// Mirror used by the forced order
        #[arg(long)]
        forced_mirror: Option<u32>,

        /// Candidates probed concurrently per scan step
        #[arg(long)]
        batch_size: Option<usize>,

        /// Seed for the weighted-random order
        #[arg(long)]
        seed: Option<u64>,

        /// Probe depth (status, playlist, segment)
        #[arg(long)]
        depth: Option<ProbeDepth>,

        /// Skip the restore pass
        #[arg(long)]
        no_restore: bool,

        /// Write the catalog but never commit or push
        #[arg(long)]
        no_publish: bool,

        /// Publish cooldown in seconds
        #[arg(long)]
        cooldown: Option<u64>,

        /// Write Prometheus metrics to this file after the run
        #[arg(long, value_name = "FILE")]
        metrics_file: Option<PathBuf>,

        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Probe a single URL
    Probe {
        /// Stream URL to check
        url: String,

        /// Probe depth (status, playlist, segment)
        #[arg(long)]
        depth: Option<ProbeDepth>,
    },

    /// Search the mirror range for one that serves a path
    Scan {
        /// Resource path, e.g. ESPN/index.m3u8
        path: String,

        /// Mirror id to skip
        #[arg(long)]
        exclude: Option<u32>,

        /// Candidate order (descending, weighted-random, forced)
        #[arg(long)]
        order: Option<SearchOrder>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(format) = &cli.log_format {
        config.logging.format = format.clone();
    }

    setup_tracing(&config.logging.format, &config.logging.level, cli.verbose)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "mirrorwatch starting");

    match cli.command {
        Commands::Run {
            catalog,
            dry_run,
            min,
            max,
            home,
            order,
            forced_mirror,
            batch_size,
            seed,
            depth,
            no_restore,
            no_publish,
            cooldown,
            metrics_file,
            json,
        } => {
            tracing::info!(
                catalog = %catalog.display(),
                dry_run = %dry_run,
                order = ?order,
                "Starting run command"
            );
            let args = RunArgs {
                catalog,
                dry_run,
                min,
                max,
                home,
                order,
                forced_mirror,
                batch_size,
                seed,
                depth,
                no_restore,
                no_publish,
                cooldown,
                metrics_file,
                json,
            };
            commands::run(config, args).await?;
        }

        Commands::Probe { url, depth } => {
            tracing::info!(url = %url, depth = ?depth, "Starting probe command");
            commands::probe(config, url, depth).await?;
        }

        Commands::Scan {
            path,
            exclude,
            order,
        } => {
            tracing::info!(path = %path, exclude = ?exclude, "Starting scan command");
            commands::scan(config, path, exclude, order).await?;
        }
    }

    Ok(())
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let env_filter = if std::env::var_os("RUST_LOG").is_some() {
        tracing_subscriber::EnvFilter::try_from_default_env().context("Invalid RUST_LOG")?
    } else if verbose {
        tracing_subscriber::EnvFilter::new("mirrorwatch=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_new(format!("mirrorwatch={level},warn"))
            .context("Invalid log level")?
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
                .init();
        }
    }

    Ok(())
}
