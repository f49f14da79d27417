//! # tiddle CLI
//!
//! Renders records of a notebook through the tiddle engine, once or
//! continuously.

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tiddle")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "tiddle.yml")]
    config: PathBuf,

    /// JSON file holding an array of records to load over the shadow records
    #[arg(long, env = "TIDDLE_LOAD")]
    load: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a record once
    Render {
        /// Record title (defaults to the configured root title)
        title: Option<String>,

        /// Output format
        #[arg(long, value_enum, default_value_t = RenderFormat::Text)]
        format: RenderFormat,

        /// Print render metrics to stderr
        #[arg(long)]
        metrics: bool,
    },

    /// Render a record and keep it up to date while a clock record ticks
    Watch {
        /// Record title (defaults to the configured root title)
        title: Option<String>,

        /// Milliseconds between clock updates (defaults to the configured interval)
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Stop after this many clock updates
        #[arg(long)]
        ticks: Option<u64>,
    },

    /// List every resolvable title and where it resolves from
    List {
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

#[derive(Copy, Clone, ValueEnum)]
pub enum RenderFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let subscriber = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(if cli.verbose {
                tracing::Level::DEBUG.into()
            } else {
                tracing::Level::INFO.into()
            }),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let session = commands::Session::open(&cli.config, cli.load.as_deref())?;

    match cli.command {
        Commands::Render {
            title,
            format,
            metrics,
        } => commands::render_record(&session, title.as_deref(), format, metrics),
        Commands::Watch {
            title,
            interval_ms,
            ticks,
        } => {
            let opts = commands::WatchOptions { interval_ms, ticks };
            commands::watch_record(&session, title.as_deref(), opts).await
        }
        Commands::List { json } => commands::list_titles(&session, json),
    }
}
