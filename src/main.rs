mod cli;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use loci_flow::config::FlowConfig;
use loci_flow::flow::correlate::Strategies;
use loci_flow::flow::export::ExportFormat;

#[derive(Parser)]
#[command(
    name = "loci-flow",
    version,
    about = "Correlate AI-assistant activity and build flow graphs"
)]
struct Cli {
    /// Config file (defaults to ~/.loci-flow/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load activity events from a JSON file into the store
    Ingest {
        /// JSON array of events, or an object with an `events` array
        file: PathBuf,
    },
    /// Detect relations between events and print them as JSON
    Correlate {
        #[command(flatten)]
        window: WindowArgs,
        #[command(flatten)]
        detection: DetectionArgs,
        /// Persist detected relations
        #[arg(long)]
        save: bool,
    },
    /// Build a flow graph and print it in the chosen format
    Flow {
        #[command(flatten)]
        window: WindowArgs,
        #[command(flatten)]
        detection: DetectionArgs,
        /// Output format: json, dot, or mermaid
        #[arg(long, default_value = "json")]
        format: ExportFormat,
        /// Persist the built flow
        #[arg(long)]
        save: bool,
    },
    /// Report Eulerian properties, connectivity, and density
    Analyze {
        /// Analyze a stored flow
        #[arg(long, conflicts_with = "session")]
        flow_id: Option<String>,
        /// Build and analyze a flow for this session
        #[arg(long)]
        session: Option<String>,
    },
    /// Export a stored flow
    Export {
        #[arg(long)]
        flow_id: String,
        /// Output format: json, dot, or mermaid
        #[arg(long, default_value = "json")]
        format: ExportFormat,
    },
    /// Show store statistics
    Stats,
}

#[derive(clap::Args)]
struct WindowArgs {
    /// Use every event of this session
    #[arg(long)]
    session: Option<String>,
    /// Use the most recent events inside the capture window
    #[arg(long)]
    recent: bool,
}

#[derive(clap::Args)]
struct DetectionArgs {
    /// Strategies to run: "all" or a comma-separated list
    #[arg(long, default_value = "all")]
    strategies: Strategies,
    /// Minimum relation strength in [0, 1] (defaults to detection.min_strength)
    #[arg(long)]
    min_strength: Option<f64>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => FlowConfig::load_from(path)?,
        None => FlowConfig::load()?,
    };

    // Log to stderr so stdout carries only exported text.
    let filter = EnvFilter::try_new(&config.logging.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Ingest { file } => cli::ingest::ingest(&config, &file)?,
        Command::Correlate {
            window,
            detection,
            save,
        } => {
            let window = cli::EventWindow::from_args(window.session.as_deref(), window.recent)?;
            cli::correlate::correlate(
                &config,
                &window,
                &detection.strategies,
                detection.min_strength,
                save,
            )?;
        }
        Command::Flow {
            window,
            detection,
            format,
            save,
        } => {
            let window = cli::EventWindow::from_args(window.session.as_deref(), window.recent)?;
            cli::flow::flow(
                &config,
                &window,
                &detection.strategies,
                detection.min_strength,
                format,
                save,
            )?;
        }
        Command::Analyze { flow_id, session } => {
            cli::analyze::analyze(&config, flow_id.as_deref(), session.as_deref())?;
        }
        Command::Export { flow_id, format } => cli::export::export(&config, &flow_id, format)?,
        Command::Stats => cli::stats::stats(&config)?,
    }

    Ok(())
}
