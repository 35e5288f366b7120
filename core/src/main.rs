//! ROADTRACK: score positional observations against a road network.
//!
//! The `score` command reads a track of WGS84 fixes and a set of road edges, builds an
//! off-road and an on-road hypothesis for every observation, scores each against the best
//! hypothesis of the previous observation and writes the winners to a CSV file together with
//! their transition and motion log-likelihood terms.

mod common;

use std::error::Error;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use common::{init_logger, prepare_output_path, validate_csv_input};
use log::{error, info};

use roadtrack::records::{EdgeRecord, MatchRecord, ObservationRecord};
use roadtrack::{GreedyMatcher, TrackerConfig};

const LONG_ABOUT: &str = "ROADTRACK: score positional observations against a road network.

Observations are read from a CSV file with columns time (RFC 3339), latitude and longitude in
degrees. Road edges are read from a CSV file of vertices with columns edge_id, latitude and
longitude, the vertices of each edge listed in order. Tunables (variances, transition priors
and the candidate search radius) can be supplied in a TOML/JSON/YAML configuration file.";

/// Command line arguments
#[derive(Parser)]
#[command(
    author,
    version,
    about = "Score positional observations against a road network.",
    long_about = LONG_ABOUT
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Log file path (if not specified, logs to stderr)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand, Clone)]
enum Command {
    #[command(
        name = "score",
        about = "Greedily match each observation to the off-road state or a nearby edge"
    )]
    Score(ScoreArgs),
    #[command(name = "config", about = "Write the default configuration to a file")]
    Config(ConfigArgs),
}

#[derive(Args, Clone, Debug)]
struct ScoreArgs {
    /// Observations CSV (time, latitude, longitude)
    #[arg(short, long)]
    observations: PathBuf,
    /// Edge vertices CSV (edge_id, latitude, longitude)
    #[arg(short, long)]
    edges: PathBuf,
    /// Output CSV for matched states
    #[arg(short = 'O', long)]
    output: PathBuf,
    /// Configuration file (TOML/JSON/YAML); defaults are used if omitted
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Override the candidate search radius in meters
    #[arg(long)]
    search_radius: Option<f64>,
}

#[derive(Args, Clone, Debug)]
struct ConfigArgs {
    /// Destination file; the format follows the extension
    #[arg(short = 'O', long)]
    output: PathBuf,
}

fn score(args: &ScoreArgs) -> Result<(), Box<dyn Error>> {
    validate_csv_input(&args.observations)?;
    validate_csv_input(&args.edges)?;
    prepare_output_path(&args.output)?;

    let mut config = match &args.config {
        Some(path) => TrackerConfig::from_file(path)?,
        None => TrackerConfig::default(),
    };
    if let Some(radius) = args.search_radius {
        config.search_radius = radius;
    }
    config.validate()?;

    let observation_records = ObservationRecord::from_csv(&args.observations)?;
    info!(
        "Read {} observations from {}",
        observation_records.len(),
        args.observations.display()
    );
    let plane = ObservationRecord::plane_for(&observation_records)?;
    let observations = ObservationRecord::to_observations(&observation_records, &plane)?;

    let edge_records = EdgeRecord::from_csv(&args.edges)?;
    let graph = EdgeRecord::build_graph(&edge_records, &plane)?;
    info!("Built {} edges from {}", graph.len(), args.edges.display());

    let matcher = GreedyMatcher::new(&graph, &config)?;
    let matches = matcher.run(observations)?;
    let records = matches
        .iter()
        .map(|m| m.to_record(&plane))
        .collect::<Result<Vec<MatchRecord>, _>>()?;
    MatchRecord::to_csv(&records, &args.output)?;
    info!("Wrote {} matches to {}", records.len(), args.output.display());
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logger(&cli.log_level, cli.log_file.as_ref())?;

    let result = match &cli.command {
        Command::Score(args) => score(args),
        Command::Config(args) => {
            prepare_output_path(&args.output)?;
            TrackerConfig::default().to_file(&args.output)?;
            info!("Wrote default configuration to {}", args.output.display());
            Ok(())
        }
    };
    if let Err(e) = &result {
        error!("{e}");
    }
    result
}
