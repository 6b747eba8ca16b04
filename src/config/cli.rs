//! CLI argument parsing and validation
//!
//! # Usage
//!
//! ```bash
//! qcapsnets search shallowcaps_mnist.yaml
//! qcapsnets search shallowcaps_mnist.yaml --memory-budget-mb 0.1 --output-dir ./quantized
//! qcapsnets validate shallowcaps_mnist.yaml --detailed
//! qcapsnets rank shallowcaps_mnist.yaml
//! qcapsnets info shallowcaps_mnist.yaml --format json
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Q-CapsNets: mixed-precision bit-width search for capsule networks
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "qcapsnets")]
#[command(version)]
#[command(
    about = "Layer-wise weight, activation and dynamic-routing bit-width search for capsule networks"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Run the bit-width search and save the quantized configurations
    Search(SearchArgs),

    /// Validate a configuration file without searching
    Validate(ValidateArgs),

    /// Print the sensitivity ranking derived from the statistics
    Rank(RankArgs),

    /// Display the layer table and baseline memory
    Info(InfoArgs),
}

/// Arguments for the search command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct SearchArgs {
    /// Path to YAML configuration file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Override output directory
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Override the memory budget (MB)
    #[arg(short, long)]
    pub memory_budget_mb: Option<f64>,

    /// Override the accuracy tolerance (percent of top accuracy)
    #[arg(short, long)]
    pub tolerance: Option<f64>,

    /// Dry run (load everything, but do not evaluate)
    #[arg(long)]
    pub dry_run: bool,

    /// Summary format (text, json, yaml)
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the validate command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct ValidateArgs {
    /// Path to YAML configuration file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Show detailed validation report
    #[arg(short, long)]
    pub detailed: bool,
}

/// Arguments for the rank command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct RankArgs {
    /// Path to YAML configuration file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Output format (text, json, yaml)
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the info command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct InfoArgs {
    /// Path to YAML configuration file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Output format (text, json, yaml)
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Output format for printed summaries
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "yaml" => Ok(OutputFormat::Yaml),
            _ => Err(format!(
                "Unknown output format: {}. Valid formats: text, json, yaml",
                s
            )),
        }
    }
}

/// Parse CLI arguments from a string slice (for testing)
pub fn parse_args<I, T>(args: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(args)
}

/// Apply command-line overrides to a QuantizeSpec
pub fn apply_overrides(spec: &mut super::QuantizeSpec, args: &SearchArgs) {
    if let Some(output_dir) = &args.output_dir {
        spec.output.dir = Some(output_dir.clone());
    }
    if let Some(mb) = args.memory_budget_mb {
        spec.search.memory_budget_mb = mb;
    }
    if let Some(tolerance) = args.tolerance {
        spec.search.accuracy_tolerance = tolerance;
    }
}
