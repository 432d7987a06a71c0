use clap::{Args, Parser, Subcommand};
use procsim::core::geometry::Dimension;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "procsim CLI - level-set simulation of TEOS deposition into trenches, with Monte-Carlo ray tracing.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads used for ray tracing.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the trench, run the TEOS deposition and write the initial and final surfaces.
    Run(RunArgs),
    /// Validate a parameter file and print the resolved simulation parameters.
    Check(CheckArgs),
}

/// Options shared by every command that reads a parameter file.
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Path to the parameter file (key=value lines in TOML syntax; `.5` and `5.` are accepted).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub config: PathBuf,

    /// Simulation dimension (2 or 3), overriding the parameter file.
    #[arg(short, long, value_name = "DIM")]
    pub dim: Option<Dimension>,

    /// Set a specific parameter, overriding the parameter file.
    /// Can be used multiple times. Example: -S trenchWidth=0.5
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Directory the surface tables are written to.
    #[arg(short, long, default_value = ".", value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Prefix of the output files: <NAME>_initial.csv and <NAME>_final.csv.
    #[arg(short, long, default_value = "SingleTEOS", value_name = "NAME")]
    pub name: String,

    // --- Process Overrides ---
    /// Override the number of rays traced per surface point.
    #[arg(short = 'r', long, value_name = "INT")]
    pub rays_per_point: Option<usize>,

    /// Override the process duration.
    #[arg(short = 't', long, value_name = "FLOAT")]
    pub process_time: Option<f64>,

    /// Override the random seed of the ray tracer.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,
}

/// Arguments for the `check` subcommand.
#[derive(Args, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
}
