use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use poco_experiments::presets::PRESET_NAMES;
use poco_sweep_core::contract::RequestOverrides;

mod logging;
mod run;

use run::{RequestSource, RunOptions};

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "poco",
    version,
    about = "Power and coverage curves for estimators by simulation",
    long_about = "Runs replicated simulations of a data-generating process over a\n\
                  parameter grid and reports power, coverage, bias and standard-error\n\
                  bias for every estimator at every grid point."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a greeting
    Hello,
    /// List the built-in presets
    Presets,
    /// Run a simulation request and export the metric table
    Run(RunArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Request file (.json or .toml)
    #[arg(long, required_unless_present = "preset", conflicts_with = "preset")]
    config: Option<PathBuf>,
    /// Built-in request to run instead of a file
    #[arg(long, value_parser = clap::builder::PossibleValuesParser::new(PRESET_NAMES))]
    preset: Option<String>,
    /// CSV output path
    #[arg(long, default_value = "poco_results.csv")]
    output: PathBuf,
    /// Also write the full results as JSON
    #[arg(long)]
    json: Option<PathBuf>,
    /// Also write the metric table as Parquet
    #[arg(long)]
    parquet: Option<PathBuf>,
    /// Master seed, overriding the request
    #[arg(long, env = "POCO_SEED")]
    seed: Option<u64>,
    /// Replicates per combination, overriding the request
    #[arg(long, env = "POCO_REPLICATES")]
    replicates: Option<usize>,
    /// Worker threads, overriding the request
    #[arg(long, env = "POCO_THREADS")]
    threads: Option<usize>,
    /// Disable the progress bar
    #[arg(long)]
    no_progress: bool,
}

impl RunArgs {
    fn into_options(self) -> RunOptions {
        let source = match self.config {
            Some(path) => RequestSource::File(path),
            None => RequestSource::Preset(self.preset.unwrap_or_default()),
        };
        RunOptions {
            source,
            overrides: RequestOverrides {
                seed: self.seed,
                replicates: self.replicates,
                threads: self.threads,
            },
            output: self.output,
            json: self.json,
            parquet: self.parquet,
            show_progress: !self.no_progress,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_tracing();

    match cli.command {
        Commands::Hello => {
            println!("{}", poco_core::greeting());
            ExitCode::SUCCESS
        }
        Commands::Presets => {
            for name in PRESET_NAMES {
                println!("{name}");
            }
            ExitCode::SUCCESS
        }
        Commands::Run(args) => match run::execute(args.into_options()) {
            Ok(results) => {
                for line in run::summary_lines(&results) {
                    println!("{line}");
                }
                ExitCode::SUCCESS
            }
            Err(error) => {
                tracing::error!("{error:#}");
                eprintln!("error: {error:#}");
                ExitCode::FAILURE
            }
        },
    }
}
