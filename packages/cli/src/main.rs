#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the escapement survey pipeline.
//!
//! Uses `indicatif-log-bridge` (via [`escapement_map_cli_utils::init_logger`])
//! to route `log` output through `indicatif::MultiProgress` so that the
//! per-point warnings for unmatched observations never fight the progress
//! bar for the terminal.

mod config;
mod output;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use escapement_map_cli_utils::{IndicatifProgress, MultiProgress};
use escapement_map_pipeline::{PipelineInput, PipelineOptions, PipelineOutput};

use crate::config::Config;

#[derive(Parser)]
#[command(
    name = "escapement_map",
    about = "Spatially join escapement survey points to stream sections and summarize them"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Input settings shared by every subcommand. Flags override the file.
#[derive(Args)]
struct InputArgs {
    /// Configuration file (defaults to `escapement_map.toml` if present)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Survey table (delimited text)
    #[arg(long)]
    survey: Option<PathBuf>,
    /// Stream-section boundary polygons (`GeoJSON`)
    #[arg(long)]
    boundaries: Option<PathBuf>,
    /// Reference system of the boundaries (e.g. "EPSG:3005"), overriding
    /// the one declared in the file
    #[arg(long)]
    boundary_crs: Option<String>,
}

impl InputArgs {
    fn into_config(self) -> Result<Config, config::ConfigError> {
        let mut config = Config::load(self.config.as_deref())?;
        if let Some(survey) = self.survey {
            config.input.survey = Some(survey);
        }
        if let Some(boundaries) = self.boundaries {
            config.input.boundaries = Some(boundaries);
        }
        if let Some(crs) = self.boundary_crs {
            config.input.boundary_crs = Some(crs);
        }
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline and write the point layer, joined layer, and
    /// summary tables
    Run {
        #[command(flatten)]
        inputs: InputArgs,
        /// Directory to write outputs to
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Run the pipeline and list the observations outside every stream
    /// section
    Unmatched {
        #[command(flatten)]
        inputs: InputArgs,
    },
}

fn execute(
    config: &Config,
    multi: &MultiProgress,
) -> Result<PipelineOutput, Box<dyn std::error::Error>> {
    let input = config.resolve_input()?;
    let pipeline_input = PipelineInput::load(
        &input.survey,
        input.delimiter,
        &input.boundaries,
        input.boundary_crs,
    )?;

    let progress = IndicatifProgress::points_bar(multi, "Associating survey points");
    let options = PipelineOptions {
        summary: config.summary.clone(),
    };

    Ok(escapement_map_pipeline::run(pipeline_input, &options, &progress)?)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = escapement_map_cli_utils::init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { inputs, output_dir } => {
            let mut config = inputs.into_config()?;
            if let Some(dir) = output_dir {
                config.output.directory = dir;
            }

            let output = execute(&config, &multi)?;
            output::write_all(&config.output, &output)?;

            let unmatched = output.joined.unmatched().count();
            if unmatched > 0 {
                log::warn!(
                    "{unmatched} of {} observations matched no stream section; \
                     run `escapement_map unmatched` to list them",
                    output.joined.features.len()
                );
            }
            log::info!("Outputs written to {}", config.output.directory.display());
        }
        Commands::Unmatched { inputs } => {
            let config = inputs.into_config()?;
            let output = execute(&config, &multi)?;
            output::print_unmatched(&output.joined, &config.summary.sampler_name);
        }
    }

    Ok(())
}
