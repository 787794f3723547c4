use clap::{Parser, Subcommand};
use crm_analysis::cli;
use crm_analysis::core::report::DEFAULT_MAX_STEPS;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "analysis")]
#[command(about = "Evaluate CRM analysis values and aggregate them into reports")]
#[command(long_about = "Analysis - value functions and aggregation over CRM query rows

COMMANDS:
  validate      - Check an analysis configuration and its value formulas
  report        - Aggregate a row file into a category report
  aggregations  - List the selectable aggregation types

VALUE FORMULAS:
  N[field]          number of a source field
  T[field]          text of a source field
  X[table]          record identification of a joined table
  L[field]          value fetched by a linked lookup
  V[value]          an earlier value of the same analysis
  JS[script](...)   script formula, e.g. JS[(a, b) => a * b](N[Price], N[Qty])
  ROUND(...)        named function applied to another value

EXAMPLES:
  analysis validate pipeline.yaml
  analysis report pipeline.yaml rows.yaml
  analysis report pipeline.yaml rows.yaml --json --report-mode

Set RUST_LOG (e.g. RUST_LOG=crm_analysis=debug) for parser and stepping detail.")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check an analysis configuration and its value formulas
    Validate {
        /// Path to the analysis YAML file
        file: PathBuf,
    },

    /// Aggregate result rows into a category report
    Report {
        /// Path to the analysis YAML file
        config: PathBuf,

        /// Path to the YAML row file
        rows: PathBuf,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Render values for export (no percent suffixes)
        #[arg(long)]
        report_mode: bool,

        /// Stepping rounds before pending results are dropped
        #[arg(long, default_value_t = DEFAULT_MAX_STEPS)]
        max_steps: usize,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// List the selectable aggregation types
    Aggregations,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let verbose = matches!(cli.command, Commands::Report { verbose: true, .. });
    let default_filter = if verbose {
        "crm_analysis=debug"
    } else {
        "crm_analysis=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Validate { file } => cli::validate(file)?,

        Commands::Report {
            config,
            rows,
            json,
            report_mode,
            max_steps,
            verbose,
        } => cli::report(config, rows, json, report_mode, max_steps, verbose)?,

        Commands::Aggregations => cli::aggregations()?,
    }

    Ok(())
}
