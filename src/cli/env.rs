use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use super::commands::Commands;
use super::output::OutputFormat;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Human,
    Json,
}

#[derive(Parser)]
#[command(author, version, about = "Synchronized smoke runs against the climate resilience map")]
#[command(propagate_version = true)]
pub struct CliArgs {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// Enable debug mode
    #[arg(short, long)]
    pub debug: bool,

    /// Log line format
    #[arg(long, value_enum, default_value = "human")]
    pub log_format: LogFormat,

    /// Output format
    #[arg(short, long, value_enum, default_value = "human")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::Commands;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn run_accepts_filters_and_outputs() {
        let cli = CliArgs::try_parse_from([
            "mapsync",
            "--log-format",
            "json",
            "-o",
            "json",
            "run",
            "map_without",
            "--metrics-out",
            "metrics.prom",
            "--fail-fast",
        ])
        .unwrap();
        assert_eq!(cli.log_format, LogFormat::Json);
        assert_eq!(cli.output, OutputFormat::Json);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.scenarios, vec!["map_without".to_string()]);
                assert_eq!(args.metrics_out, Some(PathBuf::from("metrics.prom")));
                assert!(args.fail_fast);
            }
            _ => panic!("expected run"),
        }
    }
}
