use clap::Subcommand;

use super::config::ConfigArgs;
use super::run::RunArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Run smoke scenarios against the configured application
    Run(RunArgs),

    /// List the available scenarios
    List,

    /// Manage mapsync configuration
    Config(ConfigArgs),
}
