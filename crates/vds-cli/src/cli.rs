use std::path::PathBuf;

use clap::Parser;

/// Generate a year of load voltage magnitudes for each configured OpenDSS circuit.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Set the logging level
    #[arg(long, default_value = "info")]
    pub log_level: tracing::Level,

    /// Configuration file (defaults to ./vds.toml when present, built-in circuits otherwise)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["vds"]);
        assert_eq!(cli.log_level, tracing::Level::INFO);
        assert!(cli.config.is_none());

        let cli = Cli::parse_from(["vds", "--log-level", "debug", "--config", "ckt.toml"]);
        assert_eq!(cli.log_level, tracing::Level::DEBUG);
        assert_eq!(cli.config, Some(PathBuf::from("ckt.toml")));
    }
}
