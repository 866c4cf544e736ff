use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "service_pricing",
    version,
    about = "Clean car-service price listings and serve a pricing dashboard"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

// Flags left unset fall back to the loaded Settings.
#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Normalize, deduplicate and validate the raw listing export
    Clean {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Serve the dashboard over the cleaned dataset
    Serve {
        #[arg(long)]
        dataset: Option<PathBuf>,
        #[arg(long)]
        address: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command};
    use clap::Parser;
    use std::path::PathBuf;

    #[test]
    fn parses_clean_with_paths() {
        let cli = Cli::try_parse_from(["service_pricing", "clean", "--input", "raw.csv"]).expect("parse");
        assert_eq!(
            cli.command,
            Command::Clean {
                input: Some(PathBuf::from("raw.csv")),
                output: None,
            }
        );
    }

    #[test]
    fn parses_serve_defaults() {
        let cli = Cli::try_parse_from(["service_pricing", "serve"]).expect("parse");
        assert_eq!(
            cli.command,
            Command::Serve {
                dataset: None,
                address: None,
            }
        );
    }

    #[test]
    fn requires_subcommand() {
        assert!(Cli::try_parse_from(["service_pricing"]).is_err());
    }
}
