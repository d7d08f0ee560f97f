use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "print-quote", version, about = "3D print quoting and checkout service")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml", global = true)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the HTTP server (default)
    Start,

    /// Price a job offline from known analysis metrics
    Quote {
        /// Material label, resolved against the catalog
        #[arg(short, long, default_value = "PLA")]
        material: String,

        /// Filament mass in grams
        #[arg(short, long, default_value = "50.0")]
        grams: f64,

        /// Print time in minutes
        #[arg(short = 't', long, default_value = "120.0")]
        minutes: f64,

        /// Complexity score, 0-100 (50 is neutral)
        #[arg(long, default_value = "50.0")]
        complexity: f64,

        /// Number of units
        #[arg(short, long, default_value = "1")]
        quantity: u32,

        /// Rush order
        #[arg(short, long)]
        rush: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the configured material catalog
    Materials,

    /// Configuration management commands
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Show version information
    Version,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommands {
    /// Display current configuration (with secrets masked)
    Show,

    /// Validate configuration file
    Validate,
}

impl Cli {
    /// Get the command to execute, defaulting to Start if none provided
    pub fn get_command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_is_start() {
        let cli = Cli {
            config: PathBuf::from("config.toml"),
            command: None,
        };

        assert!(matches!(cli.get_command(), Commands::Start));
    }

    #[test]
    fn test_cli_parsing_quote() {
        let args = vec![
            "print-quote",
            "quote",
            "--material",
            "petg",
            "-g",
            "80",
            "-t",
            "90",
            "-q",
            "6",
            "--rush",
        ];
        let cli = Cli::try_parse_from(args).unwrap();

        match cli.get_command() {
            Commands::Quote {
                material,
                grams,
                minutes,
                complexity,
                quantity,
                rush,
                json,
            } => {
                assert_eq!(material, "petg");
                assert_eq!(grams, 80.0);
                assert_eq!(minutes, 90.0);
                assert_eq!(complexity, 50.0);
                assert_eq!(quantity, 6);
                assert!(rush);
                assert!(!json);
            }
            _ => panic!("Expected Quote command"),
        }
    }

    #[test]
    fn test_cli_parsing_config_show() {
        let args = vec!["print-quote", "--config", "custom.toml", "config", "show"];
        let cli = Cli::try_parse_from(args).unwrap();

        assert_eq!(cli.config, PathBuf::from("custom.toml"));
        match cli.get_command() {
            Commands::Config { action } => assert!(matches!(action, ConfigCommands::Show)),
            _ => panic!("Expected Config command"),
        }
    }

    #[test]
    fn test_cli_parsing_config_validate() {
        let args = vec!["print-quote", "config", "validate"];
        let cli = Cli::try_parse_from(args).unwrap();

        match cli.get_command() {
            Commands::Config { action } => assert!(matches!(action, ConfigCommands::Validate)),
            _ => panic!("Expected Config command"),
        }
    }

    #[test]
    fn test_cli_parsing_version_and_materials() {
        let cli = Cli::try_parse_from(vec!["print-quote", "version"]).unwrap();
        assert!(matches!(cli.get_command(), Commands::Version));

        let cli = Cli::try_parse_from(vec!["print-quote", "materials"]).unwrap();
        assert!(matches!(cli.get_command(), Commands::Materials));
    }

    #[test]
    fn test_cli_rejects_negative_quantity() {
        let result = Cli::try_parse_from(vec!["print-quote", "quote", "-q", "-3"]);
        assert!(result.is_err());
    }
}
