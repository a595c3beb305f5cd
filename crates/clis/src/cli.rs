use crate::commands::Command;
use crate::tracing::{LogLevel, TracingConfig, TracingFormat};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "clis")]
#[command(about = "Install, link and validate command-line tools in a bin directory")]
#[command(long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(
        long,
        global = true,
        env = "CLIS_CONFIG",
        help = "Configuration file (default: ./clis.toml when present)"
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        env = "CLIS_BIN_DIR",
        help = "Directory the tools are installed into (default: ./bin)"
    )]
    pub bin_dir: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        env = "CLIS_CONCURRENCY",
        help = "Maximum number of tools installed at once"
    )]
    pub concurrency: Option<usize>,

    #[arg(
        short = 'l',
        long,
        global = true,
        help = "Set logging level",
        default_value = "warn",
        value_enum
    )]
    pub level: LogLevel,

    #[arg(long, global = true, help = "Print the result as JSON")]
    pub json: bool,

    #[arg(
        long,
        global = true,
        help = "Log output format",
        default_value = "compact",
        value_enum
    )]
    pub log_format: TracingFormat,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Provision the default tools plus the given ones")]
    Check {
        #[arg(help = "Tools to provision, as `name` or `name-version`")]
        tools: Vec<String>,
    },
    #[command(about = "List the tools that can be provisioned")]
    List,
}

impl From<Commands> for Command {
    fn from(cmd: Commands) -> Self {
        match cmd {
            Commands::Check { tools } => Self::Check { tools },
            Commands::List => Self::List,
        }
    }
}

impl Cli {
    pub fn tracing_config(&self) -> TracingConfig {
        TracingConfig {
            format: self.log_format,
            level: self.level.into(),
            ..TracingConfig::default()
        }
    }
}

pub fn parse() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracing::Level;

    #[test]
    fn test_cli_default_values() {
        let cli = Cli::try_parse_from(["clis", "list"]).unwrap();

        assert_eq!(cli.level, LogLevel::Warn);
        assert_eq!(cli.log_format, TracingFormat::Compact);
        assert!(!cli.json);
        assert!(matches!(cli.command, Commands::List));
    }

    #[test]
    fn test_check_collects_tools() {
        let cli = Cli::try_parse_from(["clis", "check", "helm", "openshift-install-4.10"]).unwrap();
        match cli.command {
            Commands::Check { tools } => {
                assert_eq!(tools, vec!["helm", "openshift-install-4.10"]);
            }
            Commands::List => panic!("expected check"),
        }

        let cli = Cli::try_parse_from(["clis", "check"]).unwrap();
        assert!(matches!(cli.command, Commands::Check { tools } if tools.is_empty()));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "clis",
            "check",
            "jq",
            "--bin-dir",
            "/opt/tools",
            "--concurrency",
            "2",
            "-l",
            "debug",
            "--json",
            "--log-format",
            "json",
        ])
        .unwrap();

        assert_eq!(cli.bin_dir, Some(PathBuf::from("/opt/tools")));
        assert_eq!(cli.concurrency, Some(2));
        assert!(cli.json);
        let tracing = cli.tracing_config();
        assert_eq!(tracing.level, Level::DEBUG);
        assert_eq!(tracing.format, TracingFormat::Json);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(Cli::try_parse_from(["clis", "--level", "loud", "list"]).is_err());
        assert!(Cli::try_parse_from(["clis", "--concurrency", "many", "list"]).is_err());
        assert!(Cli::try_parse_from(["clis"]).is_err());
    }

    #[test]
    fn test_command_conversion() {
        let cli = Cli::try_parse_from(["clis", "check", "gh"]).unwrap();
        let command: Command = cli.command.into();
        assert_eq!(
            command,
            Command::Check {
                tools: vec!["gh".to_string()]
            }
        );
    }
}
