//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "winlldp")]
#[command(version, about = "Host-side LLDP agent: advertise and discover L2 neighbors", long_about = None)]
pub struct Cli {
    /// Path to a .env configuration file
    #[arg(short = 'e', long, global = true, value_name = "FILE")]
    pub env_file: Option<PathBuf>,

    /// Verbose output (-v for debug, -vv for trace)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send LLDP advertisements once
    Send {
        /// Send on a single interface instead of the configured set
        #[arg(short, long)]
        interface: Option<String>,
    },

    /// LLDP capture worker management
    Capture {
        #[command(subcommand)]
        action: CaptureAction,
    },

    /// Show discovered LLDP neighbors
    ShowNeighbors {
        /// Refresh the table every 5 seconds until interrupted
        #[arg(short, long)]
        watch: bool,
    },

    /// Remove all discovered neighbors
    ClearNeighbors,

    /// Show network interfaces
    ShowInterfaces,

    /// Show the effective configuration
    ShowConfig,

    /// Print the version
    Version,

    /// Run sender and capture in the foreground (service entry point)
    Run,

    /// Platform service integration
    Service {
        #[command(subcommand)]
        action: ServiceAction,
    },

    /// Capture worker entry point (spawned by `capture start`)
    #[command(hide = true)]
    CaptureWorker,
}

#[derive(Subcommand, Debug)]
pub enum CaptureAction {
    /// Start the capture worker process
    Start,
    /// Stop the capture worker process
    Stop,
    /// Show capture worker status
    Status,
    /// Show the capture worker log
    Log {
        /// Number of lines to show (0 for the whole file)
        #[arg(short = 'n', long, default_value_t = 20)]
        lines: usize,
    },
}

#[derive(Subcommand, Debug)]
pub enum ServiceAction {
    Install,
    Uninstall,
    Start,
    Stop,
    Restart,
    Status,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_core_commands() {
        assert!(matches!(
            Cli::try_parse_from(["winlldp", "send", "-i", "eth0"]).unwrap().command,
            Commands::Send { interface: Some(ref name) } if name == "eth0"
        ));
        assert!(matches!(
            Cli::try_parse_from(["winlldp", "capture", "start"]).unwrap().command,
            Commands::Capture { action: CaptureAction::Start }
        ));
        assert!(matches!(
            Cli::try_parse_from(["winlldp", "show-neighbors", "--watch"]).unwrap().command,
            Commands::ShowNeighbors { watch: true }
        ));
    }

    #[test]
    fn test_global_env_file() {
        let cli = Cli::try_parse_from(["winlldp", "send", "-e", "/etc/winlldp.env"]).unwrap();
        assert_eq!(cli.env_file, Some(PathBuf::from("/etc/winlldp.env")));
    }

    #[test]
    fn test_capture_log_lines_default() {
        let cli = Cli::try_parse_from(["winlldp", "capture", "log"]).unwrap();
        match cli.command {
            Commands::Capture {
                action: CaptureAction::Log { lines },
            } => assert_eq!(lines, 20),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_command_rejected() {
        assert!(Cli::try_parse_from(["winlldp", "frobnicate"]).is_err());
    }
}
