//! CLI definitions for roastctl.

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

use roast_client::ProgramMode;

#[derive(Debug, Parser)]
#[command(
    name = "roastctl",
    version,
    about = "Monitor and control a roast controller",
    infer_subcommands = true,
    after_help = "Examples:\n  roastctl --url roaster.local console   # interactive console\n  roastctl set setpoint 210              # change the setpoint\n  roastctl upload city-roast.toml        # send a roast program\n  roastctl monitor --samples             # stream status and telemetry"
)]
pub struct Cli {
    /// Configuration file (defaults to ./roaster.toml when present).
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,
    /// Controller URL (ws://host:port/ or a bare host).
    #[arg(long, short, global = true)]
    pub url: Option<String>,
    /// Show debug logs.
    #[arg(long, short, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the controller's current status.
    Status,
    /// Start a run.
    Start,
    /// Stop the current run.
    Stop,
    /// Restart the current run.
    Restart,
    /// Persist the controller's current settings.
    SaveConfig,
    /// Switch the control mode.
    Mode {
        #[arg(value_enum)]
        mode: ModeArg,
    },
    /// Change one tuning parameter (setpoint, ramp_rate, p, i, d).
    Set {
        name: String,
        #[arg(allow_hyphen_values = true)]
        value: String,
    },
    /// Upload a roast program from a .toml or .json file.
    Upload { file: PathBuf },
    /// Print status changes until the connection closes.
    Monitor {
        /// Also print every telemetry sample.
        #[arg(long)]
        samples: bool,
    },
    /// Interactive terminal console.
    #[command(alias = "ui")]
    Console,
    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Simple,
    Program,
}

impl From<ModeArg> for ProgramMode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Simple => Self::Simple,
            ModeArg::Program => Self::Program,
        }
    }
}
