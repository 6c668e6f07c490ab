//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - run: start the fleet and tune until Ctrl-C
//! - check: validate enabled miners' profiles
//! - list: list configured miners
//! - status / restart: one-off device actions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// axetune - keeps a fleet of ASIC miners inside their thermal and power limits
#[derive(Parser, Debug)]
#[command(name = "axetune")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// The command to run; `run` when none was given
    pub fn resolved_command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Run)
    }
}

/// Main subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Start autotuning every enabled miner (default)
    Run,

    /// Validate the tuning profiles of enabled miners
    Check,

    /// List configured miners
    List {
        /// Show only miners with autotuning enabled
        #[arg(short, long)]
        enabled: bool,
    },

    /// Read current telemetry from one miner
    Status {
        /// Miner address
        address: String,
    },

    /// Restart one miner
    Restart {
        /// Miner address
        address: String,
    },
}
