//! CLI command definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "bargain")]
#[command(about = "Automated counter-offer negotiation for broker deal suggestions", long_about = None)]
pub struct Cli {
    /// Path to a TOML configuration file
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the negotiation loop against a dispatch stream
    Run {
        /// Listen for the dispatch connection on this port
        #[arg(short, long, default_value = "9801", conflicts_with = "connect")]
        port: u16,

        /// Connect to a dispatch endpoint instead of listening
        #[arg(short = 'c', long)]
        connect: Option<String>,
    },

    /// Evaluate the decision policy for one offer and exit
    Check {
        /// Offered price in copper
        offered: u64,

        /// Asking price in copper
        asking: u64,
    },
}
