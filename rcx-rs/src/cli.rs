//! Root CLI structure for rcx-rs

use clap::{Parser, Subcommand};

use crate::commands::info::InfoArgs;
use crate::commands::observer::AddObserverArgs;

#[derive(Parser)]
#[command(name = "rcx-rs")]
#[command(about = "Command-line tools for Age of Mythology recorded games", long_about = None)]
#[command(version)]
#[command(author)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (can be repeated for more detail)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Display information about a recording
    Info(InfoArgs),

    /// Write a copy of a recording with an observer added
    AddObserver(AddObserverArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}
