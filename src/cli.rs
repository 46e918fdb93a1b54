use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "treemodel",
    about = "Browse and script tree view-models over JSON documents and directories",
    version
)]
pub struct Cli {
    /// Write logs to this file instead of stderr
    #[arg(long, env = "TREEMODEL_LOG_FILE", global = true)]
    pub log_file: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Include hidden entries of directory sources
    #[arg(long, env = "TREEMODEL_SHOW_HIDDEN", global = true)]
    pub show_hidden: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the visible tree
    Show {
        /// JSON document or directory
        source: PathBuf,
        /// Expand every node before printing
        #[arg(long)]
        expand_all: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run operations read from stdin, one per line, then print the tree
    Exec {
        /// JSON document or directory
        source: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Fuzzy-search node names
    Search {
        /// JSON document or directory
        source: PathBuf,
        /// Query to match against node names
        query: String,
        /// Expand every node before searching
        #[arg(long)]
        expand_all: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Launch interactive browser
    Browse {
        /// JSON document or directory
        source: PathBuf,
        /// Poll interval in milliseconds
        #[arg(long, default_value = "250")]
        poll_interval: u64,
    },
}
