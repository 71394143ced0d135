//! This module defines the command-line interface for the application using `clap`.
//!
//! It provides a `Cli` struct that represents the parsed command-line arguments,
//! and a `Commands` enum that represents the available subcommands and their
//! options.
//!
//! # Examples
//!
//! ```no_run
//! use clap::Parser;
//! use vect::commands::{Cli, Commands};
//!
//! let cli = Cli::parse();
//! match cli.command {
//!     Commands::Search { query, k } => println!("searching {query:?} (k = {k:?})"),
//!     _ => {}
//! }
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Represents the parsed command-line arguments.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, propagate_version = true, color = clap::ColorChoice::Auto)]
pub struct Cli {
    /// Path to the YAML configuration file. Defaults to `<config_dir>/config.yaml`.
    #[arg(long, short = 'c', global = true, env = "VECT_CONFIG")]
    pub config: Option<PathBuf>,

    /// The parsed subcommand and its options.
    #[command(subcommand)]
    pub command: Commands,
}

/// Represents the available subcommands and their options.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Chunk, embed and store text given inline or read from a file.
    #[clap(name = "add", alias = "a")]
    Add {
        /// Text to store.
        #[arg(required_unless_present = "file", conflicts_with = "file")]
        text: Option<String>,

        /// Read the text to store from this file.
        #[arg(long, short = 'f')]
        file: Option<PathBuf>,
    },

    /// Print the stored texts most similar to the query.
    #[clap(name = "search", alias = "s")]
    Search {
        query: String,

        /// Number of results. Defaults to `top_k` from the configuration.
        #[arg(short = 'k', long)]
        k: Option<usize>,
    },

    /// Remove every stored vector and record.
    Clear,

    /// Show how many vectors and records are stored.
    Stats,

    /// Write a default configuration file.
    Init,
}
