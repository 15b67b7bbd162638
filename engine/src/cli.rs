//! CLI interface for Attendant
//!
//! This module provides the command-line interface using clap's derive API.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::state::StartMode;

/// Attendant
///
/// Watches the shared answer store and enters each newly published answer
/// into the live quiz session for you.
#[derive(Parser, Debug)]
#[command(name = "attendant")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start answering newly published records
    Run(RunArgs),

    /// Print the latest published record
    Latest,

    /// Show the cursor, the last seen record and whether an instance is running
    Status,

    /// Store the single sign-on login id and password in the OS keychain
    Credentials,
}

/// Where the cursor starts. Prompts when none is given.
#[derive(Args, Debug, Default)]
#[group(multiple = false)]
pub struct RunArgs {
    /// Act on the current latest record immediately
    #[arg(long)]
    pub catch_up: bool,

    /// Only act on records published from now on
    #[arg(long)]
    pub from_now: bool,

    /// Keep the cursor from the previous run
    #[arg(long)]
    pub resume: bool,
}

impl RunArgs {
    /// The start mode chosen on the command line, if any.
    pub fn start_mode(&self) -> Option<StartMode> {
        if self.catch_up {
            Some(StartMode::CatchUp)
        } else if self.from_now {
            Some(StartMode::FromNow)
        } else if self.resume {
            Some(StartMode::Resume)
        } else {
            None
        }
    }
}
