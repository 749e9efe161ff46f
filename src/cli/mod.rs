// src/cli/mod.rs
//! CLI definitions for txplan
//!
//! This module contains the command-line interface definitions using clap.
//! The command implementations are in the `commands` module.
//!
//! - `plan` - Load channels and a prefix, then print the ordered transaction
//! - `show-config` - Print the effective configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "txplan")]
#[command(author = "Conary Contributors")]
#[command(version)]
#[command(about = "Ordered, classified transaction plans for package environments", long_about = None)]
pub struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compute the transaction for a set of install and remove requests
    Plan {
        /// Channel as NAME=PATH; earlier channels have higher priority
        #[arg(long = "channel", value_name = "NAME=PATH", required = true)]
        channels: Vec<String>,

        /// Environment prefix holding conda-meta records of installed packages
        #[arg(short, long, value_name = "DIR")]
        prefix: Option<PathBuf>,

        /// Package to install, as a match spec ("openssl >=3")
        #[arg(short, long = "install", value_name = "SPEC")]
        install: Vec<String>,

        /// Installed package to remove
        #[arg(short, long = "remove", value_name = "NAME")]
        remove: Vec<String>,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration as TOML
    ShowConfig,
}
