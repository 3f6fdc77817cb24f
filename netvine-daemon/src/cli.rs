//! CLI argument definitions for netvine-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Netvine packet rewriting daemon.
///
/// Reconciles the host bridge/VLAN/classifier state and runs the
/// netfilter-queue packet rewriting workers.
#[derive(Parser, Debug)]
#[command(name = "netvine-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to netvine.toml configuration file.
    #[arg(short, long, default_value = "/etc/netvine/netvine.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration file and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,

    /// Disable the netfilter queue workers (dataplane control only).
    #[arg(long)]
    pub no_queue: bool,
}
