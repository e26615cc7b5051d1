//! Component for §10.1: the CLI surface driving both engines.

use std::time::Duration;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(name = "probenet")]
#[command(about = "ICMP ping and MTR (traceroute+ping) probing")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Emit structured JSON instead of a human-readable report
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Send ICMP Echo Requests and report loss/RTT statistics
    Ping {
        /// Target hostname or IP address
        target: String,

        /// Number of probes to send
        #[arg(short, long, default_value = "4")]
        count: usize,

        /// Wait time between probes, in milliseconds
        #[arg(short, long, default_value = "1000")]
        interval: u64,

        /// Per-probe reply timeout, in milliseconds
        #[arg(short, long, default_value = "1000")]
        timeout: u64,

        /// ICMP Echo payload size, in bytes
        #[arg(short, long, default_value = "64")]
        data_size: usize,

        /// Resolve and probe over IPv4 only
        #[arg(long, conflicts_with = "force_v6")]
        force_v4: bool,

        /// Resolve and probe over IPv6 only
        #[arg(long, conflicts_with = "force_v4")]
        force_v6: bool,
    },
    /// Perform repeated TTL sweeps, reporting per-hop loss and latency
    Mtr {
        /// Target hostname or IP address
        target: String,

        /// Number of attempts per hop
        #[arg(short, long, default_value = "3")]
        count: usize,

        /// Maximum TTL to probe
        #[arg(short = 'M', long, default_value = "60")]
        max_hops: usize,

        /// Wait time between probes, in milliseconds
        #[arg(short, long, default_value = "1000")]
        interval: u64,

        /// Per-probe reply timeout, in milliseconds
        #[arg(short, long, default_value = "1000")]
        timeout: u64,

        /// ICMP Echo payload size, in bytes
        #[arg(short, long, default_value = "64")]
        data_size: usize,

        /// Resolve and probe over IPv4 only
        #[arg(long, conflicts_with = "force_v6")]
        force_v4: bool,

        /// Resolve and probe over IPv6 only
        #[arg(long, conflicts_with = "force_v4")]
        force_v6: bool,
    },
}

impl Command {
    pub fn interval(&self) -> Duration {
        let ms = match self {
            Command::Ping { interval, .. } | Command::Mtr { interval, .. } => *interval,
        };
        Duration::from_millis(ms)
    }

    pub fn timeout(&self) -> Duration {
        let ms = match self {
            Command::Ping { timeout, .. } | Command::Mtr { timeout, .. } => *timeout,
        };
        Duration::from_millis(ms)
    }
}
