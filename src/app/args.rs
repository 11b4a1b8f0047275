use std::fmt;

use clap::{Parser, ValueEnum};
use tracing::Level;

/// pg_sniff_proxy: transparent TCP proxy that logs PostgreSQL frontend traffic.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// TCP port to listen on for incoming client connections.
    pub listen_port: u16,

    /// Backend PostgreSQL host, a dotted-quad IPv4 literal.
    pub backend_host: String,

    /// Backend PostgreSQL port.
    pub backend_port: u16,

    /// Number of Worker threads sharding proxy sessions.
    #[arg(long, default_value_t = 6, env)]
    pub workers: usize,

    /// Path to the append-only query log file.
    #[arg(long, default_value_t = String::from("resources/logs.txt"), env)]
    pub log_path: String,

    #[arg(short, long, default_value_t = tracing::Level::INFO, env)]
    pub log_level: Level,

    #[clap(short = 'F', long, value_enum, default_value_t = LogFormat::Text, env)]
    pub log_format: LogFormat,

    /// Disable colors in the log output.
    #[arg(long, default_value_t = false, env)]
    pub no_color: bool,

    /// Milliseconds the LogSink flusher waits for before checking the backlog.
    #[arg(long, default_value_t = 10, env)]
    pub flush_interval_ms: u64,

    /// Backlog size (pending log lines) that wakes the flusher early.
    #[arg(long, default_value_t = 10_000, env)]
    pub batch_size: usize,

    /// How many flushed batches between synchronous `msync` calls.
    #[arg(long, default_value_t = 20, env)]
    pub sync_every_n: usize,

    /// Hard cap on the LogSink backlog; oldest records are dropped past this.
    #[arg(long, default_value_t = 200_000, env)]
    pub backlog_cap: usize,

    /// Per-direction outbound buffer size (bytes) that pauses the peer's reads.
    #[arg(long, default_value_t = 16 * 1024 * 1024, env)]
    pub high_water_mark: usize,

    /// Per-direction outbound buffer size (bytes) that resumes the peer's reads.
    #[arg(long, default_value_t = 4 * 1024 * 1024, env)]
    pub low_water_mark: usize,
}

pub fn parse() -> Args {
    Args::parse()
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum LogFormat {
    Text,
    Json,
    Pretty,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
            LogFormat::Pretty => write!(f, "pretty"),
        }
    }
}
