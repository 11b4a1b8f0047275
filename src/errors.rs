//! Errors.

use std::io;
use std::net::SocketAddr;

/// Top-level error returned from fallible construction paths (`main`, engine startup).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    LogSink(#[from] LogSinkError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("invalid command line arguments: {0}")]
    BadArgs(String),
}

/// Failures constructing or running the [`crate::logsink::LogSink`].
#[derive(Debug, thiserror::Error)]
pub enum LogSinkError {
    #[error("failed to open log file {path:?}")]
    Open {
        path: std::path::PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to set log file {path:?} to size {size}")]
    Truncate {
        path: std::path::PathBuf,
        size: u64,
        #[source]
        source: io::Error,
    },
    #[error("failed to mmap log file {path:?}")]
    Map {
        path: std::path::PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to spawn flusher thread")]
    Spawn(#[source] io::Error),
}

/// Failures constructing or running the proxy engine (acceptor + workers).
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to bind listener on {addr}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("backend address {0:?} is not a valid IPv4 literal")]
    BadBackendAddr(String),
}
