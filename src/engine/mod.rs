//! The proxy engine: one Acceptor task distributing sessions round-robin
//! across a fixed pool of Worker tasks, each with its own intake channel
//! and session `JoinSet`. Workers never share state.

pub mod acceptor;
pub mod buffer;
pub mod session;
pub mod worker;

use std::sync::Arc;

use tokio::sync::Notify;

use crate::app::Args;
use crate::errors::EngineError;
use crate::logsink::LogSink;

use acceptor::{spawn_acceptor, AcceptorHandle};
use worker::{spawn_worker, WorkerHandle};

/// Owns the running Acceptor and Worker tasks. Dropping or calling
/// [`Engine::shutdown`] signals every task to stop and joins them.
pub struct Engine {
    acceptor: AcceptorHandle,
    workers: Vec<WorkerHandle>,
}

impl Engine {
    pub async fn start(args: &Args, logsink: Arc<LogSink>) -> Result<Self, EngineError> {
        let mut workers = Vec::with_capacity(args.workers);
        for index in 0..args.workers {
            let handle = spawn_worker(
                index,
                Arc::new(Notify::new()),
                Arc::clone(&logsink),
                args.high_water_mark,
                args.low_water_mark,
            );
            workers.push(handle);
        }

        let dispatchers = workers.iter().map(WorkerHandle::dispatcher).collect();

        let acceptor = spawn_acceptor(
            args.listen_port,
            args.backend_host.clone(),
            args.backend_port,
            dispatchers,
            Arc::new(Notify::new()),
        )
        .await?;

        tracing::info!(
            listen_port = args.listen_port,
            backend_host = %args.backend_host,
            backend_port = args.backend_port,
            workers = args.workers,
            "engine started"
        );

        Ok(Self { acceptor, workers })
    }

    /// Signals every task to stop, wakes them, and awaits until they've
    /// all exited.
    pub async fn shutdown(mut self) {
        self.acceptor.wake();
        for handle in &self.workers {
            handle.wake();
        }
        self.acceptor.join().await;
        for handle in &mut self.workers {
            handle.join().await;
        }
    }
}
