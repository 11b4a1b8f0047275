//! Accepts client connections and, for each one, spawns a task that opens a
//! connection to the backend and hands the pair off to a Worker chosen by
//! round robin. Connecting to the backend from its own spawned task (rather
//! than inline in the accept loop) keeps a slow or unreachable backend from
//! stalling subsequent accepts — the non-blocking-connect fix §9 calls for,
//! which `tokio::net::TcpStream::connect` gives for free.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::engine::worker::WorkerDispatcher;
use crate::errors::EngineError;

pub struct AcceptorHandle {
    shutdown: Arc<Notify>,
    join: Option<JoinHandle<()>>,
}

impl AcceptorHandle {
    /// Wakes the accept loop so shutdown is prompt.
    pub fn wake(&self) {
        self.shutdown.notify_one();
    }

    pub async fn join(&mut self) {
        if let Some(handle) = self.join.take() {
            let _ = handle.await;
        }
    }
}

/// Binds the listening socket before spawning the accept loop, so bind
/// failures surface synchronously to the caller.
pub async fn spawn_acceptor(
    listen_port: u16,
    backend_host: String,
    backend_port: u16,
    workers: Vec<WorkerDispatcher>,
    shutdown: Arc<Notify>,
) -> Result<AcceptorHandle, EngineError> {
    let listen_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, listen_port));
    let listener = TcpListener::bind(listen_addr)
        .await
        .map_err(|source| EngineError::Bind {
            addr: listen_addr,
            source,
        })?;

    let backend_octets: Ipv4Addr = backend_host
        .parse()
        .map_err(|_| EngineError::BadBackendAddr(backend_host.clone()))?;
    let backend_addr = SocketAddr::V4(SocketAddrV4::new(backend_octets, backend_port));

    let accept_shutdown = Arc::clone(&shutdown);
    let join = tokio::spawn(accept_loop(listener, backend_addr, workers, accept_shutdown));

    Ok(AcceptorHandle {
        shutdown,
        join: Some(join),
    })
}

async fn accept_loop(
    listener: TcpListener,
    backend_addr: SocketAddr,
    workers: Vec<WorkerDispatcher>,
    shutdown: Arc<Notify>,
) {
    let mut next_worker = 0usize;

    loop {
        tokio::select! {
            biased;

            _ = shutdown.notified() => break,

            accepted = listener.accept() => {
                match accepted {
                    Ok((client, peer)) => {
                        if let Err(err) = client.set_nodelay(true) {
                            tracing::warn!(error = %err, %peer, "failed to set TCP_NODELAY on client socket");
                        }

                        let dispatcher = workers[next_worker % workers.len()].clone();
                        next_worker = next_worker.wrapping_add(1);

                        tokio::spawn(async move {
                            match TcpStream::connect(backend_addr).await {
                                Ok(backend) => {
                                    tracing::debug!(%peer, backend = %backend_addr, "accepted session");
                                    dispatcher.dispatch(client, backend);
                                }
                                Err(err) => {
                                    tracing::warn!(error = %err, backend = %backend_addr, "backend connect failed, dropping client");
                                }
                            }
                        });
                    }
                    Err(err) => {
                        tracing::error!(error = %err, "accept failed");
                    }
                }
            }
        }
    }
}
