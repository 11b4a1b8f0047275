//! A Worker is an async supervisor task owning a shard of proxy Sessions:
//! it holds the intake channel the Acceptor dispatches new `(client,
//! backend)` pairs through, and a `JoinSet` of the session tasks it has
//! spawned. No Worker ever touches another Worker's sessions or buffers.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::{mpsc, Notify};
use tokio::task::{JoinHandle, JoinSet};

use crate::engine::session::Session;
use crate::logsink::LogSink;

const READ_BUFFER_SIZE: usize = 8192;

type IntakePair = (TcpStream, TcpStream);

/// Cheaply cloneable handle the Acceptor uses to hand off new
/// `(client, backend)` pairs to this Worker's intake channel.
#[derive(Clone)]
pub struct WorkerDispatcher {
    intake: mpsc::UnboundedSender<IntakePair>,
}

impl WorkerDispatcher {
    /// Enqueues a pair for this Worker to pick up. A send failure means the
    /// Worker has already shut down; the pair is simply dropped, closing
    /// both sockets.
    pub fn dispatch(&self, client: TcpStream, backend: TcpStream) {
        let _ = self.intake.send((client, backend));
    }
}

/// Owning handle held by the Engine: joins the Worker task on shutdown.
pub struct WorkerHandle {
    dispatcher: WorkerDispatcher,
    shutdown: Arc<Notify>,
    join: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn dispatcher(&self) -> WorkerDispatcher {
        self.dispatcher.clone()
    }

    pub fn wake(&self) {
        self.shutdown.notify_one();
    }

    pub async fn join(&mut self) {
        if let Some(handle) = self.join.take() {
            let _ = handle.await;
        }
    }
}

pub fn spawn_worker(
    index: usize,
    shutdown: Arc<Notify>,
    logsink: Arc<LogSink>,
    high_water_mark: usize,
    low_water_mark: usize,
) -> WorkerHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let worker_shutdown = Arc::clone(&shutdown);

    let join = tokio::spawn(worker_loop(
        index,
        rx,
        worker_shutdown,
        logsink,
        high_water_mark,
        low_water_mark,
    ));

    WorkerHandle {
        dispatcher: WorkerDispatcher { intake: tx },
        shutdown,
        join: Some(join),
    }
}

/// Drains the intake channel, spawning one session task per pair, until
/// told to shut down. Dropping the `JoinSet` on the way out aborts any
/// sessions still running — the same abrupt-close-on-shutdown behavior as
/// simply dropping a thread-owned session map.
async fn worker_loop(
    index: usize,
    mut intake: mpsc::UnboundedReceiver<IntakePair>,
    shutdown: Arc<Notify>,
    logsink: Arc<LogSink>,
    high_water_mark: usize,
    low_water_mark: usize,
) {
    let mut sessions = JoinSet::new();

    loop {
        tokio::select! {
            biased;

            _ = shutdown.notified() => {
                tracing::debug!(worker = index, "worker shutting down");
                break;
            }

            Some((client, backend)) = intake.recv() => {
                sessions.spawn(run_session(
                    client,
                    backend,
                    Arc::clone(&logsink),
                    high_water_mark,
                    low_water_mark,
                ));
            }

            Some(_) = sessions.join_next(), if !sessions.is_empty() => {}
        }
    }
}

/// Runs one session to completion: pumps bytes in both directions,
/// decoding and logging client traffic, until either side closes.
async fn run_session(
    client: TcpStream,
    backend: TcpStream,
    logsink: Arc<LogSink>,
    high_water_mark: usize,
    low_water_mark: usize,
) {
    let mut session = Session::new(client, backend);

    loop {
        let client_read_paused = session.client_interest.read_paused;
        let backend_read_paused = session.backend_interest.read_paused;
        let client_wants_write = !session.backend_to_client.is_empty();
        let backend_wants_write = !session.client_to_backend.is_empty();

        let should_close = tokio::select! {
            biased;

            result = session.client.readable(), if !client_read_paused => {
                match result {
                    Ok(()) => !handle_read(&mut session, true, &logsink),
                    Err(_) => true,
                }
            }

            result = session.backend.readable(), if !backend_read_paused => {
                match result {
                    Ok(()) => !handle_read(&mut session, false, &logsink),
                    Err(_) => true,
                }
            }

            result = session.client.writable(), if client_wants_write => {
                match result {
                    Ok(()) => !handle_write(&mut session, true),
                    Err(_) => true,
                }
            }

            result = session.backend.writable(), if backend_wants_write => {
                match result {
                    Ok(()) => !handle_write(&mut session, false),
                    Err(_) => true,
                }
            }

            // Backstop, in case back-pressure on both directions ever left
            // every branch above disabled at once; re-evaluates the guards.
            _ = tokio::time::sleep(Duration::from_millis(100)) => false,
        };

        if should_close {
            break;
        }

        sync_interests(&mut session, high_water_mark, low_water_mark);
    }
}

/// Reads from the ready socket (`is_client` selects which) in a loop with
/// `try_read` until it would block, mirroring the read-until-would-block
/// pattern of an edge-triggered readiness loop. Client bytes are fed
/// through the decoder before being queued for the backend. Returns `false`
/// if the session must close.
fn handle_read(session: &mut Session, is_client: bool, logsink: &LogSink) -> bool {
    let mut buf = [0u8; READ_BUFFER_SIZE];
    let mut decoded_lines: Vec<String> = Vec::new();

    let result = loop {
        let socket = if is_client { &session.client } else { &session.backend };
        match socket.try_read(&mut buf) {
            Ok(0) => break false,
            Ok(n) => {
                if is_client {
                    decoded_lines.extend(session.decoder.parse_client_message(&buf[..n]));
                    session.client_to_backend.append(&buf[..n]);
                } else {
                    session.backend_to_client.append(&buf[..n]);
                }
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => break true,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => break false,
        }
    };

    for line in decoded_lines {
        logsink.log(line);
    }

    result
}

/// Sends as much of the matching outbound buffer as possible with
/// `try_write`, stopping on would-block. Returns `false` if the session
/// must close.
fn handle_write(session: &mut Session, is_client: bool) -> bool {
    loop {
        let (socket, outbound) = if is_client {
            (&session.client, &mut session.backend_to_client)
        } else {
            (&session.backend, &mut session.client_to_backend)
        };

        if outbound.is_empty() {
            return true;
        }

        match socket.try_write(outbound.as_slice()) {
            Ok(0) => return false,
            Ok(n) => outbound.consume(n),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => return true,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => return false,
        }
    }
}

/// Recomputes read back-pressure for both sockets of a session: paused
/// above the high-water mark, resumed at the low-water mark.
fn sync_interests(session: &mut Session, high_water_mark: usize, low_water_mark: usize) {
    if session.client_to_backend.len() >= high_water_mark {
        session.client_interest.read_paused = true;
    } else if session.client_to_backend.len() <= low_water_mark {
        session.client_interest.read_paused = false;
    }

    if session.backend_to_client.len() >= high_water_mark {
        session.backend_interest.read_paused = true;
    } else if session.backend_to_client.len() <= low_water_mark {
        session.backend_interest.read_paused = false;
    }
}
