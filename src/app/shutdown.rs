//! SIGINT/SIGTERM handling for the foreground proxy process, via tokio's
//! own signal futures — the same pattern the teacher's `app/server.rs`
//! uses for its `interrupt_signal`/`term_signal` in its accept loop's
//! `tokio::select!`.

use tokio::signal::unix::{signal, SignalKind};

/// Resolves once SIGINT or SIGTERM arrives. Await this alongside the rest
/// of the async main loop's `tokio::select!`.
pub async fn wait_for_shutdown() {
    let mut term = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut interrupt = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");

    tokio::select! {
        _ = term.recv() => {}
        _ = interrupt.recv() => {}
    }
}
