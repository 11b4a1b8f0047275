//! Asynchronous log sink: batches decoded entries from many proxy sessions
//! into a single append-only file backed by a growing memory mapping,
//! flushed by a dedicated background worker.

pub mod mmap_log;

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::errors::LogSinkError;
use mmap_log::MappedLog;

struct Shared {
    backlog: Mutex<VecDeque<String>>,
    cv: Condvar,
    done: AtomicBool,
    dropped_records: AtomicU64,
}

/// Handle to the background flusher. `log()` is cheap and non-blocking
/// under normal operation; dropping the sink drains and synchronously
/// flushes everything still queued.
pub struct LogSink {
    shared: Arc<Shared>,
    batch_size: usize,
    backlog_cap: usize,
    worker: Option<JoinHandle<()>>,
}

/// Tunables mirroring the original `AsyncLogger` constructor defaults.
pub struct LogSinkConfig {
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub sync_every_n: usize,
    pub backlog_cap: usize,
}

impl Default for LogSinkConfig {
    fn default() -> Self {
        Self {
            batch_size: 10_000,
            flush_interval: Duration::from_millis(10),
            sync_every_n: 20,
            backlog_cap: 200_000,
        }
    }
}

impl LogSink {
    pub fn new(path: &Path, config: LogSinkConfig) -> Result<Self, LogSinkError> {
        let mapped_log = MappedLog::open(path)?;

        let shared = Arc::new(Shared {
            backlog: Mutex::new(VecDeque::new()),
            cv: Condvar::new(),
            done: AtomicBool::new(false),
            dropped_records: AtomicU64::new(0),
        });

        let worker_shared = Arc::clone(&shared);
        let flush_interval = config.flush_interval;
        let sync_every_n = config.sync_every_n;
        let worker = std::thread::Builder::new()
            .name("logsink-flusher".into())
            .spawn(move || flusher_loop(worker_shared, mapped_log, flush_interval, sync_every_n))
            .map_err(LogSinkError::Spawn)?;

        Ok(Self {
            shared,
            batch_size: config.batch_size,
            backlog_cap: config.backlog_cap,
            worker: Some(worker),
        })
    }

    /// Enqueues one record. Non-blocking; wakes the flusher early once the
    /// backlog reaches `batch_size`. Past `backlog_cap` the oldest record is
    /// dropped instead of growing memory without bound (back-pressure).
    pub fn log(&self, line: String) {
        let mut backlog = self.shared.backlog.lock();
        backlog.push_back(line);
        if backlog.len() > self.backlog_cap {
            backlog.pop_front();
            self.shared.dropped_records.fetch_add(1, Ordering::Relaxed);
        }
        let should_wake = backlog.len() >= self.batch_size;
        drop(backlog);
        if should_wake {
            self.shared.cv.notify_one();
        }
    }

    /// Number of records dropped due to backlog overflow or LogSink errors.
    pub fn dropped_records(&self) -> u64 {
        self.shared.dropped_records.load(Ordering::Relaxed)
    }
}

impl Drop for LogSink {
    fn drop(&mut self) {
        self.shared.done.store(true, Ordering::SeqCst);
        self.shared.cv.notify_all();
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

fn flusher_loop(
    shared: Arc<Shared>,
    mut mapped_log: MappedLog,
    flush_interval: Duration,
    sync_every_n: usize,
) {
    let mut sync_counter = 0usize;
    let mut errored = false;

    loop {
        let mut local_batch = {
            let mut backlog = shared.backlog.lock();
            if backlog.is_empty() && !shared.done.load(Ordering::SeqCst) {
                shared.cv.wait_for(&mut backlog, flush_interval);
            }
            if backlog.is_empty() && shared.done.load(Ordering::SeqCst) {
                break;
            }
            std::mem::take(&mut *backlog)
        };

        if !local_batch.is_empty() {
            write_batch(&shared, &mut mapped_log, &mut local_batch, &mut errored);
            if !errored {
                sync_counter += 1;
                if sync_counter >= sync_every_n {
                    mapped_log.flush_async();
                    sync_counter = 0;
                }
            }
        }
    }

    // Drain whatever arrived between the last wakeup check and shutdown.
    let mut remaining = std::mem::take(&mut *shared.backlog.lock());
    write_batch(&shared, &mut mapped_log, &mut remaining, &mut errored);

    if mapped_log.write_offset() > 0 {
        mapped_log.flush_sync();
    }
    mapped_log.truncate_to_write_offset();
}

/// Writes every record in `batch` to `mapped_log`. A mapping failure marks
/// `errored` and the rest of the batch (and future batches, until the
/// process is restarted) is dropped with the counter incremented — the
/// sink never leaves a null/dangling mapping reachable.
fn write_batch(shared: &Shared, mapped_log: &mut MappedLog, batch: &mut VecDeque<String>, errored: &mut bool) {
    for record in batch.drain(..) {
        if *errored {
            shared.dropped_records.fetch_add(1, Ordering::Relaxed);
            continue;
        }

        let required = mapped_log.write_offset() + record.len() as u64 + 1;
        match mapped_log.ensure_capacity(required) {
            Ok(()) => mapped_log.append_record(&record),
            Err(err) => {
                tracing::error!(error = %err, "log mapping growth failed, retrying once");
                if mapped_log.ensure_capacity(required).is_ok() {
                    mapped_log.append_record(&record);
                } else {
                    tracing::error!("log mapping growth failed twice, dropping batch");
                    *errored = true;
                    shared.dropped_records.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }
}
