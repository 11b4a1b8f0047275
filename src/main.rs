use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use pg_sniff_proxy::app::{self, shutdown};
use pg_sniff_proxy::engine::Engine;
use pg_sniff_proxy::logsink::{LogSink, LogSinkConfig};

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

fn main() {
    let args = app::parse();
    app::init_logging(&args);

    let logsink_config = LogSinkConfig {
        batch_size: args.batch_size,
        flush_interval: Duration::from_millis(args.flush_interval_ms),
        sync_every_n: args.sync_every_n,
        backlog_cap: args.backlog_cap,
    };

    let logsink = match LogSink::new(Path::new(&args.log_path), logsink_config) {
        Ok(logsink) => Arc::new(logsink),
        Err(err) => {
            tracing::error!(error = %err, "failed to start log sink");
            std::process::exit(exitcode::CANTCREAT);
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("pg-sniff-proxy")
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            tracing::error!(error = %err, "failed to start tokio runtime");
            std::process::exit(exitcode::OSERR);
        }
    };

    runtime.block_on(async {
        let engine = match Engine::start(&args, Arc::clone(&logsink)).await {
            Ok(engine) => engine,
            Err(err) => {
                tracing::error!(error = %err, "failed to start engine");
                std::process::exit(exitcode::OSERR);
            }
        };

        shutdown::wait_for_shutdown().await;

        tracing::info!("shutdown signal received, draining sessions");
        engine.shutdown().await;
    });

    // logsink is the last Arc clone remaining once the engine's workers
    // have joined; dropping it here runs its synchronous flush-and-exit.
    drop(logsink);

    std::process::exit(exitcode::OK);
}
