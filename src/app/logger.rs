use tracing_subscriber::EnvFilter;

use super::args::{Args, LogFormat};

pub fn init_logging(args: &Args) {
    // Initialize a default filter, then override the builtin default "warning" with our
    // commandline, (default: "info")
    let filter = EnvFilter::from_default_env().add_directive(args.log_level.into());

    let trace_sub = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(!args.no_color)
        .with_writer(std::io::stderr);

    match args.log_format {
        LogFormat::Json => trace_sub.json().init(),
        LogFormat::Pretty => trace_sub.pretty().init(),
        LogFormat::Text => trace_sub.init(),
    };

    tracing::info!("pg_sniff_proxy starting (version {})", env!("CARGO_PKG_VERSION"));
}
