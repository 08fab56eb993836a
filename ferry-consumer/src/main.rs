//! ferry-consumer — the receiving half of a transfer.
//!
//! Listens on the loopback port, accepts the single producer
//! connection, and collects framed values into a bounded buffer. Runs
//! standalone or spawned by `ferry run`.
#![allow(clippy::print_stderr)]

/// Unsupported-platform stub.
#[cfg(not(unix))]
fn main() {
    eprintln!("ferry-consumer only runs on Unix hosts");
    std::process::exit(1);
}

/// Hands off to the real consumer.
#[cfg(unix)]
fn main() {
    app::run();
}

#[cfg(unix)]
mod app {
    use std::fs::File;
    use std::io;
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    use clap::Parser;
    use ferry::{BoundedBuffer, TransferConfig, consumer};
    use serde::Serialize;

    /// Command-line flags; `ferry run` forwards these when it spawns us.
    #[derive(Parser)]
    #[command(
        name = "ferry-consumer",
        version,
        about = "Receiving half of a ferry transfer"
    )]
    struct Cli {
        /// TCP port to listen on (loopback only).
        #[arg(long, default_value_t = ferry_proto::DEFAULT_PORT)]
        port: u16,

        /// Stop once this many values have been stored.
        #[arg(long, default_value_t = 100)]
        capacity: usize,

        /// Receiving worker threads.
        #[arg(long, default_value_t = 2)]
        workers: usize,

        /// How long to wait for a producer, in milliseconds.
        #[arg(long, default_value_t = 5_000)]
        accept_timeout_ms: u64,

        /// Write the collected values as JSON to this path.
        #[arg(long)]
        report: Option<PathBuf>,

        /// Enable debug logging.
        #[arg(short, long)]
        verbose: bool,
    }

    /// Entry point for the consumer process.
    pub(crate) fn run() {
        let cli = Cli::parse();
        init_tracing(cli.verbose);

        if let Err(e) = serve_once(&cli) {
            eprintln!("ferry-consumer: {e}");
            std::process::exit(1);
        }
    }

    /// Serves one transfer and writes the report if one was requested.
    fn serve_once(cli: &Cli) -> ferry::Result<()> {
        let mut cfg = TransferConfig::default();
        cfg.port = cli.port;
        cfg.capacity = cli.capacity;
        cfg.consumer_workers = cli.workers;
        cfg.accept_timeout = Duration::from_millis(cli.accept_timeout_ms);

        match consumer::serve(&cfg)? {
            Some(buffer) => {
                if let Some(path) = cli.report.as_deref() {
                    write_report(path, &buffer)?;
                }
            }
            None => {
                // A producer that never shows up is a normal outcome.
                eprintln!(
                    "ferry-consumer: no producer connected within {} ms",
                    cli.accept_timeout_ms
                );
            }
        }
        Ok(())
    }

    /// Snapshot written for `--report`.
    #[derive(Serialize)]
    struct Report<'a> {
        /// Configured buffer capacity.
        capacity: usize,
        /// Number of values stored.
        stored: usize,
        /// Values in insertion order.
        values: &'a [i32],
    }

    /// Writes the collected values as pretty-printed JSON.
    fn write_report(path: &Path, buffer: &BoundedBuffer) -> io::Result<()> {
        let report = Report {
            capacity: buffer.capacity(),
            stored: buffer.len(),
            values: buffer.values(),
        };
        serde_json::to_writer_pretty(File::create(path)?, &report).map_err(io::Error::other)
    }

    /// Stdout logging; `-v` raises the filter to debug.
    fn init_tracing(verbose: bool) {
        let filter = if verbose { "ferry=debug" } else { "ferry=info" };
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
