//! `ferry run` — launch a consumer and stream a file of integers to it.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use ferry::{IntSource, TransferConfig, launch, producer};
use tracing::{info, warn};

/// Arguments for `ferry run`.
#[derive(clap::Args)]
pub struct RunArgs {
    /// File of whitespace/line-delimited integers to transfer.
    #[arg(short, long, default_value = "numbers.txt")]
    input: PathBuf,

    /// TCP port the consumer listens on (loopback only).
    #[arg(long, default_value_t = ferry_proto::DEFAULT_PORT)]
    port: u16,

    /// Stop after reading this many values from the input.
    #[arg(long, default_value_t = 100)]
    count: u32,

    /// Consumer buffer capacity.
    #[arg(long, default_value_t = 100)]
    capacity: usize,

    /// Producer-side worker threads.
    #[arg(long, default_value_t = 2)]
    producer_workers: usize,

    /// Consumer-side worker threads.
    #[arg(long, default_value_t = 2)]
    consumer_workers: usize,

    /// Connect attempts before giving up on the consumer.
    #[arg(long, default_value_t = 50)]
    connect_attempts: u32,

    /// Pause between connect attempts, in milliseconds.
    #[arg(long, default_value_t = 100)]
    retry_interval_ms: u64,

    /// Consumer's accept window, in milliseconds.
    #[arg(long, default_value_t = 5_000)]
    accept_timeout_ms: u64,

    /// Consumer executable (defaults to `ferry-consumer` next to this
    /// binary, falling back to `$PATH`).
    #[arg(long)]
    consumer_bin: Option<PathBuf>,

    /// Do not spawn a consumer; connect to one started elsewhere.
    #[arg(long)]
    no_spawn: bool,

    /// Forwarded to the consumer: write the collected values as JSON here.
    #[arg(long)]
    report: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short, long)]
    verbose: bool,
}

impl RunArgs {
    /// Executes a full transfer run.
    pub fn run(self) -> Result<()> {
        init_tracing(self.verbose);
        let cfg = self.config();

        let source = IntSource::open(&self.input)
            .with_context(|| format!("cannot open input file {}", self.input.display()))?;

        let mut consumer = if self.no_spawn {
            if self.report.is_some() {
                warn!("--report is forwarded to the consumer; it does nothing with --no-spawn");
            }
            None
        } else {
            let program = self
                .consumer_bin
                .clone()
                .unwrap_or_else(default_consumer_bin);
            Some(launch::spawn(&program, &cfg, self.report.as_deref())?)
        };

        match producer::run(&cfg, source) {
            Ok(summary) => {
                info!(read = summary.read, sent = summary.sent, "producer finished");
            }
            Err(e) => {
                // Do not leave an orphaned consumer behind a failed run.
                if let Some(handle) = consumer.as_mut() {
                    if let Err(stop_err) = handle.stop(Duration::from_secs(5)) {
                        warn!(error = %stop_err, "could not stop the consumer");
                    }
                }
                return Err(e.into());
            }
        }

        if let Some(mut handle) = consumer {
            let status = handle.wait()?;
            if !status.success() {
                bail!("consumer exited with {status}");
            }
        }
        Ok(())
    }

    /// Maps the flags onto a [`TransferConfig`].
    fn config(&self) -> TransferConfig {
        let mut cfg = TransferConfig::default();
        cfg.port = self.port;
        cfg.max_values = self.count;
        cfg.capacity = self.capacity;
        cfg.producer_workers = self.producer_workers;
        cfg.consumer_workers = self.consumer_workers;
        cfg.connect_attempts = self.connect_attempts;
        cfg.retry_interval = Duration::from_millis(self.retry_interval_ms);
        cfg.accept_timeout = Duration::from_millis(self.accept_timeout_ms);
        cfg
    }
}

/// `ferry-consumer` next to the current executable, falling back to a
/// bare name resolved through `$PATH`.
fn default_consumer_bin() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("ferry-consumer")))
        .filter(|candidate| candidate.exists())
        .unwrap_or_else(|| PathBuf::from("ferry-consumer"))
}

/// Stdout logging; `-v` raises the filter to debug.
fn init_tracing(verbose: bool) {
    let filter = if verbose { "ferry=debug" } else { "ferry=info" };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
