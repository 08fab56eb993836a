//! Two-process bounded producer/consumer pipeline over loopback TCP.
//!
//! A producer reads integers from a whitespace-delimited source and
//! ships them, one 4-byte big-endian frame at a time, to a consumer
//! that collects them into a fixed-capacity buffer. Each side runs a
//! small pool of worker threads over shared state guarded by a single
//! lock; the two processes synchronize only through the connection
//! itself. Closing the connection is the end-of-stream signal.
//!
//! The crate exposes the two sides separately so they can run in
//! different processes (see `ferry-consumer` and the `ferry` CLI) or in
//! one process for tests.
//!
//! # Quick start
//!
//! ```no_run
//! use std::io::Cursor;
//! use std::thread;
//!
//! use ferry::{IntSource, TransferConfig, consumer, producer};
//!
//! let mut cfg = TransferConfig::default();
//! cfg.port = 7777;
//!
//! let server = {
//!     let cfg = cfg.clone();
//!     thread::spawn(move || consumer::serve(&cfg))
//! };
//!
//! let source = IntSource::new(Cursor::new("3 -1 42 0 7"));
//! let summary = producer::run(&cfg, source).expect("transfer failed");
//! assert_eq!(summary.sent, 5);
//!
//! let collected = server.join().unwrap().expect("consumer failed");
//! assert_eq!(collected.map(|buffer| buffer.len()), Some(5));
//! ```

pub mod buffer;
mod config;
pub mod consumer;
mod error;
#[cfg(unix)]
pub mod launch;
pub mod net;
pub mod producer;
pub mod source;

pub use buffer::BoundedBuffer;
pub use config::TransferConfig;
pub use error::{Error, Result};
#[cfg(unix)]
pub use launch::ConsumerHandle;
pub use producer::DrainSummary;
pub use source::IntSource;
