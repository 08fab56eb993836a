//! Producer side: drain an integer source into the connection with a
//! small worker pool.

use std::io::{BufRead, Write};
use std::sync::{Mutex, PoisonError};
use std::thread;

use tracing::{debug, info, warn};

use crate::source::IntSource;
use crate::{Result, TransferConfig, net};

/// Totals from one producer run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct DrainSummary {
    /// Values claimed from the source (final value of the shared counter).
    pub read: u32,
    /// Values actually delivered to the connection.
    pub sent: u32,
}

/// The shared claim state: source plus read counter, one critical section.
struct Feed<R> {
    /// Where values come from.
    source: IntSource<R>,
    /// How many values have been claimed so far.
    read: u32,
}

/// Connects to the consumer named by `cfg` and drains `source` into the
/// connection. The connection closes when the pool finishes, which is
/// what tells the consumer the stream is over.
pub fn run<R: BufRead + Send>(
    cfg: &TransferConfig,
    source: IntSource<R>,
) -> Result<DrainSummary> {
    let stream = net::connect_retry(cfg.addr(), cfg.connect_attempts, cfg.retry_interval)?;
    drain(stream, source, cfg.max_values, cfg.producer_workers)
}

/// Drains up to `max_values` from `source` into `sink` with `workers`
/// concurrent threads.
///
/// Workers claim a value and bump the shared counter under one lock,
/// then send outside it, so a slow peer never serializes claiming. The
/// sink is shared without a lock of its own: every frame goes out in a
/// single `write` call (see [`ferry_proto::write_frame`]), so concurrent
/// frames cannot interleave.
///
/// A failed send terminates that worker only; the run still completes
/// and the summary reports how much was actually delivered.
pub fn drain<R, W>(
    sink: W,
    source: IntSource<R>,
    max_values: u32,
    workers: usize,
) -> Result<DrainSummary>
where
    R: BufRead + Send,
    W: Sync,
    for<'a> &'a W: Write,
{
    let shared = Mutex::new(Feed { source, read: 0 });
    let mut sent_total = 0;

    thread::scope(|scope| -> Result<()> {
        let feed = &shared;
        let out = &sink;
        let mut handles = Vec::with_capacity(workers);
        for worker in 0..workers {
            handles.push(
                thread::Builder::new()
                    .name(format!("producer-{worker}"))
                    .spawn_scoped(scope, move || worker_loop(worker, feed, out, max_values))?,
            );
        }
        for handle in handles {
            match handle.join() {
                Ok(sent) => sent_total += sent,
                Err(_) => warn!("producer worker panicked"),
            }
        }
        Ok(())
    })?;

    let read = shared
        .into_inner()
        .unwrap_or_else(PoisonError::into_inner)
        .read;
    debug!(read, sent = sent_total, "producer pool drained");
    Ok(DrainSummary {
        read,
        sent: sent_total,
    })
}

/// One worker: claim a value under the lock, send it outside the lock.
/// Returns how many values this worker delivered.
fn worker_loop<R, W>(worker: usize, feed: &Mutex<Feed<R>>, sink: &W, max_values: u32) -> u32
where
    R: BufRead,
    for<'a> &'a W: Write,
{
    let mut out = sink;
    let mut sent = 0;
    loop {
        let value = {
            let mut guard = feed.lock().unwrap_or_else(PoisonError::into_inner);
            if guard.read >= max_values {
                debug!(worker, "read limit reached");
                break;
            }
            let Some(value) = guard.source.next_value() else {
                debug!(worker, "source exhausted");
                break;
            };
            guard.read += 1;
            info!(worker, value, read = guard.read, "read value");
            value
        };

        if let Err(e) = ferry_proto::write_frame(&mut out, value) {
            warn!(worker, value, error = %e, "send failed; stopping this worker");
            break;
        }
        sent += 1;
    }
    sent
}

#[cfg(test)]
mod tests {
    use std::io::{self, Cursor};
    use std::sync::Arc;

    use super::*;

    /// Concurrent in-memory sink that records every byte written to it.
    #[derive(Clone, Default)]
    struct SinkLog(Arc<Mutex<Vec<u8>>>);

    impl io::Write for &SinkLog {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Sink whose every write fails.
    struct FailSink;

    impl io::Write for &FailSink {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn decode_frames(bytes: &[u8]) -> Vec<i32> {
        assert_eq!(bytes.len() % 4, 0, "sink holds a torn frame");
        bytes
            .chunks_exact(4)
            .map(|chunk| i32::from_be_bytes(chunk.try_into().unwrap()))
            .collect()
    }

    fn source_of(values: &[i32]) -> IntSource<Cursor<String>> {
        let text = values
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        IntSource::new(Cursor::new(text))
    }

    #[test]
    fn drains_exactly_the_source() {
        let log = SinkLog::default();
        let summary = drain(log.clone(), source_of(&[3, -1, 42, 0, 7]), 100, 2).unwrap();
        assert_eq!(summary, DrainSummary { read: 5, sent: 5 });

        let mut got = decode_frames(&log.0.lock().unwrap());
        got.sort_unstable();
        assert_eq!(got, vec![-1, 0, 3, 7, 42]);
    }

    #[test]
    fn honors_the_read_limit() {
        let values: Vec<i32> = (0..50).collect();
        let log = SinkLog::default();
        let summary = drain(log.clone(), source_of(&values), 10, 2).unwrap();
        assert_eq!(summary, DrainSummary { read: 10, sent: 10 });

        let got = decode_frames(&log.0.lock().unwrap());
        assert_eq!(got.len(), 10);
        for value in got {
            assert!((0..50).contains(&value));
        }
    }

    #[test]
    fn contended_pool_loses_and_duplicates_nothing() {
        let values: Vec<i32> = (0..500).map(|i| i * 7 - 1750).collect();
        let log = SinkLog::default();
        let summary = drain(log.clone(), source_of(&values), 500, 8).unwrap();
        assert_eq!(summary, DrainSummary { read: 500, sent: 500 });

        let mut got = decode_frames(&log.0.lock().unwrap());
        got.sort_unstable();
        let mut expected = values;
        expected.sort_unstable();
        assert_eq!(got, expected);
    }

    #[test]
    fn send_failure_stops_the_worker_not_the_run() {
        let values: Vec<i32> = (0..10).collect();
        let summary = drain(FailSink, source_of(&values), 100, 2).unwrap();
        // Each worker claims one value, fails its send, and stops.
        assert_eq!(summary.sent, 0);
        assert_eq!(summary.read, 2);
    }
}
