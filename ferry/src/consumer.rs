//! Consumer side: bounded accept, then collect frames into the buffer.

use std::io::Read;
#[cfg(unix)]
use std::net::TcpListener;
use std::sync::{Mutex, PoisonError};
use std::thread;

use tracing::{debug, info, warn};

use crate::Result;
#[cfg(unix)]
use crate::TransferConfig;
use crate::buffer::BoundedBuffer;
#[cfg(unix)]
use crate::net;

/// Binds the run's loopback endpoint, waits for the single producer, and
/// collects until end-of-stream or a full buffer.
///
/// `Ok(None)` is the graceful no-show: the accept window expired with no
/// producer connecting. The listener is dropped as soon as the
/// connection is accepted; a process serves one transfer.
#[cfg(unix)]
pub fn serve(cfg: &TransferConfig) -> Result<Option<BoundedBuffer>> {
    let listener = TcpListener::bind(cfg.addr())?;
    info!(addr = %listener.local_addr()?, "listening for the producer");

    let Some(stream) = net::accept_timeout(&listener, cfg.accept_timeout)? else {
        return Ok(None);
    };
    drop(listener);

    let buffer = collect(stream, cfg.capacity, cfg.consumer_workers)?;
    info!(
        stored = buffer.len(),
        capacity = buffer.capacity(),
        "collection complete"
    );
    Ok(Some(buffer))
}

/// Receives frames from `stream` into a fresh bounded buffer with
/// `workers` concurrent threads, until the peer closes or the buffer
/// fills.
///
/// Frame extraction is serialized by a lock of its own: TCP hands back
/// bytes with no frame alignment, so two workers mid-read would
/// interleave partial frames and reassemble values nobody sent. The
/// buffer lock is separate and covers only the full-check and the
/// append; a worker waiting for bytes never holds it. A value that
/// arrives after another worker has taken the last slot is dropped with
/// a warning, so the buffer never exceeds its capacity.
///
/// A failed receive terminates that worker only; the rest of the pool
/// keeps collecting.
pub fn collect<S>(stream: S, capacity: usize, workers: usize) -> Result<BoundedBuffer>
where
    S: Read + Send,
{
    let feed = Mutex::new(stream);
    let shared = Mutex::new(BoundedBuffer::new(capacity));

    thread::scope(|scope| -> Result<()> {
        let buffer = &shared;
        let input = &feed;
        let mut handles = Vec::with_capacity(workers);
        for worker in 0..workers {
            handles.push(
                thread::Builder::new()
                    .name(format!("consumer-{worker}"))
                    .spawn_scoped(scope, move || worker_loop(worker, buffer, input))?,
            );
        }
        for handle in handles {
            if handle.join().is_err() {
                warn!("consumer worker panicked");
            }
        }
        Ok(())
    })?;

    Ok(shared.into_inner().unwrap_or_else(PoisonError::into_inner))
}

/// One worker: full-check under the buffer lock, one whole frame under
/// the feed lock, append under the buffer lock again.
fn worker_loop<S>(worker: usize, buffer: &Mutex<BoundedBuffer>, feed: &Mutex<S>)
where
    S: Read,
{
    loop {
        if buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_full()
        {
            debug!(worker, "buffer full");
            break;
        }

        let frame = {
            let mut input = feed.lock().unwrap_or_else(PoisonError::into_inner);
            ferry_proto::read_frame(&mut *input)
        };
        let value = match frame {
            Ok(Some(value)) => value,
            Ok(None) => {
                debug!(worker, "peer closed the connection");
                break;
            }
            Err(e) => {
                warn!(worker, error = %e, "receive failed; stopping this worker");
                break;
            }
        };

        let mut guard = buffer.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.push(value) {
            Some(index) => info!(worker, value, index, "stored value"),
            None => {
                // Another worker took the last slot during our receive.
                warn!(worker, value, "buffer filled during receive; dropping value");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, Cursor, Read as _};

    use super::*;

    /// Reader that hands out at most one byte per call, so every frame
    /// crosses a read boundary.
    struct Dribble(Cursor<Vec<u8>>);

    impl io::Read for Dribble {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let end = buf.len().min(1);
            self.0.read(&mut buf[..end])
        }
    }

    fn frame_bytes(values: &[i32]) -> Vec<u8> {
        let mut bytes = Vec::new();
        for &value in values {
            ferry_proto::write_frame(&mut bytes, value).unwrap();
        }
        bytes
    }

    fn sorted(buffer: BoundedBuffer) -> Vec<i32> {
        let mut values = buffer.into_values();
        values.sort_unstable();
        values
    }

    #[test]
    fn collects_until_end_of_stream() {
        let feed = Cursor::new(frame_bytes(&[3, -1, 42, 0, 7]));
        let buffer = collect(feed, 100, 2).unwrap();
        assert_eq!(buffer.len(), 5);
        assert_eq!(sorted(buffer), vec![-1, 0, 3, 7, 42]);
    }

    #[test]
    fn stops_at_capacity() {
        let values: Vec<i32> = (0..50).collect();
        let buffer = collect(Cursor::new(frame_bytes(&values)), 10, 4).unwrap();
        assert_eq!(buffer.len(), 10);
        for value in buffer.values() {
            assert!((0..50).contains(value));
        }
    }

    #[test]
    fn contended_pool_stores_every_value_once() {
        let values: Vec<i32> = (0..1000).map(|i| i * 3 - 1500).collect();
        let buffer = collect(Cursor::new(frame_bytes(&values)), 1000, 8).unwrap();
        let mut expected = values;
        expected.sort_unstable();
        assert_eq!(sorted(buffer), expected);
    }

    #[test]
    fn single_byte_reads_cannot_tear_frames() {
        let values: Vec<i32> = (100_000..100_400).collect();
        let feed = Dribble(Cursor::new(frame_bytes(&values)));
        let buffer = collect(feed, 400, 2).unwrap();
        assert_eq!(sorted(buffer), values);
    }

    #[test]
    fn truncated_tail_is_contained() {
        let mut bytes = frame_bytes(&[1, 2, 3]);
        bytes.extend_from_slice(&[0xDE, 0xAD]);
        let buffer = collect(Cursor::new(bytes), 100, 2).unwrap();
        assert_eq!(sorted(buffer), vec![1, 2, 3]);
    }

    #[test]
    fn empty_stream_leaves_an_empty_buffer() {
        let buffer = collect(Cursor::new(Vec::new()), 10, 2).unwrap();
        assert!(buffer.is_empty());
    }
}
