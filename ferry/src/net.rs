//! Transport setup: bounded accept on the consumer side, connect-with-retry
//! on the producer side.

use std::io;
#[cfg(unix)]
use std::net::TcpListener;
use std::net::{SocketAddr, TcpStream};
#[cfg(unix)]
use std::os::fd::AsFd;
use std::thread;
use std::time::Duration;
#[cfg(unix)]
use std::time::Instant;

#[cfg(unix)]
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use tracing::debug;

use crate::{Error, Result};

/// Accepts one connection, waiting at most `timeout`.
///
/// Returns `Ok(None)` when the window expires with no producer, the
/// consumer's graceful no-show path. The wait is a `poll(2)` on a
/// temporarily nonblocking listener: a pending connection can be reset
/// between a readable poll and the accept, and a blocking accept would
/// then overstay the window waiting for the next arrival. `EINTR`
/// restarts the wait with the remaining time. Listener and accepted
/// stream both come back in blocking mode.
#[cfg(unix)]
pub fn accept_timeout(
    listener: &TcpListener,
    timeout: Duration,
) -> io::Result<Option<TcpStream>> {
    let deadline = Instant::now() + timeout;
    listener.set_nonblocking(true)?;
    let accepted = poll_accept(listener, deadline);
    listener.set_nonblocking(false)?;

    let Some((stream, peer)) = accepted? else {
        return Ok(None);
    };
    stream.set_nonblocking(false)?;
    debug!(%peer, "producer connected");
    Ok(Some(stream))
}

/// Poll-then-accept loop behind [`accept_timeout`]; the listener must
/// already be nonblocking.
#[cfg(unix)]
fn poll_accept(
    listener: &TcpListener,
    deadline: Instant,
) -> io::Result<Option<(TcpStream, SocketAddr)>> {
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Ok(None);
        }
        let mut fds = [PollFd::new(listener.as_fd(), PollFlags::POLLIN)];
        match poll(
            &mut fds,
            PollTimeout::try_from(remaining).unwrap_or(PollTimeout::MAX),
        ) {
            Ok(0) => return Ok(None),
            Ok(_) => {}
            Err(nix::errno::Errno::EINTR) => continue,
            Err(e) => return Err(io::Error::from(e)),
        }
        match listener.accept() {
            Ok(pair) => return Ok(Some(pair)),
            // The pending connection went away between poll and accept.
            Err(e) if retriable_accept(&e) => {}
            Err(e) => return Err(e),
        }
    }
}

/// Accept failures that mean "wait again", not "give up".
#[cfg(unix)]
fn retriable_accept(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::Interrupted
    )
}

/// Connects to the consumer, retrying while it starts up.
///
/// Each attempt opens a fresh socket. Only the failures that mean
/// "nobody listening yet" (connection refused, network unreachable) are
/// retried after `interval`; any other error is immediately fatal.
/// Exhausting `attempts` yields [`Error::ConnectRetriesExhausted`].
pub fn connect_retry(
    addr: SocketAddr,
    attempts: u32,
    interval: Duration,
) -> Result<TcpStream> {
    for attempt in 1..=attempts {
        match TcpStream::connect(addr) {
            Ok(stream) => {
                debug!(%addr, attempt, "connected to consumer");
                return Ok(stream);
            }
            Err(e) if is_not_ready(&e) => {
                debug!(%addr, attempt, error = %e, "consumer not ready");
                if attempt < attempts {
                    thread::sleep(interval);
                }
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(Error::ConnectRetriesExhausted { addr, attempts })
}

/// `true` for the connect failures that mean the consumer is not up yet.
fn is_not_ready(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused | io::ErrorKind::NetworkUnreachable
    )
}

#[cfg(test)]
mod tests {
    #[cfg(unix)]
    use std::io::{Read as _, Write as _};
    use std::net::TcpListener;

    use super::*;

    /// Binds an ephemeral port and frees it again, returning the address.
    fn free_addr() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    }

    #[cfg(unix)]
    #[test]
    fn accepts_a_connection_within_the_window() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = thread::spawn(move || {
            let mut stream = TcpStream::connect(addr).unwrap();
            stream.write_all(&[0, 0, 0, 9]).unwrap();
        });
        let mut accepted = accept_timeout(&listener, Duration::from_secs(5))
            .unwrap()
            .expect("no connection within the window");
        // A blocking read proves the accepted stream did not stay
        // nonblocking.
        let mut frame = [0_u8; 4];
        accepted.read_exact(&mut frame).unwrap();
        assert_eq!(frame, [0, 0, 0, 9]);
        client.join().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn times_out_when_nobody_connects() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let started = Instant::now();
        let accepted = accept_timeout(&listener, Duration::from_millis(50)).unwrap();
        assert!(accepted.is_none());
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[cfg(unix)]
    #[test]
    fn leaves_the_listener_blocking_after_a_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = accept_timeout(&listener, Duration::from_millis(50)).unwrap();
        assert!(accepted.is_none());

        let client = thread::spawn(move || {
            thread::sleep(Duration::from_millis(80));
            drop(TcpStream::connect(addr).unwrap());
        });
        // Must block until the late client arrives, not fail with
        // `WouldBlock`.
        let (stream, _) = listener.accept().unwrap();
        drop(stream);
        client.join().unwrap();
    }

    #[test]
    fn retries_until_a_late_listener_appears() {
        let addr = free_addr();
        let server = thread::spawn(move || {
            thread::sleep(Duration::from_millis(80));
            let listener = TcpListener::bind(addr).unwrap();
            listener.accept().unwrap();
        });
        let stream = connect_retry(addr, 50, Duration::from_millis(10)).unwrap();
        drop(stream);
        server.join().unwrap();
    }

    #[test]
    fn gives_up_after_the_attempt_budget() {
        let addr = free_addr();
        let err = connect_retry(addr, 3, Duration::from_millis(10)).unwrap_err();
        match err {
            Error::ConnectRetriesExhausted { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("unexpected error: {other}"),
        }
    }
}
