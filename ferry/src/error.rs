//! Error types for ferry operations.

use std::net::SocketAddr;

/// Alias for `Result<T, ferry::Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by transfer setup and process management.
///
/// Worker-level failures (a send or receive that dies mid-run) are not
/// errors at this level: they terminate the affected worker and the run
/// completes with whatever the surviving workers moved.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The consumer endpoint never became reachable within the retry budget.
    #[error("no consumer listening at {addr} after {attempts} connect attempts")]
    ConnectRetriesExhausted {
        /// Address the producer tried to reach.
        addr: SocketAddr,
        /// Attempts made before giving up.
        attempts: u32,
    },

    /// The consumer executable could not be started.
    #[error("failed to launch consumer `{program}`")]
    Spawn {
        /// Program that was being launched.
        program: String,
        /// Underlying spawn error.
        #[source]
        source: std::io::Error,
    },

    /// An I/O error during transport setup or teardown.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
