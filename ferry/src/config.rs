//! Run configuration shared by both sides of a transfer.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables for one producer-to-consumer run.
///
/// Both processes must agree on `port`; everything else is advisory for
/// the side that reads it. The defaults describe the stock demo run: up
/// to 100 values into a 100-slot buffer, two workers on each side.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct TransferConfig {
    /// TCP port the consumer listens on (loopback only).
    pub port: u16,
    /// Maximum number of values the producer reads from its source.
    pub max_values: u32,
    /// Capacity of the consumer's bounded buffer.
    pub capacity: usize,
    /// Producer-side worker thread count.
    pub producer_workers: usize,
    /// Consumer-side worker thread count.
    pub consumer_workers: usize,
    /// Connect attempts before the producer gives up on the consumer.
    pub connect_attempts: u32,
    /// Pause between connect attempts.
    pub retry_interval: Duration,
    /// How long the consumer waits for a producer before exiting.
    pub accept_timeout: Duration,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            port: ferry_proto::DEFAULT_PORT,
            max_values: 100,
            capacity: 100,
            producer_workers: 2,
            consumer_workers: 2,
            connect_attempts: 50,
            retry_interval: Duration::from_millis(100),
            accept_timeout: Duration::from_secs(5),
        }
    }
}

impl TransferConfig {
    /// Loopback endpoint both sides use for this run.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), self.port)
    }
}
