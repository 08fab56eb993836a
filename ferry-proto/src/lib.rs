//! Wire protocol for the ferry producer↔consumer transfer.
//!
//! One value per frame: exactly [`FRAME_LEN`] bytes, an `i32` in network
//! (big-endian) byte order, suitable for any reliable byte stream. There is
//! no header, length prefix, or terminator; end-of-stream is signaled by
//! closing the connection at a frame boundary, not by a sentinel value.

mod codec;

pub use codec::{FRAME_LEN, decode, encode, read_frame, write_frame};

/// Default TCP port the consumer listens on.
pub const DEFAULT_PORT: u16 = 12345;
