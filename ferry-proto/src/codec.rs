//! Fixed-width frame codec over any `Read`/`Write` stream.
//!
//! Each frame is exactly 4 bytes: one `i32` in network byte order.

use std::io::{self, Read, Write};

/// Size of one frame on the wire, in bytes.
pub const FRAME_LEN: usize = 4;

/// Encodes a value as one network byte order frame.
pub const fn encode(value: i32) -> [u8; FRAME_LEN] {
    value.to_be_bytes()
}

/// Decodes one network byte order frame back into a value.
pub const fn decode(frame: [u8; FRAME_LEN]) -> i32 {
    i32::from_be_bytes(frame)
}

/// Encodes `value` and writes the frame with a single `write` call.
///
/// Senders may share the underlying stream without a lock, so a partial
/// frame must not be completed with a second call — the retry could
/// interleave with another sender's frame. A short write is therefore an
/// error and the frame is considered lost.
pub fn write_frame<W: Write>(w: &mut W, value: i32) -> io::Result<()> {
    let frame = encode(value);
    let written = loop {
        match w.write(&frame) {
            Ok(n) => break n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    };
    if written != FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::WriteZero,
            format!("short frame write ({written} of {FRAME_LEN} bytes)"),
        ));
    }
    w.flush()
}

/// Reads one frame from `r` and decodes it.
///
/// Returns `Ok(None)` when the stream is closed at a frame boundary (the
/// peer's graceful end-of-stream). Partial deliveries are accumulated until
/// the frame is complete; a close in the middle of a frame is an
/// [`io::ErrorKind::UnexpectedEof`] error.
pub fn read_frame<R: Read>(r: &mut R) -> io::Result<Option<i32>> {
    let mut frame = [0u8; FRAME_LEN];
    let mut filled = 0;
    while filled < FRAME_LEN {
        match r.read(&mut frame[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("connection closed mid-frame ({filled} of {FRAME_LEN} bytes)"),
                ));
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(Some(decode(frame)))
}
