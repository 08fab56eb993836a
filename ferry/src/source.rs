//! Sequential integer source backed by whitespace-delimited text.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use tracing::warn;

/// Streams `i32`s out of a reader, one token at a time.
///
/// Values are separated by any run of whitespace. The first token that
/// does not parse as an `i32` permanently ends the stream; values before
/// it are still yielded. A read error while refilling also ends the
/// stream (after a warning) rather than aborting the run.
#[derive(Debug)]
pub struct IntSource<R> {
    /// Underlying line-oriented reader.
    reader: R,
    /// Values parsed from the current line, not yet handed out.
    parsed: VecDeque<i32>,
    /// Set once the stream has ended for any reason.
    exhausted: bool,
}

impl IntSource<BufReader<File>> {
    /// Opens a file of whitespace/line-delimited integers.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: BufRead> IntSource<R> {
    /// Wraps any buffered reader.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            parsed: VecDeque::new(),
            exhausted: false,
        }
    }

    /// Returns the next value, or `None` once the source is exhausted.
    ///
    /// Exhaustion is permanent: every later call also returns `None`.
    pub fn next_value(&mut self) -> Option<i32> {
        loop {
            if let Some(value) = self.parsed.pop_front() {
                return Some(value);
            }
            if self.exhausted {
                return None;
            }
            self.refill();
        }
    }

    /// Reads one more line and parses its tokens into `self.parsed`.
    fn refill(&mut self) {
        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) => self.exhausted = true,
            Ok(_) => {
                for token in line.split_whitespace() {
                    match token.parse::<i32>() {
                        Ok(value) => self.parsed.push_back(value),
                        Err(_) => {
                            // Malformed token ends the stream, scanf-style.
                            self.exhausted = true;
                            break;
                        }
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "read error on the data source; treating it as exhausted");
                self.exhausted = true;
            }
        }
    }
}
