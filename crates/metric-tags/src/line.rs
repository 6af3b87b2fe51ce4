//! Newline framing for tokio.
//!
//! Splits a byte stream into lines for [`decode_line`](crate::decode_line).
//! Line terminators (`\n` or `\r\n`) are removed.

use bytes::BytesMut;
use tokio_util::codec::Decoder;
use tracing::warn;

use crate::error::LineError;

/// Default maximum line length, terminator included.
pub const DEFAULT_MAX_LINE_LEN: usize = 65536;

/// What to do with a line longer than the limit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Overflow {
    /// Drop the line, count it and keep reading.
    Skip,
    /// Fail with [`LineError::LineTooLong`].
    Error,
}

/// Line codec for metric feeds.
#[derive(Debug)]
pub struct LineCodec {
    /// Index of next byte to check for newline
    next_index: usize,
    max_len: usize,
    overflow: Overflow,
    /// Inside an over-long line, dropping bytes up to its newline.
    discarding: bool,
    skipped: u64,
}

impl LineCodec {
    /// A codec with [`DEFAULT_MAX_LINE_LEN`] that skips over-long lines.
    pub fn new() -> Self {
        Self::with_max_len(DEFAULT_MAX_LINE_LEN, Overflow::Skip)
    }

    /// A codec with a custom limit and overflow policy.
    pub fn with_max_len(max_len: usize, overflow: Overflow) -> Self {
        Self {
            next_index: 0,
            max_len,
            overflow,
            discarding: false,
            skipped: 0,
        }
    }

    /// Lines dropped for exceeding the limit.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    fn too_long(&mut self, actual: usize) -> Result<(), LineError> {
        match self.overflow {
            Overflow::Error => Err(LineError::LineTooLong {
                actual,
                limit: self.max_len,
            }),
            Overflow::Skip => {
                self.skipped += 1;
                warn!(actual, limit = self.max_len, "dropping over-long line");
                Ok(())
            }
        }
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn trim_terminator(mut line: BytesMut) -> BytesMut {
    if line.last() == Some(&b'\n') {
        line.truncate(line.len() - 1);
        if line.last() == Some(&b'\r') {
            line.truncate(line.len() - 1);
        }
    }
    line
}

impl Decoder for LineCodec {
    type Item = BytesMut;
    type Error = LineError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<BytesMut>, LineError> {
        loop {
            let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') else {
                self.next_index = src.len();
                if !self.discarding && src.len() > self.max_len {
                    self.too_long(src.len())?;
                    self.discarding = true;
                }
                if self.discarding {
                    src.clear();
                    self.next_index = 0;
                }
                return Ok(None);
            };

            let line = src.split_to(self.next_index + offset + 1);
            self.next_index = 0;

            if self.discarding {
                self.discarding = false;
                continue;
            }
            if line.len() > self.max_len {
                self.too_long(line.len())?;
                continue;
            }
            return Ok(Some(trim_terminator(line)));
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<BytesMut>, LineError> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }
        self.next_index = 0;
        if src.is_empty() || self.discarding {
            src.clear();
            self.discarding = false;
            return Ok(None);
        }
        Ok(Some(trim_terminator(src.split())))
    }
}
