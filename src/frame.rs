//! Reassembly of `!`-terminated frames from the raw serial byte stream.

use std::fmt;

use crate::error::DecodeError;
use crate::parser::QueueItem;

/// Character that ends every message from the rig.
pub const TERMINATOR: char = '!';

/// One complete message, terminator included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame(String);

impl Frame {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Accumulates decoded text until a terminator arrives.
#[derive(Debug, Default)]
pub struct FrameReader {
    buffer: String,
}

impl FrameReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends newly arrived bytes and slices off every complete frame.
    ///
    /// The result depends only on the concatenation of all pushed bytes, not on
    /// how they were split into chunks. A chunk with a non-ASCII byte is rejected
    /// as a whole and leaves the buffer untouched.
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<Frame>, DecodeError> {
        let text = decode_ascii(bytes)?;
        self.buffer.push_str(&text);

        let mut frames = Vec::new();
        while let Some(end) = self.buffer.find(TERMINATOR) {
            let rest = self.buffer.split_off(end + TERMINATOR.len_utf8());
            frames.push(Frame(std::mem::replace(&mut self.buffer, rest)));
        }
        Ok(frames)
    }

    /// Forces out whatever text is waiting for a terminator.
    ///
    /// Returns it as a raw item and clears the buffer. A buffer holding only
    /// whitespace is kept and yields nothing.
    pub fn flush_leftover(&mut self) -> Option<QueueItem> {
        let trimmed = self.buffer.trim();
        if trimmed.is_empty() {
            return None;
        }
        let raw = trimmed.to_string();
        self.buffer.clear();
        Some(QueueItem::Raw(raw))
    }

    /// Text received since the last complete frame.
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

/// Strict 7-bit ASCII decoding.
pub fn decode_ascii(bytes: &[u8]) -> Result<String, DecodeError> {
    if let Some(offset) = bytes.iter().position(|b| !b.is_ascii()) {
        return Err(DecodeError {
            byte: bytes[offset],
            offset,
        });
    }
    Ok(bytes.iter().map(|&b| char::from(b)).collect())
}
