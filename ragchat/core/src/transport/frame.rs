//! Frame Protocol
//!
//! Decoder for the line-delimited event stream returned by the turn endpoint.
//!
//! # Frame Format
//!
//! ```text
//! data: {"token":"Hello "}\n
//! \n
//! data: {"done":true,"conversation_id":"c1","chunks":[]}\n
//! \n
//! ```
//!
//! Each frame is one line carrying the `data:` marker followed by a JSON
//! payload. Blank separator lines, `event:` lines and `:` comments carry no
//! payload and are skipped.
//!
//! # Partial Reads
//!
//! Network reads split the stream at arbitrary byte offsets, including in the
//! middle of a multi-byte UTF-8 sequence. The decoder buffers raw bytes and
//! only converts a line to text once its terminating `\n` has arrived, so a
//! trailing partial line is always carried over to the next read intact.
//!
//! # Security
//!
//! - A line may not grow past `max_frame_bytes` without a line break; this
//!   bounds memory when a peer never terminates a line.

use crate::error::TurnError;

/// Marker that introduces a payload line
pub const DATA_PREFIX: &str = "data:";

/// Default maximum line length (1 MiB)
pub const DEFAULT_MAX_FRAME_BYTES: usize = 1024 * 1024;

/// Minimum buffer capacity for decoder
const MIN_BUFFER_CAPACITY: usize = 4096;

/// Extract the payload of a single complete line
///
/// Returns `None` for lines without the data marker and for empty payloads.
#[must_use]
pub fn parse_data_line(line: &str) -> Option<&str> {
    let payload = line.strip_prefix(DATA_PREFIX)?.trim();
    (!payload.is_empty()).then_some(payload)
}

/// Decoder state machine for streaming frame parsing
///
/// Buffers incoming bytes and yields complete payloads.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    /// Position where we've consumed up to
    read_pos: usize,
    /// Bytes in `read_pos..scan_pos` hold no line break
    scan_pos: usize,
    max_frame_bytes: usize,
    /// Payload lines yielded so far
    frames: u64,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    /// Create a new decoder with the default line limit
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_frame_bytes(DEFAULT_MAX_FRAME_BYTES)
    }

    /// Create a decoder with a custom line limit
    #[must_use]
    pub fn with_max_frame_bytes(max_frame_bytes: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(MIN_BUFFER_CAPACITY),
            read_pos: 0,
            scan_pos: 0,
            max_frame_bytes,
            frames: 0,
        }
    }

    /// Append bytes to the buffer
    pub fn push(&mut self, data: &[u8]) {
        if self.read_pos == self.buffer.len() {
            self.buffer.clear();
            self.read_pos = 0;
            self.scan_pos = 0;
        } else if self.read_pos > self.buffer.len() / 2 && self.read_pos > MIN_BUFFER_CAPACITY {
            self.buffer.drain(..self.read_pos);
            self.scan_pos -= self.read_pos;
            self.read_pos = 0;
        }
        self.buffer.extend_from_slice(data);
    }

    /// Get the number of bytes buffered but not yet consumed
    #[must_use]
    pub fn available(&self) -> usize {
        self.buffer.len() - self.read_pos
    }

    /// Number of payloads yielded so far
    #[must_use]
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Try to decode the next payload
    ///
    /// Returns:
    /// - `Ok(Some(payload))` if a complete data line was found
    /// - `Ok(None)` if more data is needed
    /// - `Err(TurnError::FrameTooLarge)` if a line exceeds the limit
    pub fn next_payload(&mut self) -> Result<Option<String>, TurnError> {
        loop {
            let pending_len = self.buffer.len() - self.read_pos;
            let resume = self.scan_pos.max(self.read_pos);
            let Some(offset) = self.buffer[resume..].iter().position(|&b| b == b'\n') else {
                self.scan_pos = self.buffer.len();
                if pending_len > self.max_frame_bytes {
                    return Err(self.too_large(pending_len));
                }
                return Ok(None);
            };
            let newline = resume - self.read_pos + offset;

            if newline > self.max_frame_bytes {
                return Err(self.too_large(newline));
            }

            let line_end = self.read_pos + newline;
            let line = Self::line_text(&self.buffer[self.read_pos..line_end]);
            self.read_pos = line_end + 1;
            self.scan_pos = self.read_pos;

            if let Some(payload) = parse_data_line(&line) {
                self.frames += 1;
                return Ok(Some(payload.to_string()));
            }
        }
    }

    /// Decode every payload currently available
    pub fn drain(&mut self) -> Result<Vec<String>, TurnError> {
        let mut payloads = Vec::new();
        while let Some(payload) = self.next_payload()? {
            payloads.push(payload);
        }
        Ok(payloads)
    }

    /// Flush a final line that was never terminated
    ///
    /// Called once the body is exhausted. Anything left in the buffer is the
    /// last line of the stream.
    pub fn finish(&mut self) -> Option<String> {
        let rest = Self::line_text(&self.buffer[self.read_pos..]);
        self.clear();
        let payload = parse_data_line(&rest)?.to_string();
        self.frames += 1;
        Some(payload)
    }

    /// Clear the buffer
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.read_pos = 0;
        self.scan_pos = 0;
    }

    fn line_text(bytes: &[u8]) -> String {
        let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
        String::from_utf8_lossy(bytes).into_owned()
    }

    fn too_large(&self, size: usize) -> TurnError {
        TurnError::FrameTooLarge {
            size,
            max: self.max_frame_bytes,
        }
    }
}
