//! Balanced-brace frame decoder for the bridge wire format.
//!
//! The wire carries concatenated JSON objects with no length prefix and no
//! separator, so frames must be split by brace balance. A regex split on
//! `}{` boundaries breaks on nested objects and on braces inside string
//! literals; this decoder scans byte-by-byte, tracking brace depth, string
//! state, and escapes, so `{"kwargs": {"a": "}"}}` comes out as exactly one
//! frame.
//!
//! The decoder is incremental: [`FrameDecoder::feed`] may receive any split
//! of the stream (half a frame, three frames, a frame plus a fragment) and
//! [`FrameDecoder::next_frame`] yields complete objects as they close.

use crowdarm_types::ArmError;

/// Incremental splitter of a byte stream into balanced-brace JSON frames.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    /// Next byte to scan; everything before it has been classified.
    scan: usize,
    /// Index of the `{` opening the frame currently being scanned.
    start: Option<usize>,
    depth: usize,
    in_string: bool,
    escaped: bool,
}

impl FrameDecoder {
    /// Create an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw bytes from the stream.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Extract the next complete frame, if one has closed.
    ///
    /// Returns `Ok(None)` when more bytes are needed.
    ///
    /// # Errors
    ///
    /// [`ArmError::Decode`] on a non-whitespace byte outside any object, or
    /// on invalid UTF-8 within a frame. The decoder is not recoverable
    /// after an error; the connection should be dropped.
    pub fn next_frame(&mut self) -> Result<Option<String>, ArmError> {
        while self.scan < self.buf.len() {
            let byte = self.buf[self.scan];

            if self.start.is_none() {
                match byte {
                    b'{' => {
                        self.start = Some(self.scan);
                        self.depth = 1;
                    }
                    b if b.is_ascii_whitespace() => {}
                    b => {
                        return Err(ArmError::Decode(format!(
                            "unexpected byte 0x{b:02x} between frames"
                        )));
                    }
                }
            } else if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if byte == b'\\' {
                    self.escaped = true;
                } else if byte == b'"' {
                    self.in_string = false;
                }
            } else {
                match byte {
                    b'"' => self.in_string = true,
                    b'{' => self.depth += 1,
                    b'}' => {
                        self.depth -= 1;
                        if self.depth == 0
                            && let Some(start) = self.start.take()
                        {
                            let frame = String::from_utf8(self.buf[start..=self.scan].to_vec())
                                .map_err(|e| ArmError::Decode(e.to_string()))?;
                            self.buf.drain(..=self.scan);
                            self.scan = 0;
                            return Ok(Some(frame));
                        }
                    }
                    _ => {}
                }
            }
            self.scan += 1;
        }
        Ok(None)
    }

    /// True if a partial frame is buffered.
    pub fn has_partial(&self) -> bool {
        self.start.is_some()
    }
}
