//! Newline framing over a byte stream.
//!
//! Bytes arrive in arbitrary chunks; the framer buffers them and yields one
//! complete line at a time, so a request split across reads is parsed once
//! and pipelined requests in a single read are each seen in order.

use super::errors::DispatchError;

#[derive(Debug)]
pub(crate) struct LineFramer {
    buffer: Vec<u8>,
    scanned: usize,
    max_line_bytes: usize,
}

impl LineFramer {
    pub(crate) fn new(max_line_bytes: usize) -> Self {
        Self {
            buffer: Vec::new(),
            scanned: 0,
            max_line_bytes,
        }
    }

    pub(crate) fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Pops the next complete line without its terminator.
    ///
    /// A trailing `\r` is left in place; JSON parsing treats it as whitespace.
    pub(crate) fn next_line(&mut self) -> Result<Option<Vec<u8>>, DispatchError> {
        let unscanned = self.buffer.get(self.scanned..).unwrap_or_default();
        let Some(offset) = unscanned.iter().position(|byte| *byte == b'\n') else {
            self.scanned = self.buffer.len();
            if self.buffer.len() > self.max_line_bytes {
                return Err(DispatchError::request_too_large(
                    self.buffer.len(),
                    self.max_line_bytes,
                ));
            }
            return Ok(None);
        };

        let end = self.scanned + offset;
        let mut line: Vec<u8> = self.buffer.drain(..=end).collect();
        line.pop();
        self.scanned = 0;
        if line.len() > self.max_line_bytes {
            return Err(DispatchError::request_too_large(
                line.len(),
                self.max_line_bytes,
            ));
        }
        Ok(Some(line))
    }

    /// Bytes buffered after the last complete line.
    pub(crate) fn pending(&self) -> usize {
        self.buffer.len()
    }
}
