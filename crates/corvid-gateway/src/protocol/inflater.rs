//! zlib-stream transport decompression
//!
//! With `compress=zlib-stream` the whole connection is one zlib stream. A
//! message may span several binary frames and is complete once the buffered
//! input ends with the sync-flush suffix `00 00 FF FF`. The context is shared
//! by every message on a connection and must be reset between connections.

use flate2::{Decompress, FlushDecompress, Status};

const ZLIB_SUFFIX: [u8; 4] = [0x00, 0x00, 0xFF, 0xFF];
const INITIAL_OUTPUT: usize = 32 * 1024;

#[derive(Debug)]
pub struct Inflater {
    decompress: Decompress,
    input: Vec<u8>,
    output: Vec<u8>,
}

impl Inflater {
    #[must_use]
    pub fn new() -> Self {
        Self {
            decompress: Decompress::new(true),
            input: Vec::new(),
            output: Vec::with_capacity(INITIAL_OUTPUT),
        }
    }

    /// Feed one binary frame; returns the decoded text once a message completes
    pub fn push(&mut self, frame: &[u8]) -> Result<Option<String>, InflateError> {
        self.input.extend_from_slice(frame);
        if !self.input.ends_with(&ZLIB_SUFFIX) {
            return Ok(None);
        }

        self.output.clear();
        let mut offset = 0;
        loop {
            if self.output.len() == self.output.capacity() {
                self.output.reserve(self.output.capacity().max(INITIAL_OUTPUT));
            }
            let before_in = self.decompress.total_in();
            let before_out = self.decompress.total_out();
            let status = self.decompress.decompress_vec(
                &self.input[offset..],
                &mut self.output,
                FlushDecompress::Sync,
            )?;
            offset += (self.decompress.total_in() - before_in) as usize;
            let progressed =
                self.decompress.total_in() > before_in || self.decompress.total_out() > before_out;

            // spare output left over means zlib has flushed everything it can
            let drained = self.output.len() < self.output.capacity();
            if status == Status::StreamEnd || (drained && (offset >= self.input.len() || !progressed)) {
                break;
            }
        }
        self.input.clear();

        let text = String::from_utf8(std::mem::take(&mut self.output))?;
        self.output = Vec::with_capacity(INITIAL_OUTPUT);
        Ok(Some(text))
    }

    /// Start a fresh stream for a new connection
    pub fn reset(&mut self) {
        self.decompress.reset(true);
        self.input.clear();
        self.output.clear();
    }

    /// Bytes buffered waiting for the end of a message
    pub fn pending(&self) -> usize {
        self.input.len()
    }
}

impl Default for Inflater {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InflateError {
    #[error("zlib error: {0}")]
    Zlib(#[from] flate2::DecompressError),

    #[error("inflated frame is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}
