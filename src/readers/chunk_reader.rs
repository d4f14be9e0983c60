use crate::error::{ProcessingError, Result};
use crate::utils::constants::{DEFAULT_CHUNK_SIZE, DEFAULT_MAX_LINE_LENGTH, LINE_TERMINATOR};
use std::io::{ErrorKind, Read};
use tracing::debug;

/// An owned run of complete rows.
///
/// Every chunk but the last ends with a newline; the last may end at end of
/// stream instead. No row is ever split across two chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkBuffer {
    data: Vec<u8>,
    offset: usize,
}

impl ChunkBuffer {
    pub fn new(data: Vec<u8>, offset: usize) -> Self {
        Self { data, offset }
    }

    /// Position of the chunk's first byte within the whole stream
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

}

/// Splits a byte stream into line-aligned chunks.
///
/// Each read of up to `block_size` bytes is appended to the leftover of the
/// previous read; everything through the last newline becomes a chunk and the
/// unterminated tail is carried into the next iteration. A tail that grows past
/// `max_line_length` without a newline is a fatal fault. At end of stream a
/// non-empty tail is emitted as a final chunk.
pub struct ChunkSplitter<R> {
    source: R,
    block_size: usize,
    max_line_length: usize,
    leftover: Vec<u8>,
    bytes_read: u64,
    bytes_emitted: usize,
    chunks_emitted: u64,
    finished: bool,
}

impl<R: Read> ChunkSplitter<R> {
    pub fn new(source: R) -> Self {
        Self {
            source,
            block_size: DEFAULT_CHUNK_SIZE,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            leftover: Vec::new(),
            bytes_read: 0,
            bytes_emitted: 0,
            chunks_emitted: 0,
            finished: false,
        }
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size.max(1);
        self
    }

    pub fn with_max_line_length(mut self, max_line_length: usize) -> Self {
        self.max_line_length = max_line_length;
        self
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn chunks_emitted(&self) -> u64 {
        self.chunks_emitted
    }

    /// Read once into the spare capacity of `buf`, retrying on interrupts
    fn read_block(&mut self, buf: &mut Vec<u8>) -> Result<usize> {
        let start = buf.len();
        buf.resize(start + self.block_size, 0);
        let read = loop {
            match self.source.read(&mut buf[start..]) {
                Ok(n) => break n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    buf.truncate(start);
                    return Err(e.into());
                }
            }
        };
        buf.truncate(start + read);
        self.bytes_read += read as u64;
        Ok(read)
    }

    fn next_chunk(&mut self) -> Result<Option<ChunkBuffer>> {
        loop {
            let mut buf = std::mem::take(&mut self.leftover);
            let start = buf.len();
            let read = self.read_block(&mut buf)?;

            if read == 0 {
                // End of stream terminates any unfinished last row
                self.finished = true;
                if buf.is_empty() {
                    return Ok(None);
                }
                debug!(bytes = buf.len(), "flushing unterminated final row");
                return Ok(Some(self.emit(buf)));
            }

            // Only the fresh bytes can hold a newline, the leftover never does
            match buf[start..].iter().rposition(|&b| b == LINE_TERMINATOR) {
                Some(index) => {
                    self.leftover = buf.split_off(start + index + 1);
                    self.check_leftover()?;
                    return Ok(Some(self.emit(buf)));
                }
                None => {
                    self.leftover = buf;
                    self.check_leftover()?;
                }
            }
        }
    }

    fn check_leftover(&mut self) -> Result<()> {
        if self.leftover.len() > self.max_line_length {
            self.finished = true;
            return Err(ProcessingError::OversizedLine {
                length: self.leftover.len(),
                limit: self.max_line_length,
            });
        }
        Ok(())
    }

    fn emit(&mut self, data: Vec<u8>) -> ChunkBuffer {
        let offset = self.bytes_emitted;
        self.bytes_emitted += data.len();
        self.chunks_emitted += 1;
        ChunkBuffer::new(data, offset)
    }
}

impl<R: Read> Iterator for ChunkSplitter<R> {
    type Item = Result<ChunkBuffer>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_chunk() {
            Ok(chunk) => chunk.map(Ok),
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
