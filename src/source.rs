//! Byte-chunk sources feeding the row decoder.
//!
//! A [`ChunkSource`] hands the decoder an ordered, finite sequence of byte
//! buffers. Chunk boundaries carry no meaning: a chunk may end in the
//! middle of a row, a quoted field, or a multi-byte character. Transport
//! concerns (fetching, retries, decompression) live outside this crate;
//! anything that implements `io::Read` can be wrapped in a [`ReadSource`].

use std::{
    collections::VecDeque,
    fs::File,
    io::{self, BufReader, Read},
    path::Path,
};

pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

pub trait ChunkSource {
    /// Identifier for this stream (URL or path), used in diff records and
    /// error messages.
    fn label(&self) -> &str;

    /// Returns the next chunk, or `None` once the stream is exhausted.
    fn next_chunk(&mut self) -> io::Result<Option<Vec<u8>>>;
}

/// A source over buffers already held in memory.
#[derive(Debug, Clone)]
pub struct MemorySource {
    label: String,
    chunks: VecDeque<Vec<u8>>,
}

impl MemorySource {
    pub fn new(label: impl Into<String>, chunks: Vec<Vec<u8>>) -> Self {
        MemorySource {
            label: label.into(),
            chunks: chunks.into(),
        }
    }

    /// Wraps one contiguous buffer as a single-chunk source.
    pub fn from_bytes(label: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        MemorySource::new(label, vec![bytes.into()])
    }
}

impl ChunkSource for MemorySource {
    fn label(&self) -> &str {
        &self.label
    }

    fn next_chunk(&mut self) -> io::Result<Option<Vec<u8>>> {
        Ok(self.chunks.pop_front())
    }
}

/// Pulls fixed-size chunks from any `io::Read`.
pub struct ReadSource<R: Read> {
    label: String,
    reader: R,
    chunk_size: usize,
    done: bool,
}

impl<R: Read> ReadSource<R> {
    pub fn new(label: impl Into<String>, reader: R) -> Self {
        ReadSource {
            label: label.into(),
            reader,
            chunk_size: DEFAULT_CHUNK_SIZE,
            done: false,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }
}

impl ReadSource<BufReader<File>> {
    pub fn from_path(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(ReadSource::new(
            path.display().to_string(),
            BufReader::new(file),
        ))
    }
}

impl<R: Read> ChunkSource for ReadSource<R> {
    fn label(&self) -> &str {
        &self.label
    }

    fn next_chunk(&mut self) -> io::Result<Option<Vec<u8>>> {
        if self.done {
            return Ok(None);
        }
        let mut buf = vec![0u8; self.chunk_size];
        let read = self.reader.read(&mut buf)?;
        if read == 0 {
            self.done = true;
            return Ok(None);
        }
        buf.truncate(read);
        Ok(Some(buf))
    }
}
