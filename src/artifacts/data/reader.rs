//! Bounded streaming of a pending payload
//!
//! Once the lexer has read a blob's `data` line the payload is left in the
//! input. A [`DataReader`] hands it out in caller-sized pieces so that no
//! more than one chunk is resident at a time, even for a single long
//! delimited line.

use crate::areas::lexer::Lexer;
use crate::artifacts::core::error::StreamError;
use std::io::{self, BufRead, Read};

/// Size of the buffer used when copying a payload through
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Source of a payload that is read incrementally
pub trait DataSource {
    /// Byte count from the `data` line, if it was counted
    fn declared_len(&self) -> Option<u64>;

    /// Read the next piece of the payload, `Ok(0)` once it is exhausted
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, StreamError>;
}

/// Output that takes a blob while a hook streams its payload
pub trait PayloadTee {
    /// Write everything that precedes the payload
    fn start(&mut self) -> Result<(), StreamError>;

    fn copy(&mut self, chunk: &[u8]) -> Result<(), StreamError>;
}

/// Payload of the blob the lexer returned last
pub struct DataReader<'a, R> {
    lexer: &'a mut Lexer<R>,
}

impl<'a, R: BufRead> DataReader<'a, R> {
    pub(crate) fn new(lexer: &'a mut Lexer<R>) -> Self {
        Self { lexer }
    }

    /// Discard whatever is left of the payload
    ///
    /// # Returns
    ///
    /// Number of payload bytes skipped
    pub fn skip_rest(&mut self) -> Result<u64, StreamError> {
        self.lexer.skip_data()
    }
}

impl<R: BufRead> DataSource for DataReader<'_, R> {
    fn declared_len(&self) -> Option<u64> {
        self.lexer.pending_len()
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, StreamError> {
        self.lexer.read_data(buf)
    }
}

impl<R: BufRead> Read for DataReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.lexer.read_data(buf).map_err(io::Error::from)
    }
}

/// Feed the rest of `source` to `sink` one chunk at a time
///
/// # Returns
///
/// Number of bytes passed to `sink`
pub fn stream_to<E>(
    source: &mut dyn DataSource,
    mut sink: impl FnMut(&[u8]) -> Result<(), E>,
) -> Result<u64, E>
where
    E: From<StreamError>,
{
    let mut buf = vec![0; CHUNK_SIZE];
    let mut total = 0;
    loop {
        let n = source.read_chunk(&mut buf)?;
        if n == 0 {
            return Ok(total);
        }
        sink(&buf[..n])?;
        total += n as u64;
    }
}
