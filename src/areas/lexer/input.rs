use crate::artifacts::core::Position;
use crate::artifacts::core::error::{ParseError, StreamError};
use std::io::{self, BufRead};

/// Line-oriented view of the input with one line of push-back
///
/// Command lines are read whole; payload bytes are read raw so that data
/// sections never pass through the line buffer.
pub(crate) struct Input<R> {
    reader: R,
    line: Vec<u8>,
    has_line: bool,
    replay: bool,
    eof: bool,
    line_no: u64,
    line_start: u64,
    consumed: u64,
}

impl<R: BufRead> Input<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: Vec::new(),
            has_line: false,
            replay: false,
            eof: false,
            line_no: 0,
            line_start: 0,
            consumed: 0,
        }
    }

    /// Advance to the next line, replaying an unread one first
    ///
    /// # Returns
    ///
    /// `false` at the end of the input
    pub fn read_line(&mut self) -> io::Result<bool> {
        if self.replay {
            self.replay = false;
            return Ok(self.has_line);
        }

        self.line.clear();
        self.has_line = false;
        if self.eof {
            return Ok(false);
        }

        let n = self.reader.read_until(b'\n', &mut self.line)?;
        if n == 0 {
            self.eof = true;
            return Ok(false);
        }

        self.line_start = self.consumed;
        self.consumed += n as u64;
        self.line_no += 1;
        if self.line.last() == Some(&b'\n') {
            self.line.pop();
        } else {
            self.eof = true;
        }
        self.has_line = true;
        Ok(true)
    }

    /// Make the next [`Input::read_line`] return the current line again
    pub fn unread(&mut self) {
        self.replay = true;
    }

    /// Current line without its LF, empty at the end of the input
    pub fn line(&self) -> &[u8] {
        if self.has_line { &self.line } else { &[] }
    }

    pub fn has_line(&self) -> bool {
        self.has_line
    }

    pub fn position(&self, command: u64) -> Position {
        Position::new(command, self.line_no, self.line_start)
    }

    pub fn error(&self, command: u64, kind: impl Into<ParseError>) -> StreamError {
        StreamError::Parse {
            kind: kind.into(),
            position: self.position(command),
        }
    }

    /// Read raw payload bytes
    pub fn read_payload(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        debug_assert!(!self.replay, "payload read with a line pushed back");
        let n = self.reader.read(buf)?;
        self.account(&buf[..n]);
        Ok(n)
    }

    /// Read payload bytes into `buf`, stopping right after the first LF
    ///
    /// At most `buf.len()` bytes are taken, so a long line arrives in
    /// several pieces.
    pub fn read_payload_until_lf(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        debug_assert!(!self.replay, "payload read with a line pushed back");
        let mut filled = 0;
        while filled < buf.len() {
            let available = self.reader.fill_buf()?;
            if available.is_empty() {
                break;
            }
            let window = &available[..available.len().min(buf.len() - filled)];
            let (n, line_end) = match memchr::memchr(b'\n', window) {
                Some(i) => (i + 1, true),
                None => (window.len(), false),
            };
            buf[filled..filled + n].copy_from_slice(&window[..n]);
            self.reader.consume(n);
            filled += n;
            if line_end {
                break;
            }
        }
        self.account(&buf[..filled]);
        Ok(filled)
    }

    fn account(&mut self, bytes: &[u8]) {
        self.line_no += memchr::memchr_iter(b'\n', bytes).count() as u64;
        self.consumed += bytes.len() as u64;
    }
}
