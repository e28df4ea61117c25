//! Stream serializer
//!
//! Mirror of the lexer. Commands are packed into an entity buffer that is
//! written out as a whole once the entity is complete, so a failure while
//! packing leaves nothing of that entity in the output. Blob payloads that
//! no hook touched, or that a hook streamed through a [`BlobTee`], bypass
//! the buffer: they are copied from the input in bounded chunks.

use crate::areas::marks::ObjectDigest;
use crate::artifacts::core::Position;
use crate::artifacts::core::error::{PackError, StreamError};
use crate::artifacts::data::body::BodyState;
use crate::artifacts::data::reader::{DataSource, PayloadTee, stream_to};
use crate::artifacts::data::{DataHeader, fits_delimiter, write_block};
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::object::{PackStyle, Packable};
use std::io::Write;

pub struct Serializer<W> {
    writer: W,
    buffer: Vec<u8>,
    style: PackStyle,
    written: u64,
}

impl<W: Write> Serializer<W> {
    pub fn new(writer: W, style: PackStyle) -> Self {
        Self {
            writer,
            buffer: Vec::new(),
            style,
            written: 0,
        }
    }

    /// Pack `command` into the entity buffer, followed by a blank line if
    /// `trailing_lf` is set
    pub fn emit(
        &mut self,
        command: &impl Packable,
        trailing_lf: bool,
        position: Position,
    ) -> Result<(), StreamError> {
        let start = self.buffer.len();
        if let Err(kind) = command.pack(&mut self.buffer, &self.style) {
            self.buffer.truncate(start);
            return Err(StreamError::Pack { kind, position });
        }
        if trailing_lf {
            self.buffer.push(b'\n');
        }
        Ok(())
    }

    /// Like [`Serializer::emit`], also feeding the packed bytes to `digest`
    pub fn emit_hashed(
        &mut self,
        command: &impl Packable,
        trailing_lf: bool,
        position: Position,
        digest: Option<&mut Box<dyn ObjectDigest>>,
    ) -> Result<(), StreamError> {
        let start = self.buffer.len();
        self.emit(command, trailing_lf, position)?;
        if let Some(digest) = digest {
            digest.update(&self.buffer[start..]);
        }
        Ok(())
    }

    /// Bytes packed since the last flush
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    /// Drop everything packed since the last flush
    pub fn discard(&mut self) {
        self.buffer.clear();
    }

    /// Write the entity buffer out
    pub fn flush_entity(&mut self) -> Result<(), StreamError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        self.writer.write_all(&self.buffer)?;
        self.written += self.buffer.len() as u64;
        tracing::trace!(bytes = self.buffer.len(), total = self.written, "flushed entity");
        self.buffer.clear();
        Ok(())
    }

    /// Write a blob with its payload
    ///
    /// A payload still in the input is copied from `source` chunk by chunk
    /// with the framing it was read with. Loaded or replaced payloads keep
    /// a delimited framing only while the content still fits it. A payload
    /// already written through a [`BlobTee`] only gets its closing line.
    pub fn write_blob(
        &mut self,
        blob: &Blob,
        body: BodyState,
        source: &mut dyn DataSource,
        mut digest: Option<&mut Box<dyn ObjectDigest>>,
        position: Position,
    ) -> Result<(), StreamError> {
        match body {
            BodyState::Loaded(bytes) | BodyState::Replaced(bytes) => {
                self.emit(blob, false, position)?;
                let delim = blob
                    .data
                    .delim()
                    .filter(|delim| fits_delimiter(&bytes, delim))
                    .map(|delim| delim.as_slice());
                write_block(&bytes, delim, &mut self.buffer);
                if let Some(digest) = digest.as_deref_mut() {
                    digest.update(&bytes);
                }
                self.flush_entity()
            }
            BodyState::Unread => {
                self.start_blob(blob, position)?;
                stream_to(source, |chunk| self.copy_payload(chunk, digest.as_deref_mut()))?;
                self.end_blob(blob)
            }
            BodyState::Written => self.end_blob(blob),
            BodyState::Consumed => {
                self.discard();
                Err(StreamError::Pack {
                    kind: PackError::BlobConsumed,
                    position,
                })
            }
        }
    }

    /// Write a blob up to and including its `data` line
    fn start_blob(&mut self, blob: &Blob, position: Position) -> Result<(), StreamError> {
        self.emit(blob, false, position)?;
        match &blob.data {
            DataHeader::Counted { len } => {
                self.buffer.extend_from_slice(format!("data {len}\n").as_bytes());
            }
            DataHeader::Delimited { delim } => {
                self.buffer.extend_from_slice(b"data <<");
                self.buffer.extend_from_slice(delim);
                self.buffer.push(b'\n');
            }
        }
        self.flush_entity()
    }

    fn copy_payload(
        &mut self,
        chunk: &[u8],
        digest: Option<&mut Box<dyn ObjectDigest>>,
    ) -> Result<(), StreamError> {
        self.writer.write_all(chunk)?;
        self.written += chunk.len() as u64;
        if let Some(digest) = digest {
            digest.update(chunk);
        }
        Ok(())
    }

    fn end_blob(&mut self, blob: &Blob) -> Result<(), StreamError> {
        if let DataHeader::Delimited { delim } = &blob.data {
            self.buffer.extend_from_slice(delim);
            self.buffer.push(b'\n');
        }
        self.flush_entity()
    }

    /// Append a bare line feed to the entity buffer
    pub fn blank_line(&mut self) {
        self.buffer.push(b'\n');
    }

    /// Total bytes written so far
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn flush(&mut self) -> Result<(), StreamError> {
        self.flush_entity()?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Writes a blob while a hook streams its payload
///
/// Everything up to the payload goes out when streaming starts, each chunk
/// as the hook reads it. [`Serializer::write_blob`] closes the blob once
/// the hook keeps it.
pub struct BlobTee<'a, W> {
    serializer: &'a mut Serializer<W>,
    blob: &'a Blob,
    digest: Option<&'a mut Box<dyn ObjectDigest>>,
    position: Position,
}

impl<'a, W: Write> BlobTee<'a, W> {
    pub fn new(
        serializer: &'a mut Serializer<W>,
        blob: &'a Blob,
        digest: Option<&'a mut Box<dyn ObjectDigest>>,
        position: Position,
    ) -> Self {
        Self {
            serializer,
            blob,
            digest,
            position,
        }
    }
}

impl<W: Write> PayloadTee for BlobTee<'_, W> {
    fn start(&mut self) -> Result<(), StreamError> {
        self.serializer.start_blob(self.blob, self.position)
    }

    fn copy(&mut self, chunk: &[u8]) -> Result<(), StreamError> {
        self.serializer.copy_payload(chunk, self.digest.as_deref_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::objects::command::{Command, Progress};
    use crate::artifacts::objects::mark::Mark;
    use anyhow::Result;
    use pretty_assertions::assert_eq;

    struct Slice {
        data: &'static [u8],
        pos: usize,
    }

    impl DataSource for Slice {
        fn declared_len(&self) -> Option<u64> {
            Some(self.data.len() as u64)
        }

        fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, StreamError> {
            let n = (self.data.len() - self.pos).min(buf.len());
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    fn blob(header: DataHeader) -> Blob {
        Blob::new(Mark::new(1), None, header)
    }

    #[test]
    fn entities_are_written_on_flush() -> Result<()> {
        let mut serializer = Serializer::new(Vec::new(), PackStyle::default());
        let progress = Command::Progress(Progress::new("half way".into()));

        serializer.emit(&progress, true, Position::default())?;
        assert_eq!(serializer.written(), 0);

        serializer.flush()?;
        assert_eq!(serializer.into_inner(), b"progress half way\n\n".to_vec());
        Ok(())
    }

    #[test]
    fn failed_pack_leaves_no_partial_output() -> Result<()> {
        let mut serializer = Serializer::new(Vec::new(), PackStyle::default());
        let bad = Command::Progress(Progress::new("two\nlines".into()));

        let err = serializer.emit(&bad, false, Position::default()).unwrap_err();
        assert!(matches!(err, StreamError::Pack { .. }));
        assert!(serializer.pending().is_empty());
        Ok(())
    }

    #[test]
    fn unread_payload_is_copied_with_its_framing() -> Result<()> {
        let mut serializer = Serializer::new(Vec::new(), PackStyle::default());
        let mut source = Slice {
            data: b"line\n",
            pos: 0,
        };

        serializer.write_blob(
            &blob(DataHeader::Delimited { delim: "EOT".into() }),
            BodyState::Unread,
            &mut source,
            None,
            Position::default(),
        )?;

        assert_eq!(
            serializer.into_inner(),
            b"blob\nmark :1\ndata <<EOT\nline\nEOT\n".to_vec()
        );
        Ok(())
    }

    #[test]
    fn replaced_payload_falls_back_to_counted_framing() -> Result<()> {
        let mut serializer = Serializer::new(Vec::new(), PackStyle::default());
        let mut source = Slice { data: b"", pos: 0 };

        serializer.write_blob(
            &blob(DataHeader::Delimited { delim: "EOT".into() }),
            BodyState::Replaced("no newline".into()),
            &mut source,
            None,
            Position::default(),
        )?;

        assert_eq!(
            serializer.into_inner(),
            b"blob\nmark :1\ndata 10\nno newline".to_vec()
        );
        Ok(())
    }

    #[test]
    fn consumed_payload_cannot_be_written() {
        let mut serializer = Serializer::new(Vec::new(), PackStyle::default());
        let mut source = Slice { data: b"", pos: 0 };

        let err = serializer
            .write_blob(
                &blob(DataHeader::Counted { len: 3 }),
                BodyState::Consumed,
                &mut source,
                None,
                Position::default(),
            )
            .unwrap_err();

        assert!(matches!(
            err,
            StreamError::Pack {
                kind: PackError::BlobConsumed,
                ..
            }
        ));
        assert!(serializer.into_inner().is_empty());
    }

    #[test]
    fn teed_payload_is_closed_by_write_blob() -> Result<()> {
        let mut serializer = Serializer::new(Vec::new(), PackStyle::default());
        let blob = blob(DataHeader::Delimited { delim: "EOT".into() });
        let mut source = Slice { data: b"", pos: 0 };

        let mut tee = BlobTee::new(&mut serializer, &blob, None, Position::default());
        tee.start()?;
        tee.copy(b"first\n")?;
        tee.copy(b"second\n")?;
        serializer.write_blob(&blob, BodyState::Written, &mut source, None, Position::default())?;

        assert_eq!(
            serializer.into_inner(),
            b"blob\nmark :1\ndata <<EOT\nfirst\nsecond\nEOT\n".to_vec()
        );
        Ok(())
    }
}
