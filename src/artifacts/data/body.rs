use crate::artifacts::core::error::StreamError;
use crate::artifacts::data::reader::{DataSource, PayloadTee, stream_to};
use bytes::{Bytes, BytesMut};

/// What a blob hook did with the payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyState {
    /// Untouched; the session copies it straight through
    Unread,
    /// Read into memory and still current
    Loaded(Bytes),
    /// Replaced with new content
    Replaced(Bytes),
    /// Streamed out by the hook and no longer available
    Consumed,
    /// Copied to the output while the hook streamed it
    Written,
}

/// Payload of a blob as seen by a blob hook
///
/// The payload is still in the input when the hook runs. The hook may
/// leave it alone, [`load`](BlobBody::load) it (bounded by the big data
/// threshold), [`stream`](BlobBody::stream) it in chunks, or
/// [`replace`](BlobBody::replace) it.
///
/// With a tee attached, streaming an unread payload also writes the blob
/// to the output chunk by chunk. The blob is then kept as it stood when
/// the hook started streaming.
pub struct BlobBody<'a> {
    source: &'a mut dyn DataSource,
    tee: Option<&'a mut dyn PayloadTee>,
    state: BodyState,
    limit: u64,
}

impl<'a> BlobBody<'a> {
    pub fn new(source: &'a mut dyn DataSource, limit: u64) -> Self {
        Self {
            source,
            tee: None,
            state: BodyState::Unread,
            limit,
        }
    }

    pub fn with_tee(mut self, tee: &'a mut dyn PayloadTee) -> Self {
        self.tee = Some(tee);
        self
    }

    /// Payload length, when known without reading it
    pub fn declared_len(&self) -> Option<u64> {
        match &self.state {
            BodyState::Loaded(bytes) | BodyState::Replaced(bytes) => Some(bytes.len() as u64),
            BodyState::Unread => self.source.declared_len(),
            BodyState::Consumed | BodyState::Written => None,
        }
    }

    /// Bring the whole payload into memory
    ///
    /// Fails with [`StreamError::PayloadTooLarge`] above the big data
    /// threshold; use [`BlobBody::stream`] for such payloads.
    pub fn load(&mut self) -> Result<Bytes, StreamError> {
        match &self.state {
            BodyState::Loaded(bytes) | BodyState::Replaced(bytes) => return Ok(bytes.clone()),
            BodyState::Consumed | BodyState::Written => return Err(StreamError::NoPendingData),
            BodyState::Unread => {}
        }

        let limit = self.limit;
        if self.source.declared_len().is_some_and(|len| len > limit) {
            return Err(StreamError::PayloadTooLarge { limit });
        }

        let mut buf = BytesMut::new();
        stream_to(&mut *self.source, |chunk| {
            if (buf.len() + chunk.len()) as u64 > limit {
                return Err(StreamError::PayloadTooLarge { limit });
            }
            buf.extend_from_slice(chunk);
            Ok(())
        })?;

        let bytes = buf.freeze();
        self.state = BodyState::Loaded(bytes.clone());
        Ok(bytes)
    }

    /// Pass the payload to `sink` in bounded chunks
    ///
    /// With a tee, each chunk of an unread payload reaches the output
    /// before `sink` sees it and the blob can no longer be replaced or
    /// dropped. Without one the payload is consumed; the hook must then
    /// [`replace`](BlobBody::replace) it or drop the blob.
    pub fn stream(&mut self, mut sink: impl FnMut(&[u8]) -> anyhow::Result<()>) -> anyhow::Result<u64> {
        match &self.state {
            BodyState::Loaded(bytes) | BodyState::Replaced(bytes) => {
                sink(bytes)?;
                Ok(bytes.len() as u64)
            }
            BodyState::Consumed | BodyState::Written => Err(StreamError::NoPendingData.into()),
            BodyState::Unread => match self.tee.as_deref_mut() {
                Some(tee) => {
                    self.state = BodyState::Written;
                    tee.start()?;
                    stream_to(&mut *self.source, |chunk| {
                        tee.copy(chunk)?;
                        sink(chunk)
                    })
                }
                None => {
                    self.state = BodyState::Consumed;
                    stream_to(&mut *self.source, |chunk| sink(chunk))
                }
            },
        }
    }

    /// Use `bytes` as the payload
    ///
    /// Fails once the payload was written through a tee.
    pub fn replace(&mut self, bytes: impl Into<Bytes>) -> Result<(), StreamError> {
        if self.state == BodyState::Written {
            return Err(StreamError::PayloadWritten);
        }
        self.state = BodyState::Replaced(bytes.into());
        Ok(())
    }

    pub fn state(&self) -> &BodyState {
        &self.state
    }

    pub fn into_state(self) -> BodyState {
        self.state
    }
}
