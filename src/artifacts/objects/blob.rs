//! Blob command
//!
//! ```text
//! blob
//! mark :<n>?
//! original-oid <id>?
//! data ...
//! ```
//!
//! The payload is not part of [`Blob`]; it stays in the input until the
//! session reads, streams or skips it.

use crate::artifacts::core::error::PackError;
use crate::artifacts::data::DataHeader;
use crate::artifacts::objects::mark::Mark;
use crate::artifacts::objects::object::{PackStyle, Packable, put_line};
use bstr::BString;
use derive_new::new;

#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct Blob {
    pub mark: Option<Mark>,
    pub original_oid: Option<BString>,
    pub data: DataHeader,
}

impl Blob {
    /// Payload length, when the input counted it
    pub fn declared_len(&self) -> Option<u64> {
        self.data.declared_len()
    }
}

/// Writes the header lines only; the `data` section follows separately
impl Packable for Blob {
    fn pack(&self, out: &mut Vec<u8>, _style: &PackStyle) -> Result<(), PackError> {
        out.extend_from_slice(b"blob\n");
        if let Some(mark) = self.mark {
            put_line(out, b"mark", mark.to_string().as_bytes(), "mark")?;
        }
        if let Some(oid) = &self.original_oid {
            put_line(out, b"original-oid", oid, "original-oid")?;
        }
        Ok(())
    }
}
