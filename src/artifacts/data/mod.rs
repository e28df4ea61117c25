//! Data framing
//!
//! Payloads of blobs, messages and inline file contents are framed either
//! by a byte count (`data <n>`) or by a delimiter line (`data <<EOF`).
//! Either form may be followed by one optional blank line.
//!
//! - `body`: hook-facing handle on a blob payload that is still in the input
//! - `reader`: bounded streaming of a pending payload

pub mod body;
pub mod reader;

use crate::artifacts::codec::integer::parse_u64;
use crate::artifacts::core::error::ParseError;
use bstr::BString;
use bytes::Bytes;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataHeader {
    Counted { len: u64 },
    Delimited { delim: BString },
}

impl DataHeader {
    /// Parse the argument of a `data` line
    pub fn parse(arg: &[u8]) -> Result<Self, ParseError> {
        match arg.strip_prefix(b"<<") {
            Some(delim) => {
                if delim.contains(&0) {
                    return Err(ParseError::ContainsNul("data delimiter"));
                }
                Ok(DataHeader::Delimited {
                    delim: BString::from(delim),
                })
            }
            None => Ok(DataHeader::Counted {
                len: parse_u64(arg)?,
            }),
        }
    }

    /// Exact payload length, unknown for delimited data until it is read
    pub fn declared_len(&self) -> Option<u64> {
        match self {
            DataHeader::Counted { len } => Some(*len),
            DataHeader::Delimited { .. } => None,
        }
    }

    pub fn delim(&self) -> Option<&BString> {
        match self {
            DataHeader::Counted { .. } => None,
            DataHeader::Delimited { delim } => Some(delim),
        }
    }
}

/// A payload held in memory: commit and tag messages and inline data
///
/// `delim` remembers the input framing so it can be reproduced. The block
/// falls back to counted framing once its bytes no longer fit the delimiter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct DataBlock {
    pub bytes: Bytes,
    pub delim: Option<BString>,
    pub trailing_lf: bool,
}

impl DataBlock {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
            delim: None,
            trailing_lf: false,
        }
    }

    pub fn delimited(bytes: impl Into<Bytes>, delim: impl Into<BString>) -> Self {
        Self {
            bytes: bytes.into(),
            delim: Some(delim.into()),
            trailing_lf: false,
        }
    }

    pub fn with_trailing_lf(mut self, trailing_lf: bool) -> Self {
        self.trailing_lf = trailing_lf;
        self
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Replace the payload, keeping the framing preferences
    pub fn set_bytes(&mut self, bytes: impl Into<Bytes>) {
        self.bytes = bytes.into();
    }

    /// The delimiter to write with, if the payload can still use it
    pub fn usable_delim(&self) -> Option<&BString> {
        self.delim
            .as_ref()
            .filter(|delim| fits_delimiter(&self.bytes, delim))
    }

    /// Append the `data` line, payload, terminator and optional blank line
    pub fn write_to(&self, out: &mut Vec<u8>) {
        write_block(&self.bytes, self.usable_delim().map(|d| d.as_slice()), out);
        if self.trailing_lf {
            out.push(b'\n');
        }
    }
}

/// Whether `bytes` can be framed by `delim`
///
/// The payload must end in LF (or be empty) and no payload line may equal
/// the delimiter.
pub fn fits_delimiter(bytes: &[u8], delim: &[u8]) -> bool {
    if bytes.is_empty() {
        return true;
    }
    if bytes.last() != Some(&b'\n') {
        return false;
    }
    !bytes[..bytes.len() - 1]
        .split(|&b| b == b'\n')
        .any(|line| line == delim)
}

/// Append a complete data section using `delim` when given, else a byte count
pub fn write_block(bytes: &[u8], delim: Option<&[u8]>, out: &mut Vec<u8>) {
    match delim {
        Some(delim) => {
            out.extend_from_slice(b"data <<");
            out.extend_from_slice(delim);
            out.push(b'\n');
            out.extend_from_slice(bytes);
            out.extend_from_slice(delim);
            out.push(b'\n');
        }
        None => {
            out.extend_from_slice(format!("data {}\n", bytes.len()).as_bytes());
            out.extend_from_slice(bytes);
        }
    }
}
