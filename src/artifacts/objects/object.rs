//! Serialization of stream commands
//!
//! Every command knows how to write itself back in fast-import form.
//! Packing goes to an in-memory buffer and only fails on values that cannot
//! be represented, such as a path containing NUL or a name containing `<`.

use crate::artifacts::codec::path::{PathContext, encode_path};
use crate::artifacts::core::error::PackError;
use crate::artifacts::objects::object_ref::ObjectRef;

/// Output options shared by all commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackStyle {
    pub quote_non_ascii: bool,
}

impl Default for PackStyle {
    fn default() -> Self {
        Self {
            quote_non_ascii: true,
        }
    }
}

pub trait Packable {
    fn pack(&self, out: &mut Vec<u8>, style: &PackStyle) -> Result<(), PackError>;

    fn to_bytes(&self, style: &PackStyle) -> Result<Vec<u8>, PackError> {
        let mut out = Vec::new();
        self.pack(&mut out, style)?;
        Ok(out)
    }
}

/// Check a value that must fit on a single line
pub(crate) fn check_line(value: &[u8], what: &'static str) -> Result<(), PackError> {
    if value.contains(&0) {
        return Err(PackError::ContainsNul(what));
    }
    if value.contains(&b'\n') {
        return Err(PackError::ContainsNewline(what));
    }
    Ok(())
}

/// Append `<keyword> <value>\n`
pub(crate) fn put_line(
    out: &mut Vec<u8>,
    keyword: &[u8],
    value: &[u8],
    what: &'static str,
) -> Result<(), PackError> {
    check_line(value, what)?;
    out.extend_from_slice(keyword);
    out.push(b' ');
    out.extend_from_slice(value);
    out.push(b'\n');
    Ok(())
}

pub(crate) fn put_ref(out: &mut Vec<u8>, keyword: &[u8], object: &ObjectRef) -> Result<(), PackError> {
    if let ObjectRef::Symbolic(name) = object {
        check_line(name, "object reference")?;
    }
    out.extend_from_slice(keyword);
    out.push(b' ');
    object.write_to(out);
    out.push(b'\n');
    Ok(())
}

pub(crate) fn put_path(
    out: &mut Vec<u8>,
    path: &[u8],
    context: PathContext,
    style: &PackStyle,
) -> Result<(), PackError> {
    if path.contains(&0) {
        return Err(PackError::ContainsNul("path"));
    }
    encode_path(path, context, style.quote_non_ascii, out);
    Ok(())
}
