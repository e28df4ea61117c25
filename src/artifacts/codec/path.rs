//! C-style quoted paths
//!
//! A path is either written verbatim or wrapped in double quotes with
//! C escapes: `\a \b \f \n \r \t \v \\ \"` and three-digit octal `\NNN`
//! whose first digit is `0`-`3`. An escaped NUL is never valid.
//!
//! Where a path may appear decides how an unquoted path ends, see
//! [`PathContext`].

use bstr::BString;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathContext {
    /// Source of `R`/`C`: an unquoted path stops at the first space
    Field,
    /// Last field of a line: an unquoted path runs to the end of the line
    EndOfLine,
    /// Path of a top-level `ls <dataref> <path>`
    Ls,
    /// Path of `ls` inside a commit, which must be quoted
    CommitLs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum PathError {
    #[error("missing closing quote")]
    Unterminated,
    #[error("invalid escape sequence")]
    InvalidEscape,
    #[error("invalid octal escape")]
    InvalidOctal,
    #[error("escaped NUL")]
    EscapedNul,
    #[error("unexpected bytes after closing quote")]
    TrailingBytes,
    #[error("path must be quoted here")]
    MissingQuote,
    #[error("empty path")]
    Empty,
}

/// Decode a quoted path
///
/// `quoted` must start with `"`.
///
/// # Returns
///
/// The decoded path and the bytes after the closing quote
pub fn unquote(quoted: &[u8]) -> Result<(BString, &[u8]), PathError> {
    debug_assert_eq!(quoted.first(), Some(&b'"'));
    let mut s = &quoted[1..];
    let mut path = Vec::with_capacity(s.len());

    loop {
        let i = memchr::memchr2(b'"', b'\\', s).ok_or(PathError::Unterminated)?;
        path.extend_from_slice(&s[..i]);
        if s[i] == b'"' {
            return Ok((path.into(), &s[i + 1..]));
        }

        let escape = *s.get(i + 1).ok_or(PathError::Unterminated)?;
        s = &s[i + 2..];
        let byte = match escape {
            b'a' => 0x07,
            b'b' => 0x08,
            b'f' => 0x0c,
            b'n' => b'\n',
            b'r' => b'\r',
            b't' => b'\t',
            b'v' => 0x0b,
            b'\\' => b'\\',
            b'"' => b'"',
            b'0'..=b'3' => {
                let (d1, d2) = match s {
                    [d1 @ b'0'..=b'7', d2 @ b'0'..=b'7', ..] => (*d1, *d2),
                    _ => return Err(PathError::InvalidOctal),
                };
                s = &s[2..];
                let byte = ((escape - b'0') << 6) | ((d1 - b'0') << 3) | (d2 - b'0');
                if byte == 0 {
                    return Err(PathError::EscapedNul);
                }
                byte
            }
            _ => return Err(PathError::InvalidEscape),
        };
        path.push(byte);
    }
}

/// Decode the path at the start of `field`
///
/// # Returns
///
/// The path and the rest of the field, starting right after the path
pub fn decode_path(field: &[u8], context: PathContext) -> Result<(BString, &[u8]), PathError> {
    if field.first() == Some(&b'"') {
        let (path, rest) = unquote(field)?;
        if context != PathContext::Field && !rest.is_empty() {
            return Err(PathError::TrailingBytes);
        }
        return Ok((path, rest));
    }

    match context {
        PathContext::CommitLs => Err(PathError::MissingQuote),
        PathContext::Field => {
            let end = memchr::memchr(b' ', field).unwrap_or(field.len());
            if end == 0 {
                return Err(PathError::Empty);
            }
            Ok((BString::from(&field[..end]), &field[end..]))
        }
        PathContext::EndOfLine | PathContext::Ls => Ok((BString::from(field), &[])),
    }
}

/// Whether `path` cannot be written verbatim
pub fn needs_quoting(path: &[u8], quote_non_ascii: bool) -> bool {
    path.is_empty()
        || path.iter().any(|&b| {
            b < 0x20
                || b == 0x7f
                || b == b' '
                || b == b'"'
                || b == b'\\'
                || (quote_non_ascii && b >= 0x80)
        })
}

/// Append `path` in quoted form
pub fn quote(path: &[u8], quote_non_ascii: bool, out: &mut Vec<u8>) {
    out.push(b'"');
    for &b in path {
        match b {
            0x07 => out.extend_from_slice(b"\\a"),
            0x08 => out.extend_from_slice(b"\\b"),
            0x0c => out.extend_from_slice(b"\\f"),
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            b'\t' => out.extend_from_slice(b"\\t"),
            0x0b => out.extend_from_slice(b"\\v"),
            b'\\' => out.extend_from_slice(b"\\\\"),
            b'"' => out.extend_from_slice(b"\\\""),
            b if b < 0x20 || b == 0x7f || (quote_non_ascii && b >= 0x80) => {
                out.extend_from_slice(format!("\\{b:03o}").as_bytes());
            }
            b => out.push(b),
        }
    }
    out.push(b'"');
}

/// Append `path` the way it must appear in `context`
///
/// The path must not contain NUL; the serializer checks that first.
pub fn encode_path(path: &[u8], context: PathContext, quote_non_ascii: bool, out: &mut Vec<u8>) {
    if context == PathContext::CommitLs || needs_quoting(path, quote_non_ascii) {
        quote(path, quote_non_ascii, out);
    } else {
        out.extend_from_slice(path);
    }
}
