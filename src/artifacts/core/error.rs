//! Error taxonomy
//!
//! Leaf codecs own their own error enums (`IntegerError`, `DateError`,
//! `PathError`, `IdentError`, `MarkError`). They roll up into [`ParseError`]
//! while reading and [`PackError`] while writing. A session reports every
//! failure as a [`StreamError`] carrying the [`Position`] of the command
//! that caused it.

use crate::areas::hooks::HookKind;
use crate::areas::marks::MarkError;
use crate::artifacts::codec::date::DateError;
use crate::artifacts::codec::integer::IntegerError;
use crate::artifacts::codec::path::PathError;
use crate::artifacts::core::Position;
use crate::artifacts::objects::mark::Mark;
use crate::artifacts::objects::object_type::ObjectKind;
use crate::artifacts::objects::person::IdentError;
use bstr::BString;
use std::io;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("invalid integer: {0}")]
    Integer(#[from] IntegerError),
    #[error("invalid date: {0}")]
    Date(#[from] DateError),
    #[error("invalid path: {0}")]
    Path(#[from] PathError),
    #[error("invalid person identifier: {0}")]
    Ident(#[from] IdentError),
    #[error(transparent)]
    Mark(#[from] MarkError),
    #[error("unsupported command: {0}")]
    UnsupportedCommand(BString),
    #[error("unexpected blank line")]
    UnexpectedBlank,
    #[error("expected 'committer' in commit")]
    ExpectedCommitter,
    #[error("expected 'from' in tag")]
    ExpectedTagFrom,
    #[error("expected 'tagger' in tag")]
    ExpectedTagger,
    #[error("expected 'mark' in alias")]
    ExpectedAliasMark,
    #[error("expected 'to' in alias")]
    ExpectedAliasTo,
    #[error("expected 'data' command")]
    ExpectedData,
    #[error("mark does not start with ':'")]
    MarkMissingColon,
    #[error("cannot use ':0' as a mark")]
    ZeroMark,
    #[error("empty object reference")]
    EmptyReference,
    #[error("invalid file mode {0}")]
    InvalidMode(BString),
    #[error("missing space separator")]
    MissingSpace,
    #[error("top-level 'ls' requires a tree-ish before the path")]
    LsWithoutRoot,
    #[error("unknown date format {0}")]
    UnknownDateFormat(BString),
    #[error("{0} contains NUL")]
    ContainsNul(&'static str),
    #[error("unexpected bytes after {0}")]
    TrailingBytes(&'static str),
    #[error("unexpected EOF in data")]
    DataUnexpectedEof,
    #[error("unterminated data: missing delimiter {0}")]
    UnterminatedData(BString),
    #[error("inline data exceeds {limit} bytes")]
    InlineDataTooLarge { limit: u64 },
    #[error("mark {mark} names a {kind}, not a commit")]
    ParentNotCommit { mark: Mark, kind: ObjectKind },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PackError {
    #[error("{0} contains NUL")]
    ContainsNul(&'static str),
    #[error("{0} contains a line feed")]
    ContainsNewline(&'static str),
    #[error("{0} contains '<' or '>'")]
    IdentDelimiter(&'static str),
    #[error("blob payload was consumed without a replacement")]
    BlobConsumed,
    #[error("blob was already written while its payload streamed")]
    BlobWritten,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} hook redefined")]
    HookRedefined(HookKind),
    #[error("big data threshold must be positive")]
    ZeroThreshold,
    #[error("invalid value {value:?} for {key}")]
    InvalidEnv { key: &'static str, value: String },
}

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("{kind} ({position})")]
    Parse { kind: ParseError, position: Position },
    #[error("cannot write command: {kind} ({position})")]
    Pack { kind: PackError, position: Position },
    #[error("{kind} hook failed ({position}): {error:#}")]
    Hook {
        kind: HookKind,
        position: Position,
        error: anyhow::Error,
    },
    #[error("object hasher failed ({position}): {error:#}")]
    Hasher {
        position: Position,
        error: anyhow::Error,
    },
    #[error("blob payload exceeds {limit} bytes; stream it instead")]
    PayloadTooLarge { limit: u64 },
    #[error("no blob data is pending")]
    NoPendingData,
    #[error("blob payload was already written to the output")]
    PayloadWritten,
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl StreamError {
    pub fn position(&self) -> Option<Position> {
        match self {
            StreamError::Parse { position, .. }
            | StreamError::Pack { position, .. }
            | StreamError::Hook { position, .. }
            | StreamError::Hasher { position, .. } => Some(*position),
            _ => None,
        }
    }

    /// The parse failure, if this error came from the lexer
    pub fn parse_kind(&self) -> Option<&ParseError> {
        match self {
            StreamError::Parse { kind, .. } => Some(kind),
            _ => None,
        }
    }
}

impl From<StreamError> for io::Error {
    fn from(err: StreamError) -> Self {
        match err {
            StreamError::Io(err) => err,
            err => io::Error::new(io::ErrorKind::InvalidData, err),
        }
    }
}
