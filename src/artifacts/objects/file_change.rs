//! File changes of a commit
//!
//! ```text
//! M <mode> <dataref> <path>
//! D <path>
//! R <source> <destination>
//! C <source> <destination>
//! N <dataref> <committish>
//! deleteall
//! ```
//!
//! `ls` and `cat-blob` may also appear between the changes of a commit;
//! they are kept in order as [`ChangeLine`] entries.

use crate::artifacts::core::error::ParseError;
use crate::artifacts::data::DataBlock;
use crate::artifacts::objects::command::{CatBlob, Ls};
use crate::artifacts::objects::object_ref::ObjectRef;
use bstr::BString;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModeKind {
    Regular,
    Executable,
    Symlink,
    Gitlink,
    Directory,
}

/// Octal file mode of an `M` line
///
/// The short forms `644` and `755` are kept as written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileMode(u32);

impl FileMode {
    pub const REGULAR: FileMode = FileMode(0o100644);
    pub const EXECUTABLE: FileMode = FileMode(0o100755);
    pub const SYMLINK: FileMode = FileMode(0o120000);
    pub const GITLINK: FileMode = FileMode(0o160000);
    pub const DIRECTORY: FileMode = FileMode(0o040000);

    /// Parse an octal mode
    ///
    /// # Returns
    ///
    /// The mode and whether it carried redundant leading zeros
    pub fn parse(field: &[u8]) -> Result<(Self, bool), ParseError> {
        let invalid = || ParseError::InvalidMode(field.into());
        if field.is_empty() || !field.iter().all(|b| (b'0'..=b'7').contains(b)) {
            return Err(invalid());
        }

        let digits = field.len() - field.iter().take_while(|&&b| b == b'0').count();
        let value = field
            .iter()
            .try_fold(0u32, |acc, &b| {
                acc.checked_mul(8)
                    .and_then(|acc| acc.checked_add(u32::from(b - b'0')))
            })
            .ok_or_else(invalid)?;

        let mode = FileMode(value);
        match value {
            0o100644 | 0o100755 | 0o120000 | 0o160000 | 0o040000 | 0o644 | 0o755 => {}
            _ => return Err(invalid()),
        }

        Ok((mode, field.len() > mode.canonical_len().max(digits)))
    }

    pub fn kind(&self) -> ModeKind {
        match self.0 {
            0o100755 | 0o755 => ModeKind::Executable,
            0o120000 => ModeKind::Symlink,
            0o160000 => ModeKind::Gitlink,
            0o040000 => ModeKind::Directory,
            _ => ModeKind::Regular,
        }
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }

    fn canonical_len(&self) -> usize {
        if self.0 <= 0o777 { 3 } else { 6 }
    }
}

impl std::fmt::Display for FileMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0 <= 0o777 {
            write!(f, "{:o}", self.0)
        } else {
            write!(f, "{:06o}", self.0)
        }
    }
}

/// Content of an `M` or `N` line
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataRef {
    Object(ObjectRef),
    Inline(DataBlock),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FileChange {
    Modify {
        mode: FileMode,
        data: DataRef,
        path: BString,
    },
    Delete {
        path: BString,
    },
    Rename {
        source: BString,
        destination: BString,
    },
    Copy {
        source: BString,
        destination: BString,
    },
    NoteModify {
        data: DataRef,
        target: ObjectRef,
    },
    DeleteAll,
}

impl FileChange {
    /// Paths this change touches, source first
    pub fn paths(&self) -> Vec<&BString> {
        match self {
            FileChange::Modify { path, .. } | FileChange::Delete { path } => vec![path],
            FileChange::Rename {
                source,
                destination,
            }
            | FileChange::Copy {
                source,
                destination,
            } => vec![source, destination],
            FileChange::NoteModify { .. } | FileChange::DeleteAll => Vec::new(),
        }
    }

    pub fn paths_mut(&mut self) -> Vec<&mut BString> {
        match self {
            FileChange::Modify { path, .. } | FileChange::Delete { path } => vec![path],
            FileChange::Rename {
                source,
                destination,
            }
            | FileChange::Copy {
                source,
                destination,
            } => vec![source, destination],
            FileChange::NoteModify { .. } | FileChange::DeleteAll => Vec::new(),
        }
    }

    /// Object references held by this change
    pub fn refs_mut(&mut self) -> Vec<&mut ObjectRef> {
        match self {
            FileChange::Modify {
                data: DataRef::Object(object),
                ..
            } => vec![object],
            FileChange::NoteModify { data, target } => match data {
                DataRef::Object(object) => vec![object, target],
                DataRef::Inline(_) => vec![target],
            },
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChangeLine {
    File(FileChange),
    Ls(Ls),
    CatBlob(CatBlob),
}

impl ChangeLine {
    pub fn as_file_change(&self) -> Option<&FileChange> {
        match self {
            ChangeLine::File(change) => Some(change),
            _ => None,
        }
    }
}
