//! Mark table
//!
//! Maps marks to the identity of what they name. A mark is defined once,
//! when its blob, commit, tag or alias is read, and holds a provisional
//! identity until the object hasher (if any) supplies the final object ID.
//!
//! ## Invariants
//!
//! - a mark is defined at most once per session
//! - a mark can only be resolved by commands after the one defining it
//! - a provisional identity is replaced by a final one exactly once

use crate::artifacts::objects::mark::Mark;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_ref::ObjectRef;
use crate::artifacts::objects::object_type::ObjectKind;
use bstr::BString;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarkError {
    #[error("unknown mark {0}")]
    UnknownMark(Mark),
    #[error("mark {0} is already defined")]
    DuplicateMark(Mark),
    #[error("mark {0} already has its final identity")]
    AlreadyFinal(Mark),
}

/// What a mark or reference stands for
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    /// Object created by the command with this index; its ID is not known yet
    Pending { kind: ObjectKind, command: u64 },
    Object(ObjectId),
    /// Committish the session does not interpret
    Symbolic(BString),
}

impl Identity {
    pub fn kind(&self) -> Option<ObjectKind> {
        match self {
            Identity::Pending { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    identity: Identity,
    kind: Option<ObjectKind>,
    defined_at: u64,
    is_final: bool,
}

#[derive(Debug, Default)]
pub struct MarkTable {
    entries: HashMap<Mark, Entry>,
}

impl MarkTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `mark` to `identity` on behalf of the command with index `command`
    pub fn define(&mut self, mark: Mark, identity: Identity, command: u64) -> Result<(), MarkError> {
        if self.entries.contains_key(&mark) {
            return Err(MarkError::DuplicateMark(mark));
        }
        self.entries.insert(
            mark,
            Entry {
                kind: identity.kind(),
                identity,
                defined_at: command,
                is_final: false,
            },
        );
        Ok(())
    }

    /// Resolve a reference as seen by any later command
    pub fn resolve(&self, reference: &ObjectRef) -> Result<Identity, MarkError> {
        self.resolve_at(reference, u64::MAX)
    }

    /// Resolve a reference as seen by the command with index `command`
    ///
    /// Marks defined by that command or later are unknown to it.
    pub fn resolve_at(&self, reference: &ObjectRef, command: u64) -> Result<Identity, MarkError> {
        match reference {
            ObjectRef::Mark(mark) => self
                .entries
                .get(mark)
                .filter(|entry| entry.defined_at < command)
                .map(|entry| entry.identity.clone())
                .ok_or(MarkError::UnknownMark(*mark)),
            ObjectRef::ObjectId(oid) => Ok(Identity::Object(oid.clone())),
            ObjectRef::Symbolic(name) => Ok(Identity::Symbolic(name.clone())),
        }
    }

    /// Replace the provisional identity of `mark` with its final object ID
    pub fn reassign(&mut self, mark: Mark, oid: ObjectId) -> Result<(), MarkError> {
        let entry = self
            .entries
            .get_mut(&mark)
            .ok_or(MarkError::UnknownMark(mark))?;
        if entry.is_final {
            return Err(MarkError::AlreadyFinal(mark));
        }
        entry.identity = Identity::Object(oid);
        entry.is_final = true;
        Ok(())
    }

    /// Kind of object `mark` was defined for, if the definition said so
    pub fn kind_of(&self, mark: Mark) -> Option<ObjectKind> {
        self.entries.get(&mark).and_then(|entry| entry.kind)
    }

    pub fn contains(&self, mark: Mark) -> bool {
        self.entries.contains_key(&mark)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Final object IDs assigned so far
    pub fn final_ids(&self) -> impl Iterator<Item = (Mark, &ObjectId)> {
        self.entries.iter().filter_map(|(mark, entry)| match &entry.identity {
            Identity::Object(oid) if entry.is_final => Some((*mark, oid)),
            _ => None,
        })
    }
}

/// Computes final object IDs for what the session writes out
///
/// The session feeds each blob payload, and the serialized form of each
/// commit and tag, through a digest and records the result with
/// [`MarkTable::reassign`].
pub trait ObjectHasher {
    fn digest(&mut self, kind: ObjectKind) -> Box<dyn ObjectDigest>;
}

pub trait ObjectDigest {
    fn update(&mut self, bytes: &[u8]);

    fn finish(self: Box<Self>) -> anyhow::Result<ObjectId>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn mark(id: u64) -> Mark {
        Mark::new(id).unwrap()
    }

    fn pending(command: u64) -> Identity {
        Identity::Pending {
            kind: ObjectKind::Commit,
            command,
        }
    }

    #[test]
    fn define_then_resolve() {
        let mut table = MarkTable::new();
        table.define(mark(1), pending(1), 1).unwrap();

        assert_eq!(table.resolve(&ObjectRef::Mark(mark(1))), Ok(pending(1)));
        assert_eq!(table.kind_of(mark(1)), Some(ObjectKind::Commit));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn duplicate_definition_fails() {
        let mut table = MarkTable::new();
        table.define(mark(1), pending(1), 1).unwrap();
        assert_eq!(
            table.define(mark(1), pending(2), 2),
            Err(MarkError::DuplicateMark(mark(1)))
        );
    }

    #[test]
    fn marks_are_invisible_before_their_definition() {
        let mut table = MarkTable::new();
        table.define(mark(7), pending(3), 3).unwrap();

        let reference = ObjectRef::Mark(mark(7));
        assert_eq!(
            table.resolve_at(&reference, 3),
            Err(MarkError::UnknownMark(mark(7)))
        );
        assert_eq!(table.resolve_at(&reference, 4), Ok(pending(3)));
        assert_eq!(
            table.resolve(&ObjectRef::Mark(mark(8))),
            Err(MarkError::UnknownMark(mark(8)))
        );
    }

    #[test]
    fn other_references_resolve_to_themselves() {
        let table = MarkTable::new();
        assert_eq!(
            table.resolve(&ObjectRef::Symbolic("HEAD".into())),
            Ok(Identity::Symbolic("HEAD".into()))
        );
    }

    #[test]
    fn reassign_happens_once() {
        let mut table = MarkTable::new();
        table.define(mark(1), pending(1), 1).unwrap();
        let oid = ObjectId::try_parse(&[b'a'; 40]).unwrap();

        table.reassign(mark(1), oid.clone()).unwrap();
        assert_eq!(
            table.resolve(&ObjectRef::Mark(mark(1))),
            Ok(Identity::Object(oid.clone()))
        );
        assert_eq!(
            table.reassign(mark(1), oid.clone()),
            Err(MarkError::AlreadyFinal(mark(1)))
        );
        assert_eq!(
            table.reassign(mark(2), oid),
            Err(MarkError::UnknownMark(mark(2)))
        );
        assert_eq!(table.final_ids().count(), 1);
        assert_eq!(table.kind_of(mark(1)), Some(ObjectKind::Commit));
    }
}
