//! Commit command
//!
//! ## Format
//!
//! ```text
//! commit <ref>
//! mark :<n>?
//! original-oid <id>?
//! author <ident>?
//! committer <ident>
//! encoding <name>?
//! data ...
//! from <committish>?
//! merge <committish>*
//! (M | D | R | C | N | deleteall | ls | cat-blob)*
//! <blank line>
//! ```
//!
//! Without `from` the commit's first parent is the current tip of `<ref>`.

use crate::artifacts::codec::path::PathContext;
use crate::artifacts::core::error::PackError;
use crate::artifacts::data::DataBlock;
use crate::artifacts::objects::file_change::{ChangeLine, DataRef, FileChange};
use crate::artifacts::objects::mark::Mark;
use crate::artifacts::objects::object::{PackStyle, Packable, put_line, put_path, put_ref};
use crate::artifacts::objects::object_ref::ObjectRef;
use crate::artifacts::objects::person::PersonIdent;
use bstr::BString;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub branch: BString,
    pub mark: Option<Mark>,
    pub original_oid: Option<BString>,
    pub author: Option<PersonIdent>,
    pub committer: PersonIdent,
    pub encoding: Option<BString>,
    pub message: DataBlock,
    pub from: Option<ObjectRef>,
    pub merges: Vec<ObjectRef>,
    pub changes: Vec<ChangeLine>,
}

impl Commit {
    /// A commit with no parents, changes or optional headers
    pub fn new(branch: impl Into<BString>, committer: PersonIdent, message: DataBlock) -> Self {
        Self {
            branch: branch.into(),
            mark: None,
            original_oid: None,
            author: None,
            committer,
            encoding: None,
            message,
            from: None,
            merges: Vec::new(),
            changes: Vec::new(),
        }
    }

    /// Explicit parents, first parent first
    pub fn parents(&self) -> impl Iterator<Item = &ObjectRef> {
        self.from.iter().chain(self.merges.iter())
    }

    pub fn is_merge(&self) -> bool {
        self.from.is_some() && !self.merges.is_empty()
    }

    pub fn file_changes(&self) -> impl Iterator<Item = &FileChange> {
        self.changes.iter().filter_map(ChangeLine::as_file_change)
    }
}

impl Packable for Commit {
    fn pack(&self, out: &mut Vec<u8>, style: &PackStyle) -> Result<(), PackError> {
        put_line(out, b"commit", &self.branch, "branch")?;
        if let Some(mark) = self.mark {
            put_line(out, b"mark", mark.to_string().as_bytes(), "mark")?;
        }
        if let Some(oid) = &self.original_oid {
            put_line(out, b"original-oid", oid, "original-oid")?;
        }
        if let Some(author) = &self.author {
            out.extend_from_slice(b"author ");
            author.write_to(out)?;
            out.push(b'\n');
        }
        out.extend_from_slice(b"committer ");
        self.committer.write_to(out)?;
        out.push(b'\n');
        if let Some(encoding) = &self.encoding {
            put_line(out, b"encoding", encoding, "encoding")?;
        }
        self.message.write_to(out);

        if let Some(from) = &self.from {
            put_ref(out, b"from", from)?;
        }
        for merge in &self.merges {
            put_ref(out, b"merge", merge)?;
        }
        for change in &self.changes {
            change.pack(out, style)?;
        }
        out.push(b'\n');
        Ok(())
    }
}

impl Packable for ChangeLine {
    fn pack(&self, out: &mut Vec<u8>, style: &PackStyle) -> Result<(), PackError> {
        match self {
            ChangeLine::File(change) => change.pack(out, style),
            ChangeLine::Ls(ls) => ls.pack(out, style),
            ChangeLine::CatBlob(cat_blob) => cat_blob.pack(out, style),
        }
    }
}

impl Packable for FileChange {
    fn pack(&self, out: &mut Vec<u8>, style: &PackStyle) -> Result<(), PackError> {
        match self {
            FileChange::Modify { mode, data, path } => {
                out.extend_from_slice(format!("M {mode} ").as_bytes());
                put_dataref(out, data);
                out.push(b' ');
                put_path(out, path, PathContext::EndOfLine, style)?;
                out.push(b'\n');
                put_inline(out, data);
            }
            FileChange::Delete { path } => {
                out.extend_from_slice(b"D ");
                put_path(out, path, PathContext::EndOfLine, style)?;
                out.push(b'\n');
            }
            FileChange::Rename {
                source,
                destination,
            } => put_pair(out, b"R ", source, destination, style)?,
            FileChange::Copy {
                source,
                destination,
            } => put_pair(out, b"C ", source, destination, style)?,
            FileChange::NoteModify { data, target } => {
                out.extend_from_slice(b"N ");
                put_dataref(out, data);
                put_ref(out, b"", target)?;
                put_inline(out, data);
            }
            FileChange::DeleteAll => out.extend_from_slice(b"deleteall\n"),
        }
        Ok(())
    }
}

fn put_dataref(out: &mut Vec<u8>, data: &DataRef) {
    match data {
        DataRef::Object(object) => object.write_to(out),
        DataRef::Inline(_) => out.extend_from_slice(b"inline"),
    }
}

fn put_inline(out: &mut Vec<u8>, data: &DataRef) {
    if let DataRef::Inline(block) = data {
        block.write_to(out);
    }
}

fn put_pair(
    out: &mut Vec<u8>,
    keyword: &[u8],
    source: &[u8],
    destination: &[u8],
    style: &PackStyle,
) -> Result<(), PackError> {
    out.extend_from_slice(keyword);
    put_path(out, source, PathContext::Field, style)?;
    out.push(b' ');
    put_path(out, destination, PathContext::EndOfLine, style)?;
    out.push(b'\n');
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::codec::date::Date;
    use crate::artifacts::objects::file_change::FileMode;
    use bstr::ByteSlice;
    use pretty_assertions::assert_eq;

    fn committer() -> PersonIdent {
        PersonIdent::new(Some("C O Mitter".into()), "c@example.com".into(), Date::Now)
    }

    #[test]
    fn packs_header_parents_and_changes() {
        let mut commit = Commit::new(
            "refs/heads/main",
            committer(),
            DataBlock::new("subject\n\nbody\n"),
        );
        commit.mark = Mark::new(3);
        commit.from = Some(ObjectRef::Mark(Mark::new(1).unwrap()));
        commit.merges.push(ObjectRef::Mark(Mark::new(2).unwrap()));
        commit.changes = vec![
            ChangeLine::File(FileChange::Modify {
                mode: FileMode::REGULAR,
                data: DataRef::Object(ObjectRef::Mark(Mark::new(1).unwrap())),
                path: "src/a b.rs".into(),
            }),
            ChangeLine::File(FileChange::Rename {
                source: "old name".into(),
                destination: "new".into(),
            }),
            ChangeLine::File(FileChange::DeleteAll),
        ];

        let packed = commit.to_bytes(&PackStyle::default()).unwrap();
        assert_eq!(
            packed.to_str_lossy(),
            "commit refs/heads/main\n\
             mark :3\n\
             committer C O Mitter <c@example.com> now\n\
             data 14\nsubject\n\nbody\n\
             from :1\n\
             merge :2\n\
             M 100644 :1 \"src/a b.rs\"\n\
             R \"old name\" new\n\
             deleteall\n\
             \n"
        );
        assert!(commit.is_merge());
    }

    #[test]
    fn inline_data_follows_its_line() {
        let mut commit = Commit::new("refs/heads/main", committer(), DataBlock::new(""));
        commit.changes.push(ChangeLine::File(FileChange::Modify {
            mode: FileMode::REGULAR,
            data: DataRef::Inline(DataBlock::new("hi\n")),
            path: "a".into(),
        }));

        let packed = commit.to_bytes(&PackStyle::default()).unwrap();
        assert!(packed.ends_with(b"data 0\nM 100644 inline a\ndata 3\nhi\n\n"));
    }

    #[test]
    fn rejects_nul_in_paths() {
        let mut commit = Commit::new("refs/heads/main", committer(), DataBlock::new(""));
        commit.changes.push(ChangeLine::File(FileChange::Delete {
            path: "a\0b".into(),
        }));
        assert_eq!(
            commit.to_bytes(&PackStyle::default()),
            Err(PackError::ContainsNul("path"))
        );
    }
}
