//! Top-level commands of a stream
//!
//! [`Command`] is the unit the lexer produces and the serializer consumes.
//! Blobs, commits and tags live in their own modules; the smaller
//! commands are defined here.

use crate::artifacts::codec::integer::{FileSize, is_zero_padded, parse_u32};
use crate::artifacts::codec::path::PathContext;
use crate::artifacts::core::Position;
use crate::artifacts::core::error::{PackError, ParseError};
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::mark::Mark;
use crate::artifacts::objects::object::{PackStyle, Packable, check_line, put_line, put_path, put_ref};
use crate::artifacts::objects::object_ref::ObjectRef;
use crate::artifacts::objects::tag::Tag;
use bstr::{BString, ByteSlice};
use derive_new::new;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Blob(Blob),
    Commit(Commit),
    Tag(Tag),
    Reset(Reset),
    Alias(Alias),
    Ls(Ls),
    CatBlob(CatBlob),
    GetMark(GetMark),
    Checkpoint,
    Progress(Progress),
    Feature(Feature),
    Option(OptionCommand),
    Done(Done),
}

impl Command {
    pub fn keyword(&self) -> &'static str {
        match self {
            Command::Blob(_) => "blob",
            Command::Commit(_) => "commit",
            Command::Tag(_) => "tag",
            Command::Reset(_) => "reset",
            Command::Alias(_) => "alias",
            Command::Ls(_) => "ls",
            Command::CatBlob(_) => "cat-blob",
            Command::GetMark(_) => "get-mark",
            Command::Checkpoint => "checkpoint",
            Command::Progress(_) => "progress",
            Command::Feature(_) => "feature",
            Command::Option(_) => "option",
            Command::Done(_) => "done",
        }
    }
}

impl Packable for Command {
    fn pack(&self, out: &mut Vec<u8>, style: &PackStyle) -> Result<(), PackError> {
        match self {
            Command::Blob(blob) => blob.pack(out, style),
            Command::Commit(commit) => commit.pack(out, style),
            Command::Tag(tag) => tag.pack(out, style),
            Command::Reset(reset) => reset.pack(out, style),
            Command::Alias(alias) => alias.pack(out, style),
            Command::Ls(ls) => ls.pack(out, style),
            Command::CatBlob(cat_blob) => cat_blob.pack(out, style),
            Command::GetMark(get_mark) => get_mark.pack(out, style),
            Command::Checkpoint => {
                out.extend_from_slice(b"checkpoint\n");
                Ok(())
            }
            Command::Progress(progress) => progress.pack(out, style),
            Command::Feature(feature) => feature.pack(out, style),
            Command::Option(option) => option.pack(out, style),
            Command::Done(done) => done.pack(out, style),
        }
    }
}

/// A command as read from the input
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct Parsed {
    pub command: Command,
    pub position: Position,
    /// The command was followed by its optional blank line
    pub trailing_lf: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct Reset {
    pub branch: BString,
    pub from: Option<ObjectRef>,
}

impl Packable for Reset {
    fn pack(&self, out: &mut Vec<u8>, _style: &PackStyle) -> Result<(), PackError> {
        put_line(out, b"reset", &self.branch, "branch")?;
        if let Some(from) = &self.from {
            put_ref(out, b"from", from)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct Alias {
    pub mark: Mark,
    pub to: ObjectRef,
}

impl Packable for Alias {
    fn pack(&self, out: &mut Vec<u8>, _style: &PackStyle) -> Result<(), PackError> {
        out.extend_from_slice(b"alias\n");
        put_line(out, b"mark", self.mark.to_string().as_bytes(), "mark")?;
        put_ref(out, b"to", &self.to)
    }
}

/// `ls`; `root` is only absent inside a commit, where the path is quoted
#[derive(Debug, Clone, PartialEq, Eq, Hash, new)]
pub struct Ls {
    pub root: Option<ObjectRef>,
    pub path: BString,
}

impl Packable for Ls {
    fn pack(&self, out: &mut Vec<u8>, style: &PackStyle) -> Result<(), PackError> {
        out.extend_from_slice(b"ls ");
        match &self.root {
            Some(root) => {
                root.write_to(out);
                out.push(b' ');
                put_path(out, &self.path, PathContext::Ls, style)?;
            }
            None => put_path(out, &self.path, PathContext::CommitLs, style)?,
        }
        out.push(b'\n');
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, new)]
pub struct CatBlob {
    pub blob: ObjectRef,
}

impl Packable for CatBlob {
    fn pack(&self, out: &mut Vec<u8>, _style: &PackStyle) -> Result<(), PackError> {
        put_ref(out, b"cat-blob", &self.blob)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct GetMark {
    pub mark: Mark,
}

impl Packable for GetMark {
    fn pack(&self, out: &mut Vec<u8>, _style: &PackStyle) -> Result<(), PackError> {
        put_line(out, b"get-mark", self.mark.to_string().as_bytes(), "mark")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct Progress {
    pub message: BString,
}

impl Packable for Progress {
    fn pack(&self, out: &mut Vec<u8>, _style: &PackStyle) -> Result<(), PackError> {
        put_line(out, b"progress", &self.message, "progress message")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct Feature {
    pub name: BString,
    pub argument: Option<BString>,
}

impl Feature {
    pub fn parse(field: &[u8]) -> Self {
        match field.split_once_str("=") {
            Some((name, argument)) => Feature::new(name.into(), Some(argument.into())),
            None => Feature::new(field.into(), None),
        }
    }
}

impl Packable for Feature {
    fn pack(&self, out: &mut Vec<u8>, _style: &PackStyle) -> Result<(), PackError> {
        check_line(&self.name, "feature")?;
        out.extend_from_slice(b"feature ");
        out.extend_from_slice(&self.name);
        if let Some(argument) = &self.argument {
            check_line(argument, "feature")?;
            out.push(b'=');
            out.extend_from_slice(argument);
        }
        out.push(b'\n');
        Ok(())
    }
}

/// Options understood by `git fast-import`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionGit {
    MaxPackSize(FileSize),
    BigFileThreshold(FileSize),
    Depth(u32),
    ActiveBranches(u32),
    ExportPackEdges(BString),
    Quiet,
    Stats,
    AllowUnsafeFeatures,
}

impl OptionGit {
    /// Parse the text after `option git `
    ///
    /// # Returns
    ///
    /// `None` for options this crate does not know about
    pub fn parse(field: &[u8]) -> Result<Option<Self>, ParseError> {
        let (name, value) = match field.split_once_str("=") {
            Some((name, value)) => (name, Some(value)),
            None => (field, None),
        };

        let option = match (name, value) {
            (b"--max-pack-size", Some(value)) => OptionGit::MaxPackSize(FileSize::parse(value)?),
            (b"--big-file-threshold", Some(value)) => {
                OptionGit::BigFileThreshold(FileSize::parse(value)?)
            }
            (b"--depth", Some(value)) => OptionGit::Depth(parse_u32(value)?),
            (b"--active-branches", Some(value)) => OptionGit::ActiveBranches(parse_u32(value)?),
            (b"--export-pack-edges", Some(value)) => OptionGit::ExportPackEdges(value.into()),
            (b"--quiet", None) => OptionGit::Quiet,
            (b"--stats", None) => OptionGit::Stats,
            (b"--allow-unsafe-features", None) => OptionGit::AllowUnsafeFeatures,
            _ => return Ok(None),
        };

        Ok(Some(option))
    }
}

impl std::fmt::Display for OptionGit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptionGit::MaxPackSize(size) => write!(f, "--max-pack-size={size}"),
            OptionGit::BigFileThreshold(size) => write!(f, "--big-file-threshold={size}"),
            OptionGit::Depth(depth) => write!(f, "--depth={depth}"),
            OptionGit::ActiveBranches(count) => write!(f, "--active-branches={count}"),
            OptionGit::ExportPackEdges(file) => write!(f, "--export-pack-edges={file}"),
            OptionGit::Quiet => write!(f, "--quiet"),
            OptionGit::Stats => write!(f, "--stats"),
            OptionGit::AllowUnsafeFeatures => write!(f, "--allow-unsafe-features"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionCommand {
    Git(OptionGit),
    /// Any option kept verbatim, including `git` options written in a
    /// non-canonical way such as `--depth=010`
    Other(BString),
}

impl OptionCommand {
    /// Parse the text after `option `
    pub fn parse(field: &[u8]) -> Result<Self, ParseError> {
        let Some(git) = field.strip_prefix(b"git ") else {
            return Ok(OptionCommand::Other(field.into()));
        };

        match OptionGit::parse(git)? {
            Some(option) if option.to_string().as_bytes() == git && !has_padded_number(git) => {
                Ok(OptionCommand::Git(option))
            }
            _ => Ok(OptionCommand::Other(field.into())),
        }
    }
}

fn has_padded_number(field: &[u8]) -> bool {
    field
        .split_once_str("=")
        .is_some_and(|(_, value)| is_zero_padded(value))
}

impl Packable for OptionCommand {
    fn pack(&self, out: &mut Vec<u8>, _style: &PackStyle) -> Result<(), PackError> {
        match self {
            OptionCommand::Git(option) => {
                put_line(out, b"option git", option.to_string().as_bytes(), "option")
            }
            OptionCommand::Other(text) => put_line(out, b"option", text, "option"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Done {
    /// An explicit `done` command
    Explicit,
    /// The input ended without one
    Eof,
}

impl Packable for Done {
    fn pack(&self, out: &mut Vec<u8>, _style: &PackStyle) -> Result<(), PackError> {
        if *self == Done::Explicit {
            out.extend_from_slice(b"done\n");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn canonical_git_options_are_typed() {
        assert_eq!(
            OptionCommand::parse(b"git --depth=10").unwrap(),
            OptionCommand::Git(OptionGit::Depth(10))
        );
        assert_eq!(
            OptionCommand::parse(b"git --max-pack-size=4m").unwrap(),
            OptionCommand::Git(OptionGit::MaxPackSize(FileSize::parse(b"4m").unwrap()))
        );
        assert_eq!(
            OptionCommand::parse(b"git --quiet").unwrap(),
            OptionCommand::Git(OptionGit::Quiet)
        );
    }

    #[test]
    fn non_canonical_options_are_kept_verbatim() {
        assert_eq!(
            OptionCommand::parse(b"git --depth=010").unwrap(),
            OptionCommand::Other("git --depth=010".into())
        );
        assert_eq!(
            OptionCommand::parse(b"git --max-pack-size=4M").unwrap(),
            OptionCommand::Other("git --max-pack-size=4M".into())
        );
        assert_eq!(
            OptionCommand::parse(b"svn --foo").unwrap(),
            OptionCommand::Other("svn --foo".into())
        );
    }

    #[test]
    fn malformed_git_option_values_fail() {
        assert!(OptionCommand::parse(b"git --depth=+1").is_err());
    }

    #[test]
    fn top_level_ls_quotes_only_when_needed() {
        let ls = Ls::new(Some(ObjectRef::Mark(Mark::new(1).unwrap())), "a b".into());
        assert_eq!(
            ls.to_bytes(&PackStyle::default()).unwrap(),
            b"ls :1 \"a b\"\n".to_vec()
        );

        let in_commit = Ls::new(None, "a".into());
        assert_eq!(
            in_commit.to_bytes(&PackStyle::default()).unwrap(),
            b"ls \"a\"\n".to_vec()
        );
    }

    #[test]
    fn feature_keeps_its_argument() {
        let feature = Feature::parse(b"date-format=rfc2822");
        assert_eq!(feature.name, "date-format");
        assert_eq!(feature.argument, Some("rfc2822".into()));
        assert_eq!(
            feature.to_bytes(&PackStyle::default()).unwrap(),
            b"feature date-format=rfc2822\n".to_vec()
        );
    }
}
