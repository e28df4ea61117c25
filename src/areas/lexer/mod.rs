//! Stream lexer
//!
//! Turns a fast-export stream into [`Command`]s, one at a time.
//!
//! ## States
//!
//! ```text
//! AwaitCommand --commit--> InCommit --blank line / other command--> AwaitCommand
//! AwaitCommand --tag-----> InTag    --message read----------------> AwaitCommand
//! AwaitCommand --done / end of input--> Done
//! ```
//!
//! Lines starting with `#` are comments wherever a command line may
//! appear and are discarded. Blob payloads are not read by
//! [`Lexer::next_command`]; they stay in the input until the caller
//! streams them through [`Lexer::data_reader`] or moves on, in which case
//! they are skipped.

mod input;

use crate::artifacts::codec::date::DateFormat;
use crate::artifacts::codec::path::{PathContext, decode_path};
use crate::artifacts::core::Position;
use crate::artifacts::core::config::Config;
use crate::artifacts::core::error::{ParseError, StreamError};
use crate::artifacts::core::warning::{Warning, WarningKind};
use crate::artifacts::data::reader::DataReader;
use crate::artifacts::data::{DataBlock, DataHeader};
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::command::{
    Alias, CatBlob, Command, Done, Feature, GetMark, Ls, OptionCommand, Parsed, Progress, Reset,
};
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::file_change::{ChangeLine, DataRef, FileChange, FileMode};
use crate::artifacts::objects::mark::Mark;
use crate::artifacts::objects::object_ref::ObjectRef;
use crate::artifacts::objects::person::PersonIdent;
use crate::artifacts::objects::tag::Tag;
use bstr::BString;
use input::Input;
use std::io::BufRead;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommandKind {
    Blob,
    Commit,
    Tag,
    Reset,
    Alias,
    Ls,
    CatBlob,
    GetMark,
    Checkpoint,
    Progress,
    Feature,
    Option,
    Done,
}

impl CommandKind {
    fn takes_argument(&self) -> bool {
        !matches!(
            self,
            CommandKind::Blob | CommandKind::Alias | CommandKind::Checkpoint | CommandKind::Done
        )
    }
}

static COMMANDS: phf::Map<&'static str, CommandKind> = phf::phf_map! {
    "blob" => CommandKind::Blob,
    "commit" => CommandKind::Commit,
    "tag" => CommandKind::Tag,
    "reset" => CommandKind::Reset,
    "alias" => CommandKind::Alias,
    "ls" => CommandKind::Ls,
    "cat-blob" => CommandKind::CatBlob,
    "get-mark" => CommandKind::GetMark,
    "checkpoint" => CommandKind::Checkpoint,
    "progress" => CommandKind::Progress,
    "feature" => CommandKind::Feature,
    "option" => CommandKind::Option,
    "done" => CommandKind::Done,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexerState {
    AwaitCommand,
    InCommit,
    InTag,
    Done,
}

/// Payload of the last blob, still in the input
struct PendingData {
    header: DataHeader,
    read: u64,
    finished: bool,
    /// Start of a delimited line, at most one byte longer than the delimiter
    head: Vec<u8>,
    head_pos: usize,
    at_line_start: bool,
}

impl PendingData {
    fn new(header: DataHeader) -> Self {
        Self {
            header,
            read: 0,
            finished: false,
            head: Vec::new(),
            head_pos: 0,
            at_line_start: true,
        }
    }
}

pub struct Lexer<R> {
    input: Input<R>,
    state: LexerState,
    date_format: DateFormat,
    allow_missing_tagger: bool,
    big_data_threshold: u64,
    command: u64,
    data: Option<PendingData>,
    warnings: Vec<Warning>,
}

impl<R: BufRead> Lexer<R> {
    pub fn new(reader: R) -> Self {
        Self::with_config(reader, &Config::default())
    }

    pub fn with_config(reader: R, config: &Config) -> Self {
        Self {
            input: Input::new(reader),
            state: LexerState::AwaitCommand,
            date_format: config.date_format,
            allow_missing_tagger: config.allow_missing_tagger,
            big_data_threshold: config.big_data_threshold,
            command: 0,
            data: None,
            warnings: Vec::new(),
        }
    }

    pub fn state(&self) -> LexerState {
        self.state
    }

    /// Date format in effect, as changed by `feature date-format=`
    pub fn date_format(&self) -> DateFormat {
        self.date_format
    }

    /// Position of the line the lexer is on
    pub fn position(&self) -> Position {
        self.input.position(self.command)
    }

    /// Warnings raised since the last call
    pub fn take_warnings(&mut self) -> Vec<Warning> {
        std::mem::take(&mut self.warnings)
    }

    /// Read the next command
    ///
    /// Skips whatever is left of the previous blob's payload first. Once
    /// the input is exhausted, or after an explicit `done`, every call
    /// returns [`Done::Eof`].
    pub fn next_command(&mut self) -> Result<Parsed, StreamError> {
        if self.state == LexerState::Done {
            return Ok(Parsed::new(Command::Done(Done::Eof), self.position(), false));
        }
        self.finish_data()?;
        self.state = LexerState::AwaitCommand;

        if !self.bump()? {
            self.state = LexerState::Done;
            return Ok(Parsed::new(Command::Done(Done::Eof), self.position(), false));
        }

        self.command += 1;
        let position = self.position();
        let (command, trailing_lf) = self.parse_command()?;
        tracing::trace!(
            command = position.command,
            line = position.line,
            keyword = command.keyword(),
            "parsed command"
        );
        Ok(Parsed::new(command, position, trailing_lf))
    }

    /// Stream the payload of the blob returned last
    pub fn data_reader(&mut self) -> Result<DataReader<'_, R>, StreamError> {
        if self.data.is_none() {
            return Err(StreamError::NoPendingData);
        }
        Ok(DataReader::new(self))
    }

    /// Skip the rest of a pending payload and its optional blank line
    ///
    /// # Returns
    ///
    /// Whether the payload was followed by the optional blank line
    pub fn finish_data(&mut self) -> Result<bool, StreamError> {
        if self.data.is_none() {
            return Ok(false);
        }
        self.skip_data()?;
        self.data = None;
        self.take_optional_lf()
    }

    pub(crate) fn pending_len(&self) -> Option<u64> {
        self.data.as_ref().and_then(|data| data.header.declared_len())
    }

    pub(crate) fn read_data(&mut self, buf: &mut [u8]) -> Result<usize, StreamError> {
        let Lexer {
            input,
            data,
            command,
            ..
        } = self;
        let pending = data.as_mut().ok_or(StreamError::NoPendingData)?;
        if pending.finished || buf.is_empty() {
            return Ok(0);
        }

        match &pending.header {
            DataHeader::Counted { len } => {
                let remaining = len - pending.read;
                if remaining == 0 {
                    pending.finished = true;
                    return Ok(0);
                }
                let want = remaining.min(buf.len() as u64) as usize;
                let n = input.read_payload(&mut buf[..want])?;
                if n == 0 {
                    return Err(input.error(*command, ParseError::DataUnexpectedEof));
                }
                pending.read += n as u64;
                pending.finished = pending.read == *len;
                Ok(n)
            }
            DataHeader::Delimited { delim } => loop {
                if pending.head_pos < pending.head.len() {
                    let available = &pending.head[pending.head_pos..];
                    let n = available.len().min(buf.len());
                    buf[..n].copy_from_slice(&available[..n]);
                    pending.head_pos += n;
                    pending.read += n as u64;
                    return Ok(n);
                }

                if !pending.at_line_start {
                    let n = input.read_payload_until_lf(buf)?;
                    if n == 0 {
                        return Err(input.error(*command, ParseError::UnterminatedData(delim.clone())));
                    }
                    pending.at_line_start = buf[n - 1] == b'\n';
                    pending.read += n as u64;
                    return Ok(n);
                }

                pending.head.resize(delim.len() + 1, 0);
                let n = input.read_payload_until_lf(&mut pending.head)?;
                pending.head.truncate(n);
                pending.head_pos = 0;
                if n == 0 {
                    return Err(input.error(*command, ParseError::UnterminatedData(delim.clone())));
                }
                let line_end = pending.head.last() == Some(&b'\n');
                let content = pending.head.strip_suffix(b"\n").unwrap_or(&pending.head);
                if content == delim.as_slice() {
                    pending.finished = true;
                    pending.head.clear();
                    return Ok(0);
                }
                pending.at_line_start = line_end;
            },
        }
    }

    pub(crate) fn skip_data(&mut self) -> Result<u64, StreamError> {
        let mut scratch = [0u8; 8192];
        let mut skipped = 0;
        loop {
            match self.read_data(&mut scratch)? {
                0 => return Ok(skipped),
                n => skipped += n as u64,
            }
        }
    }

    fn error(&self, kind: impl Into<ParseError>) -> StreamError {
        self.input.error(self.command, kind)
    }

    fn at<T, E: Into<ParseError>>(&self, result: Result<T, E>) -> Result<T, StreamError> {
        result.map_err(|err| self.error(err))
    }

    fn warn(&mut self, kind: WarningKind) {
        let warning = Warning::new(kind, self.position());
        warning.log();
        self.warnings.push(warning);
    }

    /// Advance to the next line that is not a comment
    fn bump(&mut self) -> Result<bool, StreamError> {
        loop {
            if !self.input.read_line()? {
                return Ok(false);
            }
            if !self.input.line().starts_with(b"#") {
                return Ok(true);
            }
        }
    }

    /// Consume the next line if it is blank
    fn take_optional_lf(&mut self) -> Result<bool, StreamError> {
        if !self.input.read_line()? {
            return Ok(false);
        }
        if self.input.line().is_empty() {
            return Ok(true);
        }
        self.input.unread();
        Ok(false)
    }

    /// Rest of the current line after `prefix`
    fn field(&self, prefix: &[u8]) -> Option<&[u8]> {
        self.input.line().strip_prefix(prefix)
    }

    fn parse_command(&mut self) -> Result<(Command, bool), StreamError> {
        let line = self.input.line();
        if line.is_empty() {
            return Err(self.error(ParseError::UnexpectedBlank));
        }

        let (keyword, arg) = match memchr::memchr(b' ', line) {
            Some(i) => (&line[..i], Some(&line[i + 1..])),
            None => (line, None),
        };
        let kind = std::str::from_utf8(keyword)
            .ok()
            .and_then(|keyword| COMMANDS.get(keyword))
            .copied()
            .filter(|kind| kind.takes_argument() == arg.is_some());
        let Some(kind) = kind else {
            return Err(self.error(ParseError::UnsupportedCommand(line.into())));
        };
        let arg = BString::from(arg.unwrap_or_default());

        let parsed = match kind {
            CommandKind::Blob => (Command::Blob(self.parse_blob()?), false),
            CommandKind::Commit => (Command::Commit(self.parse_commit(arg)?), false),
            CommandKind::Tag => (Command::Tag(self.parse_tag(arg)?), false),
            CommandKind::Reset => {
                let reset = self.parse_reset(arg)?;
                (Command::Reset(reset), self.take_optional_lf()?)
            }
            CommandKind::Alias => {
                let alias = self.parse_alias()?;
                (Command::Alias(alias), self.take_optional_lf()?)
            }
            CommandKind::Ls => {
                if arg.first() == Some(&b'"') {
                    return Err(self.error(ParseError::LsWithoutRoot));
                }
                let ls = self.parse_ls(&arg)?;
                (Command::Ls(ls), self.take_optional_lf()?)
            }
            CommandKind::CatBlob => {
                let cat_blob = CatBlob::new(self.at(ObjectRef::parse(&arg))?);
                (Command::CatBlob(cat_blob), self.take_optional_lf()?)
            }
            CommandKind::GetMark => {
                let get_mark = GetMark::new(self.at(Mark::parse(&arg))?);
                (Command::GetMark(get_mark), self.take_optional_lf()?)
            }
            CommandKind::Checkpoint => (Command::Checkpoint, self.take_optional_lf()?),
            CommandKind::Progress => {
                (Command::Progress(Progress::new(arg)), self.take_optional_lf()?)
            }
            CommandKind::Feature => {
                let feature = Feature::parse(&arg);
                self.apply_feature(&feature)?;
                (Command::Feature(feature), false)
            }
            CommandKind::Option => (Command::Option(self.at(OptionCommand::parse(&arg))?), false),
            CommandKind::Done => {
                self.state = LexerState::Done;
                (Command::Done(Done::Explicit), false)
            }
        };

        Ok(parsed)
    }

    fn apply_feature(&mut self, feature: &Feature) -> Result<(), StreamError> {
        if feature.name != "date-format" {
            return Ok(());
        }
        let argument = feature.argument.clone().unwrap_or_default();
        self.date_format = DateFormat::from_name(&argument)
            .ok_or_else(|| self.error(ParseError::UnknownDateFormat(argument)))?;
        Ok(())
    }

    fn optional_mark(&mut self) -> Result<Option<Mark>, StreamError> {
        let Some(arg) = self.field(b"mark ") else {
            return Ok(None);
        };
        let mark = self.at(Mark::parse(arg))?;
        self.bump()?;
        Ok(Some(mark))
    }

    fn optional_line(&mut self, prefix: &[u8]) -> Result<Option<BString>, StreamError> {
        let Some(arg) = self.field(prefix) else {
            return Ok(None);
        };
        let value = BString::from(arg);
        self.bump()?;
        Ok(Some(value))
    }

    fn optional_ident(&mut self, prefix: &[u8]) -> Result<Option<PersonIdent>, StreamError> {
        let Some(arg) = self.field(prefix) else {
            return Ok(None);
        };
        let ident = self.at(PersonIdent::parse(arg, self.date_format))?;
        self.bump()?;
        Ok(Some(ident))
    }

    fn data_header(&self) -> Result<DataHeader, StreamError> {
        let arg = self
            .field(b"data ")
            .ok_or_else(|| self.error(ParseError::ExpectedData))?;
        self.at(DataHeader::parse(arg))
    }

    /// Read a whole data section into memory
    ///
    /// With a `limit`, a section larger than it is rejected before more
    /// than `limit` bytes are held.
    fn read_block(&mut self, header: DataHeader, limit: Option<u64>) -> Result<DataBlock, StreamError> {
        if let (Some(limit), Some(len)) = (limit, header.declared_len())
            && len > limit
        {
            return Err(self.error(ParseError::InlineDataTooLarge { limit }));
        }

        let delim = header.delim().cloned();
        self.data = Some(PendingData::new(header));
        let mut bytes = Vec::new();
        let mut chunk = [0u8; 8192];
        loop {
            let n = self.read_data(&mut chunk)?;
            if n == 0 {
                break;
            }
            if let Some(limit) = limit
                && (bytes.len() + n) as u64 > limit
            {
                self.data = None;
                return Err(self.error(ParseError::InlineDataTooLarge { limit }));
            }
            bytes.extend_from_slice(&chunk[..n]);
        }
        self.data = None;

        let trailing_lf = self.take_optional_lf()?;
        Ok(DataBlock {
            bytes: bytes.into(),
            delim,
            trailing_lf,
        })
    }

    /// Inline file content, held in memory up to the big data threshold
    fn read_inline(&mut self) -> Result<DataBlock, StreamError> {
        self.bump()?;
        let header = self.data_header()?;
        self.read_block(header, Some(self.big_data_threshold))
    }

    fn parse_blob(&mut self) -> Result<Blob, StreamError> {
        self.bump()?;
        let mark = self.optional_mark()?;
        let original_oid = self.optional_line(b"original-oid ")?;
        let header = self.data_header()?;
        self.data = Some(PendingData::new(header.clone()));
        Ok(Blob::new(mark, original_oid, header))
    }

    fn parse_commit(&mut self, branch: BString) -> Result<Commit, StreamError> {
        self.state = LexerState::InCommit;
        if branch.contains(&0) {
            return Err(self.error(ParseError::ContainsNul("branch")));
        }

        self.bump()?;
        let mark = self.optional_mark()?;
        let original_oid = self.optional_line(b"original-oid ")?;
        let author = self.optional_ident(b"author ")?;
        let committer = self
            .optional_ident(b"committer ")?
            .ok_or_else(|| self.error(ParseError::ExpectedCommitter))?;
        let encoding = self.optional_line(b"encoding ")?;
        let header = self.data_header()?;
        let message = self.read_block(header, None)?;

        let mut commit = Commit::new(branch, committer, message);
        commit.mark = mark;
        commit.original_oid = original_oid;
        commit.author = author;
        commit.encoding = encoding;

        self.bump()?;
        if let Some(arg) = self.field(b"from ") {
            commit.from = Some(self.at(ObjectRef::parse(arg))?);
            self.bump()?;
        }
        while let Some(arg) = self.field(b"merge ") {
            commit.merges.push(self.at(ObjectRef::parse(arg))?);
            self.bump()?;
        }

        let terminated = loop {
            if !self.input.has_line() {
                break false;
            }
            if self.input.line().is_empty() {
                break true;
            }
            match self.parse_change()? {
                Some(change) => commit.changes.push(change),
                None => {
                    self.input.unread();
                    break false;
                }
            }
            self.bump()?;
        };

        // The blank line read after the last data section was the commit's
        // terminator; the serializer always writes one.
        if !terminated
            && let Some(block) = last_block_mut(&mut commit).filter(|block| block.trailing_lf)
        {
            block.trailing_lf = false;
        }

        self.state = LexerState::AwaitCommand;
        Ok(commit)
    }

    /// Parse the current line as a commit sub-command
    ///
    /// # Returns
    ///
    /// `None` if the line does not belong to the commit
    fn parse_change(&mut self) -> Result<Option<ChangeLine>, StreamError> {
        let line = self.input.line().to_vec();

        let change = if let Some(arg) = line.strip_prefix(b"M ") {
            self.parse_modify(arg)?
        } else if let Some(arg) = line.strip_prefix(b"D ") {
            let (path, _) = self.at(decode_path(arg, PathContext::EndOfLine))?;
            FileChange::Delete { path }
        } else if let Some(arg) = line.strip_prefix(b"R ") {
            let (source, destination) = self.parse_pair(arg)?;
            FileChange::Rename {
                source,
                destination,
            }
        } else if let Some(arg) = line.strip_prefix(b"C ") {
            let (source, destination) = self.parse_pair(arg)?;
            FileChange::Copy {
                source,
                destination,
            }
        } else if let Some(arg) = line.strip_prefix(b"N ") {
            self.parse_note(arg)?
        } else if line == b"deleteall" {
            FileChange::DeleteAll
        } else if let Some(arg) = line.strip_prefix(b"ls ") {
            let ls = match arg.first() {
                Some(b'"') => {
                    let (path, _) = self.at(decode_path(arg, PathContext::CommitLs))?;
                    Ls::new(None, path)
                }
                _ => self.parse_ls(arg)?,
            };
            return Ok(Some(ChangeLine::Ls(ls)));
        } else if let Some(arg) = line.strip_prefix(b"cat-blob ") {
            let blob = self.at(ObjectRef::parse(arg))?;
            return Ok(Some(ChangeLine::CatBlob(CatBlob::new(blob))));
        } else {
            return Ok(None);
        };

        Ok(Some(ChangeLine::File(change)))
    }

    fn parse_modify(&mut self, arg: &[u8]) -> Result<FileChange, StreamError> {
        let (mode_field, rest) = self.at(split_space(arg))?;
        let (mode, padded) = self.at(FileMode::parse(mode_field))?;
        if padded {
            self.warn(WarningKind::ZeroPaddedMode {
                mode: mode_field.into(),
            });
        }

        let (dataref, path_field) = self.at(split_space(rest))?;
        let (path, _) = self.at(decode_path(path_field, PathContext::EndOfLine))?;
        let data = match dataref {
            b"inline" => DataRef::Inline(self.read_inline()?),
            _ => DataRef::Object(self.at(ObjectRef::parse(dataref))?),
        };

        Ok(FileChange::Modify { mode, data, path })
    }

    fn parse_pair(&self, arg: &[u8]) -> Result<(BString, BString), StreamError> {
        let (source, rest) = self.at(decode_path(arg, PathContext::Field))?;
        let rest = rest
            .strip_prefix(b" ")
            .ok_or_else(|| self.error(ParseError::MissingSpace))?;
        let (destination, _) = self.at(decode_path(rest, PathContext::EndOfLine))?;
        Ok((source, destination))
    }

    fn parse_note(&mut self, arg: &[u8]) -> Result<FileChange, StreamError> {
        let (dataref, target) = self.at(split_space(arg))?;
        let target = self.at(ObjectRef::parse(target))?;
        let data = match dataref {
            b"inline" => DataRef::Inline(self.read_inline()?),
            _ => DataRef::Object(self.at(ObjectRef::parse(dataref))?),
        };
        Ok(FileChange::NoteModify { data, target })
    }

    fn parse_ls(&self, arg: &[u8]) -> Result<Ls, StreamError> {
        let (root, path) = self.at(split_space(arg))?;
        let root = self.at(ObjectRef::parse(root))?;
        let (path, _) = self.at(decode_path(path, PathContext::Ls))?;
        Ok(Ls::new(Some(root), path))
    }

    fn parse_tag(&mut self, name: BString) -> Result<Tag, StreamError> {
        self.state = LexerState::InTag;
        if name.contains(&0) {
            return Err(self.error(ParseError::ContainsNul("tag name")));
        }

        self.bump()?;
        let mark = self.optional_mark()?;
        let from = match self.field(b"from ") {
            Some(arg) => self.at(ObjectRef::parse(arg))?,
            None => return Err(self.error(ParseError::ExpectedTagFrom)),
        };
        self.bump()?;
        let original_oid = self.optional_line(b"original-oid ")?;
        let tagger = self.optional_ident(b"tagger ")?;
        if tagger.is_none() {
            if !self.allow_missing_tagger {
                return Err(self.error(ParseError::ExpectedTagger));
            }
            self.warn(WarningKind::MissingTagger);
        }
        let header = self.data_header()?;
        let message = self.read_block(header, None)?;

        self.state = LexerState::AwaitCommand;
        Ok(Tag::new(name, mark, from, original_oid, tagger, message))
    }

    fn parse_reset(&mut self, branch: BString) -> Result<Reset, StreamError> {
        if branch.contains(&0) {
            return Err(self.error(ParseError::ContainsNul("branch")));
        }
        if !self.bump()? {
            return Ok(Reset::new(branch, None));
        }
        let from = match self.field(b"from ") {
            Some(arg) => Some(self.at(ObjectRef::parse(arg))?),
            None => {
                self.input.unread();
                None
            }
        };
        Ok(Reset::new(branch, from))
    }

    fn parse_alias(&mut self) -> Result<Alias, StreamError> {
        self.bump()?;
        let mark = match self.field(b"mark ") {
            Some(arg) => self.at(Mark::parse(arg))?,
            None => return Err(self.error(ParseError::ExpectedAliasMark)),
        };
        self.bump()?;
        let to = match self.field(b"to ") {
            Some(arg) => self.at(ObjectRef::parse(arg))?,
            None => return Err(self.error(ParseError::ExpectedAliasTo)),
        };
        Ok(Alias::new(mark, to))
    }
}

fn split_space(field: &[u8]) -> Result<(&[u8], &[u8]), ParseError> {
    memchr::memchr(b' ', field)
        .map(|i| (&field[..i], &field[i + 1..]))
        .ok_or(ParseError::MissingSpace)
}

/// The data section read last while parsing `commit`
fn last_block_mut(commit: &mut Commit) -> Option<&mut DataBlock> {
    if commit.changes.is_empty() {
        if commit.from.is_some() || !commit.merges.is_empty() {
            return None;
        }
        return Some(&mut commit.message);
    }
    match commit.changes.last_mut() {
        Some(ChangeLine::File(
            FileChange::Modify {
                data: DataRef::Inline(block),
                ..
            }
            | FileChange::NoteModify {
                data: DataRef::Inline(block),
                ..
            },
        )) => Some(block),
        _ => None,
    }
}

#[cfg(test)]
mod tests;
