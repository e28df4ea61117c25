//! Rewrite session
//!
//! A [`Pipeline`] owns the configuration, the hooks and the optional
//! object hasher. [`Pipeline::run`] reads one stream and writes its
//! rewritten form, one entity at a time:
//!
//! ```text
//! lexer -> mark resolution -> field hooks -> entity hook
//!       -> graph rewriter -> serializer
//! ```
//!
//! ## Entities
//!
//! - **blob**: the `blob` hook sees the payload through a
//!   [`BlobBody`]; an untouched payload is copied through in chunks
//! - **commit**: `filename` runs for every path, then `message`, `name`,
//!   `email`, `refname` and `commit`. The rewriter then repairs the
//!   parents and the commit may be pruned
//! - **tag**, **reset**, **alias**, **ls**, **cat-blob**, **get-mark**: a
//!   target that was dropped is moved to its first surviving ancestor or
//!   the command is left out, as [`TargetPolicy`] says
//!
//! ## Failure
//!
//! Any error aborts the session. Output ends after the last entity that
//! was written completely, except for a blob whose payload was being
//! copied through when the failure happened.

mod report;

pub use report::Report;

use crate::areas::hooks::{Action, HookKind, Hooks, Verdict};
use crate::areas::lexer::Lexer;
use crate::areas::marks::{Identity, MarkTable, ObjectDigest, ObjectHasher};
use crate::areas::serializer::{BlobTee, Serializer};
use crate::artifacts::branch::refname::RefnameChecker;
use crate::artifacts::core::Position;
use crate::artifacts::core::config::{Config, PrunePolicy, TargetPolicy};
use crate::artifacts::core::error::{ConfigError, PackError, ParseError, StreamError};
use crate::artifacts::core::warning::{Warning, WarningKind};
use crate::artifacts::data::body::{BlobBody, BodyState};
use crate::artifacts::graph::rewriter::{Decision, GraphRewriter, NodeKey, Parent};
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::command::{
    Alias, CatBlob, Command, Done, GetMark, Ls, Parsed, Progress, Reset,
};
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::file_change::{ChangeLine, DataRef, FileChange};
use crate::artifacts::objects::mark::Mark;
use crate::artifacts::objects::object::PackStyle;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_ref::ObjectRef;
use crate::artifacts::objects::object_type::ObjectKind;
use crate::artifacts::objects::person::PersonIdent;
use crate::artifacts::objects::tag::Tag;
use bstr::{BStr, BString, ByteSlice};
use std::collections::HashSet;
use std::io::{BufRead, Write};

pub struct Pipeline {
    config: Config,
    hooks: Hooks,
    hasher: Option<Box<dyn ObjectHasher>>,
}

impl Pipeline {
    /// Create a pipeline, rejecting an invalid configuration up front
    pub fn new(config: Config, hooks: Hooks) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            hooks,
            hasher: None,
        })
    }

    /// Compute final object IDs for everything written out
    pub fn with_hasher(mut self, hasher: impl ObjectHasher + 'static) -> Self {
        self.hasher = Some(Box::new(hasher));
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Rewrite the stream read from `input` into `output`
    ///
    /// # Returns
    ///
    /// The session report, or the error that stopped the session
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, output: W) -> Result<Report, StreamError> {
        let style = PackStyle {
            quote_non_ascii: self.config.quote_non_ascii,
        };
        let mut session = Session {
            config: &self.config,
            hooks: &mut self.hooks,
            hasher: self.hasher.as_mut(),
            lexer: Lexer::with_config(input, &self.config),
            serializer: Serializer::new(output, style),
            marks: MarkTable::new(),
            graph: GraphRewriter::new(),
            refnames: RefnameChecker::default(),
            dropped_marks: HashSet::new(),
            report: Report::default(),
        };

        session.run()?;

        let report = session.report;
        tracing::info!(
            commands = report.commands,
            dropped = report.dropped.len(),
            pruned = report.pruned.len(),
            warnings = report.warnings.len(),
            "rewrite finished"
        );
        Ok(report)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("hooks", &self.hooks)
            .field("hasher", &self.hasher.is_some())
            .finish()
    }
}

/// Outcome of the filename hook on one file change
enum PathOutcome {
    Keep,
    Remove,
    /// One side of a rename or copy survived; the change is removed anyway
    RemoveHalf(BString),
}

struct Session<'p, R, W> {
    config: &'p Config,
    hooks: &'p mut Hooks,
    hasher: Option<&'p mut Box<dyn ObjectHasher>>,
    lexer: Lexer<R>,
    serializer: Serializer<W>,
    marks: MarkTable,
    graph: GraphRewriter,
    refnames: RefnameChecker,
    /// Blobs, tags and non-commit aliases that were left out
    dropped_marks: HashSet<Mark>,
    report: Report,
}

impl<R: BufRead, W: Write> Session<'_, R, W> {
    fn run(&mut self) -> Result<(), StreamError> {
        loop {
            let Parsed {
                command,
                position,
                trailing_lf,
            } = self.lexer.next_command()?;
            self.collect_lexer_warnings();

            let _span = tracing::debug_span!(
                "command",
                index = position.command,
                keyword = command.keyword()
            )
            .entered();
            if !matches!(command, Command::Done(Done::Eof)) {
                self.report.commands += 1;
            }

            match command {
                Command::Blob(blob) => self.blob(blob, position)?,
                Command::Commit(commit) => self.commit(commit, position)?,
                Command::Tag(tag) => self.tag(tag, position)?,
                Command::Reset(reset) => self.reset(reset, position, trailing_lf)?,
                Command::Alias(alias) => self.alias(alias, position, trailing_lf)?,
                Command::Ls(ls) => self.ls(ls, position, trailing_lf)?,
                Command::CatBlob(cat_blob) => self.cat_blob(cat_blob, position, trailing_lf)?,
                Command::GetMark(get_mark) => self.get_mark(get_mark, position, trailing_lf)?,
                Command::Checkpoint => self.checkpoint(position, trailing_lf)?,
                Command::Progress(progress) => self.progress(progress, position, trailing_lf)?,
                Command::Feature(feature) => {
                    self.serializer.emit(&feature, trailing_lf, position)?;
                    self.serializer.flush_entity()?;
                }
                Command::Option(option) => {
                    self.serializer.emit(&option, trailing_lf, position)?;
                    self.serializer.flush_entity()?;
                }
                Command::Done(done) => return self.done(done, position),
            }
        }
    }

    fn blob(&mut self, mut blob: Blob, position: Position) -> Result<(), StreamError> {
        let mark = blob.mark;
        if let Some(mark) = mark {
            let identity = Identity::Pending {
                kind: ObjectKind::Blob,
                command: position.command,
            };
            self.define(mark, identity, position)?;
        }

        let Session {
            config,
            hooks,
            hasher,
            lexer,
            serializer,
            ..
        } = self;
        let mut digest = match (mark, hasher.as_mut()) {
            (Some(_), Some(hasher)) => Some(hasher.digest(ObjectKind::Blob)),
            _ => None,
        };
        let as_read = blob.clone();
        let mut reader = lexer.data_reader()?;
        let mut tee = BlobTee::new(&mut *serializer, &as_read, digest.as_mut(), position);
        let mut body = BlobBody::new(&mut reader, config.big_data_threshold).with_tee(&mut tee);
        let verdict = match hooks.blob.as_mut() {
            Some(hook) => hook(&mut blob, &mut body).map_err(|error| StreamError::Hook {
                kind: HookKind::Blob,
                position,
                error,
            })?,
            None => Verdict::Keep,
        };
        let state = body.into_state();
        let mark_changed = blob.mark != mark;
        blob.mark = mark;

        if state == BodyState::Written {
            if verdict == Verdict::Drop {
                return Err(StreamError::Pack {
                    kind: PackError::BlobWritten,
                    position,
                });
            }
            blob = as_read;
        }
        if verdict == Verdict::Keep {
            serializer.write_blob(&blob, state, &mut reader, digest.as_mut(), position)?;
        }
        drop(reader);

        if mark_changed {
            self.warn(WarningKind::MarkChangedByHook, position);
        }
        if verdict == Verdict::Drop {
            if let Some(mark) = mark {
                self.dropped_marks.insert(mark);
            }
            self.report.blobs_dropped += 1;
            tracing::debug!(mark = ?mark, "dropped blob");
            return Ok(());
        }

        if self.lexer.finish_data()? {
            self.serializer.blank_line();
            self.serializer.flush_entity()?;
        }
        self.finalize(mark, digest, position)?;
        Ok(())
    }

    fn commit(&mut self, mut commit: Commit, position: Position) -> Result<(), StreamError> {
        self.resolve_commit(&commit, position)?;
        let mark = commit.mark;
        let key = match mark {
            Some(mark) => {
                let identity = Identity::Pending {
                    kind: ObjectKind::Commit,
                    command: position.command,
                };
                self.define(mark, identity, position)?;
                NodeKey::Mark(mark)
            }
            None => self.graph.next_anonymous(),
        };

        let branch = commit.branch.clone();
        let had_changes = commit.file_changes().next().is_some();
        let was_merge = self
            .graph
            .original_parents(branch.as_bstr(), commit.from.as_ref(), &commit.merges)
            .len()
            > 1;

        let mut verdict = self.commit_fields(&mut commit, position)?;
        if verdict == Verdict::Keep
            && let Some(hook) = self.hooks.commit.as_mut()
        {
            verdict = hook(&mut commit).map_err(|error| StreamError::Hook {
                kind: HookKind::Commit,
                position,
                error,
            })?;
        }
        if commit.mark != mark {
            commit.mark = mark;
            self.warn(WarningKind::MarkChangedByHook, position);
        }
        if verdict == Verdict::Keep {
            self.resolve_commit(&commit, position)?;
            self.filter_changes(&mut commit);
        }

        let parents =
            self.graph
                .original_parents(branch.as_bstr(), commit.from.as_ref(), &commit.merges);
        let replacement = self.graph.replacement(&parents);
        let decision = match verdict {
            Verdict::Drop => {
                self.report.dropped.push(key);
                Decision::Drop
            }
            Verdict::Keep if self.is_prunable(&commit, &parents, &replacement, had_changes, was_merge) => {
                self.report.pruned.push(key);
                Decision::Drop
            }
            Verdict::Keep => Decision::Keep,
        };
        self.graph.record(key, branch.as_bstr(), decision, &parents);

        if decision == Decision::Drop {
            tracing::debug!(node = %key, branch = %branch, "commit left out");
            if let Some(original) = commit.original_oid {
                self.report.commit_renames.insert(original, None);
            }
            return Ok(());
        }

        if was_merge && replacement.len() < 2 {
            self.report.no_longer_merges.push(key);
        }
        self.apply_parents(&mut commit, &parents, &replacement, position)?;
        self.check_paths(&commit, position);
        self.check_refname(commit.branch.as_bstr(), position);

        let mut digest = self.start_digest(ObjectKind::Commit, mark);
        self.serializer
            .emit_hashed(&commit, false, position, digest.as_mut())?;
        self.serializer.flush_entity()?;
        self.graph
            .set_output_tip(commit.branch.as_bstr(), Some(Parent::Node(key)));

        let oid = self.finalize(mark, digest, position)?;
        if let (Some(original), Some(oid)) = (commit.original_oid, oid) {
            self.report.commit_renames.insert(original, Some(oid));
        }
        Ok(())
    }

    /// Run the field hooks of a commit in dispatch order
    fn commit_fields(&mut self, commit: &mut Commit, position: Position) -> Result<Verdict, StreamError> {
        let hooks = &mut *self.hooks;
        let mut warnings = Vec::new();

        if hooks.filename.is_some() {
            let mut kept = Vec::with_capacity(commit.changes.len());
            for mut line in std::mem::take(&mut commit.changes) {
                if let ChangeLine::File(change) = &mut line {
                    match filter_paths(hooks, change, position)? {
                        PathOutcome::Keep => {}
                        PathOutcome::Remove => continue,
                        PathOutcome::RemoveHalf(path) => {
                            warnings.push(WarningKind::RenameSourceFiltered { path });
                            continue;
                        }
                    }
                }
                kept.push(line);
            }
            commit.changes = kept;
        }

        let verdict = 'fields: {
            match run_field(hooks, HookKind::Message, &commit.message.bytes, position)? {
                Action::Keep => {}
                Action::Replace(message) => commit.message.set_bytes(message),
                Action::Veto => break 'fields Verdict::Drop,
            }

            let idents = commit
                .author
                .iter_mut()
                .chain(std::iter::once(&mut commit.committer))
                .collect();
            if !ident_fields(hooks, idents, position)? {
                break 'fields Verdict::Drop;
            }

            if !rewrite_field(hooks, HookKind::Refname, &mut commit.branch, position)? {
                break 'fields Verdict::Drop;
            }
            Verdict::Keep
        };

        for kind in warnings {
            self.warn(kind, position);
        }
        Ok(verdict)
    }

    fn tag(&mut self, mut tag: Tag, position: Position) -> Result<(), StreamError> {
        self.resolve(&tag.from, position)?;
        let mark = tag.mark;
        if let Some(mark) = mark {
            let identity = Identity::Pending {
                kind: ObjectKind::Tag,
                command: position.command,
            };
            self.define(mark, identity, position)?;
        }

        let mut verdict = self.tag_fields(&mut tag, position)?;
        if verdict == Verdict::Keep
            && let Some(hook) = self.hooks.tag.as_mut()
        {
            verdict = hook(&mut tag).map_err(|error| StreamError::Hook {
                kind: HookKind::Tag,
                position,
                error,
            })?;
        }
        if tag.mark != mark {
            tag.mark = mark;
            self.warn(WarningKind::MarkChangedByHook, position);
        }
        if verdict == Verdict::Drop {
            self.drop_command(mark);
            return Ok(());
        }

        self.resolve(&tag.from, position)?;
        let Some(from) = self.retarget(&tag.from, "tag", position) else {
            self.drop_command(mark);
            return Ok(());
        };
        tag.from = from;
        self.check_refname(tag.name.as_bstr(), position);

        let mut digest = self.start_digest(ObjectKind::Tag, mark);
        self.serializer
            .emit_hashed(&tag, false, position, digest.as_mut())?;
        self.serializer.flush_entity()?;
        self.finalize(mark, digest, position)?;
        Ok(())
    }

    fn tag_fields(&mut self, tag: &mut Tag, position: Position) -> Result<Verdict, StreamError> {
        let hooks = &mut *self.hooks;
        match run_field(hooks, HookKind::Message, &tag.message.bytes, position)? {
            Action::Keep => {}
            Action::Replace(message) => tag.message.set_bytes(message),
            Action::Veto => return Ok(Verdict::Drop),
        }
        if !ident_fields(hooks, tag.tagger.iter_mut().collect(), position)? {
            return Ok(Verdict::Drop);
        }
        if !rewrite_field(hooks, HookKind::Refname, &mut tag.name, position)? {
            return Ok(Verdict::Drop);
        }
        Ok(Verdict::Keep)
    }

    fn reset(&mut self, mut reset: Reset, position: Position, trailing_lf: bool) -> Result<(), StreamError> {
        if let Some(from) = &reset.from {
            self.resolve(from, position)?;
        }
        let branch = reset.branch.clone();
        let input_target = reset.from.as_ref().map(|from| self.graph.node_for(from));

        let mut verdict = if rewrite_field(&mut *self.hooks, HookKind::Refname, &mut reset.branch, position)? {
            Verdict::Keep
        } else {
            Verdict::Drop
        };
        if verdict == Verdict::Keep
            && let Some(hook) = self.hooks.reset.as_mut()
        {
            verdict = hook(&mut reset).map_err(|error| StreamError::Hook {
                kind: HookKind::Reset,
                position,
                error,
            })?;
        }
        if verdict == Verdict::Drop {
            self.graph.reset(branch.as_bstr(), input_target);
            self.report.commands_dropped += 1;
            return Ok(());
        }

        if let Some(from) = &reset.from {
            self.resolve(from, position)?;
        }
        let input_target = reset.from.as_ref().map(|from| self.graph.node_for(from));
        self.graph.reset(branch.as_bstr(), input_target);

        if let Some(from) = reset.from.take() {
            match self.retarget(&from, "reset", position) {
                Some(target) => reset.from = Some(target),
                None => {
                    self.report.commands_dropped += 1;
                    return Ok(());
                }
            }
        }
        self.check_refname(reset.branch.as_bstr(), position);
        self.serializer.emit(&reset, trailing_lf, position)?;
        self.serializer.flush_entity()?;

        let output_target = reset.from.as_ref().map(|from| self.graph.node_for(from));
        self.graph
            .set_output_tip(reset.branch.as_bstr(), output_target);
        Ok(())
    }

    fn alias(&mut self, mut alias: Alias, position: Position, trailing_lf: bool) -> Result<(), StreamError> {
        let identity = self.resolve(&alias.to, position)?;
        self.define(alias.mark, identity, position)?;

        let target = self.graph.node_for(&alias.to);
        let to = self.retarget(&alias.to, "alias", position);
        match &target {
            Parent::Node(_) => self.graph.alias(alias.mark, &target, to.is_some()),
            Parent::External(_) if to.is_none() => {
                self.dropped_marks.insert(alias.mark);
            }
            Parent::External(_) => {}
        }

        let Some(to) = to else {
            self.report.commands_dropped += 1;
            return Ok(());
        };
        alias.to = to;
        self.serializer.emit(&alias, trailing_lf, position)?;
        self.serializer.flush_entity()
    }

    fn ls(&mut self, mut ls: Ls, position: Position, trailing_lf: bool) -> Result<(), StreamError> {
        if let Some(root) = ls.root.take() {
            self.resolve(&root, position)?;
            match self.retarget(&root, "ls", position) {
                Some(root) => ls.root = Some(root),
                None => {
                    self.report.commands_dropped += 1;
                    return Ok(());
                }
            }
        }
        self.serializer.emit(&ls, trailing_lf, position)?;
        self.serializer.flush_entity()
    }

    fn cat_blob(&mut self, mut cat_blob: CatBlob, position: Position, trailing_lf: bool) -> Result<(), StreamError> {
        self.resolve(&cat_blob.blob, position)?;
        let Some(blob) = self.retarget(&cat_blob.blob, "cat-blob", position) else {
            self.report.commands_dropped += 1;
            return Ok(());
        };
        cat_blob.blob = blob;
        self.serializer.emit(&cat_blob, trailing_lf, position)?;
        self.serializer.flush_entity()
    }

    fn get_mark(&mut self, get_mark: GetMark, position: Position, trailing_lf: bool) -> Result<(), StreamError> {
        self.resolve(&ObjectRef::Mark(get_mark.mark), position)?;
        if self.dropped_marks.contains(&get_mark.mark)
            || self.graph.is_dropped(NodeKey::Mark(get_mark.mark))
        {
            self.warn(WarningKind::TargetDropped { command: "get-mark" }, position);
            self.report.commands_dropped += 1;
            return Ok(());
        }
        self.serializer.emit(&get_mark, trailing_lf, position)?;
        self.serializer.flush_entity()
    }

    fn checkpoint(&mut self, position: Position, trailing_lf: bool) -> Result<(), StreamError> {
        let verdict = match self.hooks.checkpoint.as_mut() {
            Some(hook) => hook().map_err(|error| StreamError::Hook {
                kind: HookKind::Checkpoint,
                position,
                error,
            })?,
            None => Verdict::Keep,
        };
        if verdict == Verdict::Drop {
            self.report.commands_dropped += 1;
            return Ok(());
        }
        self.serializer
            .emit(&Command::Checkpoint, trailing_lf, position)?;
        self.serializer.flush_entity()
    }

    fn progress(&mut self, mut progress: Progress, position: Position, trailing_lf: bool) -> Result<(), StreamError> {
        let verdict = match self.hooks.progress.as_mut() {
            Some(hook) => hook(&mut progress).map_err(|error| StreamError::Hook {
                kind: HookKind::Progress,
                position,
                error,
            })?,
            None => Verdict::Keep,
        };
        if verdict == Verdict::Drop {
            self.report.commands_dropped += 1;
            return Ok(());
        }
        self.serializer.emit(&progress, trailing_lf, position)?;
        self.serializer.flush_entity()
    }

    fn done(&mut self, done: Done, position: Position) -> Result<(), StreamError> {
        if let Some(hook) = self.hooks.done.as_mut() {
            hook().map_err(|error| StreamError::Hook {
                kind: HookKind::Done,
                position,
                error,
            })?;
        }
        self.serializer.emit(&done, false, position)?;
        self.serializer.flush()
    }

    /// Resolve every reference a commit makes; unknown marks are fatal
    fn resolve_commit(&self, commit: &Commit, position: Position) -> Result<(), StreamError> {
        for parent in commit.parents() {
            self.resolve(parent, position)?;
            if self.config.validate_topology
                && let Some(mark) = parent.mark()
                && let Some(kind) = self.marks.kind_of(mark)
                && kind != ObjectKind::Commit
            {
                return Err(StreamError::Parse {
                    kind: ParseError::ParentNotCommit { mark, kind },
                    position,
                });
            }
        }

        for line in &commit.changes {
            let reference = match line {
                ChangeLine::File(FileChange::Modify {
                    data: DataRef::Object(object),
                    ..
                }) => Some(object),
                ChangeLine::File(FileChange::NoteModify { data, target }) => {
                    if let DataRef::Object(object) = data {
                        self.resolve(object, position)?;
                    }
                    Some(target)
                }
                ChangeLine::Ls(Ls {
                    root: Some(root), ..
                }) => Some(root),
                ChangeLine::CatBlob(cat_blob) => Some(&cat_blob.blob),
                _ => None,
            };
            if let Some(reference) = reference {
                self.resolve(reference, position)?;
            }
        }
        Ok(())
    }

    /// Remove changes that name dropped blobs or annotate dropped commits
    fn filter_changes(&mut self, commit: &mut Commit) {
        let dropped_marks = &self.dropped_marks;
        let graph = &self.graph;
        let is_gone = |object: &ObjectRef| {
            object
                .mark()
                .is_some_and(|mark| dropped_marks.contains(&mark))
        };

        let before = commit.changes.len();
        commit.changes.retain(|line| match line {
            ChangeLine::File(FileChange::Modify {
                data: DataRef::Object(object),
                ..
            }) => !is_gone(object),
            ChangeLine::File(FileChange::NoteModify { data, target }) => {
                let blob_gone = matches!(data, DataRef::Object(object) if is_gone(object));
                let target_gone = target
                    .mark()
                    .is_some_and(|mark| graph.is_dropped(NodeKey::Mark(mark)));
                !blob_gone && !target_gone
            }
            ChangeLine::CatBlob(cat_blob) => !is_gone(&cat_blob.blob),
            _ => true,
        });

        let removed = before - commit.changes.len();
        if removed > 0 {
            tracing::debug!(removed, "removed changes naming dropped objects");
        }
    }

    fn is_prunable(
        &self,
        commit: &Commit,
        parents: &[Parent],
        replacement: &[Parent],
        had_changes: bool,
        was_merge: bool,
    ) -> bool {
        if commit.file_changes().next().is_some() {
            return false;
        }
        let lost_parents = !parents.is_empty() && replacement.is_empty();
        match self.config.prune_empty {
            PrunePolicy::Never => false,
            PrunePolicy::Roots => lost_parents,
            PrunePolicy::Auto => replacement.len() <= 1 && (lost_parents || had_changes || was_merge),
        }
    }

    /// Write the replacement parents into `commit`
    ///
    /// Parents are left alone when nothing changed. Otherwise they become
    /// explicit, except for a first parent without a mark, which can only
    /// be reached as the current tip of the branch. A commit left without
    /// parents on a branch that already exists in the output is preceded
    /// by a `reset` so that it starts a new root.
    fn apply_parents(
        &mut self,
        commit: &mut Commit,
        original: &[Parent],
        replacement: &[Parent],
        position: Position,
    ) -> Result<(), StreamError> {
        let branch = commit.branch.clone();
        let output_tip = self.graph.output_tip(branch.as_bstr()).cloned();
        if replacement == original
            && (commit.from.is_some() || replacement.first() == output_tip.as_ref())
        {
            return Ok(());
        }

        let mut refs = Vec::with_capacity(replacement.len());
        for (i, parent) in replacement.iter().enumerate() {
            match parent.to_object_ref() {
                Some(reference) => refs.push(Some(reference)),
                None if i == 0 && output_tip.as_ref() == Some(parent) => refs.push(None),
                None => self.warn(WarningKind::UnreachableParent, position),
            }
        }

        let implicit = matches!(refs.first(), Some(None));
        let mut refs = refs.into_iter().flatten();
        commit.from = if implicit { None } else { refs.next() };
        commit.merges = refs.collect();
        tracing::debug!(
            branch = %branch,
            parents = replacement.len(),
            "rewrote parents"
        );

        if commit.from.is_none() && !implicit && output_tip.is_some() {
            self.serializer
                .emit(&Reset::new(branch.clone(), None), false, position)?;
            self.graph.set_output_tip(branch.as_bstr(), None);
        }
        Ok(())
    }

    /// Where a command naming `target` should point in the output
    ///
    /// # Returns
    ///
    /// `None` if the command has to be left out
    fn retarget(&mut self, target: &ObjectRef, command: &'static str, position: Position) -> Option<ObjectRef> {
        if target
            .mark()
            .is_some_and(|mark| self.dropped_marks.contains(&mark))
        {
            self.warn(WarningKind::TargetDropped { command }, position);
            return None;
        }

        let node = self.graph.node_for(target);
        let Parent::Node(key) = node else {
            return Some(target.clone());
        };
        if !self.graph.is_dropped(key) {
            return Some(target.clone());
        }

        let survivor = match self.config.dropped_target {
            TargetPolicy::Retarget => self
                .graph
                .retarget(&node)
                .and_then(|parent| parent.to_object_ref()),
            TargetPolicy::Drop => None,
        };
        match survivor {
            Some(survivor) => {
                self.warn(WarningKind::TargetRetargeted { command }, position);
                Some(survivor)
            }
            None => {
                self.warn(WarningKind::TargetDropped { command }, position);
                None
            }
        }
    }

    fn drop_command(&mut self, mark: Option<Mark>) {
        if let Some(mark) = mark {
            self.dropped_marks.insert(mark);
        }
        self.report.commands_dropped += 1;
    }

    fn check_paths(&mut self, commit: &Commit, position: Position) {
        let limit = self.config.long_path_warning;
        let long: Vec<usize> = commit
            .file_changes()
            .flat_map(FileChange::paths)
            .map(|path| path.len())
            .filter(|&len| len > limit)
            .collect();
        for len in long {
            self.warn(WarningKind::LongPath { len }, position);
        }
    }

    fn check_refname(&mut self, name: &BStr, position: Position) {
        if self.refnames.report(name) {
            self.warn(
                WarningKind::InvalidRefname {
                    name: name.to_owned(),
                },
                position,
            );
        }
    }

    fn resolve(&self, reference: &ObjectRef, position: Position) -> Result<Identity, StreamError> {
        self.marks
            .resolve_at(reference, position.command)
            .map_err(|kind| StreamError::Parse {
                kind: kind.into(),
                position,
            })
    }

    fn define(&mut self, mark: Mark, identity: Identity, position: Position) -> Result<(), StreamError> {
        self.marks
            .define(mark, identity, position.command)
            .map_err(|kind| StreamError::Parse {
                kind: kind.into(),
                position,
            })
    }

    fn start_digest(&mut self, kind: ObjectKind, mark: Option<Mark>) -> Option<Box<dyn ObjectDigest>> {
        mark?;
        self.hasher.as_mut().map(|hasher| hasher.digest(kind))
    }

    /// Record the final ID of a marked object once it was written
    fn finalize(
        &mut self,
        mark: Option<Mark>,
        digest: Option<Box<dyn ObjectDigest>>,
        position: Position,
    ) -> Result<Option<ObjectId>, StreamError> {
        let (Some(mark), Some(digest)) = (mark, digest) else {
            return Ok(None);
        };
        let oid = digest
            .finish()
            .map_err(|error| StreamError::Hasher { position, error })?;
        self.marks
            .reassign(mark, oid.clone())
            .map_err(|kind| StreamError::Parse {
                kind: kind.into(),
                position,
            })?;
        tracing::trace!(%mark, %oid, "final object id");
        self.report.object_ids.insert(mark, oid.clone());
        Ok(Some(oid))
    }

    fn warn(&mut self, kind: WarningKind, position: Position) {
        let warning = Warning::new(kind, position);
        warning.log();
        self.report.warnings.push(warning);
    }

    fn collect_lexer_warnings(&mut self) {
        let warnings = self.lexer.take_warnings();
        self.report.warnings.extend(warnings);
    }
}

fn run_field(
    hooks: &mut Hooks,
    kind: HookKind,
    value: &[u8],
    position: Position,
) -> Result<Action, StreamError> {
    match hooks.field(kind) {
        Some(hook) => hook(value).map_err(|error| StreamError::Hook {
            kind,
            position,
            error,
        }),
        None => Ok(Action::Keep),
    }
}

/// Apply a field hook in place
///
/// # Returns
///
/// `false` if the hook vetoed the value
fn rewrite_field(
    hooks: &mut Hooks,
    kind: HookKind,
    value: &mut BString,
    position: Position,
) -> Result<bool, StreamError> {
    match run_field(hooks, kind, value.as_slice(), position)? {
        Action::Keep => Ok(true),
        Action::Replace(replacement) => {
            *value = replacement.into();
            Ok(true)
        }
        Action::Veto => Ok(false),
    }
}

/// Run `name` over every named identity, then `email` over all of them
fn ident_fields(
    hooks: &mut Hooks,
    mut idents: Vec<&mut PersonIdent>,
    position: Position,
) -> Result<bool, StreamError> {
    for ident in idents.iter_mut() {
        if let Some(name) = ident.name.as_mut()
            && !rewrite_field(hooks, HookKind::Name, name, position)?
        {
            return Ok(false);
        }
    }
    for ident in idents.iter_mut() {
        if !rewrite_field(hooks, HookKind::Email, &mut ident.email, position)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn filter_paths(
    hooks: &mut Hooks,
    change: &mut FileChange,
    position: Position,
) -> Result<PathOutcome, StreamError> {
    let mut vetoed = 0;
    let mut survivor = None;
    for path in change.paths_mut() {
        if rewrite_field(hooks, HookKind::Filename, path, position)? {
            survivor = Some(path.clone());
        } else {
            vetoed += 1;
        }
    }

    Ok(match (vetoed, survivor) {
        (0, _) => PathOutcome::Keep,
        (_, Some(path)) => PathOutcome::RemoveHalf(path),
        (_, None) => PathOutcome::Remove,
    })
}
