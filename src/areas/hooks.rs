//! Hook registry
//!
//! Hooks are the only way a session changes the stream. There are two
//! families:
//!
//! - **field hooks** see one atomic value (a path, a message, a name, an
//!   email, a reference name) and return an [`Action`]
//! - **entity hooks** see a whole blob, commit, tag, reset or progress
//!   command after its field hooks ran, mutate it in place and return a
//!   [`Verdict`]
//!
//! Every kind holds at most one hook. Registering a second one for the same
//! kind is a configuration error reported before any input is read.
//!
//! ## Dispatch order
//!
//! Within one entity, hooks run in [`HookKind::DISPATCH_ORDER`]. Only the
//! kinds that apply to the entity run; e.g. a commit runs `filename` for
//! every path, then `message`, `name`, `email`, `refname` and finally
//! `commit`.

use crate::artifacts::core::error::ConfigError;
use crate::artifacts::data::body::BlobBody;
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::command::{Progress, Reset};
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::tag::Tag;
use bitflags::bitflags;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    Filename,
    Message,
    Name,
    Email,
    Refname,
    Blob,
    Commit,
    Tag,
    Reset,
    Progress,
    Checkpoint,
    Done,
}

impl HookKind {
    pub const DISPATCH_ORDER: [HookKind; 12] = [
        HookKind::Filename,
        HookKind::Message,
        HookKind::Name,
        HookKind::Email,
        HookKind::Refname,
        HookKind::Blob,
        HookKind::Commit,
        HookKind::Tag,
        HookKind::Reset,
        HookKind::Progress,
        HookKind::Checkpoint,
        HookKind::Done,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HookKind::Filename => "filename",
            HookKind::Message => "message",
            HookKind::Name => "name",
            HookKind::Email => "email",
            HookKind::Refname => "refname",
            HookKind::Blob => "blob",
            HookKind::Commit => "commit",
            HookKind::Tag => "tag",
            HookKind::Reset => "reset",
            HookKind::Progress => "progress",
            HookKind::Checkpoint => "checkpoint",
            HookKind::Done => "done",
        }
    }

    pub fn flag(&self) -> HookSet {
        match self {
            HookKind::Filename => HookSet::FILENAME,
            HookKind::Message => HookSet::MESSAGE,
            HookKind::Name => HookSet::NAME,
            HookKind::Email => HookSet::EMAIL,
            HookKind::Refname => HookSet::REFNAME,
            HookKind::Blob => HookSet::BLOB,
            HookKind::Commit => HookSet::COMMIT,
            HookKind::Tag => HookSet::TAG,
            HookKind::Reset => HookSet::RESET,
            HookKind::Progress => HookSet::PROGRESS,
            HookKind::Checkpoint => HookSet::CHECKPOINT,
            HookKind::Done => HookSet::DONE,
        }
    }

    pub fn is_field(&self) -> bool {
        HookSet::FIELDS.contains(self.flag())
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct HookSet: u16 {
        const FILENAME = 1 << 0;
        const MESSAGE = 1 << 1;
        const NAME = 1 << 2;
        const EMAIL = 1 << 3;
        const REFNAME = 1 << 4;
        const BLOB = 1 << 5;
        const COMMIT = 1 << 6;
        const TAG = 1 << 7;
        const RESET = 1 << 8;
        const PROGRESS = 1 << 9;
        const CHECKPOINT = 1 << 10;
        const DONE = 1 << 11;
        const FIELDS = Self::FILENAME.bits()
            | Self::MESSAGE.bits()
            | Self::NAME.bits()
            | Self::EMAIL.bits()
            | Self::REFNAME.bits();
    }
}

/// Outcome of a field hook
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Keep,
    Replace(Vec<u8>),
    /// Remove the value; for a path this removes the file change, for any
    /// other field it drops the whole entity
    Veto,
}

/// Outcome of an entity hook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Keep,
    Drop,
}

pub type FieldHook = Box<dyn FnMut(&[u8]) -> anyhow::Result<Action>>;
pub type BlobHook = Box<dyn FnMut(&mut Blob, &mut BlobBody<'_>) -> anyhow::Result<Verdict>>;
pub type CommitHook = Box<dyn FnMut(&mut Commit) -> anyhow::Result<Verdict>>;
pub type TagHook = Box<dyn FnMut(&mut Tag) -> anyhow::Result<Verdict>>;
pub type ResetHook = Box<dyn FnMut(&mut Reset) -> anyhow::Result<Verdict>>;
pub type ProgressHook = Box<dyn FnMut(&mut Progress) -> anyhow::Result<Verdict>>;
pub type CheckpointHook = Box<dyn FnMut() -> anyhow::Result<Verdict>>;
pub type DoneHook = Box<dyn FnMut() -> anyhow::Result<()>>;

macro_rules! hook_setter {
    ($(#[$doc:meta])* $setter:ident => $field:ident, $kind:expr, $($bound:tt)+) => {
        $(#[$doc])*
        pub fn $setter(&mut self, hook: impl $($bound)+ + 'static) -> Result<&mut Self, ConfigError> {
            self.claim($kind)?;
            self.$field = Some(Box::new(hook));
            Ok(self)
        }
    };
}

/// The hooks of one session
#[derive(Default)]
pub struct Hooks {
    registered: HookSet,
    pub(crate) filename: Option<FieldHook>,
    pub(crate) message: Option<FieldHook>,
    pub(crate) name: Option<FieldHook>,
    pub(crate) email: Option<FieldHook>,
    pub(crate) refname: Option<FieldHook>,
    pub(crate) blob: Option<BlobHook>,
    pub(crate) commit: Option<CommitHook>,
    pub(crate) tag: Option<TagHook>,
    pub(crate) reset: Option<ResetHook>,
    pub(crate) progress: Option<ProgressHook>,
    pub(crate) checkpoint: Option<CheckpointHook>,
    pub(crate) done: Option<DoneHook>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kinds that have a hook
    pub fn registered(&self) -> HookSet {
        self.registered
    }

    pub fn is_empty(&self) -> bool {
        self.registered.is_empty()
    }

    fn claim(&mut self, kind: HookKind) -> Result<(), ConfigError> {
        if self.registered.contains(kind.flag()) {
            return Err(ConfigError::HookRedefined(kind));
        }
        self.registered.insert(kind.flag());
        Ok(())
    }

    hook_setter!(
        /// Called for every path of every file change
        on_filename => filename, HookKind::Filename, FnMut(&[u8]) -> anyhow::Result<Action>
    );
    hook_setter!(
        /// Called for the message of every commit and tag
        on_message => message, HookKind::Message, FnMut(&[u8]) -> anyhow::Result<Action>
    );
    hook_setter!(
        /// Called for every author, committer and tagger name
        on_name => name, HookKind::Name, FnMut(&[u8]) -> anyhow::Result<Action>
    );
    hook_setter!(
        /// Called for every author, committer and tagger email
        on_email => email, HookKind::Email, FnMut(&[u8]) -> anyhow::Result<Action>
    );
    hook_setter!(
        /// Called for the branch of every commit and reset and the name of every tag
        on_refname => refname, HookKind::Refname, FnMut(&[u8]) -> anyhow::Result<Action>
    );
    hook_setter!(
        on_blob => blob, HookKind::Blob,
        FnMut(&mut Blob, &mut BlobBody<'_>) -> anyhow::Result<Verdict>
    );
    hook_setter!(on_commit => commit, HookKind::Commit, FnMut(&mut Commit) -> anyhow::Result<Verdict>);
    hook_setter!(on_tag => tag, HookKind::Tag, FnMut(&mut Tag) -> anyhow::Result<Verdict>);
    hook_setter!(on_reset => reset, HookKind::Reset, FnMut(&mut Reset) -> anyhow::Result<Verdict>);
    hook_setter!(
        on_progress => progress, HookKind::Progress,
        FnMut(&mut Progress) -> anyhow::Result<Verdict>
    );
    hook_setter!(
        on_checkpoint => checkpoint, HookKind::Checkpoint, FnMut() -> anyhow::Result<Verdict>
    );
    hook_setter!(
        /// Called once, when the input ends
        on_done => done, HookKind::Done, FnMut() -> anyhow::Result<()>
    );

    pub(crate) fn field(&mut self, kind: HookKind) -> Option<&mut FieldHook> {
        match kind {
            HookKind::Filename => self.filename.as_mut(),
            HookKind::Message => self.message.as_mut(),
            HookKind::Name => self.name.as_mut(),
            HookKind::Email => self.email.as_mut(),
            HookKind::Refname => self.refname.as_mut(),
            _ => None,
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("registered", &self.registered)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn dispatch_order_is_fixed() {
        let names: Vec<&str> = HookKind::DISPATCH_ORDER.iter().map(HookKind::as_str).collect();
        assert_eq!(
            names,
            vec![
                "filename",
                "message",
                "name",
                "email",
                "refname",
                "blob",
                "commit",
                "tag",
                "reset",
                "progress",
                "checkpoint",
                "done",
            ]
        );
    }

    #[test]
    fn every_kind_has_its_own_flag() {
        let all = HookKind::DISPATCH_ORDER
            .iter()
            .fold(HookSet::empty(), |set, kind| set | kind.flag());
        assert_eq!(all.bits().count_ones(), 12);
    }

    #[rstest]
    #[case(HookKind::Filename, true)]
    #[case(HookKind::Refname, true)]
    #[case(HookKind::Blob, false)]
    #[case(HookKind::Done, false)]
    fn field_kinds(#[case] kind: HookKind, #[case] expected: bool) {
        assert_eq!(kind.is_field(), expected);
    }

    #[test]
    fn registering_twice_is_a_configuration_error() {
        let mut hooks = Hooks::new();
        hooks.on_message(|_| Ok(Action::Keep)).unwrap();

        let err = hooks.on_message(|_| Ok(Action::Veto)).unwrap_err();
        assert!(matches!(err, ConfigError::HookRedefined(HookKind::Message)));
    }

    #[test]
    fn setters_chain() {
        let mut hooks = Hooks::new();
        hooks
            .on_filename(|_| Ok(Action::Keep))
            .and_then(|hooks| hooks.on_commit(|_| Ok(Verdict::Keep)))
            .and_then(|hooks| hooks.on_done(|| Ok(())))
            .unwrap();

        assert_eq!(
            hooks.registered(),
            HookSet::FILENAME | HookSet::COMMIT | HookSet::DONE
        );
        assert!(hooks.field(HookKind::Filename).is_some());
        assert!(hooks.field(HookKind::Message).is_none());
        assert!(hooks.field(HookKind::Commit).is_none());
    }

    #[test]
    fn field_hooks_are_callable() {
        let mut hooks = Hooks::new();
        hooks
            .on_email(|email| Ok(Action::Replace(email.to_ascii_uppercase())))
            .unwrap();

        let hook = hooks.field(HookKind::Email).unwrap();
        assert_eq!(hook(b"a@b").unwrap(), Action::Replace(b"A@B".to_vec()));
    }
}
