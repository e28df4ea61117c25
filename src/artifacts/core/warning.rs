//! Non-fatal diagnostics
//!
//! Warnings never abort a session. Each one is logged through `tracing` as
//! soon as it is raised and also kept in the session report.

use crate::artifacts::core::Position;
use bstr::BString;
use derive_new::new;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Severity::Info => "info",
            Severity::Warn => "warning",
            Severity::Error => "error",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarningKind {
    /// A path longer than the configured limit
    LongPath { len: usize },
    /// A file mode written with extra leading zeros
    ZeroPaddedMode { mode: BString },
    /// A reference name git would refuse to create
    InvalidRefname { name: BString },
    /// A rewritten parent that can only be named implicitly but is not the branch tip
    UnreachableParent,
    /// A rename or copy whose other side was removed by the filename hook
    RenameSourceFiltered { path: BString },
    /// A command pointing at a dropped commit was moved to a surviving ancestor
    TargetRetargeted { command: &'static str },
    /// A command pointing at a dropped commit was removed
    TargetDropped { command: &'static str },
    /// A hook changed the mark of an entity; the change was undone
    MarkChangedByHook,
    /// A tag without a tagger line
    MissingTagger,
}

impl WarningKind {
    pub fn severity(&self) -> Severity {
        match self {
            WarningKind::InvalidRefname { .. } | WarningKind::TargetRetargeted { .. } => {
                Severity::Info
            }
            WarningKind::UnreachableParent => Severity::Error,
            _ => Severity::Warn,
        }
    }
}

impl std::fmt::Display for WarningKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WarningKind::LongPath { len } => write!(f, "path of {len} bytes is unusually long"),
            WarningKind::ZeroPaddedMode { mode } => {
                write!(f, "file mode {mode} is zero-padded; normalized")
            }
            WarningKind::InvalidRefname { name } => {
                write!(f, "{name} is not a valid reference name")
            }
            WarningKind::UnreachableParent => {
                write!(f, "rewritten parent has no mark and is not the branch tip; skipped")
            }
            WarningKind::RenameSourceFiltered { path } => {
                write!(f, "rename or copy of filtered path {path}")
            }
            WarningKind::TargetRetargeted { command } => {
                write!(f, "{command} target was dropped; moved to a surviving ancestor")
            }
            WarningKind::TargetDropped { command } => {
                write!(f, "{command} target was dropped; command removed")
            }
            WarningKind::MarkChangedByHook => write!(f, "hook changed a mark; change undone"),
            WarningKind::MissingTagger => write!(f, "tag has no tagger"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct Warning {
    pub kind: WarningKind,
    pub position: Position,
}

impl Warning {
    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }

    /// Emit the warning on the `tracing` subscriber at its severity
    pub fn log(&self) {
        match self.severity() {
            Severity::Info => tracing::info!(position = %self.position, "{}", self.kind),
            Severity::Warn => tracing::warn!(position = %self.position, "{}", self.kind),
            Severity::Error => tracing::error!(position = %self.position, "{}", self.kind),
        }
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} ({})", self.severity(), self.kind, self.position)
    }
}
