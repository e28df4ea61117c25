//! Shared session types
//!
//! - `config`: tunables of a rewrite session and their environment overrides
//! - `error`: error taxonomy for parsing, serialization and the session
//! - `warning`: non-fatal diagnostics accumulated in the session report
//!
//! A [`Position`] travels with every error and warning so a failure can be
//! traced back to the command and input line that caused it.

pub mod config;
pub mod error;
pub mod warning;

use derive_new::new;

/// Location of a command in the input stream
///
/// `command` is the 1-based index of the command being processed, `line` the
/// 1-based line number and `offset` the byte offset at which that line starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, new)]
pub struct Position {
    pub command: u64,
    pub line: u64,
    pub offset: u64,
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "command {}, line {}, byte {}",
            self.command, self.line, self.offset
        )
    }
}
