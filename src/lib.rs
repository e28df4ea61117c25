//! Streaming fast-export rewriter
//!
//! Reads a `git fast-export` stream, hands its entities to user hooks,
//! repairs the commit graph around whatever the hooks removed and writes
//! an equivalent stream for `git fast-import`.
//!
//! ```no_run
//! use bit_rewrite::{Action, Config, Hooks, Pipeline};
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut hooks = Hooks::new();
//! hooks.on_filename(|path| {
//!     Ok(if path.starts_with(b"secrets/") { Action::Veto } else { Action::Keep })
//! })?;
//!
//! let mut pipeline = Pipeline::new(Config::default(), hooks)?;
//! let report = pipeline.run(std::io::stdin().lock(), std::io::stdout().lock())?;
//! eprintln!("{} commits removed", report.removed_commits());
//! # Ok(())
//! # }
//! ```

pub mod areas;
pub mod artifacts;
pub mod commands;

pub use areas::hooks::{Action, HookKind, Hooks, Verdict};
pub use areas::lexer::Lexer;
pub use areas::marks::{Identity, MarkTable, ObjectDigest, ObjectHasher};
pub use areas::pipeline::{Pipeline, Report};
pub use areas::serializer::Serializer;
pub use artifacts::core::Position;
pub use artifacts::core::config::{Config, PrunePolicy, TargetPolicy};
pub use artifacts::core::error::{ConfigError, PackError, ParseError, StreamError};
pub use artifacts::core::warning::{Severity, Warning, WarningKind};
pub use artifacts::data::body::BlobBody;
pub use artifacts::graph::rewriter::NodeKey;
pub use artifacts::objects::command::Command;
