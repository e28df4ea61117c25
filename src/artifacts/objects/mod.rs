//! Entities of a fast-export stream
//!
//! - `blob`, `commit`, `tag`: the object-creating commands
//! - `command`: the remaining commands and the [`Command`](command::Command) union
//! - `file_change`: `M`/`D`/`R`/`C`/`N`/`deleteall` lines and file modes
//! - `mark`, `object_id`, `object_ref`: ways of naming objects
//! - `object`: the [`Packable`](object::Packable) serialization trait
//! - `person`: author, committer and tagger identifiers

pub mod blob;
pub mod command;
pub mod commit;
pub mod file_change;
pub mod mark;
pub mod object;
pub mod object_id;
pub mod object_ref;
pub mod object_type;
pub mod person;
pub mod tag;

/// Length of a SHA-1 object name in hexadecimal
pub const SHA1_HEX_LENGTH: usize = 40;
/// Length of a SHA-256 object name in hexadecimal
pub const SHA256_HEX_LENGTH: usize = 64;
