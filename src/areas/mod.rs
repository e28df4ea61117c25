//! Stateful components of a rewrite session
//!
//! - `lexer`: pull parser turning input bytes into commands
//! - `marks`: mark table resolving `:<n>` references
//! - `hooks`: hook registry and dispatch order
//! - `serializer`: writes commands back out, one entity at a time
//! - `pipeline`: the session tying them together

pub mod hooks;
pub mod lexer;
pub mod marks;
pub mod pipeline;
pub mod serializer;
