//! Commit graph repair
//!
//! - `rewriter`: replacement parent lists for commits whose ancestors were
//!   dropped, and branch tips on both sides of the rewrite

pub mod rewriter;
