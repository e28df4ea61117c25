//! Stream data types and algorithms
//!
//! - `branch`: reference name checks
//! - `codec`: integers, file sizes, dates and quoted paths
//! - `core`: positions, errors, warnings and configuration
//! - `data`: `data` blocks and their streaming reader
//! - `graph`: commit graph rewriting
//! - `objects`: the commands of a stream and the entities they carry

pub mod branch;
pub mod codec;
pub mod core;
pub mod data;
pub mod graph;
pub mod objects;
