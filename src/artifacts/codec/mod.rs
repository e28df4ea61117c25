//! Field codecs of the fast-import grammar
//!
//! - `integer`: strict decimal integers and file sizes
//! - `date`: raw, rfc2822 and `now` dates
//! - `path`: C-style quoted paths

pub mod date;
pub mod integer;
pub mod path;
