//! Reference names
//!
//! Branch, tag and reset names are carried through unchanged. Names that
//! git would refuse to create are reported once each as an info-level
//! warning.

pub mod refname;

pub const INVALID_REFNAME_REGEX: &str =
    r"^\.|/\.|\.\.|^/|/$|//|\.lock$|\.lock/|\.$|@\{|^@$|[\x00-\x20\*:\?\[\\~\^\x7f]";
