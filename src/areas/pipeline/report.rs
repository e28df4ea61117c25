use crate::artifacts::core::warning::{Severity, Warning};
use crate::artifacts::graph::rewriter::NodeKey;
use crate::artifacts::objects::mark::Mark;
use crate::artifacts::objects::object_id::ObjectId;
use bstr::BString;
use std::collections::BTreeMap;

/// What a session did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    /// Commands read, not counting the implicit end of input
    pub commands: u64,
    pub warnings: Vec<Warning>,
    /// Commits dropped by a hook
    pub dropped: Vec<NodeKey>,
    /// Commits removed because they became empty
    pub pruned: Vec<NodeKey>,
    /// Commits that were merges in the input but not in the output
    pub no_longer_merges: Vec<NodeKey>,
    pub blobs_dropped: u64,
    /// Tags, resets and auxiliary commands left out of the output
    pub commands_dropped: u64,
    /// Final object IDs, when an object hasher was supplied
    pub object_ids: BTreeMap<Mark, ObjectId>,
    /// `original-oid` of each commit mapped to its new ID; `None` if it is gone
    pub commit_renames: BTreeMap<BString, Option<ObjectId>>,
}

impl Report {
    pub fn count(&self, severity: Severity) -> usize {
        self.warnings
            .iter()
            .filter(|warning| warning.severity() == severity)
            .count()
    }

    pub fn has_errors(&self) -> bool {
        self.count(Severity::Error) > 0
    }

    /// Commits that are not in the output, dropped or pruned
    pub fn removed_commits(&self) -> usize {
        self.dropped.len() + self.pruned.len()
    }
}
