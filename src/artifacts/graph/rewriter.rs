//! Commit graph rewriter
//!
//! Hooks may drop a commit after other commits were already connected to
//! it through `from` and `merge`. The rewriter keeps a decision for every
//! commit of the session and, for each one, its **replacement parent list**:
//! its own parents with every dropped parent replaced by that parent's
//! replacement list.
//!
//! ## Algorithm
//!
//! Commits arrive in the stream's topological order, so every parent a
//! commit names has already been decided. A dropped commit stores its fully
//! expanded replacement list when it is recorded, which makes expanding a
//! later reference a single lookup instead of a walk through the dropped
//! chain:
//!
//! ```text
//!   A <- B <- C          B dropped: replacement(B) = [A]
//!                        C's parents [B] expand to [A]
//! ```
//!
//! Expansion flattens in order and removes duplicates keeping the first
//! occurrence, so the first surviving ancestor of the first parent stays
//! first and mainline history is preserved.
//!
//! ## Branch tips
//!
//! A commit without `from` continues the tip of its branch. The rewriter
//! tracks tips as the input defines them, dropped commits included, so that
//! implicit parents expand like explicit ones. Tips of the output are
//! tracked separately: they decide whether an implicit parent is still
//! valid once the commit is written out.
//!
//! No cycle detection is done; an acyclic input yields acyclic output.

use crate::artifacts::objects::mark::Mark;
use crate::artifacts::objects::object_ref::ObjectRef;
use bstr::{BStr, BString};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Identity of a commit inside the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKey {
    Mark(Mark),
    /// A commit without a mark, numbered in arrival order
    Anonymous(u64),
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKey::Mark(mark) => write!(f, "{mark}"),
            NodeKey::Anonymous(id) => write!(f, "<anonymous #{id}>"),
        }
    }
}

/// One parent edge
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Parent {
    /// A commit seen earlier in the session
    Node(NodeKey),
    /// An object outside the session, e.g. an object ID or a branch name
    External(ObjectRef),
}

impl Parent {
    /// How the parent can be written in a `from` or `merge` line
    pub fn to_object_ref(&self) -> Option<ObjectRef> {
        match self {
            Parent::Node(NodeKey::Mark(mark)) => Some(ObjectRef::Mark(*mark)),
            Parent::Node(NodeKey::Anonymous(_)) => None,
            Parent::External(object) => Some(object.clone()),
        }
    }
}

impl fmt::Display for Parent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Parent::Node(key) => write!(f, "{key}"),
            Parent::External(object) => write!(f, "{object}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Keep,
    Drop,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NodeState {
    Kept { parents: Vec<Parent> },
    Dropped { replacement: Vec<Parent> },
}

#[derive(Debug, Default)]
pub struct GraphRewriter {
    nodes: HashMap<NodeKey, NodeState>,
    tips: HashMap<BString, Parent>,
    output_tips: HashMap<BString, Parent>,
    anonymous: u64,
}

impl GraphRewriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Key for the next commit that has no mark
    pub fn next_anonymous(&mut self) -> NodeKey {
        self.anonymous += 1;
        NodeKey::Anonymous(self.anonymous)
    }

    /// Parent edge for a reference found in the stream
    ///
    /// Marks of commits recorded in this session become graph nodes;
    /// anything else is outside the graph.
    pub fn node_for(&self, reference: &ObjectRef) -> Parent {
        if let ObjectRef::Mark(mark) = reference {
            let key = NodeKey::Mark(*mark);
            if self.nodes.contains_key(&key) {
                return Parent::Node(key);
            }
        }
        Parent::External(reference.clone())
    }

    /// Parents of a commit on `branch` as the input defines them
    ///
    /// Without `from`, the first parent is the current tip of `branch`.
    pub fn original_parents(
        &self,
        branch: &BStr,
        from: Option<&ObjectRef>,
        merges: &[ObjectRef],
    ) -> Vec<Parent> {
        let first = match from {
            Some(from) => Some(self.node_for(from)),
            None => self.tip(branch).cloned(),
        };
        first
            .into_iter()
            .chain(merges.iter().map(|merge| self.node_for(merge)))
            .collect()
    }

    /// Expand every dropped parent into its own replacement list
    ///
    /// The result keeps the order of `parents` and lists each survivor
    /// once, at its first occurrence.
    pub fn replacement(&self, parents: &[Parent]) -> Vec<Parent> {
        let mut seen = HashSet::new();
        let mut result = Vec::with_capacity(parents.len());

        for parent in parents {
            let expanded = match parent {
                Parent::Node(key) => match self.nodes.get(key) {
                    Some(NodeState::Dropped { replacement }) => replacement.as_slice(),
                    _ => std::slice::from_ref(parent),
                },
                Parent::External(_) => std::slice::from_ref(parent),
            };
            for survivor in expanded {
                if seen.insert(survivor.clone()) {
                    result.push(survivor.clone());
                }
            }
        }

        result
    }

    /// First survivor standing in for `target`, if any
    pub fn retarget(&self, target: &Parent) -> Option<Parent> {
        self.replacement(std::slice::from_ref(target))
            .into_iter()
            .next()
    }

    /// Record the decision for a commit on `branch` and advance the branch tip
    ///
    /// # Returns
    ///
    /// The replacement parent list of the commit
    pub fn record(
        &mut self,
        key: NodeKey,
        branch: &BStr,
        decision: Decision,
        parents: &[Parent],
    ) -> Vec<Parent> {
        let replacement = self.replacement(parents);
        let state = match decision {
            Decision::Keep => NodeState::Kept {
                parents: replacement.clone(),
            },
            Decision::Drop => NodeState::Dropped {
                replacement: replacement.clone(),
            },
        };
        tracing::trace!(node = %key, ?decision, parents = replacement.len(), "recorded commit");

        self.nodes.insert(key, state);
        self.tips.insert(branch.into(), Parent::Node(key));
        replacement
    }

    /// Record an `alias` mark for `target`
    ///
    /// An alias that is written out is a node of its own. One that is not
    /// stands for whatever replaces its target.
    pub fn alias(&mut self, mark: Mark, target: &Parent, written: bool) {
        let state = if written {
            NodeState::Kept {
                parents: Vec::new(),
            }
        } else {
            NodeState::Dropped {
                replacement: self.replacement(std::slice::from_ref(target)),
            }
        };
        self.nodes.insert(NodeKey::Mark(mark), state);
    }

    /// Move the input tip of `branch`, or delete it when `target` is `None`
    pub fn reset(&mut self, branch: &BStr, target: Option<Parent>) {
        match target {
            Some(target) => self.tips.insert(branch.into(), target),
            None => self.tips.remove(branch),
        };
    }

    pub fn tip(&self, branch: &BStr) -> Option<&Parent> {
        self.tips.get(branch)
    }

    /// Move the output tip of `branch`, or delete it when `target` is `None`
    pub fn set_output_tip(&mut self, branch: &BStr, target: Option<Parent>) {
        match target {
            Some(target) => self.output_tips.insert(branch.into(), target),
            None => self.output_tips.remove(branch),
        };
    }

    pub fn output_tip(&self, branch: &BStr) -> Option<&Parent> {
        self.output_tips.get(branch)
    }

    pub fn is_dropped(&self, key: NodeKey) -> bool {
        matches!(self.nodes.get(&key), Some(NodeState::Dropped { .. }))
    }

    pub fn contains(&self, key: NodeKey) -> bool {
        self.nodes.contains_key(&key)
    }

    /// Replacement parents a kept commit was written with
    pub fn parents_of(&self, key: NodeKey) -> Option<&[Parent]> {
        match self.nodes.get(&key) {
            Some(NodeState::Kept { parents }) => Some(parents),
            _ => None,
        }
    }
}
