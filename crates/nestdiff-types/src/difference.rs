//! The difference tree produced by a comparison run.
//!
//! A [`Difference`] records one compared pair: the two display names, the
//! rendered unified diff of their leaf-level content, free-form comments and
//! the differences found further down. The tree is fully built before it is
//! handed to a presenter.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One node of the difference tree.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Difference {
    /// Display name of the "ours" side.
    pub source1: String,
    /// Display name of the "theirs" side.
    pub source2: String,
    /// Unified diff of the leaf-level content, empty when there is none.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub unified_diff: String,
    /// Human-readable notes (fuzzy match scores, type mismatches, ...).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<String>,
    /// Set when this comparison could not be completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incomplete: Option<Incomplete>,
    /// Differences found inside this pair, in comparison order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<Difference>,
}

impl Difference {
    /// Create an empty node for a pair of sources.
    pub fn new(source1: impl Into<String>, source2: impl Into<String>) -> Self {
        Self {
            source1: source1.into(),
            source2: source2.into(),
            ..Default::default()
        }
    }

    /// Create a node carrying a unified diff.
    pub fn with_diff(
        source1: impl Into<String>,
        source2: impl Into<String>,
        unified_diff: impl Into<String>,
    ) -> Self {
        Self {
            unified_diff: unified_diff.into(),
            ..Self::new(source1, source2)
        }
    }

    /// Returns `true` if the node records nothing worth reporting.
    pub fn is_empty(&self) -> bool {
        self.unified_diff.is_empty()
            && self.comments.is_empty()
            && self.incomplete.is_none()
            && self.details.is_empty()
    }

    /// `None` for an empty node, the node otherwise.
    pub fn into_non_empty(self) -> Option<Self> {
        if self.is_empty() {
            None
        } else {
            Some(self)
        }
    }

    /// Append a child, skipping empty ones.
    pub fn add_detail(&mut self, detail: Difference) {
        if !detail.is_empty() {
            self.details.push(detail);
        }
    }

    /// Append a comment.
    pub fn add_comment(&mut self, comment: impl Into<String>) {
        self.comments.push(comment.into());
    }

    /// Record that this comparison could not be completed.
    ///
    /// The first marker is kept; later ones are appended as comments so no
    /// reason is lost.
    pub fn mark_incomplete(&mut self, marker: Incomplete) {
        match &self.incomplete {
            None => self.incomplete = Some(marker),
            Some(_) => self.comments.push(marker.to_string()),
        }
    }

    /// Returns `true` if this node or any descendant was cut short by an abort.
    pub fn is_truncated(&self) -> bool {
        self.incomplete
            .as_ref()
            .is_some_and(|m| m.kind == IncompleteKind::Truncated)
            || self.details.iter().any(Difference::is_truncated)
    }

    /// Total number of nodes in this subtree, including `self`.
    pub fn node_count(&self) -> usize {
        1 + self.details.iter().map(Difference::node_count).sum::<usize>()
    }

    /// Total bytes of unified diff text in this subtree.
    pub fn diff_bytes(&self) -> usize {
        self.unified_diff.len() + self.details.iter().map(Difference::diff_bytes).sum::<usize>()
    }

    /// Depth-first, pre-order traversal. The visitor receives each node and its
    /// depth (0 for `self`).
    pub fn walk<F>(&self, visitor: &mut F)
    where
        F: FnMut(&Difference, usize),
    {
        self.walk_at(0, visitor);
    }

    fn walk_at<F>(&self, depth: usize, visitor: &mut F)
    where
        F: FnMut(&Difference, usize),
    {
        visitor(self, depth);
        for detail in &self.details {
            detail.walk_at(depth + 1, visitor);
        }
    }
}

/// Why a comparison could not be completed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncompleteKind {
    /// An external tool needed for this comparison is not installed.
    ToolUnavailable,
    /// An external tool ran but failed.
    ToolFailed,
    /// The container listing or a member fetch failed on corrupt input.
    MalformedContainer,
    /// The artifact could not be read.
    Unreadable,
    /// The recursion-depth guard stopped the descent.
    MaxDepthExceeded,
    /// The run was aborted before this subtree finished.
    Truncated,
}

impl fmt::Display for IncompleteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::ToolUnavailable => "tool unavailable",
            Self::ToolFailed => "tool failed",
            Self::MalformedContainer => "malformed container",
            Self::Unreadable => "unreadable",
            Self::MaxDepthExceeded => "maximum depth exceeded",
            Self::Truncated => "truncated",
        };
        f.write_str(label)
    }
}

/// Marker attached to a [`Difference`] whose comparison did not finish.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Incomplete {
    pub kind: IncompleteKind,
    pub reason: String,
}

impl Incomplete {
    pub fn new(kind: IncompleteKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Incomplete {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_node_is_empty() {
        let node = Difference::new("a", "b");
        assert!(node.is_empty());
        assert!(node.into_non_empty().is_none());
    }

    #[test]
    fn comment_makes_node_non_empty() {
        let mut node = Difference::new("a", "b");
        node.add_comment("renamed");
        assert!(!node.is_empty());
    }

    #[test]
    fn empty_details_are_dropped() {
        let mut parent = Difference::new("a", "b");
        parent.add_detail(Difference::new("a/x", "b/x"));
        assert!(parent.details.is_empty());

        parent.add_detail(Difference::with_diff("a/y", "b/y", "@@ -1 +1 @@\n-1\n+2\n"));
        assert_eq!(parent.details.len(), 1);
        assert_eq!(parent.node_count(), 2);
    }

    #[test]
    fn second_marker_becomes_comment() {
        let mut node = Difference::new("a", "b");
        node.mark_incomplete(Incomplete::new(IncompleteKind::ToolFailed, "nm exited 1"));
        node.mark_incomplete(Incomplete::new(IncompleteKind::Truncated, "aborted"));
        assert_eq!(node.incomplete.as_ref().unwrap().kind, IncompleteKind::ToolFailed);
        assert_eq!(node.comments, vec!["truncated: aborted".to_string()]);
    }

    #[test]
    fn truncation_is_found_in_descendants() {
        let mut child = Difference::new("x", "y");
        child.mark_incomplete(Incomplete::new(IncompleteKind::Truncated, "stop"));
        let mut root = Difference::new("a", "b");
        root.add_detail(child);
        assert!(root.is_truncated());
    }

    #[test]
    fn walk_visits_preorder_with_depth() {
        let mut inner = Difference::with_diff("x", "x", "d");
        inner.add_detail(Difference::with_diff("x/1", "x/1", "e"));
        let mut root = Difference::new("a", "b");
        root.add_detail(inner);
        root.add_detail(Difference::with_diff("y", "y", "f"));

        let mut seen = Vec::new();
        root.walk(&mut |node, depth| seen.push((node.source1.clone(), depth)));
        assert_eq!(
            seen,
            vec![
                ("a".to_string(), 0),
                ("x".to_string(), 1),
                ("x/1".to_string(), 2),
                ("y".to_string(), 1),
            ]
        );
        assert_eq!(root.diff_bytes(), 3);
    }

    #[test]
    fn serialization_skips_empty_fields() {
        let node = Difference::with_diff("a", "b", "diff");
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["unified_diff"], "diff");
        assert!(json.get("details").is_none());
        assert!(json.get("incomplete").is_none());

        let back: Difference = serde_json::from_value(json).unwrap();
        assert_eq!(back, node);
    }
}
