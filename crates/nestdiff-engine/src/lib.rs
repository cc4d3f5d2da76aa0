//! Recursive comparison engine for nestdiff.
//!
//! Two artifacts go in, a [`Difference`](nestdiff_types::Difference) tree
//! comes out. Along the way each artifact is specialized into a concrete
//! kind, containers are opened, their members paired (exact name, then fuzzy
//! content match, then added/removed) and every pair is compared recursively.
//!
//! # Key Types
//!
//! - [`Artifact`] -- A named byte source: path, in-memory buffer, or missing
//! - [`ArtifactKind`] -- What the specializer decided an artifact is
//! - [`Container`] -- Capability to list and fetch named members
//! - [`Comparator`] -- The configured driver; entry point for a run
//! - [`LeafComparator`] -- Produces diff text for a pair of leaves
//! - [`Similarity`] -- Pluggable fuzzy-match scoring
//! - [`ProgressSink`] -- Observer for run progress
//!
//! # Design Rules
//!
//! 1. Artifacts are immutable; the specialized kind is computed once.
//! 2. Only an abort ends a run early. Every other failure is recorded on the
//!    node where it happened.
//! 3. Pairing order is deterministic for a given input.

pub mod artifact;
pub mod compare;
pub mod container;
pub mod error;
pub mod fuzzy;
pub mod leaf;
pub mod pairing;
pub mod progress;
pub mod specialize;

#[cfg(test)]
mod fixtures;

pub use artifact::{Artifact, ArtifactRef, Materialized, MISSING_NAME};
pub use compare::{CompareOutcome, Comparator, FILE_LIST_LABEL};
pub use container::{as_container, Container, Members};
pub use error::{EngineError, EngineResult};
pub use fuzzy::{ContentSimilarity, Similarity, EXACT_SCORING_BUDGET};
pub use leaf::{ContentDiff, LeafComparator, ToolDiff};
pub use nestdiff_diff::Fingerprint;
pub use pairing::{comparisons, Comparison, MatchOptions, PairingKind};
pub use progress::{NoProgress, Progress, ProgressSink, TracingProgress};
pub use specialize::{specialize, ArtifactKind};
