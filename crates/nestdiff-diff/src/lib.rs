//! Leaf-level diff primitives for nestdiff.
//!
//! Everything the comparison engine needs once it has reached a pair of
//! leaves: line diffs rendered as unified text, hexdumps for binary content,
//! similarity scores for pairing renamed members, and a runner for external
//! analysis tools.
//!
//! # Key Types
//!
//! - [`BlobDiff`] / [`DiffHunk`] / [`DiffLine`] -- Line-level diff with unified rendering
//! - [`ToolCommand`] -- Blocking, abortable external tool invocation
//! - [`content_similarity`] -- Similarity score in `[0, 1]`
//! - [`Fingerprint`] -- Per-content summary for rejecting dissimilar pairs cheaply

pub mod blob_diff;
pub mod command;
pub mod error;
pub mod hexdump;
pub mod similarity;

pub use blob_diff::{diff_blobs, diff_text, BlobDiff, DiffHunk, DiffLine};
pub use command::ToolCommand;
pub use error::{DiffError, DiffResult};
pub use hexdump::hexdump;
pub use similarity::{content_similarity, Fingerprint};
