//! Foundation types for nestdiff.
//!
//! This crate provides the output and configuration types shared by every
//! other nestdiff crate. The comparison engine produces a [`Difference`] tree,
//! presenters consume it read-only.
//!
//! # Key Types
//!
//! - [`Difference`] -- One node of the difference tree (diff text, comments, children)
//! - [`Incomplete`] / [`IncompleteKind`] -- Marker for comparisons that could not finish
//! - [`CompareConfig`] -- Options fixed for the duration of one comparison run
//! - [`AbortSignal`] -- Shared cancellation flag checked during recursion

pub mod abort;
pub mod config;
pub mod difference;
pub mod error;

pub use abort::AbortSignal;
pub use config::CompareConfig;
pub use difference::{Difference, Incomplete, IncompleteKind};
pub use error::{ConfigError, ConfigResult};
