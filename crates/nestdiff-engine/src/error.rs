//! Error types for the comparison engine.

use nestdiff_diff::DiffError;
use nestdiff_types::{AbortSignal, IncompleteKind};

/// Errors raised while walking and comparing containers.
///
/// Only [`Aborted`](Self::Aborted) ends a run; every other variant is
/// recorded on the difference node where it happened.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A container has no member with this name.
    #[error("no member `{name}` in {container}")]
    MemberNotFound { container: String, name: String },

    /// No known format matched the artifact's content.
    #[error("unsupported format: {name}")]
    UnsupportedFormat { name: String },

    /// A container listing or member fetch failed on corrupt input.
    #[error("malformed container {name}: {reason}")]
    MalformedContainer { name: String, reason: String },

    /// Reading an artifact failed.
    #[error("cannot read {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// A leaf comparison's external tool is missing or failed.
    #[error(transparent)]
    Tool(DiffError),

    /// Nesting went deeper than the configured bound.
    #[error("maximum depth of {limit} exceeded")]
    MaxDepthExceeded { limit: usize },

    /// The run's abort signal fired.
    #[error("comparison aborted: {reason}")]
    Aborted { reason: String },
}

impl EngineError {
    /// Shorthand for an I/O error on a named artifact.
    pub fn io(name: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            name: name.into(),
            source,
        }
    }

    /// Shorthand for a malformed container.
    pub fn malformed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedContainer {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// The error for a fired abort signal, carrying its reason.
    pub fn aborted(signal: &AbortSignal) -> Self {
        Self::Aborted {
            reason: signal.reason().unwrap_or("aborted").to_string(),
        }
    }

    /// Returns `true` if this error must unwind the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Aborted { .. })
    }

    /// The marker recorded on a difference node for this error.
    pub fn incomplete_kind(&self) -> IncompleteKind {
        match self {
            Self::Tool(DiffError::ToolMissing { .. }) => IncompleteKind::ToolUnavailable,
            Self::Tool(_) => IncompleteKind::ToolFailed,
            Self::MemberNotFound { .. }
            | Self::MalformedContainer { .. }
            | Self::UnsupportedFormat { .. } => IncompleteKind::MalformedContainer,
            Self::Io { .. } => IncompleteKind::Unreadable,
            Self::MaxDepthExceeded { .. } => IncompleteKind::MaxDepthExceeded,
            Self::Aborted { .. } => IncompleteKind::Truncated,
        }
    }
}

impl From<DiffError> for EngineError {
    fn from(err: DiffError) -> Self {
        match err {
            DiffError::Aborted => Self::Aborted {
                reason: "aborted while running an external tool".into(),
            },
            other => Self::Tool(other),
        }
    }
}

/// Convenience alias for engine results.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_missing_maps_to_unavailable() {
        let err = EngineError::from(DiffError::ToolMissing { tool: "nm".into() });
        assert_eq!(err.incomplete_kind(), IncompleteKind::ToolUnavailable);
        assert!(!err.is_fatal());
    }

    #[test]
    fn tool_abort_becomes_fatal() {
        let err = EngineError::from(DiffError::Aborted);
        assert!(err.is_fatal());
        assert_eq!(err.incomplete_kind(), IncompleteKind::Truncated);
    }

    #[test]
    fn malformed_message() {
        let err = EngineError::malformed("lib.a", "bad header");
        assert_eq!(err.to_string(), "malformed container lib.a: bad header");
    }
}
