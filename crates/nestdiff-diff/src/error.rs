//! Error types for the leaf diff crate.

/// Errors that can occur while producing a leaf-level diff.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// The external tool needed for this comparison is not installed.
    #[error("required tool `{tool}` is not installed")]
    ToolMissing { tool: String },

    /// The external tool ran but exited unsuccessfully.
    #[error("`{tool}` exited with {}: {stderr}", describe_status(.status))]
    ToolFailed {
        tool: String,
        status: Option<i32>,
        stderr: String,
    },

    /// The run was aborted while the tool was running.
    #[error("comparison aborted")]
    Aborted,

    /// I/O failure talking to the tool.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn describe_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("status {code}"),
        None => "a signal".to_string(),
    }
}

/// Convenience alias for diff results.
pub type DiffResult<T> = Result<T, DiffError>;
