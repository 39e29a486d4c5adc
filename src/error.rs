use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Failures surfaced by the scan pipeline.
///
/// Report parse problems are deliberately absent: a malformed report degrades
/// to a partial host list instead of failing the scan.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("{tool} is not installed or not available in PATH")]
    ToolUnavailable { tool: String },

    #[error("scan timed out after {}s. Try a smaller IP range or port range.", .0.as_secs())]
    Timeout(Duration),

    #[error("{0}")]
    ToolExecution(String),

    #[error("scanner output exceeded {limit} bytes")]
    OutputTooLarge { limit: usize },

    #[error("a scan is already running")]
    Busy,

    #[error("scan was stopped")]
    Cancelled,
}

/// Stable tag for each `ScanError` variant, used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    ToolUnavailable,
    Timeout,
    ToolExecution,
    OutputTooLarge,
    Busy,
    Cancelled,
}

impl ScanError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::ToolUnavailable { .. } => ErrorKind::ToolUnavailable,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::ToolExecution(_) => ErrorKind::ToolExecution,
            Self::OutputTooLarge { .. } => ErrorKind::OutputTooLarge,
            Self::Busy => ErrorKind::Busy,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_suggests_narrower_range() {
        let msg = ScanError::Timeout(Duration::from_secs(300)).to_string();
        assert!(msg.contains("300s"));
        assert!(msg.contains("smaller IP range"));
    }

    #[test]
    fn kind_serializes_snake_case() {
        let tag = serde_json::to_string(&ScanError::ToolUnavailable { tool: "nmap".into() }.kind()).unwrap();
        assert_eq!(tag, "\"tool_unavailable\"");
    }
}
