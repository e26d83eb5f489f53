/// Error types for the feed engine
///
/// Collaborators (graph store, content repositories, affinity lookup) report
/// failures as `anyhow::Error`; the composer maps them into this taxonomy
/// before anything reaches the caller.
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use crate::models::ContentKind;

/// Result type for feed engine operations
pub type Result<T> = std::result::Result<T, FeedError>;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Graph resolution failed: {0}")]
    GraphResolution(String),

    #[error("Content fetch failed for {kind}: {reason}")]
    ContentFetch { kind: ContentKind, reason: String },

    #[error("Scoring failed: {0}")]
    Scoring(String),

    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    #[error("Deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl FeedError {
    pub fn content_fetch(kind: ContentKind, err: impl std::fmt::Display) -> Self {
        FeedError::ContentFetch {
            kind,
            reason: err.to_string(),
        }
    }

    /// Stable machine-readable tag
    pub fn kind(&self) -> &'static str {
        match self {
            FeedError::GraphResolution(_) => "graph_resolution_failure",
            FeedError::ContentFetch { .. } => "content_fetch_failure",
            FeedError::Scoring(_) => "scoring_failure",
            FeedError::InvalidCursor(_) => "invalid_cursor",
            FeedError::DeadlineExceeded(_) => "deadline_exceeded",
            FeedError::Config(_) => "config_error",
        }
    }

    /// Client errors are rejected before any content is fetched.
    pub fn is_client_error(&self) -> bool {
        matches!(self, FeedError::InvalidCursor(_))
    }

    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            kind: self.kind(),
            reason: self.to_string(),
            content_kind: match self {
                FeedError::ContentFetch { kind, .. } => Some(*kind),
                _ => None,
            },
        }
    }
}

/// Structured failure returned to callers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub kind: &'static str,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_kind: Option<ContentKind>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_body_for_fetch_failure() {
        let err = FeedError::content_fetch(ContentKind::Poll, "connection refused");
        let body = err.to_body();

        assert_eq!(body.kind, "content_fetch_failure");
        assert_eq!(body.content_kind, Some(ContentKind::Poll));
        assert!(body.reason.contains("poll"));
        assert!(body.reason.contains("connection refused"));
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_invalid_cursor_is_client_error() {
        let err = FeedError::InvalidCursor("malformed cursor 'x'".to_string());
        assert!(err.is_client_error());

        let json = serde_json::to_value(err.to_body()).unwrap();
        assert_eq!(json["kind"], "invalid_cursor");
        assert!(json.get("contentKind").is_none());
    }
}
