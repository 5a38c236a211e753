//! Error types for canvas operations.

use serde::Deserialize;
use thiserror::Error;

/// Failure reported by the transport for a single request.
#[derive(Debug, Clone, PartialEq, Eq, Error, Deserialize)]
#[serde(rename_all = "camelCase")]
#[error("request failed with status {status}: {response_text}")]
pub struct TransportError {
    /// HTTP status, or 0 when the request never reached the server
    pub status: u16,
    /// Body returned by the server
    #[serde(default)]
    pub response_text: String,
}

impl TransportError {
    /// Creates an error with the given status and server text.
    pub fn new(status: u16, response_text: impl Into<String>) -> Self {
        Self {
            status,
            response_text: response_text.into(),
        }
    }

    /// Whether the server rejected the request for a reason the user can act on.
    ///
    /// These statuses carry a human readable explanation in the response body.
    pub fn is_client_error(&self) -> bool {
        matches!(self.status, 400 | 401 | 403 | 404 | 409)
    }
}

/// Errors surfaced by canvas operations.
#[derive(Debug, Error)]
pub enum CanvasError {
    /// The selection failed a permission or eligibility check before any request was made
    #[error("{header}: {message}")]
    NotAuthorized {
        /// Notice header shown to the user
        header: String,
        /// Notice text shown to the user
        message: String,
    },

    /// Removing a bend would leave a self-loop with fewer than two bends
    #[error("looping connections must have at least two bend points")]
    SelfLoopBendMinimum,

    /// The transport rejected a request
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A response body did not have the expected shape
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// No entity with the given id is held by the session
    #[error("unknown component: {0}")]
    UnknownComponent(String),

    /// A connection has no bend at the given index
    #[error("connection {connection_id} has no bend {index}")]
    NoSuchBend {
        /// Connection id
        connection_id: String,
        /// Requested bend index
        index: usize,
    },

    /// A gesture step arrived while no matching gesture was active
    #[error("no {0} gesture is in progress")]
    NoGesture(&'static str),

    /// A move to the parent group was requested from the topmost group
    #[error("components are already in the topmost group")]
    AlreadyTopmost,

    /// The requested group could not be entered
    #[error("unable to enter group {0}")]
    GroupUnavailable(String),

    /// A collaborator flow was dismissed by the user
    #[error("cancelled")]
    Cancelled,
}

impl CanvasError {
    /// Builds a permission/eligibility failure.
    pub fn not_authorized(header: impl Into<String>, message: impl Into<String>) -> Self {
        CanvasError::NotAuthorized {
            header: header.into(),
            message: message.into(),
        }
    }

    /// The transport failure behind this error, if any.
    pub fn transport(&self) -> Option<&TransportError> {
        match self {
            CanvasError::Transport(e) => Some(e),
            _ => None,
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = CanvasError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_statuses() {
        for status in [400, 401, 403, 404, 409] {
            assert!(TransportError::new(status, "").is_client_error(), "{status}");
        }
        for status in [0, 200, 408, 500, 503] {
            assert!(!TransportError::new(status, "").is_client_error(), "{status}");
        }
    }

    #[test]
    fn test_transport_error_converts() {
        let err: CanvasError = TransportError::new(409, "stale revision").into();
        assert_eq!(err.transport().map(|t| t.status), Some(409));
        assert!(err.to_string().contains("stale revision"));
    }

    #[test]
    fn test_not_authorized_message() {
        let err = CanvasError::not_authorized(
            "Component Position",
            "Must be authorized to modify every component selected.",
        );
        assert_eq!(
            err.to_string(),
            "Component Position: Must be authorized to modify every component selected."
        );
        assert!(err.transport().is_none());
    }
}
