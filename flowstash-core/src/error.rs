//! Error types for flowstash.

use thiserror::Error;

/// Result type for stash operations.
pub type Result<T> = std::result::Result<T, StashError>;

/// Result type for raw document operations.
pub type DocumentResult<T> = std::result::Result<T, DocumentError>;

/// Errors raised by the path-addressed [`Document`](crate::document::Document).
#[derive(Error, Debug)]
pub enum DocumentError {
    /// The path expression cannot be used for the requested operation.
    #[error("Invalid path '{path}': {reason}")]
    InvalidPath {
        /// Offending path
        path: String,
        /// What is wrong with it
        reason: String,
    },

    /// A write had to traverse a value that is not a container.
    #[error("Path '{path}' conflicts with existing value at segment '{segment}'")]
    PathConflict {
        /// Full path being written
        path: String,
        /// Segment at which traversal hit a scalar
        segment: String,
    },

    /// A value could not be converted into JSON.
    #[error("Encode error: {0}")]
    Encode(#[source] serde_json::Error),

    /// A stored value could not be decoded into the requested type.
    #[error("Decode error at '{path}': {source}")]
    Decode {
        /// Path that was read
        path: String,
        /// Underlying decoder error
        #[source]
        source: serde_json::Error,
    },

    /// The input string is not valid JSON.
    #[error("Parse error: {0}")]
    Parse(#[source] serde_json::Error),

    /// The document root must be a JSON object.
    #[error("Document root must be an object, found {0}")]
    NotAnObject(&'static str),
}

impl DocumentError {
    /// Create a new invalid path error.
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a new path conflict error.
    pub fn path_conflict(path: impl Into<String>, segment: impl Into<String>) -> Self {
        Self::PathConflict {
            path: path.into(),
            segment: segment.into(),
        }
    }
}

/// Ways in which the tail of the state history can be corrupt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedHistory {
    /// The entry is not a JSON object.
    #[error("last history item is not an object")]
    NotAnObject,

    /// The entry has no `s` field.
    #[error("last history item is missing a value for 'state'")]
    MissingState,
}

/// Error types that can occur while working with a stash.
#[derive(Error, Debug)]
pub enum StashError {
    /// The serialized stash could not be read.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A write to the stash failed.
    #[error("Failed to {context}: {source}")]
    Serialization {
        /// Which logical field or operation was being written
        context: String,
        /// Underlying document error
        #[source]
        source: DocumentError,
    },

    /// The stashed history violates the required entry shape.
    #[error("Malformed history: {0}")]
    MalformedHistory(#[from] MalformedHistory),

    /// User data access touched the namespace reserved for bookkeeping.
    #[error("Path '{0}' is reserved for flow bookkeeping")]
    ReservedPath(String),
}

impl StashError {
    /// Create a new parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Wrap a document error with the operation that produced it.
    pub fn serialization(context: impl Into<String>, source: DocumentError) -> Self {
        Self::Serialization {
            context: context.into(),
            source,
        }
    }

    /// Create a new reserved path error.
    pub fn reserved_path(path: impl Into<String>) -> Self {
        Self::ReservedPath(path.into())
    }
}

impl From<DocumentError> for StashError {
    fn from(err: DocumentError) -> Self {
        match err {
            DocumentError::Parse(_) | DocumentError::NotAnObject(_) => {
                Self::Parse(err.to_string())
            }
            other => Self::serialization("update stash", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialization_error_carries_context() {
        let err = StashError::serialization(
            "set scheduled_states",
            DocumentError::invalid_path("a.-2", "only -1 is supported"),
        );
        assert_eq!(
            err.to_string(),
            "Failed to set scheduled_states: Invalid path 'a.-2': only -1 is supported"
        );
    }

    #[test]
    fn test_document_parse_errors_map_to_stash_parse() {
        let err: StashError = DocumentError::NotAnObject("array").into();
        assert!(matches!(err, StashError::Parse(_)));

        let err: StashError = DocumentError::path_conflict("a.b", "a").into();
        assert!(matches!(err, StashError::Serialization { .. }));
    }

    #[test]
    fn test_malformed_history_messages() {
        let err: StashError = MalformedHistory::MissingState.into();
        assert_eq!(
            err.to_string(),
            "Malformed history: last history item is missing a value for 'state'"
        );
    }
}
