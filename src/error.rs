//! Error types for reply decoding and command dispatch

use thiserror::Error;

use crate::frame::FieldType;

pub type Result<T> = std::result::Result<T, QueryError>;

/// A reply value did not have the shape a decoder required.
///
/// `path` names the position inside the reply tree (e.g. `node.labels`),
/// outermost segment first. It is empty when the fault is at the root.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("expected {expected}, found {actual}{}", display_path(.path))]
pub struct ShapeError {
    pub expected: String,
    pub actual: String,
    pub path: String,
}

fn display_path(path: &str) -> String {
    if path.is_empty() {
        String::new()
    } else {
        format!(" at {}", path)
    }
}

impl ShapeError {
    pub fn new(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self {
            expected: expected.into(),
            actual: actual.into(),
            path: String::new(),
        }
    }

    /// Prefix the error location with an enclosing segment.
    pub fn at(mut self, segment: &str) -> Self {
        self.path = if self.path.is_empty() {
            segment.to_string()
        } else {
            format!("{}.{}", segment, self.path)
        };
        self
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("column '{column}' holds {expected}, got {actual}")]
    TypeMismatch {
        column: String,
        expected: FieldType,
        actual: FieldType,
    },

    #[error("row has {actual} values, frame has {expected} columns")]
    ArityMismatch {
        expected: usize,
        actual: usize,
    },

    #[error("cannot add column '{0}' to a frame that already has rows")]
    FrameNotEmpty(String),
}

/// Failure reported by the store client.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Command-level error sent by the store (`-ERR ...`), message only
    #[error("{0}")]
    Protocol(String),

    #[error(transparent)]
    Transport(#[from] std::io::Error),

    /// Bytes on the wire were not valid RESP
    #[error("invalid reply from store: {0}")]
    Codec(String),
}

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("invalid query: {0}")]
    MalformedRequest(String),

    #[error(transparent)]
    Store(#[from] ClientError),

    #[error("unexpected reply shape: {0}")]
    Shape(#[from] ShapeError),

    #[error("frame error: {0}")]
    Frame(#[from] FrameError),
}

impl From<serde_json::Error> for QueryError {
    fn from(e: serde_json::Error) -> Self {
        QueryError::MalformedRequest(e.to_string())
    }
}

impl QueryError {
    /// Stable code sent next to the message in error responses
    pub fn code(&self) -> &'static str {
        match self {
            QueryError::MalformedRequest(_) => "MALFORMED_REQUEST",
            QueryError::Store(ClientError::Protocol(_)) => "STORE_ERROR",
            QueryError::Store(_) => "TRANSPORT_ERROR",
            QueryError::Shape(_) | QueryError::Frame(_) => "DECODING_FAULT",
        }
    }

    /// Decoding faults are contained by the dispatcher and never reach the host.
    pub fn is_decoding_fault(&self) -> bool {
        matches!(self, QueryError::Shape(_) | QueryError::Frame(_))
    }
}

#[cfg(test)]
mod error_tests {
    use super::*;

    #[test]
    fn test_shape_error_path_prefixing() {
        let err = ShapeError::new("integer", "bytes").at("id").at("node");
        assert_eq!(err.path, "node.id");
        assert_eq!(err.to_string(), "expected integer, found bytes at node.id");
    }

    #[test]
    fn test_shape_error_without_path() {
        let err = ShapeError::new("array", "nil");
        assert_eq!(err.to_string(), "expected array, found nil");
    }

    #[test]
    fn test_protocol_error_is_unwrapped_to_message() {
        let message = "ERR unknown command 'GRAPH.QUERY'";
        let err = QueryError::from(ClientError::Protocol(message.into()));
        assert_eq!(err.to_string(), "ERR unknown command 'GRAPH.QUERY'");
        assert_eq!(err.code(), "STORE_ERROR");
    }

    #[test]
    fn test_transport_error_passes_through() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused");
        let err = QueryError::from(ClientError::from(io));
        assert_eq!(err.to_string(), "connection refused");
        assert_eq!(err.code(), "TRANSPORT_ERROR");
    }

    #[test]
    fn test_decoding_fault_codes() {
        let err = QueryError::from(ShapeError::new("array", "integer"));
        assert!(err.is_decoding_fault());
        assert_eq!(err.code(), "DECODING_FAULT");

        let err = QueryError::MalformedRequest("eof".into());
        assert!(!err.is_decoding_fault());
        assert_eq!(err.code(), "MALFORMED_REQUEST");
    }
}
