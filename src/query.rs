//! Query request and response types exchanged with the host

use serde::{Deserialize, Serialize};

use crate::error::QueryError;
use crate::frame::Frame;

/// Query time range, milliseconds since epoch, inclusive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: i64,
    pub to: i64,
}

/// One query as supplied by the host. `json` is the raw query body and is
/// only parsed by the dispatcher.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataQuery {
    #[serde(default)]
    pub ref_id: String,
    pub json: String,
    #[serde(default)]
    pub time_range: TimeRange,
}

impl DataQuery {
    pub fn new(json: impl Into<String>) -> Self {
        Self {
            json: json.into(),
            ..Default::default()
        }
    }
}

/// Parsed query body.
///
/// A non-empty `query` selects the custom-command path; otherwise `command`
/// selects a named decoder. Unknown JSON fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryModel {
    pub command: String,
    pub key: String,
    pub query: String,
    pub cypher: String,
}

/// Either frames or an error, never both.
///
/// Errors carry the message shown to the user and a stable code
/// (see [`QueryError::code`]) for programmatic handling.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DataResponse {
    Error {
        error: String,
        code: String,
    },
    Frames { frames: Vec<Frame> },
}

impl DataResponse {
    /// Successful response with no frames
    pub fn empty() -> Self {
        DataResponse::Frames { frames: Vec::new() }
    }

    pub fn with_frames(frames: Vec<Frame>) -> Self {
        DataResponse::Frames { frames }
    }

    pub fn from_error(err: &QueryError) -> Self {
        DataResponse::Error {
            error: err.to_string(),
            code: err.code().to_string(),
        }
    }

    pub fn frames(&self) -> &[Frame] {
        match self {
            DataResponse::Frames { frames } => frames,
            DataResponse::Error { .. } => &[],
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            DataResponse::Error { error, .. } => Some(error),
            DataResponse::Frames { .. } => None,
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            DataResponse::Error { code, .. } => Some(code),
            DataResponse::Frames { .. } => None,
        }
    }

    /// No error and no frames
    pub fn is_empty(&self) -> bool {
        matches!(self, DataResponse::Frames { frames } if frames.is_empty())
    }
}
