use rvdash_common::Rejection;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("{path} answered HTTP {status}")]
    Status { path: String, status: u16 },
    #[error("{path} timed out after {timeout_ms} ms")]
    Timeout { path: String, timeout_ms: u64 },
    #[error("malformed payload from {path}: {message}")]
    Decode { path: String, message: String },
    #[error("{path} rejected the request: {message}")]
    Rejected { path: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ToggleOutcome {
    Accepted,
    AlreadyPending,
    Offline,
}

impl From<Rejection> for ToggleOutcome {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::AlreadyPending => Self::AlreadyPending,
            Rejection::Offline => Self::Offline,
        }
    }
}
