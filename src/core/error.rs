use thiserror::Error;

use crate::core::key::CacheKey;

/// Broad classification of a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network failure or a non-2xx status that is neither 400-class validation nor 404.
    Transport,
    /// A required field or parameter was missing or malformed.
    Validation,
    /// The server answered 404.
    NotFound,
}

/// Structured error surfaced to callers and recorded in pagination state.
///
/// Mirrors the `{message, status?, code?}` object the rendering layer expects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
    pub status: Option<u16>,
    pub code: Option<String>,
}

impl ApiError {
    /// Client-side validation failure, raised before any request is made.
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError {
            kind: ErrorKind::Validation,
            message: message.into(),
            status: None,
            code: Some("ERR_VALIDATION".into()),
        }
    }

    /// Error for a non-2xx response with the given status.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        ApiError {
            kind: kind_for_status(status),
            message: message.into(),
            status: Some(status),
            code: Some(code_for_status(status).into()),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }

    pub fn is_validation(&self) -> bool {
        self.kind == ErrorKind::Validation
    }
}

fn kind_for_status(status: u16) -> ErrorKind {
    match status {
        404 => ErrorKind::NotFound,
        400 | 422 => ErrorKind::Validation,
        _ => ErrorKind::Transport,
    }
}

fn code_for_status(status: u16) -> &'static str {
    if (400..500).contains(&status) {
        "ERR_BAD_REQUEST"
    } else {
        "ERR_BAD_RESPONSE"
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        let status = e.status().map(|s| s.as_u16());
        let code = if e.is_timeout() {
            "ECONNABORTED"
        } else if e.is_connect() {
            "ERR_NETWORK"
        } else if e.is_decode() {
            "ERR_BAD_RESPONSE"
        } else if let Some(status) = status {
            code_for_status(status)
        } else {
            "ERR_NETWORK"
        };

        ApiError {
            kind: status.map(kind_for_status).unwrap_or(ErrorKind::Transport),
            message: e.to_string(),
            status,
            code: Some(code.into()),
        }
    }
}

/// Cache store misuse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("page {index} for {key} would leave a gap after {len} cached pages")]
    PageGap {
        key: CacheKey,
        index: usize,
        len: usize,
    },
}
