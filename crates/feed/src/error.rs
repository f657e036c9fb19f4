use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The request never produced a response (connect error, timeout).
    Network,
    /// The store answered, but with an error status or an `error` payload.
    Server,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network => f.write_str("network"),
            Self::Server => f.write_str("server"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} failure: {message}")]
pub struct FetchFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchFailure {
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Network,
            message: message.into(),
        }
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Server,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("scope `mine` requires a signed-in user")]
    MissingUser,
    #[error("page must be at least 1")]
    InvalidPage,
    #[error("limit must be at least 1")]
    InvalidLimit,
    #[error("page {page} is outside 1..={total_pages}")]
    PageOutOfRange { page: u32, total_pages: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeleteError {
    #[error("not allowed to delete post {0}")]
    Authorization(String),
    #[error("post {0} not found")]
    NotFound(String),
    #[error(transparent)]
    Fetch(#[from] FetchFailure),
}

/// Errors surfaced to callers of a running feed session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeedError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Delete(#[from] DeleteError),
    #[error("feed session has stopped")]
    Closed,
}
