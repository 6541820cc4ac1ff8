//! Error taxonomy shared across the workspace.
//!
//! Expected outcomes (`NotPermitted`, `LimitExceeded`, `NotFound`,
//! `Forbidden`) are typed results, not panics — callers render them as
//! short user-facing messages. `Store` is the only class that aborts an
//! operation early.

use thiserror::Error;

/// All errors produced by Likebot components.
#[derive(Debug, Error)]
pub enum LikebotError {
    /// The capability flag for the requested action class is off.
    #[error("permission not granted")]
    NotPermitted,

    /// The daily budget for the action class is exhausted.
    #[error("daily limit reached ({used}/{limit})")]
    LimitExceeded { used: u32, limit: u32 },

    /// A task or record that must exist is absent.
    #[error("not found")]
    NotFound,

    /// The requester is neither the owner nor an admin.
    #[error("not allowed")]
    Forbidden,

    /// A well-formed request with a value outside the accepted range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The external like call failed (network, timeout, or API error).
    #[error("like request failed: {0}")]
    Gateway(String),

    /// A batch run is already executing; the caller should retry later.
    #[error("a run is already in progress")]
    RunInProgress,

    /// Persistence layer failure.
    #[error("storage error: {0}")]
    Store(String),

    /// Configuration load/parse failure.
    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LikebotError>;

impl LikebotError {
    /// Whether this is an expected, user-facing outcome rather than an
    /// operational failure.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::NotPermitted
                | Self::LimitExceeded { .. }
                | Self::NotFound
                | Self::Forbidden
                | Self::InvalidArgument(_)
        )
    }
}
