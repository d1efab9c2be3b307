use thiserror::Error;

use crate::store::StoreError;

/// Expected outcomes of concurrent activity. Callers treat these as
/// "nothing changed, refresh your view", never as failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Conflict {
    #[error("group already has an active match")]
    AlreadyMatched,
    #[error("this member already voted on the invitation")]
    DuplicateVote,
    #[error("invitation is no longer pending")]
    InvitationResolved,
    #[error("a pending invitation already exists between these groups")]
    InvitationExists,
    #[error("a different decision was already recorded for this group")]
    AlreadyDecided,
    #[error("match not found or already ended")]
    MatchNotFound,
}

impl Conflict {
    pub fn code(&self) -> &'static str {
        match self {
            Conflict::AlreadyMatched => "ALREADY_MATCHED",
            Conflict::DuplicateVote => "DUPLICATE_VOTE",
            Conflict::InvitationResolved => "INVITATION_RESOLVED",
            Conflict::InvitationExists => "INVITATION_EXISTS",
            Conflict::AlreadyDecided => "ALREADY_DECIDED",
            Conflict::MatchNotFound => "MATCH_NOT_FOUND",
        }
    }

    /// Whether the client's view is stale and should be reloaded.
    pub fn refresh(&self) -> bool {
        !matches!(self, Conflict::DuplicateVote | Conflict::AlreadyDecided)
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed or self-contradicting input. Nothing was written.
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("not allowed: {0}")]
    Forbidden(String),

    #[error(transparent)]
    Conflict(#[from] Conflict),

    /// Persistence failed, after retries where the step is critical.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl EngineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn conflict(&self) -> Option<Conflict> {
        match self {
            Self::Conflict(c) => Some(*c),
            _ => None,
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
