use thiserror::Error;

use super::models::{MatchStatus, SwipeAction};

#[derive(Debug, Error)]
pub enum MatchError {
    /// Every eligible user was already surfaced. An empty state, not a failure.
    #[error("No candidates available")]
    NoCandidatesAvailable,

    #[error("Cannot record {action} on a {status} match")]
    IllegalTransition {
        status: MatchStatus,
        action: SwipeAction,
    },

    #[error("Match record {user_id} -> {matched_user_id} already exists")]
    ConstraintViolation {
        user_id: usize,
        matched_user_id: usize,
    },

    #[error("Match record {user_id} -> {matched_user_id} not found")]
    MatchNotFound {
        user_id: usize,
        matched_user_id: usize,
    },

    #[error("Match {user_id} <-> {matched_user_id} kept changing concurrently")]
    Contention {
        user_id: usize,
        matched_user_id: usize,
    },

    #[error("Store error: {0}")]
    Storage(#[from] anyhow::Error),
}
