use thiserror::Error;

use crate::matching::MatchStatus;

/// Longest message accepted, in characters, after trimming.
pub const MAX_MESSAGE_LENGTH: usize = 4000;

#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("Users {user_id} and {peer_id} are not matched")]
    NotMatched { user_id: usize, peer_id: usize },

    #[error("Message is empty")]
    EmptyMessage,

    #[error("Message is {length} characters long, max is {max}", max = MAX_MESSAGE_LENGTH)]
    MessageTooLong { length: usize },

    #[error("Store error: {0}")]
    Storage(#[from] anyhow::Error),
}

/// Only matched pairs may exchange messages.
pub fn can_exchange(status: MatchStatus) -> bool {
    status == MatchStatus::Matched
}

/// Trims `content` and checks it can be stored.
pub fn validate_content(content: &str) -> Result<String, ConversationError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(ConversationError::EmptyMessage);
    }
    let length = trimmed.chars().count();
    if length > MAX_MESSAGE_LENGTH {
        return Err(ConversationError::MessageTooLong { length });
    }
    Ok(trimmed.to_string())
}
