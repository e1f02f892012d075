//! Storage interfaces used by the matching and conversation layers.

use anyhow::Result;
use thiserror::Error;

use crate::conversation::{Message, PairKey};
use crate::matching::{MatchRecord, MatchStatus, NewMatch, Resolution, SwipeAction};
use crate::profile::ListeningProfile;
use crate::user::{AuthToken, AuthTokenValue, NewUser, UserAccount};

/// Returned, wrapped in `anyhow::Error`, when a user is created with a handle
/// that already exists.
#[derive(Debug, Error)]
#[error("Handle {0} is already taken")]
pub struct HandleTakenError(pub String);

/// Failures of conditional match writes that callers handle differently
/// from plain storage errors.
#[derive(Debug, Error)]
pub enum MatchWriteError {
    #[error("Match record {user_id} -> {matched_user_id} already exists")]
    DuplicatePair {
        user_id: usize,
        matched_user_id: usize,
    },

    /// A record changed between read and write, or the database was busy.
    #[error("Concurrent modification detected")]
    Conflict,

    #[error("Store error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for MatchWriteError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(rusqlite::ErrorCode::DatabaseBusy) | Some(rusqlite::ErrorCode::DatabaseLocked) => {
                MatchWriteError::Conflict
            }
            _ => MatchWriteError::Storage(err.into()),
        }
    }
}

pub trait AuthTokenStore: Send + Sync {
    /// Returns the token with the given value.
    /// Returns Ok(None) if the token does not exist.
    fn get_auth_token(&self, value: &AuthTokenValue) -> Result<Option<AuthToken>>;

    fn add_auth_token(&self, token: &AuthToken) -> Result<()>;

    /// Deletes a token, returning it if it existed.
    fn delete_auth_token(&self, value: &AuthTokenValue) -> Result<Option<AuthToken>>;

    fn touch_auth_token(&self, value: &AuthTokenValue) -> Result<()>;
}

pub trait UserStore: AuthTokenStore + Send + Sync {
    /// Creates a new user and returns the user id.
    /// Fails with a [`HandleTakenError`] if the handle is in use.
    fn create_user(&self, new_user: &NewUser) -> Result<usize>;

    /// Returns Ok(None) if the user does not exist.
    fn get_user(&self, user_id: usize) -> Result<Option<UserAccount>>;

    fn get_user_id(&self, handle: &str) -> Result<Option<usize>>;

    /// Links the user to an account of the listening data source and refreshes
    /// the fields the source knows about.
    fn update_source_account(
        &self,
        user_id: usize,
        spotify_id: &str,
        display_name: &str,
        avatar_url: Option<&str>,
    ) -> Result<()>;
}

pub trait ListeningProfileStore: Send + Sync {
    /// Inserts or replaces the user's profile and stamps the sync time.
    fn save_listening_profile(&self, user_id: usize, profile: &ListeningProfile) -> Result<()>;

    /// Returns Ok(None) if the user never stored a profile.
    fn get_listening_profile(&self, user_id: usize) -> Result<Option<ListeningProfile>>;
}

pub trait MatchStore: Send + Sync {
    /// Returns the lowest-id user that has a listening profile, is not
    /// `user_id` and is not the target of any of `user_id`'s records.
    fn next_candidate_id(&self, user_id: usize) -> Result<Option<usize>>;

    /// Inserts a `pending` record. Fails with `DuplicatePair` if a record for
    /// the same ordered pair exists.
    fn insert_match(&self, new_match: &NewMatch) -> Result<MatchRecord, MatchWriteError>;

    fn get_match(&self, user_id: usize, matched_user_id: usize) -> Result<Option<MatchRecord>>;

    /// Records `action` and `status` on the record if its version is still
    /// `record.version`, and mirrors the action onto the reverse record.
    fn set_user_action(
        &self,
        record: &MatchRecord,
        action: SwipeAction,
        status: MatchStatus,
    ) -> Result<MatchRecord, MatchWriteError>;

    /// Promotes both directed records of the pair to `matched` in one
    /// transaction, if both carry a `like`.
    fn promote_if_mutual(
        &self,
        user_id: usize,
        matched_user_id: usize,
    ) -> Result<Resolution, MatchWriteError>;

    /// The user's forward records with the given status, newest first.
    fn list_matches(&self, user_id: usize, status: MatchStatus) -> Result<Vec<MatchRecord>>;
}

pub trait MessageStore: Send + Sync {
    fn insert_message(&self, pair: PairKey, message: &Message) -> Result<()>;

    /// Flags as read every message of the pair not sent by `reader_id`.
    /// Returns how many messages changed.
    fn mark_read(&self, pair: PairKey, reader_id: usize) -> Result<usize>;

    /// All messages of the pair, oldest first.
    fn list_messages(&self, pair: PairKey) -> Result<Vec<Message>>;
}

pub trait FullStore: UserStore + ListeningProfileStore + MatchStore + MessageStore {}

impl<T> FullStore for T where T: UserStore + ListeningProfileStore + MatchStore + MessageStore {}
