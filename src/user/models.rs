use serde::{Deserialize, Serialize};
use std::time::SystemTime;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: usize,
    pub handle: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub bio: String,
    pub spotify_id: Option<String>,
    pub created: SystemTime,
    pub last_profile_sync: Option<SystemTime>,
}

/// The part of a user shown to other users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: usize,
    pub handle: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub bio: String,
}

impl From<&UserAccount> for UserSummary {
    fn from(account: &UserAccount) -> Self {
        UserSummary {
            id: account.id,
            handle: account.handle.clone(),
            display_name: account.display_name.clone(),
            avatar_url: account.avatar_url.clone(),
            bio: account.bio.clone(),
        }
    }
}

/// Fields a user provides when registering.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub handle: String,
    pub display_name: Option<String>,
    #[serde(default)]
    pub bio: String,
    pub avatar_url: Option<String>,
}
