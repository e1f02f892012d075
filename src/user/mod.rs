pub mod auth;
mod models;

pub use auth::{AuthToken, AuthTokenValue};
pub use models::{NewUser, UserAccount, UserSummary};
