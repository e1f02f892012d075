use async_trait::async_trait;
use thiserror::Error;

use super::normalizer::RawListeningData;

/// Failures talking to the external listening data source.
///
/// Every variant means the same thing to the core: no profile is available
/// for this user right now.
#[derive(Debug, Error)]
pub enum ProfileSourceError {
    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upstream endpoint {endpoint} answered with status {status}")]
    Status { endpoint: String, status: u16 },
}

/// The account the listening data belongs to, as known by the source.
#[derive(Debug, Clone)]
pub struct SourceAccount {
    pub external_id: String,
    pub display_name: String,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FetchedListeningData {
    pub account: SourceAccount,
    pub data: RawListeningData,
}

#[async_trait]
pub trait ProfileSource: Send + Sync {
    /// Fetches the raw listening data of the account owning `access_token`.
    async fn fetch_listening_data(
        &self,
        access_token: &str,
    ) -> Result<FetchedListeningData, ProfileSourceError>;
}
