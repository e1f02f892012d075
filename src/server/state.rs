use axum::extract::FromRef;

use crate::conversation::ConversationService;
use crate::matching::MatchEngine;
use crate::profile::ProfileSource;
use crate::store::FullStore;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedStore = Arc<dyn FullStore>;
pub type GuardedMatchEngine = Arc<MatchEngine>;
pub type GuardedConversations = Arc<ConversationService>;
pub type GuardedProfileSource = Arc<dyn ProfileSource>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub store: GuardedStore,
    pub match_engine: GuardedMatchEngine,
    pub conversations: GuardedConversations,
    pub profile_source: GuardedProfileSource,
}

impl FromRef<ServerState> for GuardedStore {
    fn from_ref(input: &ServerState) -> Self {
        input.store.clone()
    }
}

impl FromRef<ServerState> for GuardedMatchEngine {
    fn from_ref(input: &ServerState) -> Self {
        input.match_engine.clone()
    }
}

impl FromRef<ServerState> for GuardedConversations {
    fn from_ref(input: &ServerState) -> Self {
        input.conversations.clone()
    }
}

impl FromRef<ServerState> for GuardedProfileSource {
    fn from_ref(input: &ServerState) -> Self {
        input.profile_source.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}
