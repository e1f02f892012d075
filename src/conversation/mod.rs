//! Messaging between matched users.

mod gate;
mod hub;
mod models;

use std::sync::Arc;

use tracing::debug;

use crate::store::{FullStore, MatchStore, MessageStore};

pub use gate::{can_exchange, validate_content, ConversationError, MAX_MESSAGE_LENGTH};
pub use hub::MessageHub;
pub use models::{Message, PairKey};

pub struct ConversationService {
    store: Arc<dyn FullStore>,
    hub: Arc<MessageHub>,
}

impl ConversationService {
    pub fn new(store: Arc<dyn FullStore>, hub: Arc<MessageHub>) -> Self {
        Self { store, hub }
    }

    pub fn hub(&self) -> &Arc<MessageHub> {
        &self.hub
    }

    /// Fails with `NotMatched` unless the user's record about the peer is matched.
    pub fn ensure_matched(&self, user_id: usize, peer_id: usize) -> Result<(), ConversationError> {
        let record = self.store.get_match(user_id, peer_id)?;
        match record {
            Some(record) if can_exchange(record.status) => Ok(()),
            _ => Err(ConversationError::NotMatched { user_id, peer_id }),
        }
    }

    pub async fn post_message(
        &self,
        sender_id: usize,
        peer_id: usize,
        content: &str,
    ) -> Result<Message, ConversationError> {
        self.ensure_matched(sender_id, peer_id)?;
        let content = validate_content(content)?;

        let pair = PairKey::new(sender_id, peer_id);
        let message = Message::new(sender_id, content);
        self.store.insert_message(pair, &message)?;

        let delivered = self.hub.publish(pair, message.clone()).await;
        debug!(
            "Message {} from {} delivered live to {} subscribers",
            message.id, sender_id, delivered
        );
        Ok(message)
    }

    /// Returns the conversation oldest first, after flagging the peer's
    /// messages as read.
    pub fn list_messages(
        &self,
        reader_id: usize,
        peer_id: usize,
    ) -> Result<Vec<Message>, ConversationError> {
        self.ensure_matched(reader_id, peer_id)?;

        let pair = PairKey::new(reader_id, peer_id);
        let marked = self.store.mark_read(pair, reader_id)?;
        if marked > 0 {
            debug!("Marked {} messages as read for user {}", marked, reader_id);
        }
        Ok(self.store.list_messages(pair)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::{MatchEngine, SwipeAction};
    use crate::profile::{Artist, ListeningProfile};
    use crate::store::{ListeningProfileStore, SqliteStore, UserStore};
    use crate::user::NewUser;
    use tempfile::TempDir;

    struct Fixture {
        engine: MatchEngine,
        service: ConversationService,
        alice: usize,
        bob: usize,
        _temp_dir: TempDir,
    }

    /// Alice and Bob surfaced each other, nobody decided yet.
    fn fixture() -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(SqliteStore::new(temp_dir.path().join("test.db")).unwrap());
        let profile = ListeningProfile {
            top_artists: vec![Artist {
                id: "a1".to_string(),
                name: "Slowdive".to_string(),
                genres: vec![],
                popularity: 70,
            }],
            ..Default::default()
        };
        let mut ids = vec![];
        for handle in ["alice", "bob"] {
            let id = store
                .create_user(&NewUser {
                    handle: handle.to_string(),
                    display_name: None,
                    bio: String::new(),
                    avatar_url: None,
                })
                .unwrap();
            store.save_listening_profile(id, &profile).unwrap();
            ids.push(id);
        }

        let engine = MatchEngine::new(store.clone());
        engine.surface_candidate(ids[0]).unwrap();
        engine.surface_candidate(ids[1]).unwrap();
        Fixture {
            engine,
            service: ConversationService::new(store, Arc::new(MessageHub::new())),
            alice: ids[0],
            bob: ids[1],
            _temp_dir: temp_dir,
        }
    }

    fn match_pair(f: &Fixture) {
        f.engine
            .record_action(f.alice, f.bob, SwipeAction::Like)
            .unwrap();
        assert!(
            f.engine
                .record_action(f.bob, f.alice, SwipeAction::Like)
                .unwrap()
                .matched
        );
    }

    #[tokio::test]
    async fn unmatched_pairs_cannot_exchange() {
        let f = fixture();

        let result = f.service.post_message(f.alice, f.bob, "hi").await;
        assert!(matches!(result, Err(ConversationError::NotMatched { .. })));

        f.engine
            .record_action(f.alice, f.bob, SwipeAction::Like)
            .unwrap();
        let result = f.service.post_message(f.alice, f.bob, "hi").await;
        assert!(matches!(result, Err(ConversationError::NotMatched { .. })));
        assert!(matches!(
            f.service.list_messages(f.alice, f.bob),
            Err(ConversationError::NotMatched { .. })
        ));

        // No record at all between alice and a stranger.
        let result = f.service.post_message(f.alice, 999, "hi").await;
        assert!(matches!(result, Err(ConversationError::NotMatched { .. })));
    }

    #[tokio::test]
    async fn matched_pairs_exchange_and_read() {
        let f = fixture();
        match_pair(&f);
        let mut live = f.service.hub().subscribe(PairKey::new(f.alice, f.bob)).await;

        let sent = f
            .service
            .post_message(f.alice, f.bob, "  did you see them live?  ")
            .await
            .unwrap();
        assert_eq!(sent.content, "did you see them live?");
        assert_eq!(live.recv().await.unwrap().id, sent.id);

        f.service.post_message(f.bob, f.alice, "twice!").await.unwrap();

        // Alice reads: only Bob's message gets flagged.
        let messages = f.service.list_messages(f.alice, f.bob).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].sender_id, f.alice);
        assert!(!messages[0].read);
        assert_eq!(messages[1].sender_id, f.bob);
        assert!(messages[1].read);

        let messages = f.service.list_messages(f.bob, f.alice).unwrap();
        assert!(messages.iter().all(|m| m.read));
    }

    #[tokio::test]
    async fn blank_messages_are_rejected() {
        let f = fixture();
        match_pair(&f);
        assert!(matches!(
            f.service.post_message(f.alice, f.bob, "   ").await,
            Err(ConversationError::EmptyMessage)
        ));
        assert!(f.service.list_messages(f.alice, f.bob).unwrap().is_empty());
    }
}
