//! Per-pair live message channels.
//!
//! Delivery is at-least-once: a subscriber may see a message both live and in
//! a later listing, receivers dedupe by message id.

use std::collections::HashMap;

use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use super::models::{Message, PairKey};

const CHANNEL_CAPACITY: usize = 64;

pub struct MessageHub {
    channels: RwLock<HashMap<PairKey, broadcast::Sender<Message>>>,
}

impl Default for MessageHub {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageHub {
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribe to new messages of the pair, creating its channel if needed.
    pub async fn subscribe(&self, pair: PairKey) -> broadcast::Receiver<Message> {
        let mut channels = self.channels.write().await;
        channels
            .entry(pair)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Deliver `message` to the current subscribers of the pair.
    ///
    /// Returns how many subscribers received it. A channel nobody listens to
    /// anymore is dropped.
    pub async fn publish(&self, pair: PairKey, message: Message) -> usize {
        let mut channels = self.channels.write().await;
        let Some(sender) = channels.get(&pair) else {
            return 0;
        };
        match sender.send(message) {
            Ok(delivered) => delivered,
            Err(_) => {
                debug!("Dropping live channel of pair {:?}, no subscribers", pair);
                channels.remove(&pair);
                0
            }
        }
    }

    /// Drops the pair's channel if nobody is subscribed to it anymore.
    ///
    /// Returns whether the channel was removed.
    pub async fn release(&self, pair: PairKey) -> bool {
        let mut channels = self.channels.write().await;
        match channels.get(&pair) {
            Some(sender) if sender.receiver_count() == 0 => {
                channels.remove(&pair);
                debug!("Released live channel of pair {:?}", pair);
                true
            }
            _ => false,
        }
    }

    /// Number of pairs with a live channel.
    pub async fn channel_count(&self) -> usize {
        self.channels.read().await.len()
    }
}
