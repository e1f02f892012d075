use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

/// Identity of a conversation: the unordered pair of its two users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PairKey {
    low: usize,
    high: usize,
}

impl PairKey {
    pub fn new(a: usize, b: usize) -> Self {
        PairKey {
            low: a.min(b),
            high: a.max(b),
        }
    }

    pub fn low(&self) -> usize {
        self.low
    }

    pub fn high(&self) -> usize {
        self.high
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub sender_id: usize,
    pub content: String,
    pub created: SystemTime,
    pub read: bool,
}

impl Message {
    pub fn new(sender_id: usize, content: String) -> Self {
        Message {
            id: Uuid::new_v4(),
            sender_id,
            content,
            created: SystemTime::now(),
            read: false,
        }
    }
}
