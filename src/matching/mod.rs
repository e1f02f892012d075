mod engine;
mod error;
mod models;

pub use engine::MatchEngine;
pub use error::MatchError;
pub use models::{
    transition, ActionOutcome, Candidate, MatchRecord, MatchStatus, MatchWithPeer, NewMatch,
    Resolution, SwipeAction, Transition,
};
