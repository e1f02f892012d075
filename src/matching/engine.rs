//! The match lifecycle: surfacing candidates, recording decisions and
//! resolving mutual likes into matches.
//!
//! Each directed record moves `pending -> liked | passed` on its owner's
//! decision. `liked -> matched` only happens through mutual resolution, which
//! promotes both directed records of a pair in one store transaction.

use std::sync::Arc;

use anyhow::Context;
use tracing::{debug, info, warn};

use super::error::MatchError;
use super::models::{
    transition, ActionOutcome, Candidate, MatchRecord, MatchStatus, MatchWithPeer, NewMatch,
    Resolution, SwipeAction, Transition,
};
use crate::compatibility;
use crate::profile::ListeningProfile;
use crate::store::{FullStore, ListeningProfileStore, MatchStore, MatchWriteError, UserStore};

/// Conditional writes that lost a race are retried this many times.
const MAX_CONFLICT_RETRIES: usize = 1;

pub struct MatchEngine {
    store: Arc<dyn FullStore>,
}

impl MatchEngine {
    pub fn new(store: Arc<dyn FullStore>) -> Self {
        Self { store }
    }

    fn write_error(&self, err: MatchWriteError, user_id: usize, peer_id: usize) -> MatchError {
        match err {
            MatchWriteError::DuplicatePair {
                user_id,
                matched_user_id,
            } => MatchError::ConstraintViolation {
                user_id,
                matched_user_id,
            },
            MatchWriteError::Conflict => MatchError::Contention {
                user_id,
                matched_user_id: peer_id,
            },
            MatchWriteError::Storage(err) => MatchError::Storage(err),
        }
    }

    /// Picks the next user `user_id` has never seen, scores them and stores a
    /// pending record for the pair.
    pub fn surface_candidate(&self, user_id: usize) -> Result<Candidate, MatchError> {
        let candidate_id = self
            .store
            .next_candidate_id(user_id)?
            .ok_or(MatchError::NoCandidatesAvailable)?;

        let own_profile = match self.store.get_listening_profile(user_id)? {
            Some(profile) => profile,
            None => {
                warn!(
                    "User {} has no listening profile, scoring candidate {} against an empty one",
                    user_id, candidate_id
                );
                ListeningProfile::default()
            }
        };
        let candidate_profile = self
            .store
            .get_listening_profile(candidate_id)?
            .unwrap_or_default();

        let score = compatibility::score(&own_profile, &candidate_profile);
        let record = self
            .store
            .insert_match(&NewMatch {
                user_id,
                matched_user_id: candidate_id,
                score,
            })
            .map_err(|err| self.write_error(err, user_id, candidate_id))?;

        let candidate = self
            .store
            .get_user(candidate_id)?
            .with_context(|| format!("Candidate user {} not found", candidate_id))?;

        debug!(
            "Surfaced candidate {} for user {} with score {}",
            candidate_id, user_id, record.compatibility_score
        );
        Ok(Candidate {
            user: (&candidate).into(),
            compatibility_score: record.compatibility_score,
            compatibility_details: record.compatibility_details,
        })
    }

    /// Records the user's decision about a surfaced candidate. A like also
    /// attempts mutual resolution.
    pub fn record_action(
        &self,
        user_id: usize,
        peer_id: usize,
        action: SwipeAction,
    ) -> Result<ActionOutcome, MatchError> {
        let mut retries = 0;
        loop {
            let record = self.get_match(user_id, peer_id)?;
            let status = match transition(record.status, action) {
                Transition::Apply(status) => status,
                Transition::Unchanged => break,
                Transition::Illegal => {
                    return Err(MatchError::IllegalTransition {
                        status: record.status,
                        action,
                    })
                }
            };

            match self.store.set_user_action(&record, action, status) {
                Ok(_) => break,
                Err(MatchWriteError::Conflict) if retries < MAX_CONFLICT_RETRIES => {
                    retries += 1;
                    debug!(
                        "Match {} -> {} changed while recording {}, retrying",
                        user_id, peer_id, action
                    );
                }
                Err(err) => return Err(self.write_error(err, user_id, peer_id)),
            }
        }

        if action == SwipeAction::Like {
            self.resolve_mutual(user_id, peer_id)?;
        }

        let status = self.get_match(user_id, peer_id)?.status;
        Ok(ActionOutcome {
            status,
            matched: status == MatchStatus::Matched,
        })
    }

    /// Promotes the pair to matched if both users liked each other.
    /// Safe to call any number of times, from both sides at once.
    pub fn resolve_mutual(&self, user_id: usize, peer_id: usize) -> Result<Resolution, MatchError> {
        let mut retries = 0;
        loop {
            match self.store.promote_if_mutual(user_id, peer_id) {
                Ok(resolution) => {
                    if resolution == Resolution::Promoted {
                        info!("Users {} and {} matched", user_id, peer_id);
                    }
                    return Ok(resolution);
                }
                Err(MatchWriteError::Conflict) if retries < MAX_CONFLICT_RETRIES => {
                    retries += 1;
                    debug!(
                        "Promotion of {} <-> {} conflicted, retrying",
                        user_id, peer_id
                    );
                }
                Err(err) => return Err(self.write_error(err, user_id, peer_id)),
            }
        }
    }

    pub fn get_match(&self, user_id: usize, peer_id: usize) -> Result<MatchRecord, MatchError> {
        self.store
            .get_match(user_id, peer_id)?
            .ok_or(MatchError::MatchNotFound {
                user_id,
                matched_user_id: peer_id,
            })
    }

    /// The user's matched pairs, newest first.
    pub fn list_my_matches(&self, user_id: usize) -> Result<Vec<MatchWithPeer>, MatchError> {
        let records = self.store.list_matches(user_id, MatchStatus::Matched)?;
        let mut matches = Vec::with_capacity(records.len());
        for record in records {
            match self.store.get_user(record.matched_user_id)? {
                Some(peer) => matches.push(MatchWithPeer {
                    peer: (&peer).into(),
                    record,
                }),
                None => warn!(
                    "Match {} points to missing user {}",
                    record.id, record.matched_user_id
                ),
            }
        }
        Ok(matches)
    }
}
