use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;

use anyhow::bail;
use serde::{Deserialize, Serialize};

use crate::compatibility::{CompatibilityDetails, CompatibilityScore};
use crate::user::UserSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Pending,
    Liked,
    Passed,
    Matched,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Pending => "pending",
            MatchStatus::Liked => "liked",
            MatchStatus::Passed => "passed",
            MatchStatus::Matched => "matched",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, MatchStatus::Passed | MatchStatus::Matched)
    }
}

impl FromStr for MatchStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "pending" => Ok(MatchStatus::Pending),
            "liked" => Ok(MatchStatus::Liked),
            "passed" => Ok(MatchStatus::Passed),
            "matched" => Ok(MatchStatus::Matched),
            _ => bail!("Unknown match status {}", s),
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwipeAction {
    Like,
    Pass,
}

impl SwipeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwipeAction::Like => "like",
            SwipeAction::Pass => "pass",
        }
    }

    /// The status a `pending` record moves to when this action is recorded.
    pub fn resulting_status(&self) -> MatchStatus {
        match self {
            SwipeAction::Like => MatchStatus::Liked,
            SwipeAction::Pass => MatchStatus::Passed,
        }
    }
}

impl FromStr for SwipeAction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "like" => Ok(SwipeAction::Like),
            "pass" => Ok(SwipeAction::Pass),
            _ => bail!("Unknown swipe action {}", s),
        }
    }
}

impl fmt::Display for SwipeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What recording `action` on a record in `status` should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Write the action and move to the given status.
    Apply(MatchStatus),
    /// The same action was already recorded, nothing to write.
    Unchanged,
    Illegal,
}

pub fn transition(status: MatchStatus, action: SwipeAction) -> Transition {
    match (status, action) {
        (MatchStatus::Pending, action) => Transition::Apply(action.resulting_status()),
        (MatchStatus::Liked, SwipeAction::Like) => Transition::Unchanged,
        (MatchStatus::Liked, SwipeAction::Pass) => Transition::Illegal,
        (MatchStatus::Passed, _) | (MatchStatus::Matched, _) => Transition::Illegal,
    }
}

/// One user's directed view of one candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: usize,
    pub user_id: usize,
    pub matched_user_id: usize,
    pub compatibility_score: u8,
    pub compatibility_details: CompatibilityDetails,
    pub status: MatchStatus,
    pub user_action: Option<SwipeAction>,
    pub matched_user_action: Option<SwipeAction>,
    #[serde(skip)]
    pub version: i64,
    pub created: SystemTime,
    pub updated: SystemTime,
}

/// A directed record about to be inserted, always `pending`.
#[derive(Debug, Clone)]
pub struct NewMatch {
    pub user_id: usize,
    pub matched_user_id: usize,
    pub score: CompatibilityScore,
}

/// A freshly surfaced candidate along with how compatible they are.
#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    pub user: UserSummary,
    pub compatibility_score: u8,
    pub compatibility_details: CompatibilityDetails,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActionOutcome {
    pub status: MatchStatus,
    pub matched: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// This call promoted both records.
    Promoted,
    /// Both records were already matched.
    AlreadyMatched,
    /// The reverse record is missing or has no like.
    NotMutual,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchWithPeer {
    pub peer: UserSummary,
    #[serde(flatten)]
    pub record: MatchRecord,
}
