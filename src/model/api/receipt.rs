use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{api::id::ApiId, db::Vote};

/// Request body for casting a vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRequest {
    pub candidate_id: ApiId,
}

/// Returned to the voter once their vote has been admitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteReceipt {
    pub vote_id: ApiId,
    pub election_id: ApiId,
    pub candidate_id: ApiId,
    pub timestamp: DateTime<Utc>,
}

impl From<Vote> for VoteReceipt {
    fn from(vote: Vote) -> Self {
        Self {
            vote_id: vote.id.into(),
            election_id: vote.election_id.into(),
            candidate_id: vote.candidate_id.into(),
            timestamp: vote.timestamp,
        }
    }
}

/// Whether the caller has voted in an election, read from the vote records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteStatus {
    pub has_voted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vote_id: Option<ApiId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl From<Option<Vote>> for VoteStatus {
    fn from(vote: Option<Vote>) -> Self {
        Self {
            has_voted: vote.is_some(),
            vote_id: vote.as_ref().map(|v| v.id.into()),
            timestamp: vote.map(|v| v.timestamp),
        }
    }
}

/// One entry in a voter's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastVote {
    pub vote_id: ApiId,
    pub election_id: ApiId,
    pub election_title: Option<String>,
    pub candidate_id: ApiId,
    pub candidate_name: Option<String>,
    pub timestamp: DateTime<Utc>,
}
