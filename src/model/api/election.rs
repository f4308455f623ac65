use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::id::ApiId,
    common::ElectionStatus,
    db::{Candidate, Election},
};

/// Summary of an election for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionSummary {
    pub id: ApiId,
    pub title: String,
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: ElectionStatus,
    pub total_votes: u64,
    /// Percentage of the voting window already elapsed.
    pub progress: u8,
}

impl ElectionSummary {
    pub fn at(election: Election, now: DateTime<Utc>) -> Self {
        Self {
            id: election.id.into(),
            progress: election.progress_at(now),
            title: election.title,
            description: election.description,
            start_time: election.start_time,
            end_time: election.end_time,
            status: election.status,
            total_votes: election.total_votes,
        }
    }
}

/// A candidate as shown on the ballot. Counts are deliberately omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotCandidate {
    pub id: ApiId,
    pub name: String,
    pub description: String,
}

impl From<Candidate> for BallotCandidate {
    fn from(candidate: Candidate) -> Self {
        Self {
            id: candidate.id.into(),
            name: candidate.name,
            description: candidate.description,
        }
    }
}

/// Everything needed to render a ballot for one voter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    pub election: ElectionSummary,
    pub candidates: Vec<BallotCandidate>,
    pub has_voted: bool,
}
