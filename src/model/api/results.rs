use serde::{Deserialize, Serialize};

use crate::model::{api::id::ApiId, common::ElectionStatus};

/// The published view of an election's tally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectionResults {
    pub election_id: ApiId,
    pub title: String,
    pub status: ElectionStatus,
    pub total_votes: u64,
    pub candidates: Vec<CandidateResult>,
    /// Set only when exactly one candidate holds the strict maximum.
    pub winner_id: Option<ApiId>,
    /// Two or more candidates share a non-zero top count.
    pub tied: bool,
    pub active_voters: u64,
    /// `total_votes` as a percentage of `active_voters`, capped at 100.
    /// Votes stay counted after their voter is suspended, while
    /// `active_voters` drops, so the raw ratio can exceed 100.
    pub turnout: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateResult {
    pub id: ApiId,
    pub name: String,
    pub vote_count: u64,
    pub percentage: f64,
    pub rank: u32,
}
