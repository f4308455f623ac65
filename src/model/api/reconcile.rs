use serde::{Deserialize, Serialize};

use crate::model::api::id::ApiId;

/// A cached counter that disagreed with the vote records and was rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repair {
    pub counter: Counter,
    pub id: ApiId,
    pub was: u64,
    pub now: u64,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Counter {
    Election,
    Candidate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub election_id: ApiId,
    pub total_votes: u64,
    pub repaired: Vec<Repair>,
}
