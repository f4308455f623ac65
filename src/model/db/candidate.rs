use serde::{Deserialize, Serialize};

use crate::model::{common::Approval, mongodb::Id};

/// A candidate standing in exactly one election.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "_id")]
    pub id: Id,
    /// The election this candidate belongs to. Never changes.
    pub election_id: Id,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub approval: Approval,
    /// Number of votes admitted for this candidate.
    #[serde(default)]
    pub vote_count: u64,
}

impl Candidate {
    pub fn new(election_id: Id, name: impl Into<String>, approval: Approval) -> Self {
        Self {
            id: Id::new(),
            election_id,
            name: name.into(),
            description: String::new(),
            approval,
            vote_count: 0,
        }
    }

    /// Only approved candidates may receive votes or appear on the ballot.
    pub fn is_approved(&self) -> bool {
        self.approval == Approval::Approved
    }

    /// Can this candidate receive a vote in the given election?
    pub fn eligible_in(&self, election_id: Id) -> bool {
        self.election_id == election_id && self.is_approved()
    }
}
