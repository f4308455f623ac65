use serde::{Deserialize, Serialize};

use crate::model::db::Inactive;

/// Advisory answer to "would a vote by this voter currently be accepted?".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eligibility {
    pub eligible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<Ineligible>,
}

impl Eligibility {
    pub fn eligible() -> Self {
        Self {
            eligible: true,
            reason: None,
        }
    }

    pub fn ineligible(reason: Ineligible) -> Self {
        Self {
            eligible: false,
            reason: Some(reason),
        }
    }
}

/// The first check that failed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ineligible {
    ElectionNotFound,
    ElectionNotPublished,
    VotingNotOpen,
    VotingClosed,
    VoterNotFound,
    VoterSuspended,
    AlreadyVoted,
}

impl From<Inactive> for Ineligible {
    fn from(inactive: Inactive) -> Self {
        match inactive {
            Inactive::Status(_) => Self::ElectionNotPublished,
            Inactive::NotYetOpen => Self::VotingNotOpen,
            Inactive::Closed => Self::VotingClosed,
        }
    }
}
