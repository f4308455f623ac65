use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};

/// States in the Election lifecycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElectionStatus {
    /// Under construction by the admins; no voting.
    Draft,
    /// Visible to everyone; voting is open while inside the window.
    Published,
    /// Voting has closed for good.
    Ended,
    /// Completed and hidden by default.
    Archived,
}

impl ElectionStatus {
    /// Can an election in this status be moved into `next`?
    ///
    /// Statuses only ever move forwards through the lifecycle, possibly
    /// skipping steps, and never regress.
    pub fn can_transition_to(self, next: ElectionStatus) -> bool {
        next > self
    }

    /// Are votes accepted in this status (subject to the time window)?
    pub fn accepts_votes(self) -> bool {
        self == ElectionStatus::Published
    }
}

impl From<ElectionStatus> for Bson {
    fn from(status: ElectionStatus) -> Self {
        to_bson(&status).expect("Serialisation is infallible")
    }
}

/// Approval state of a candidate nomination.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Approval {
    Pending,
    Approved,
    Rejected,
}

impl From<Approval> for Bson {
    fn from(approval: Approval) -> Self {
        to_bson(&approval).expect("Serialisation is infallible")
    }
}

/// Account standing of a voter.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Standing {
    Active,
    Suspended,
}

impl From<Standing> for Bson {
    fn from(standing: Standing) -> Self {
        to_bson(&standing).expect("Serialisation is infallible")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ElectionStatus::*;

    #[test]
    fn lifecycle_only_moves_forwards() {
        assert!(Draft.can_transition_to(Published));
        assert!(Published.can_transition_to(Ended));
        assert!(Ended.can_transition_to(Archived));
        assert!(Published.can_transition_to(Archived));

        assert!(!Published.can_transition_to(Draft));
        assert!(!Archived.can_transition_to(Ended));
        assert!(!Ended.can_transition_to(Ended));
    }

    #[test]
    fn only_published_elections_accept_votes() {
        assert!(Published.accepts_votes());
        for status in [Draft, Ended, Archived] {
            assert!(!status.accepts_votes());
        }
    }

    #[test]
    fn statuses_serialise_as_snake_case() {
        assert_eq!(Bson::from(Published), Bson::String("published".to_string()));
        assert_eq!(Bson::from(Approval::Pending), Bson::String("pending".to_string()));
        assert_eq!(Bson::from(Standing::Suspended), Bson::String("suspended".to_string()));
    }
}
