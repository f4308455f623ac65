use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{common::ElectionStatus, mongodb::Id};

/// An election, as written by the admin service.
///
/// The ledger only ever touches `total_votes`, which is a cache of the
/// number of votes recorded against this election.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Election {
    /// Unique ID.
    #[serde(rename = "_id")]
    pub id: Id,
    /// Election title.
    pub title: String,
    /// Free-text description.
    #[serde(default)]
    pub description: String,
    /// Voting opens at this instant (inclusive).
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub start_time: DateTime<Utc>,
    /// Voting closes at this instant (inclusive).
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub end_time: DateTime<Utc>,
    /// Lifecycle status.
    pub status: ElectionStatus,
    /// Number of votes admitted for this election.
    #[serde(default)]
    pub total_votes: u64,
}

/// Why an election is not accepting votes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Inactive {
    /// The election is in a status that never accepts votes.
    Status(ElectionStatus),
    /// The voting window has not opened yet.
    NotYetOpen,
    /// The voting window has closed.
    Closed,
}

impl Display for Inactive {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Status(status) => write!(f, "election is {status:?}"),
            Self::NotYetOpen => write!(f, "voting has not opened yet"),
            Self::Closed => write!(f, "voting has closed"),
        }
    }
}

impl Election {
    /// Create a new election with no votes.
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        status: ElectionStatus,
    ) -> Self {
        Self {
            id: Id::new(),
            title: title.into(),
            description: description.into(),
            start_time,
            end_time,
            status,
            total_votes: 0,
        }
    }

    /// Is `now` inside the voting window? Both ends are inclusive.
    pub fn window_contains(&self, now: DateTime<Utc>) -> bool {
        self.start_time <= now && now <= self.end_time
    }

    /// Check whether this election accepts votes at `now`.
    pub fn accepting_votes_at(&self, now: DateTime<Utc>) -> Result<(), Inactive> {
        if !self.status.accepts_votes() {
            Err(Inactive::Status(self.status))
        } else if now < self.start_time {
            Err(Inactive::NotYetOpen)
        } else if now > self.end_time {
            Err(Inactive::Closed)
        } else {
            Ok(())
        }
    }

    /// How far through its window the election is at `now`, as a whole percentage.
    pub fn progress_at(&self, now: DateTime<Utc>) -> u8 {
        let total = (self.end_time - self.start_time).num_milliseconds();
        let elapsed = (now - self.start_time).num_milliseconds();
        if elapsed <= 0 {
            0
        } else if elapsed >= total {
            100
        } else {
            // In (0, 100) since 0 < elapsed < total.
            ((elapsed as f64 / total as f64) * 100.0).round() as u8
        }
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use chrono::Duration;

    use super::*;

    impl Election {
        /// A published election open from now for a week.
        pub fn open_example() -> Self {
            let now = Utc::now();
            Self::new(
                "Student Council 2024",
                "Annual student council election",
                now - Duration::seconds(1),
                now + Duration::days(7),
                ElectionStatus::Published,
            )
        }

        /// A published election that opens in three days.
        pub fn upcoming_example() -> Self {
            let now = Utc::now();
            Self::new(
                "Sports Committee 2024",
                "Elect your sports committee representatives",
                now + Duration::days(3),
                now + Duration::days(10),
                ElectionStatus::Published,
            )
        }

        /// A published election whose window closed yesterday.
        pub fn closed_example() -> Self {
            let now = Utc::now();
            Self::new(
                "Graduation Committee 2023",
                "Graduation ceremony committee",
                now - Duration::days(30),
                now - Duration::days(1),
                ElectionStatus::Published,
            )
        }

        /// A draft election with an open window.
        pub fn draft_example() -> Self {
            Self {
                status: ElectionStatus::Draft,
                ..Self::open_example()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn window_is_inclusive() {
        let election = Election::open_example();
        assert!(election.window_contains(election.start_time));
        assert!(election.window_contains(election.end_time));
        assert!(!election.window_contains(election.end_time + Duration::milliseconds(1)));
        assert!(!election.window_contains(election.start_time - Duration::milliseconds(1)));
    }

    #[test]
    fn inactive_reasons() {
        let now = Utc::now();
        assert_eq!(Election::open_example().accepting_votes_at(now), Ok(()));
        assert_eq!(
            Election::upcoming_example().accepting_votes_at(now),
            Err(Inactive::NotYetOpen)
        );
        assert_eq!(
            Election::closed_example().accepting_votes_at(now),
            Err(Inactive::Closed)
        );
        assert_eq!(
            Election::draft_example().accepting_votes_at(now),
            Err(Inactive::Status(ElectionStatus::Draft))
        );
    }

    #[test]
    fn progress_is_clamped() {
        let mut election = Election::open_example();
        election.start_time = Utc::now();
        election.end_time = election.start_time + Duration::hours(10);

        assert_eq!(election.progress_at(election.start_time - Duration::hours(1)), 0);
        assert_eq!(election.progress_at(election.start_time + Duration::hours(5)), 50);
        assert_eq!(election.progress_at(election.end_time + Duration::hours(1)), 100);
    }
}
