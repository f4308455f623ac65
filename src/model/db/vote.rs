use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// A single admitted vote. Immutable once written.
///
/// At most one exists per `(voter_id, election_id)`; the store enforces this
/// with a unique constraint.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Vote {
    #[serde(rename = "_id")]
    pub id: Id,
    pub voter_id: Id,
    pub election_id: Id,
    pub candidate_id: Id,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub timestamp: DateTime<Utc>,
}

impl Vote {
    pub fn new(voter_id: Id, election_id: Id, candidate_id: Id, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Id::new(),
            voter_id,
            election_id,
            candidate_id,
            timestamp,
        }
    }
}
