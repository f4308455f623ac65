use serde::{Deserialize, Serialize};

use crate::model::api::id::ApiId;

/// Votes for one approved candidate.
///
/// `rank` is a competition rank: candidates with equal counts share a rank
/// and the next rank skips accordingly (1, 1, 3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyEntry {
    pub candidate_id: ApiId,
    pub vote_count: u64,
    pub rank: u32,
}
