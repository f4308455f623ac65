//! The entity store: persisted elections, candidates, voters and votes.
//!
//! The ledger talks to storage only through [`EntityStore`], so the same
//! admission logic runs against MongoDB in production and against
//! [`MemoryStore`] in tests. Both honour the one contract that matters:
//! [`EntityStore::insert_vote`] is an atomic insert-if-absent on
//! `(voter_id, election_id)`.

use std::collections::HashMap;
use std::sync::Arc;

use mongodb::error::Error as DbError;
use thiserror::Error;

use crate::model::{
    db::{Candidate, Election, Vote, Voter},
    mongodb::Id,
};

#[cfg(test)]
mod contract;
mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// Infrastructure failures. Never partially applied; safe for the caller to retry.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("Inconsistent store state: {0}")]
    Inconsistent(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A shareable handle on whichever store the server was built with.
pub type Store = Arc<dyn EntityStore>;

/// Outcome of an attempted vote insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteInsert {
    /// The vote was written and the counters bumped.
    Admitted(Vote),
    /// A vote by this voter in this election already exists; nothing was written.
    Duplicate,
}

/// Vote counts for one election.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Counters {
    pub total: u64,
    pub by_candidate: HashMap<Id, u64>,
}

impl Counters {
    /// The count for a candidate, zero if absent.
    pub fn candidate(&self, id: Id) -> u64 {
        self.by_candidate.get(&id).copied().unwrap_or(0)
    }
}

/// The cached counters of an election next to the counts derived from its
/// votes, as observed by a single atomic recount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recount {
    pub cached: Counters,
    pub actual: Counters,
}

#[rocket::async_trait]
pub trait EntityStore: Send + Sync {
    async fn election(&self, id: Id) -> StoreResult<Option<Election>>;

    /// All elections in the `published` status.
    async fn published_elections(&self) -> StoreResult<Vec<Election>>;

    async fn candidate(&self, id: Id) -> StoreResult<Option<Candidate>>;

    /// Every candidate of an election, regardless of approval.
    async fn candidates(&self, election_id: Id) -> StoreResult<Vec<Candidate>>;

    async fn voter(&self, id: Id) -> StoreResult<Option<Voter>>;

    /// Number of voters in active standing.
    async fn count_active_voters(&self) -> StoreResult<u64>;

    /// The vote cast by a voter in an election, if any.
    async fn vote_for(&self, voter_id: Id, election_id: Id) -> StoreResult<Option<Vote>>;

    /// Every vote a voter has cast, newest first.
    async fn votes_by_voter(&self, voter_id: Id) -> StoreResult<Vec<Vote>>;

    /// Atomically insert `vote` unless one already exists for its
    /// `(voter_id, election_id)`, and bump the candidate and election
    /// counters in the same unit of work.
    async fn insert_vote(&self, vote: Vote) -> StoreResult<VoteInsert>;

    /// Count an election's votes directly from the vote records.
    async fn count_votes(&self, election_id: Id) -> StoreResult<Counters>;

    /// Recount an election's votes and overwrite its cached counters with
    /// the result, atomically with respect to concurrent admissions.
    async fn recount(&self, election_id: Id) -> StoreResult<Recount>;
}
