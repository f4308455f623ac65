use std::collections::HashMap;
use std::sync::Arc;

use rocket::tokio::sync::RwLock;

use crate::model::{
    common::{ElectionStatus, Standing},
    db::{Candidate, Election, Vote, Voter},
    mongodb::Id,
};

use super::{Counters, EntityStore, Recount, StoreError, StoreResult, VoteInsert};

#[derive(Default)]
struct Tables {
    elections: HashMap<Id, Election>,
    candidates: HashMap<Id, Candidate>,
    voters: HashMap<Id, Voter>,
    votes: HashMap<Id, Vote>,
    /// Unique index: (voter_id, election_id) -> vote ID.
    ballot_keys: HashMap<(Id, Id), Id>,
}

impl Tables {
    fn cached_counters(&self, election: &Election) -> Counters {
        let by_candidate = self
            .candidates
            .values()
            .filter(|c| c.election_id == election.id)
            .map(|c| (c.id, c.vote_count))
            .collect();
        Counters {
            total: election.total_votes,
            by_candidate,
        }
    }

    fn counted_votes(&self, election_id: Id) -> Counters {
        let mut counters = Counters::default();
        for vote in self.votes.values().filter(|v| v.election_id == election_id) {
            counters.total += 1;
            *counters.by_candidate.entry(vote.candidate_id).or_default() += 1;
        }
        counters
    }
}

/// An in-process store. Cloning yields another handle on the same tables.
///
/// All writes take the table lock, so the insert-if-absent on the
/// `(voter_id, election_id)` key and the counter bumps happen as one step.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an election, as the admin service would.
    pub async fn insert_election(&self, election: Election) {
        self.tables
            .write()
            .await
            .elections
            .insert(election.id, election);
    }

    /// Insert or replace a candidate, as the admin service would.
    pub async fn insert_candidate(&self, candidate: Candidate) {
        self.tables
            .write()
            .await
            .candidates
            .insert(candidate.id, candidate);
    }

    /// Insert or replace a voter, as the auth service would.
    pub async fn insert_voter(&self, voter: Voter) {
        self.tables.write().await.voters.insert(voter.id, voter);
    }

    /// Total number of vote records, across all elections.
    pub async fn vote_records(&self) -> usize {
        self.tables.read().await.votes.len()
    }
}

#[rocket::async_trait]
impl EntityStore for MemoryStore {
    async fn election(&self, id: Id) -> StoreResult<Option<Election>> {
        Ok(self.tables.read().await.elections.get(&id).cloned())
    }

    async fn published_elections(&self) -> StoreResult<Vec<Election>> {
        Ok(self
            .tables
            .read()
            .await
            .elections
            .values()
            .filter(|e| e.status == ElectionStatus::Published)
            .cloned()
            .collect())
    }

    async fn candidate(&self, id: Id) -> StoreResult<Option<Candidate>> {
        Ok(self.tables.read().await.candidates.get(&id).cloned())
    }

    async fn candidates(&self, election_id: Id) -> StoreResult<Vec<Candidate>> {
        Ok(self
            .tables
            .read()
            .await
            .candidates
            .values()
            .filter(|c| c.election_id == election_id)
            .cloned()
            .collect())
    }

    async fn voter(&self, id: Id) -> StoreResult<Option<Voter>> {
        Ok(self.tables.read().await.voters.get(&id).cloned())
    }

    async fn count_active_voters(&self) -> StoreResult<u64> {
        let tables = self.tables.read().await;
        let active = tables
            .voters
            .values()
            .filter(|v| v.standing == Standing::Active)
            .count();
        Ok(active as u64)
    }

    async fn vote_for(&self, voter_id: Id, election_id: Id) -> StoreResult<Option<Vote>> {
        let tables = self.tables.read().await;
        Ok(tables
            .ballot_keys
            .get(&(voter_id, election_id))
            .and_then(|vote_id| tables.votes.get(vote_id))
            .cloned())
    }

    async fn votes_by_voter(&self, voter_id: Id) -> StoreResult<Vec<Vote>> {
        let mut votes: Vec<_> = self
            .tables
            .read()
            .await
            .votes
            .values()
            .filter(|v| v.voter_id == voter_id)
            .cloned()
            .collect();
        votes.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(votes)
    }

    async fn insert_vote(&self, vote: Vote) -> StoreResult<VoteInsert> {
        let mut tables = self.tables.write().await;
        let key = (vote.voter_id, vote.election_id);
        if tables.ballot_keys.contains_key(&key) {
            return Ok(VoteInsert::Duplicate);
        }
        // Check every record we are about to touch before writing anything.
        if !tables.elections.contains_key(&vote.election_id) {
            return Err(StoreError::Inconsistent(format!(
                "election {} vanished during admission",
                vote.election_id
            )));
        }
        if !tables.candidates.contains_key(&vote.candidate_id) {
            return Err(StoreError::Inconsistent(format!(
                "candidate {} vanished during admission",
                vote.candidate_id
            )));
        }

        tables.ballot_keys.insert(key, vote.id);
        tables.votes.insert(vote.id, vote.clone());
        if let Some(candidate) = tables.candidates.get_mut(&vote.candidate_id) {
            candidate.vote_count += 1;
        }
        if let Some(election) = tables.elections.get_mut(&vote.election_id) {
            election.total_votes += 1;
        }
        if let Some(voter) = tables.voters.get_mut(&vote.voter_id) {
            if !voter.voted_elections.contains(&vote.election_id) {
                voter.voted_elections.push(vote.election_id);
            }
        }
        Ok(VoteInsert::Admitted(vote))
    }

    async fn count_votes(&self, election_id: Id) -> StoreResult<Counters> {
        Ok(self.tables.read().await.counted_votes(election_id))
    }

    async fn recount(&self, election_id: Id) -> StoreResult<Recount> {
        let mut tables = self.tables.write().await;
        let election = tables.elections.get(&election_id).ok_or_else(|| {
            StoreError::Inconsistent(format!("election {election_id} vanished during recount"))
        })?;
        let cached = tables.cached_counters(election);
        let actual = tables.counted_votes(election_id);

        for candidate in tables
            .candidates
            .values_mut()
            .filter(|c| c.election_id == election_id)
        {
            candidate.vote_count = actual.candidate(candidate.id);
        }
        if let Some(election) = tables.elections.get_mut(&election_id) {
            election.total_votes = actual.total;
        }
        Ok(Recount { cached, actual })
    }
}
