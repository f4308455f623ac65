//! Behaviour every [`EntityStore`] must share, run against each implementation.

use chrono::Utc;
use rocket::tokio;

use crate::model::{
    common::{Approval, Standing},
    db::{Candidate, Election, Vote, Voter},
    mongodb::Id,
};

use super::{EntityStore, StoreError, VoteInsert};

/// Writes the admin and auth services would make, for seeding a store.
#[rocket::async_trait]
pub(crate) trait Seed: EntityStore + Clone + 'static {
    /// Insert or replace an election.
    async fn seed_election(&self, election: Election);

    /// Insert or replace a candidate.
    async fn seed_candidate(&self, candidate: Candidate);

    async fn seed_voter(&self, voter: Voter);
}

struct Seeded {
    election: Election,
    a: Candidate,
    b: Candidate,
    voters: Vec<Voter>,
}

async fn seed<S: Seed>(store: &S, voters: usize) -> Seeded {
    let election = Election::open_example();
    let a = Candidate::new(election.id, "Alice", Approval::Approved);
    let b = Candidate::new(election.id, "Bob", Approval::Approved);
    store.seed_election(election.clone()).await;
    store.seed_candidate(a.clone()).await;
    store.seed_candidate(b.clone()).await;

    let mut seeded = Vec::with_capacity(voters);
    for i in 0..voters {
        let voter = Voter::new(format!("Voter {i}"), Standing::Active);
        store.seed_voter(voter.clone()).await;
        seeded.push(voter);
    }
    Seeded {
        election,
        a,
        b,
        voters: seeded,
    }
}

pub(crate) async fn admits_one_vote_per_voter<S: Seed>(store: S) {
    let Seeded {
        election,
        a,
        b,
        voters,
    } = seed(&store, 1).await;
    let voter_id = voters[0].id;

    let attempts: Vec<_> = (0..16)
        .map(|i| {
            let store = store.clone();
            let candidate_id = if i % 2 == 0 { a.id } else { b.id };
            let vote = Vote::new(voter_id, election.id, candidate_id, Utc::now());
            tokio::spawn(async move { store.insert_vote(vote).await })
        })
        .collect();

    let mut admitted = 0;
    let mut duplicates = 0;
    for attempt in attempts {
        match attempt.await.unwrap().unwrap() {
            VoteInsert::Admitted(_) => admitted += 1,
            VoteInsert::Duplicate => duplicates += 1,
        }
    }
    assert_eq!((admitted, duplicates), (1, 15));

    let counted = store.count_votes(election.id).await.unwrap();
    assert_eq!(counted.total, 1);
    assert!(store.vote_for(voter_id, election.id).await.unwrap().is_some());
    let election = store.election(election.id).await.unwrap().unwrap();
    assert_eq!(election.total_votes, 1);
}

pub(crate) async fn counters_track_concurrent_votes<S: Seed>(store: S) {
    let Seeded {
        election,
        a,
        b,
        voters,
    } = seed(&store, 12).await;

    // Every vote bumps the same election counter, so these all contend.
    let attempts: Vec<_> = voters
        .iter()
        .enumerate()
        .map(|(i, voter)| {
            let store = store.clone();
            let candidate_id = if i % 3 == 0 { a.id } else { b.id };
            let vote = Vote::new(voter.id, election.id, candidate_id, Utc::now());
            tokio::spawn(async move { store.insert_vote(vote).await })
        })
        .collect();
    for attempt in attempts {
        assert!(matches!(
            attempt.await.unwrap().unwrap(),
            VoteInsert::Admitted(_)
        ));
    }

    let counted = store.count_votes(election.id).await.unwrap();
    assert_eq!(counted.total, 12);
    assert_eq!(counted.candidate(a.id), 4);
    assert_eq!(counted.candidate(b.id), 8);

    let election_now = store.election(election.id).await.unwrap().unwrap();
    assert_eq!(election_now.total_votes, counted.total);
    for candidate in [&a, &b] {
        let stored = store.candidate(candidate.id).await.unwrap().unwrap();
        assert_eq!(stored.vote_count, counted.candidate(candidate.id));
    }
    let voter = store.voter(voters[0].id).await.unwrap().unwrap();
    assert_eq!(voter.voted_elections, vec![election.id]);
}

pub(crate) async fn recount_repairs_drifted_counters<S: Seed>(store: S) {
    let Seeded {
        election,
        a,
        b,
        voters,
    } = seed(&store, 3).await;
    for voter in &voters {
        let vote = Vote::new(voter.id, election.id, a.id, Utc::now());
        store.insert_vote(vote).await.unwrap();
    }

    let mut drifted = store.election(election.id).await.unwrap().unwrap();
    drifted.total_votes = 1;
    store.seed_election(drifted).await;
    let mut drifted = store.candidate(a.id).await.unwrap().unwrap();
    drifted.vote_count = 9;
    store.seed_candidate(drifted).await;

    let recount = store.recount(election.id).await.unwrap();
    assert_eq!(recount.cached.total, 1);
    assert_eq!(recount.cached.candidate(a.id), 9);
    assert_eq!(recount.actual.total, 3);
    assert_eq!(recount.actual.candidate(a.id), 3);
    assert_eq!(recount.actual.candidate(b.id), 0);

    let election = store.election(election.id).await.unwrap().unwrap();
    assert_eq!(election.total_votes, 3);
    assert_eq!(store.candidate(a.id).await.unwrap().unwrap().vote_count, 3);
    assert_eq!(store.candidate(b.id).await.unwrap().unwrap().vote_count, 0);
}

pub(crate) async fn failed_insert_writes_nothing<S: Seed>(store: S) {
    let Seeded {
        election, voters, ..
    } = seed(&store, 1).await;
    let voter_id = voters[0].id;

    let result = store
        .insert_vote(Vote::new(voter_id, election.id, Id::new(), Utc::now()))
        .await;

    assert!(matches!(result, Err(StoreError::Inconsistent(_))));
    assert_eq!(store.vote_for(voter_id, election.id).await.unwrap(), None);
    assert_eq!(store.count_votes(election.id).await.unwrap().total, 0);
    let election = store.election(election.id).await.unwrap().unwrap();
    assert_eq!(election.total_votes, 0);
}
