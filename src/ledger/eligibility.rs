use chrono::{DateTime, Utc};

use crate::model::{
    api::eligibility::{Eligibility, Ineligible},
    mongodb::Id,
};
use crate::store::{EntityStore, StoreResult};

/// Decide whether `voter_id` could currently vote in `election_id`.
///
/// Checks run in order and stop at the first failure: the election exists
/// and is published, `now` is inside its window, the voter exists and is
/// active, and the voter has not voted yet. Read-only and advisory;
/// admission re-checks everything itself.
pub async fn check_eligibility(
    store: &dyn EntityStore,
    voter_id: Id,
    election_id: Id,
    now: DateTime<Utc>,
) -> StoreResult<Eligibility> {
    let election = match store.election(election_id).await? {
        Some(election) => election,
        None => return Ok(Eligibility::ineligible(Ineligible::ElectionNotFound)),
    };
    if let Err(inactive) = election.accepting_votes_at(now) {
        return Ok(Eligibility::ineligible(inactive.into()));
    }

    match store.voter(voter_id).await? {
        None => return Ok(Eligibility::ineligible(Ineligible::VoterNotFound)),
        Some(voter) if !voter.is_active() => {
            return Ok(Eligibility::ineligible(Ineligible::VoterSuspended))
        }
        Some(_) => {}
    }

    if store.vote_for(voter_id, election_id).await?.is_some() {
        return Ok(Eligibility::ineligible(Ineligible::AlreadyVoted));
    }

    Ok(Eligibility::eligible())
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::ledger::{cast_vote, fixtures::Scenario};
    use crate::model::db::Election;
    use crate::store::MemoryStore;

    #[backend_test]
    async fn active_voter_in_open_election_is_eligible(store: MemoryStore) {
        let s = Scenario::seed(&store).await;
        let result = check_eligibility(&store, s.voter.id, s.election.id, Utc::now())
            .await
            .unwrap();
        assert_eq!(result, Eligibility::eligible());
    }

    #[backend_test]
    async fn checks_short_circuit_in_order(store: MemoryStore) {
        let s = Scenario::seed_election(&store, Election::draft_example()).await;

        // Draft election and unknown voter: the election check wins.
        let result = check_eligibility(&store, Id::new(), s.election.id, Utc::now())
            .await
            .unwrap();
        assert_eq!(result.reason, Some(Ineligible::ElectionNotPublished));

        let result = check_eligibility(&store, s.voter.id, Id::new(), Utc::now())
            .await
            .unwrap();
        assert_eq!(result.reason, Some(Ineligible::ElectionNotFound));
    }

    #[backend_test]
    async fn window_edges(store: MemoryStore) {
        let s = Scenario::seed(&store).await;
        let e = &s.election;

        for (now, expected) in [
            (e.start_time - Duration::seconds(1), Some(Ineligible::VotingNotOpen)),
            (e.start_time, None),
            (e.end_time, None),
            (e.end_time + Duration::seconds(1), Some(Ineligible::VotingClosed)),
        ] {
            let result = check_eligibility(&store, s.voter.id, e.id, now)
                .await
                .unwrap();
            assert_eq!(result.reason, expected, "at {now}");
            assert_eq!(result.eligible, expected.is_none());
        }
    }

    #[backend_test]
    async fn voter_checks(store: MemoryStore) {
        let s = Scenario::seed(&store).await;

        let result = check_eligibility(&store, s.suspended.id, s.election.id, Utc::now())
            .await
            .unwrap();
        assert_eq!(result.reason, Some(Ineligible::VoterSuspended));

        let result = check_eligibility(&store, Id::new(), s.election.id, Utc::now())
            .await
            .unwrap();
        assert_eq!(result.reason, Some(Ineligible::VoterNotFound));
    }

    #[backend_test]
    async fn voters_who_voted_are_no_longer_eligible(store: MemoryStore) {
        let s = Scenario::seed(&store).await;
        cast_vote(&store, s.voter.id, s.election.id, s.a.id, Utc::now())
            .await
            .unwrap();

        let result = check_eligibility(&store, s.voter.id, s.election.id, Utc::now())
            .await
            .unwrap();
        assert_eq!(result.reason, Some(Ineligible::AlreadyVoted));
    }
}
