use rocket::{serde::json::Json, Route, State};

use crate::error::Result;
use crate::model::api::{auth::CurrentVoter, receipt::CastVote};
use crate::store::Store;

pub fn routes() -> Vec<Route> {
    routes![vote_history]
}

/// Every vote the caller has cast, newest first, with display names where
/// the election and candidate still exist.
#[get("/voter/votes")]
async fn vote_history(voter: CurrentVoter, store: &State<Store>) -> Result<Json<Vec<CastVote>>> {
    let votes = store.votes_by_voter(voter.id).await?;

    // Look up display names; either record may have been deleted since.
    let mut history = Vec::with_capacity(votes.len());
    for vote in votes {
        let election = store.election(vote.election_id).await?;
        let candidate = store.candidate(vote.candidate_id).await?;
        history.push(CastVote {
            vote_id: vote.id.into(),
            election_id: vote.election_id.into(),
            election_title: election.map(|e| e.title),
            candidate_id: vote.candidate_id.into(),
            candidate_name: candidate.map(|c| c.name),
            timestamp: vote.timestamp,
        });
    }
    Ok(Json(history))
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rocket::{http::Status, local::asynchronous::Client};

    use super::*;
    use crate::bearer;
    use crate::ledger::{cast_vote, fixtures::Scenario};
    use crate::model::db::{Election, Voter};
    use crate::store::MemoryStore;

    #[backend_test]
    async fn history_is_newest_first(client: Client, store: MemoryStore) {
        let first = Scenario::seed(&store).await;
        let mut second = Election::open_example();
        second.title = "Library Board".to_string();
        let second = Scenario::seed_election(&store, second).await;
        // Both scenarios seed their own voters; vote as the first one everywhere.
        let voter = first.voter.id;
        let earlier = Utc::now() - Duration::seconds(1);

        cast_vote(&store, voter, first.election.id, first.a.id, earlier)
            .await
            .unwrap();
        cast_vote(&store, voter, second.election.id, second.b.id, Utc::now())
            .await
            .unwrap();

        let response = client
            .get("/voter/votes")
            .header(bearer::<Voter>(voter))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let history: Vec<CastVote> = response.into_json().await.unwrap();

        assert_eq!(history.len(), 2);
        assert_eq!(history[0].election_title.as_deref(), Some("Library Board"));
        assert_eq!(history[0].candidate_name.as_deref(), Some("Bob"));
        assert_eq!(*history[1].election_id, first.election.id);
        assert_eq!(history[1].candidate_name.as_deref(), Some("Alice"));
    }

    #[backend_test]
    async fn history_needs_a_token(client: Client) {
        let response = client.get("/voter/votes").dispatch().await;
        assert_eq!(response.status(), Status::Unauthorized);
    }
}
