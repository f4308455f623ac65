use chrono::Utc;
use rocket::{response::status::Created, serde::json::Json, Route, State};

use crate::error::{Error, Result};
use crate::ledger::{cast_vote, check_eligibility, AdmissionError};
use crate::model::api::{
    auth::CurrentVoter,
    election::{Ballot, BallotCandidate, ElectionSummary},
    eligibility::Eligibility,
    receipt::{VoteReceipt, VoteRequest, VoteStatus},
};
use crate::store::Store;

use super::common::{path_id, PathId};

pub fn routes() -> Vec<Route> {
    routes![eligibility, cast, ballot, vote_status]
}

#[get("/elections/<election_id>/eligibility")]
async fn eligibility(
    voter: CurrentVoter,
    election_id: PathId,
    store: &State<Store>,
) -> Result<Json<Eligibility>> {
    let election_id = path_id(election_id)?;

    // Could the caller vote right now?
    let eligibility =
        check_eligibility(store.inner().as_ref(), voter.id, election_id, Utc::now()).await?;
    Ok(Json(eligibility))
}

#[post("/elections/<election_id>/votes", data = "<vote>", format = "json")]
async fn cast(
    voter: CurrentVoter,
    election_id: PathId,
    vote: Json<VoteRequest>,
    store: &State<Store>,
) -> Result<Created<Json<VoteReceipt>>> {
    let election_id = path_id(election_id)?;

    // Turn away suspended voters without touching the ledger.
    // Admission checks standing again against the store.
    if !voter.is_active() {
        debug!("Suspended voter {} tried to vote in election {election_id}", voter.id);
        return Err(AdmissionError::VoterNotActive(voter.id).into());
    }

    // Admit the vote.
    let vote = cast_vote(
        store.inner().as_ref(),
        voter.id,
        election_id,
        vote.candidate_id.into(),
        Utc::now(),
    )
    .await?;

    // Point at the caller's vote status.
    let location = format!("/elections/{election_id}/vote");
    Ok(Created::new(location).body(Json(vote.into())))
}

#[get("/elections/<election_id>/ballot")]
async fn ballot(
    voter: CurrentVoter,
    election_id: PathId,
    store: &State<Store>,
) -> Result<Json<Ballot>> {
    let election_id = path_id(election_id)?;

    // Get the election.
    let election = store
        .election(election_id)
        .await?
        .ok_or_else(|| Error::not_found("Election"))?;

    // Get the approved candidates, by name.
    let mut candidates = store.candidates(election_id).await?;
    candidates.retain(|c| c.is_approved());
    candidates.sort_by(|a, b| a.name.cmp(&b.name));
    let has_voted = store.vote_for(voter.id, election_id).await?.is_some();

    Ok(Json(Ballot {
        election: ElectionSummary::at(election, Utc::now()),
        candidates: candidates.into_iter().map(BallotCandidate::from).collect(),
        has_voted,
    }))
}

#[get("/elections/<election_id>/vote")]
async fn vote_status(
    voter: CurrentVoter,
    election_id: PathId,
    store: &State<Store>,
) -> Result<Json<VoteStatus>> {
    let election_id = path_id(election_id)?;

    // Ensure the election exists.
    if store.election(election_id).await?.is_none() {
        return Err(Error::not_found("Election"));
    }

    // Get the caller's vote.
    let vote = store.vote_for(voter.id, election_id).await?;
    Ok(Json(vote.into()))
}
