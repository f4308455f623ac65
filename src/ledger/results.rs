use crate::model::{
    api::results::{CandidateResult, ElectionResults},
    mongodb::Id,
};
use crate::store::EntityStore;

use super::{existing_election, tally::ranked_candidates, Consistency, LookupError};

/// `part` as a percentage of `whole`, zero when `whole` is zero.
fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Project an election's tally into its published results.
///
/// Works at any status and with no votes at all, in which case every count
/// and percentage is zero and there is no winner. A tie for first place
/// also leaves `winner_id` empty and sets `tied`.
pub async fn get_results(
    store: &dyn EntityStore,
    election_id: Id,
) -> Result<ElectionResults, LookupError> {
    let election = existing_election(store, election_id).await?;
    let ranked = ranked_candidates(store, election_id, Consistency::Cached).await?;
    let active_voters = store.count_active_voters().await?;
    let total_votes = election.total_votes;

    let top = ranked.first().map(|(_, count, _)| *count).unwrap_or(0);
    let leaders: Vec<_> = ranked
        .iter()
        .filter(|(_, count, _)| top > 0 && *count == top)
        .map(|(candidate, _, _)| candidate.id)
        .collect();
    let winner_id = match leaders.as_slice() {
        [only] => Some((*only).into()),
        _ => None,
    };

    let candidates = ranked
        .into_iter()
        .map(|(candidate, vote_count, rank)| CandidateResult {
            id: candidate.id.into(),
            name: candidate.name,
            vote_count,
            percentage: percentage(vote_count, total_votes),
            rank,
        })
        .collect();

    Ok(ElectionResults {
        election_id: election.id.into(),
        title: election.title,
        status: election.status,
        total_votes,
        candidates,
        winner_id,
        tied: leaders.len() > 1,
        active_voters,
        // Votes by since-suspended voters still count, but those voters no
        // longer do.
        turnout: percentage(total_votes, active_voters).min(100.0),
    })
}
