use crate::model::{api::tally::TallyEntry, db::Candidate, mongodb::Id};
use crate::store::EntityStore;

use super::{existing_election, LookupError};

/// Where vote counts are read from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Consistency {
    /// The counters maintained by admission.
    #[default]
    Cached,
    /// A fresh aggregation over the vote records.
    Strong,
}

/// Approved candidates paired with their counts, best first, with competition ranks.
pub(super) async fn ranked_candidates(
    store: &dyn EntityStore,
    election_id: Id,
    consistency: Consistency,
) -> Result<Vec<(Candidate, u64, u32)>, LookupError> {
    let mut candidates = store.candidates(election_id).await?;
    candidates.retain(Candidate::is_approved);

    let counted = match consistency {
        Consistency::Cached => None,
        Consistency::Strong => Some(store.count_votes(election_id).await?),
    };
    let mut counted: Vec<_> = candidates
        .into_iter()
        .map(|candidate| {
            let count = match counted {
                Some(ref counters) => counters.candidate(candidate.id),
                None => candidate.vote_count,
            };
            (candidate, count)
        })
        .collect();

    // Ties are listed by ID only so that the order is stable; they share a rank.
    counted.sort_by(|(a, a_count), (b, b_count)| b_count.cmp(a_count).then(a.id.cmp(&b.id)));

    Ok(rank(counted))
}

/// Assign competition ranks (1, 1, 3) to counts already sorted best first.
fn rank<T>(sorted: Vec<(T, u64)>) -> Vec<(T, u64, u32)> {
    let mut ranked = Vec::with_capacity(sorted.len());
    let mut previous: Option<(u64, u32)> = None;
    for (position, (item, count)) in sorted.into_iter().enumerate() {
        let rank = match previous {
            Some((previous_count, previous_rank)) if previous_count == count => previous_rank,
            _ => position as u32 + 1,
        };
        previous = Some((count, rank));
        ranked.push((item, count, rank));
    }
    ranked
}

/// Per-candidate vote counts for an election's approved candidates.
///
/// Both consistency modes agree whenever the counters are in step with the
/// vote records, which admission guarantees.
pub async fn get_tally(
    store: &dyn EntityStore,
    election_id: Id,
    consistency: Consistency,
) -> Result<Vec<TallyEntry>, LookupError> {
    existing_election(store, election_id).await?;
    let tally = ranked_candidates(store, election_id, consistency)
        .await?
        .into_iter()
        .map(|(candidate, vote_count, rank)| TallyEntry {
            candidate_id: candidate.id.into(),
            vote_count,
            rank,
        })
        .collect();
    Ok(tally)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::ledger::{cast_vote, fixtures::Scenario};
    use crate::store::MemoryStore;

    #[test]
    fn ranks_share_on_ties_and_skip_after() {
        let ranked = rank(vec![("a", 5), ("b", 5), ("c", 2), ("d", 0), ("e", 0)]);
        let ranks: Vec<_> = ranked.iter().map(|(_, _, rank)| *rank).collect();
        assert_eq!(ranks, vec![1, 1, 3, 4, 4]);
    }

    #[backend_test]
    async fn tally_excludes_unapproved_candidates(store: MemoryStore) {
        let s = Scenario::seed(&store).await;
        cast_vote(&store, s.voter.id, s.election.id, s.a.id, Utc::now())
            .await
            .unwrap();

        let tally = get_tally(&store, s.election.id, Consistency::Cached)
            .await
            .unwrap();
        assert_eq!(
            tally,
            vec![
                TallyEntry {
                    candidate_id: s.a.id.into(),
                    vote_count: 1,
                    rank: 1
                },
                TallyEntry {
                    candidate_id: s.b.id.into(),
                    vote_count: 0,
                    rank: 2
                },
            ]
        );
    }

    #[backend_test]
    async fn cached_and_strong_reads_agree(store: MemoryStore) {
        let s = Scenario::seed(&store).await;
        let voters = Scenario::more_voters(&store, 5).await;
        for (i, voter) in voters.iter().enumerate() {
            let candidate = if i < 3 { s.b.id } else { s.a.id };
            cast_vote(&store, voter.id, s.election.id, candidate, Utc::now())
                .await
                .unwrap();
        }

        let cached = get_tally(&store, s.election.id, Consistency::Cached)
            .await
            .unwrap();
        let strong = get_tally(&store, s.election.id, Consistency::Strong)
            .await
            .unwrap();
        assert_eq!(cached, strong);
        assert_eq!(*cached[0].candidate_id, s.b.id);
        assert_eq!(cached[0].vote_count, 3);
    }

    #[backend_test]
    async fn empty_election_tallies_to_zero(store: MemoryStore) {
        let s = Scenario::seed(&store).await;
        let tally = get_tally(&store, s.election.id, Consistency::Strong)
            .await
            .unwrap();
        assert_eq!(tally.len(), 2);
        assert!(tally.iter().all(|e| e.vote_count == 0 && e.rank == 1));
    }

    #[backend_test]
    async fn unknown_election_is_not_found(store: MemoryStore) {
        let result = get_tally(&store, Id::new(), Consistency::Cached).await;
        assert!(matches!(result, Err(LookupError::ElectionNotFound(_))));
    }
}
