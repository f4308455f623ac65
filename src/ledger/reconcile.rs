use std::collections::BTreeSet;

use crate::model::{
    api::reconcile::{Counter, ReconcileReport, Repair},
    mongodb::Id,
};
use crate::store::EntityStore;

use super::{existing_election, LookupError};

/// Rebuild an election's cached counters from its vote records.
///
/// Counters that already agree are left alone; every one that was rewritten
/// is listed in the report.
pub async fn reconcile(
    store: &dyn EntityStore,
    election_id: Id,
) -> Result<ReconcileReport, LookupError> {
    existing_election(store, election_id).await?;
    let recount = store.recount(election_id).await?;

    let mut repaired = Vec::new();
    if recount.cached.total != recount.actual.total {
        repaired.push(Repair {
            counter: Counter::Election,
            id: election_id.into(),
            was: recount.cached.total,
            now: recount.actual.total,
        });
    }
    // Ordered so that reports are stable.
    let candidate_ids: BTreeSet<_> = recount.cached.by_candidate.keys().copied().collect();
    for candidate_id in candidate_ids {
        let (was, now) = (
            recount.cached.candidate(candidate_id),
            recount.actual.candidate(candidate_id),
        );
        if was != now {
            repaired.push(Repair {
                counter: Counter::Candidate,
                id: candidate_id.into(),
                was,
                now,
            });
        }
    }

    for repair in &repaired {
        warn!(
            "Reconciled {:?} counter {} in election {election_id}: {} -> {}",
            repair.counter, repair.id, repair.was, repair.now
        );
    }
    if repaired.is_empty() {
        debug!("Counters for election {election_id} already consistent");
    }

    Ok(ReconcileReport {
        election_id: election_id.into(),
        total_votes: recount.actual.total,
        repaired,
    })
}
