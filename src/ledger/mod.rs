//! The voting ledger: vote admission, eligibility, tallies and results.
//!
//! Every operation takes the store it works against and, where the voting
//! window matters, the instant to evaluate it at. Handlers pass `Utc::now()`.

use thiserror::Error;

use crate::model::{db::Election, mongodb::Id};
use crate::store::{EntityStore, StoreError};

mod admission;
mod eligibility;
mod reconcile;
mod results;
mod scheduler;
mod tally;

pub use admission::{cast_vote, AdmissionError};
pub use eligibility::check_eligibility;
pub use reconcile::reconcile;
pub use results::get_results;
pub use scheduler::{ReconcileScheduler, ReconcileSchedulerFairing};
pub use tally::{get_tally, Consistency};

/// Failures of the read-only ledger operations.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("Election {0} not found")]
    ElectionNotFound(Id),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Fetch an election or fail with [`LookupError::ElectionNotFound`].
async fn existing_election(store: &dyn EntityStore, id: Id) -> Result<Election, LookupError> {
    store
        .election(id)
        .await?
        .ok_or(LookupError::ElectionNotFound(id))
}
