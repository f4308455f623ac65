use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{
    db::{Inactive, Vote},
    mongodb::Id,
};
use crate::store::{EntityStore, StoreError, VoteInsert};

/// Why a vote was not admitted. Every variant is final for that attempt:
/// none of them is retried by the ledger.
#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("Election {0} not found")]
    ElectionNotFound(Id),
    #[error("Election {election_id} is not accepting votes: {reason}")]
    ElectionNotActive { election_id: Id, reason: Inactive },
    #[error("Candidate {0} cannot receive votes in this election")]
    CandidateNotEligible(Id),
    #[error("Voter {0} is not active")]
    VoterNotActive(Id),
    #[error("Voter {voter_id} has already voted in election {election_id}")]
    DuplicateVote { voter_id: Id, election_id: Id },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AdmissionError {
    /// A short machine-readable name for the failure.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ElectionNotFound(_) => "election_not_found",
            Self::ElectionNotActive { .. } => "election_not_active",
            Self::CandidateNotEligible(_) => "candidate_not_eligible",
            Self::VoterNotActive(_) => "voter_not_active",
            Self::DuplicateVote { .. } => "duplicate_vote",
            Self::Store(_) => "storage_unavailable",
        }
    }

    /// What the voter is told.
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::ElectionNotFound(_) => "Election not found",
            Self::ElectionNotActive { .. } => "Voting is not currently open for this election",
            Self::CandidateNotEligible(_) => "This candidate cannot receive votes in this election",
            Self::VoterNotActive(_) => "Your account is not allowed to vote",
            Self::DuplicateVote { .. } => "You have already voted in this election",
            Self::Store(_) => "Something went wrong, please try again",
        }
    }
}

/// Admit a single vote.
///
/// The election, candidate and voter are re-validated here rather than
/// trusted from an earlier eligibility check. Uniqueness is decided solely
/// by the store's insert-if-absent: of any number of concurrent calls for
/// the same voter and election, exactly one is admitted and the rest fail
/// with [`AdmissionError::DuplicateVote`].
pub async fn cast_vote(
    store: &dyn EntityStore,
    voter_id: Id,
    election_id: Id,
    candidate_id: Id,
    now: DateTime<Utc>,
) -> Result<Vote, AdmissionError> {
    match validate(store, voter_id, election_id, candidate_id, now).await {
        Ok(()) => {}
        Err(AdmissionError::Store(e)) => {
            error!("Failed to validate vote by voter {voter_id} in election {election_id}: {e}");
            return Err(e.into());
        }
        Err(e) => {
            debug!("Rejected vote by voter {voter_id} in election {election_id}: {e}");
            return Err(e);
        }
    }

    let vote = Vote::new(voter_id, election_id, candidate_id, now);
    match store.insert_vote(vote).await {
        Ok(VoteInsert::Admitted(vote)) => {
            info!(
                "Admitted vote {} by voter {voter_id} in election {election_id}",
                vote.id
            );
            Ok(vote)
        }
        Ok(VoteInsert::Duplicate) => {
            info!("Rejected duplicate vote by voter {voter_id} in election {election_id}");
            Err(AdmissionError::DuplicateVote {
                voter_id,
                election_id,
            })
        }
        Err(e) => {
            error!("Failed to record vote by voter {voter_id} in election {election_id}: {e}");
            Err(e.into())
        }
    }
}

/// Everything admission checks before attempting the insert.
async fn validate(
    store: &dyn EntityStore,
    voter_id: Id,
    election_id: Id,
    candidate_id: Id,
    now: DateTime<Utc>,
) -> Result<(), AdmissionError> {
    let election = store
        .election(election_id)
        .await?
        .ok_or(AdmissionError::ElectionNotFound(election_id))?;
    election
        .accepting_votes_at(now)
        .map_err(|reason| AdmissionError::ElectionNotActive {
            election_id,
            reason,
        })?;

    match store.candidate(candidate_id).await? {
        Some(candidate) if candidate.eligible_in(election_id) => {}
        _ => return Err(AdmissionError::CandidateNotEligible(candidate_id)),
    }

    match store.voter(voter_id).await? {
        Some(voter) if voter.is_active() => Ok(()),
        _ => Err(AdmissionError::VoterNotActive(voter_id)),
    }
}
