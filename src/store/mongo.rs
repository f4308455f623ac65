use std::collections::HashMap;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use mongodb::{
    bson::{doc, Bson, Document},
    error::{Error as DbError, TRANSIENT_TRANSACTION_ERROR, UNKNOWN_TRANSACTION_COMMIT_RESULT},
    options::FindOptions,
    Client, ClientSession, Database,
};
use rocket::{futures::TryStreamExt, tokio::time::sleep};

use crate::model::{
    common::{ElectionStatus, Standing},
    db::{Candidate, Election, Vote, Voter},
    mongodb::{is_duplicate_key_error, Coll, Id},
};

use super::{Counters, EntityStore, Recount, StoreError, StoreResult, VoteInsert};

/// How long a transaction keeps being re-run after transient aborts.
/// Matches the driver's own `with_transaction` limit.
const TRANSACTION_TIME_LIMIT: Duration = Duration::from_secs(120);
const INITIAL_BACKOFF: Duration = Duration::from_millis(5);
const MAX_BACKOFF: Duration = Duration::from_millis(500);

/// Paces the re-runs of one transaction: exponential backoff with jitter,
/// until a deadline.
struct Retry {
    deadline: Instant,
    backoff: Duration,
    attempt: u32,
}

impl Retry {
    fn new() -> Self {
        Self::within(TRANSACTION_TIME_LIMIT)
    }

    fn within(limit: Duration) -> Self {
        Self {
            deadline: Instant::now() + limit,
            backoff: INITIAL_BACKOFF,
            attempt: 1,
        }
    }

    /// The base pause before the next attempt, or `None` if that attempt
    /// would start past the deadline.
    fn next_delay(&mut self) -> Option<Duration> {
        let delay = self.backoff;
        if Instant::now() + delay >= self.deadline {
            return None;
        }
        self.attempt += 1;
        self.backoff = (self.backoff * 2).min(MAX_BACKOFF);
        Some(delay)
    }

    /// Sleep before the next attempt. Returns false once out of time.
    async fn wait(&mut self) -> bool {
        match self.next_delay() {
            Some(delay) => {
                sleep(jittered(delay)).await;
                true
            }
            None => false,
        }
    }
}

/// `delay` plus up to half of it again, varied from call to call.
fn jittered(delay: Duration) -> Duration {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or_default();
    delay + delay.mul_f64(f64::from(nanos % 1000) / 2000.0)
}

/// The production store, backed by MongoDB.
///
/// Vote uniqueness comes from the unique `(voter_id, election_id)` index on
/// the votes collection (see `ensure_indexes_exist`); the vote insert and
/// both counter increments share one multi-document transaction.
#[derive(Clone)]
pub struct MongoStore {
    client: Client,
    elections: Coll<Election>,
    candidates: Coll<Candidate>,
    voters: Coll<Voter>,
    votes: Coll<Vote>,
}

impl MongoStore {
    pub fn new(client: Client, db: &Database) -> Self {
        Self {
            client,
            elections: Coll::from_db(db),
            candidates: Coll::from_db(db),
            voters: Coll::from_db(db),
            votes: Coll::from_db(db),
        }
    }

    /// Write the vote and bump the counters inside the session's open transaction.
    async fn write_vote(&self, vote: &Vote, session: &mut ClientSession) -> StoreResult<()> {
        self.votes
            .insert_one_with_session(vote, None, session)
            .await?;

        let candidate_filter = doc! {
            "_id": vote.candidate_id,
            "election_id": vote.election_id,
        };
        let result = self
            .candidates
            .update_one_with_session(
                candidate_filter,
                doc! { "$inc": { "vote_count": 1_i64 } },
                None,
                session,
            )
            .await?;
        if result.matched_count != 1 {
            return Err(StoreError::Inconsistent(format!(
                "candidate {} vanished during admission",
                vote.candidate_id
            )));
        }

        let result = self
            .elections
            .update_one_with_session(
                vote.election_id.as_doc(),
                doc! { "$inc": { "total_votes": 1_i64 } },
                None,
                session,
            )
            .await?;
        if result.matched_count != 1 {
            return Err(StoreError::Inconsistent(format!(
                "election {} vanished during admission",
                vote.election_id
            )));
        }

        // The voter's history is a convenience copy; a missing voter document is fine.
        self.voters
            .update_one_with_session(
                vote.voter_id.as_doc(),
                doc! { "$addToSet": { "voted_elections": vote.election_id } },
                None,
                session,
            )
            .await?;
        Ok(())
    }

    /// Recount inside the session's open transaction and overwrite the caches.
    async fn write_recount(
        &self,
        election_id: Id,
        session: &mut ClientSession,
    ) -> StoreResult<Recount> {
        let election = self
            .elections
            .find_one_with_session(election_id.as_doc(), None, session)
            .await?
            .ok_or_else(|| {
                StoreError::Inconsistent(format!("election {election_id} vanished during recount"))
            })?;

        let mut cached = Counters {
            total: election.total_votes,
            by_candidate: HashMap::new(),
        };
        let mut cursor = self
            .candidates
            .find_with_session(doc! { "election_id": election_id }, None, session)
            .await?;
        while let Some(candidate) = cursor.next(session).await {
            let candidate = candidate?;
            cached.by_candidate.insert(candidate.id, candidate.vote_count);
        }

        let mut actual = Counters::default();
        let mut cursor = self
            .votes
            .raw()
            .aggregate_with_session(count_pipeline(election_id), None, session)
            .await?;
        while let Some(group) = cursor.next(session).await {
            let (candidate_id, count) = parse_group(group?)?;
            actual.total += count;
            actual.by_candidate.insert(candidate_id, count);
        }

        for candidate_id in cached.by_candidate.keys() {
            let update = doc! {
                "$set": { "vote_count": to_i64(actual.candidate(*candidate_id))? }
            };
            self.candidates
                .update_one_with_session(candidate_id.as_doc(), update, None, session)
                .await?;
        }
        let update = doc! { "$set": { "total_votes": to_i64(actual.total)? } };
        self.elections
            .update_one_with_session(election_id.as_doc(), update, None, session)
            .await?;

        Ok(Recount { cached, actual })
    }
}

/// Commit the session's transaction, retrying while the outcome is unknown.
async fn commit(session: &mut ClientSession, retry: &mut Retry) -> Result<(), DbError> {
    loop {
        match session.commit_transaction().await {
            Ok(()) => return Ok(()),
            Err(e) if e.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT) => {
                if !retry.wait().await {
                    return Err(e);
                }
                debug!("Commit result unknown, retrying (attempt {}): {e}", retry.attempt);
            }
            Err(e) => return Err(e),
        }
    }
}

/// Should a failed transaction be run again from the start?
fn is_transient(err: &StoreError) -> bool {
    match err {
        StoreError::Db(e) => e.contains_label(TRANSIENT_TRANSACTION_ERROR),
        StoreError::Inconsistent(_) => false,
    }
}

/// Aggregation grouping an election's votes by candidate.
fn count_pipeline(election_id: Id) -> Vec<Document> {
    vec![
        doc! { "$match": { "election_id": election_id } },
        doc! { "$group": { "_id": "$candidate_id", "count": { "$sum": 1 } } },
    ]
}

/// Read one `{ _id: candidate_id, count }` group produced by [`count_pipeline`].
fn parse_group(group: Document) -> StoreResult<(Id, u64)> {
    let candidate_id = group
        .get_object_id("_id")
        .map_err(|e| StoreError::Inconsistent(format!("malformed vote group: {e}")))?;
    let count = match group.get("count") {
        Some(Bson::Int32(n)) => u64::try_from(*n).ok(),
        Some(Bson::Int64(n)) => u64::try_from(*n).ok(),
        _ => None,
    }
    .ok_or_else(|| StoreError::Inconsistent(format!("malformed vote count in {group}")))?;
    Ok((candidate_id.into(), count))
}

fn to_i64(count: u64) -> StoreResult<i64> {
    i64::try_from(count).map_err(|_| StoreError::Inconsistent(format!("count {count} overflows")))
}

#[rocket::async_trait]
impl EntityStore for MongoStore {
    async fn election(&self, id: Id) -> StoreResult<Option<Election>> {
        Ok(self.elections.find_one(id.as_doc(), None).await?)
    }

    async fn published_elections(&self) -> StoreResult<Vec<Election>> {
        let filter = doc! { "status": ElectionStatus::Published };
        Ok(self
            .elections
            .find(filter, None)
            .await?
            .try_collect()
            .await?)
    }

    async fn candidate(&self, id: Id) -> StoreResult<Option<Candidate>> {
        Ok(self.candidates.find_one(id.as_doc(), None).await?)
    }

    async fn candidates(&self, election_id: Id) -> StoreResult<Vec<Candidate>> {
        let filter = doc! { "election_id": election_id };
        Ok(self
            .candidates
            .find(filter, None)
            .await?
            .try_collect()
            .await?)
    }

    async fn voter(&self, id: Id) -> StoreResult<Option<Voter>> {
        Ok(self.voters.find_one(id.as_doc(), None).await?)
    }

    async fn count_active_voters(&self) -> StoreResult<u64> {
        let filter = doc! { "standing": Standing::Active };
        Ok(self.voters.count_documents(filter, None).await?)
    }

    async fn vote_for(&self, voter_id: Id, election_id: Id) -> StoreResult<Option<Vote>> {
        let filter = doc! {
            "voter_id": voter_id,
            "election_id": election_id,
        };
        Ok(self.votes.find_one(filter, None).await?)
    }

    async fn votes_by_voter(&self, voter_id: Id) -> StoreResult<Vec<Vote>> {
        let options = FindOptions::builder()
            .sort(doc! { "timestamp": -1 })
            .build();
        Ok(self
            .votes
            .find(doc! { "voter_id": voter_id }, options)
            .await?
            .try_collect()
            .await?)
    }

    async fn insert_vote(&self, vote: Vote) -> StoreResult<VoteInsert> {
        let mut session = self.client.start_session(None).await?;
        let mut retry = Retry::new();
        loop {
            session.start_transaction(None).await?;
            let written = match self.write_vote(&vote, &mut session).await {
                Ok(()) => commit(&mut session, &mut retry)
                    .await
                    .map_err(StoreError::from),
                Err(e) => {
                    // The server may already have aborted; that is fine.
                    let _ = session.abort_transaction().await;
                    Err(e)
                }
            };
            let err = match written {
                Ok(()) => return Ok(VoteInsert::Admitted(vote)),
                Err(StoreError::Db(ref e)) if is_duplicate_key_error(e) => {
                    return Ok(VoteInsert::Duplicate)
                }
                Err(e) if is_transient(&e) => e,
                Err(e) => return Err(e),
            };
            if retry.wait().await {
                debug!(
                    "Vote transaction aborted transiently, retrying (attempt {}): {err}",
                    retry.attempt
                );
                continue;
            }

            // Out of time. The write we kept conflicting with may be this
            // voter's, or ours if a commit outcome was lost.
            return match self.vote_for(vote.voter_id, vote.election_id).await? {
                Some(existing) if existing.id == vote.id => Ok(VoteInsert::Admitted(existing)),
                Some(_) => Ok(VoteInsert::Duplicate),
                None => Err(err),
            };
        }
    }

    async fn count_votes(&self, election_id: Id) -> StoreResult<Counters> {
        let mut counters = Counters::default();
        let mut cursor = self
            .votes
            .raw()
            .aggregate(count_pipeline(election_id), None)
            .await?;
        while let Some(group) = cursor.try_next().await? {
            let (candidate_id, count) = parse_group(group)?;
            counters.total += count;
            counters.by_candidate.insert(candidate_id, count);
        }
        Ok(counters)
    }

    async fn recount(&self, election_id: Id) -> StoreResult<Recount> {
        let mut session = self.client.start_session(None).await?;
        let mut retry = Retry::new();
        loop {
            session.start_transaction(None).await?;
            let recounted = match self.write_recount(election_id, &mut session).await {
                Ok(recount) => commit(&mut session, &mut retry)
                    .await
                    .map(|()| recount)
                    .map_err(StoreError::from),
                Err(e) => {
                    let _ = session.abort_transaction().await;
                    Err(e)
                }
            };
            let err = match recounted {
                Err(e) if is_transient(&e) => e,
                other => return other,
            };
            if !retry.wait().await {
                return Err(err);
            }
            debug!(
                "Recount transaction aborted transiently, retrying (attempt {}): {err}",
                retry.attempt
            );
        }
    }
}
