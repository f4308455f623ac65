use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use rocket::{
    fairing::{Fairing, Info, Kind},
    futures::future::{BoxFuture, FutureExt},
    tokio::sync::Mutex,
    Build, Orbit, Rocket,
};

use crate::{
    config::Config,
    model::{db::Election, mongodb::Id},
    scheduled_task::ScheduledTask,
    store::{Store, StoreResult},
};

use super::{reconcile, LookupError};

/// Map from election IDs to their latest reconciliation task. Successful
/// tasks stay, finished, so rescans can tell the election is sealed.
type TaskMap = HashMap<Id, ScheduledTask<Result<(), LookupError>>>;

/// Reconciliation tasks, one per published election, due when its voting
/// window closes so that final results are read from verified counters.
///
/// Elections are published and edited by another service, so the store is
/// rescanned periodically once [`ReconcileScheduler::start_rescans`] is called.
#[derive(Clone)]
pub struct ReconcileScheduler {
    store: Store,
    tasks: Arc<Mutex<TaskMap>>,
    rescan: Arc<Mutex<Option<ScheduledTask<()>>>>,
    retry_after: Duration,
}

impl ReconcileScheduler {
    pub fn new(store: Store, retry_after: Duration) -> Self {
        Self {
            store,
            tasks: Default::default(),
            rescan: Default::default(),
            retry_after,
        }
    }

    /// Does the given election have a reconciliation pending?
    pub async fn is_pending(&self, election_id: Id) -> bool {
        self.tasks
            .lock()
            .await
            .get(&election_id)
            .map_or(false, |task| !task.is_finished())
    }

    /// Schedule a reconciliation for every published election that lacks
    /// one, or whose latest one was due before the window now closes.
    pub async fn schedule_elections(&self) -> StoreResult<()> {
        for election in self.store.published_elections().await? {
            let due = self
                .tasks
                .lock()
                .await
                .get(&election.id)
                .map(ScheduledTask::run_at);
            match due {
                Some(run_at) if run_at >= election.end_time => {}
                Some(run_at) => {
                    debug!(
                        "Window of election {} moved from {run_at} to {}; rescheduling",
                        election.id, election.end_time
                    );
                    self.schedule_election(&election).await;
                }
                None => self.schedule_election(&election).await,
            }
        }
        Ok(())
    }

    /// Rerun [`ReconcileScheduler::schedule_elections`] every `every`,
    /// replacing any earlier rescans.
    pub async fn start_rescans(&self, every: Duration) {
        let task = ScheduledTask::new(self.clone().rescan(every), Utc::now() + every);
        let previous = self.rescan.lock().await.replace(task);
        if let Some(previous) = previous {
            previous.cancel().await;
        }
    }

    /// One rescan, which schedules the next. Recursive, hence boxed.
    fn rescan(self, every: Duration) -> BoxFuture<'static, ()> {
        async move {
            trace!("Rescanning for elections to reconcile");
            if let Err(e) = self.schedule_elections().await {
                error!("Failed to rescan for elections to reconcile: {e}");
            }
            let next = ScheduledTask::new(self.clone().rescan(every), Utc::now() + every);
            *self.rescan.lock().await = Some(next);
        }
        .boxed()
    }

    /// Cancel the rescans and every pending reconciliation.
    pub async fn cancel_all(&self) {
        // A rescan finishing right now may already have queued the next one.
        loop {
            let rescan = self.rescan.lock().await.take();
            match rescan {
                Some(rescan) => {
                    rescan.cancel().await;
                }
                None => break,
            }
        }
        let pending: Vec<_> = self.tasks.lock().await.drain().collect();
        for (election_id, task) in pending {
            if !task.cancel().await {
                debug!("Cancelled pending reconciliation for election {election_id}");
            }
        }
    }

    /// Schedule a reconciliation at the end of the given election's window.
    /// An existing one is rescheduled.
    pub async fn schedule_election(&self, election: &Election) {
        let work = Self::task(
            election.id,
            self.store.clone(),
            self.tasks.clone(),
            self.retry_after,
        );
        let mut tasks_locked = self.tasks.lock().await;
        if let Some(task) = tasks_locked.remove(&election.id) {
            if task.cancel().await {
                trace!("Replaced a reconciliation for {} that had already run", election.id);
            }
        }
        tasks_locked.insert(election.id, ScheduledTask::new(work, election.end_time));
    }

    /// Reconcile the election, retrying later on failure.
    /// Recursive, hence boxed.
    fn task(
        election_id: Id,
        store: Store,
        tasks: Arc<Mutex<TaskMap>>,
        retry_after: Duration,
    ) -> BoxFuture<'static, Result<(), LookupError>> {
        async move {
            debug!("Running end-of-window reconciliation for election {election_id}");
            let result = reconcile(store.as_ref(), election_id).await.map(|_| ());
            match result {
                Ok(()) => {
                    trace!("Reconciliation of election {election_id} completed");
                }
                Err(LookupError::ElectionNotFound(_)) => {
                    tasks.lock().await.remove(&election_id);
                    warn!("Election {election_id} disappeared before it could be reconciled");
                }
                Err(ref e) => {
                    error!("Reconciliation for election {election_id} failed: {e}");
                    let retry = Self::task(election_id, store, tasks.clone(), retry_after);
                    let retry_time = Utc::now() + retry_after;
                    tasks
                        .lock()
                        .await
                        .insert(election_id, ScheduledTask::new(retry, retry_time));
                    warn!(
                        "Failed reconciliation will be retried in {} seconds",
                        retry_after.num_seconds()
                    );
                }
            }
            result
        }
        .boxed()
    }
}

/// Schedules reconciliations for all published elections during ignition,
/// starts the periodic rescans, and places a [`ReconcileScheduler`] into
/// managed state. On shutdown, cancels everything it scheduled.
/// Must be attached after the fairings that manage [`Store`] and [`Config`].
pub struct ReconcileSchedulerFairing;

#[rocket::async_trait]
impl Fairing for ReconcileSchedulerFairing {
    fn info(&self) -> Info {
        Info {
            name: "Reconcile Scheduler",
            kind: Kind::Ignite | Kind::Shutdown,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        info!("Scheduling end-of-window reconciliations...");
        let (store, config) = match (rocket.state::<Store>(), rocket.state::<Config>()) {
            (Some(store), Some(config)) => (store.clone(), config),
            _ => {
                error!("Store and config must be available before scheduling reconciliations");
                return Err(rocket);
            }
        };
        let scheduler = ReconcileScheduler::new(store, config.reconcile_retry());

        // Schedule what is already published.
        if let Err(e) = scheduler.schedule_elections().await {
            error!("Failed to schedule reconciliations: {e}");
            return Err(rocket);
        }

        // Pick up whatever gets published later.
        scheduler.start_rescans(config.reconcile_rescan()).await;
        info!("...reconciliations scheduled!");

        Ok(rocket.manage(scheduler))
    }

    async fn on_shutdown(&self, rocket: &Rocket<Orbit>) {
        if let Some(scheduler) = rocket.state::<ReconcileScheduler>() {
            info!("Cancelling scheduled reconciliations");
            scheduler.cancel_all().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use rocket::tokio::time::{sleep, Duration as StdDuration};

    use super::*;
    use crate::ledger::fixtures::Scenario;
    use crate::store::{EntityStore, MemoryStore};

    async fn wait_until_done(scheduler: &ReconcileScheduler, election_id: Id) {
        for _ in 0..100 {
            if !scheduler.is_pending(election_id).await {
                return;
            }
            sleep(StdDuration::from_millis(10)).await;
        }
        panic!("reconciliation for {election_id} never completed");
    }

    #[backend_test]
    async fn closed_elections_are_reconciled_immediately(store: MemoryStore) {
        let mut election = Election::closed_example();
        election.total_votes = 3;
        let s = Scenario::seed_election(&store, election).await;

        let scheduler = ReconcileScheduler::new(Arc::new(store.clone()), Duration::seconds(300));
        scheduler.schedule_elections().await.unwrap();
        wait_until_done(&scheduler, s.election.id).await;

        let election = store.election(s.election.id).await.unwrap().unwrap();
        assert_eq!(election.total_votes, 0);
    }

    #[backend_test]
    async fn open_elections_wait_for_their_end_time(store: MemoryStore) {
        let s = Scenario::seed(&store).await;
        let scheduler = ReconcileScheduler::new(Arc::new(store.clone()), Duration::seconds(300));
        scheduler.schedule_elections().await.unwrap();

        sleep(StdDuration::from_millis(50)).await;
        assert!(scheduler.is_pending(s.election.id).await);

        // Rescheduling keeps exactly one task.
        scheduler.schedule_election(&s.election).await;
        assert!(scheduler.is_pending(s.election.id).await);
        assert_eq!(scheduler.tasks.lock().await.len(), 1);
    }

    #[backend_test]
    async fn sealed_elections_are_not_reconciled_again(store: MemoryStore) {
        let s = Scenario::seed_election(&store, Election::closed_example()).await;
        let scheduler = ReconcileScheduler::new(Arc::new(store.clone()), Duration::seconds(300));
        scheduler.schedule_elections().await.unwrap();
        wait_until_done(&scheduler, s.election.id).await;

        // Drift introduced after sealing is left for an explicit reconcile.
        let mut election = store.election(s.election.id).await.unwrap().unwrap();
        election.total_votes = 9;
        store.insert_election(election).await;

        scheduler.schedule_elections().await.unwrap();
        sleep(StdDuration::from_millis(50)).await;
        assert!(!scheduler.is_pending(s.election.id).await);
        let election = store.election(s.election.id).await.unwrap().unwrap();
        assert_eq!(election.total_votes, 9);
    }

    #[backend_test]
    async fn extended_windows_are_rescheduled(store: MemoryStore) {
        let s = Scenario::seed(&store).await;
        let scheduler = ReconcileScheduler::new(Arc::new(store.clone()), Duration::seconds(300));
        scheduler.schedule_elections().await.unwrap();

        let mut election = s.election.clone();
        election.end_time = election.end_time + Duration::hours(1);
        store.insert_election(election.clone()).await;
        scheduler.schedule_elections().await.unwrap();

        let tasks = scheduler.tasks.lock().await;
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[&election.id].run_at(), election.end_time);
    }

    #[backend_test]
    async fn rescans_pick_up_elections_published_later(store: MemoryStore) {
        let scheduler = ReconcileScheduler::new(Arc::new(store.clone()), Duration::seconds(300));
        scheduler.schedule_elections().await.unwrap();
        scheduler.start_rescans(Duration::milliseconds(20)).await;

        // Published by the admin service after startup.
        let s = Scenario::seed(&store).await;
        let mut scheduled = false;
        for _ in 0..100 {
            if scheduler.is_pending(s.election.id).await {
                scheduled = true;
                break;
            }
            sleep(StdDuration::from_millis(10)).await;
        }
        assert!(scheduled, "rescans never scheduled election {}", s.election.id);

        scheduler.cancel_all().await;
        assert!(!scheduler.is_pending(s.election.id).await);
        assert!(scheduler.rescan.lock().await.is_none());
    }

    #[backend_test]
    async fn unpublished_elections_are_not_scheduled(store: MemoryStore) {
        let s = Scenario::seed_election(&store, Election::draft_example()).await;
        let scheduler = ReconcileScheduler::new(Arc::new(store.clone()), Duration::seconds(300));
        scheduler.schedule_elections().await.unwrap();
        assert!(!scheduler.is_pending(s.election.id).await);
    }
}
