use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use chrono::{DateTime, Utc};
use rocket::tokio::{
    self,
    sync::Notify,
    task::{JoinError, JoinHandle},
    time::Duration,
};

/// A future that runs once, at a given instant, on the Rocket runtime.
///
/// Dropping a `ScheduledTask` does not stop it; use [`ScheduledTask::cancel`].
pub struct ScheduledTask<T> {
    run_at: DateTime<Utc>,
    task: JoinHandle<T>,
    timer: JoinHandle<()>,
}

impl<T> ScheduledTask<T>
where
    T: Send + 'static,
{
    /// Spawn `work` to run at `run_at`, or immediately if that is already past.
    pub fn new<Fut>(work: Fut, run_at: DateTime<Utc>) -> Self
    where
        Fut: Future<Output = T> + Send + 'static,
    {
        let go = Arc::new(Notify::new());

        let task_go = go.clone();
        let task = tokio::spawn(async move {
            task_go.notified().await;
            work.await
        });

        // `notify_one` stores a permit, so the task starts even if the
        // timer fires before it first polls `notified()`.
        let delay = delay_until(run_at);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            go.notify_one();
        });

        Self { run_at, task, timer }
    }

    /// When the task is (or was) due to run.
    pub fn run_at(&self) -> DateTime<Utc> {
        self.run_at
    }

    /// Has the work completed (or been aborted)?
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the task. Returns true iff the work had already run to completion.
    pub async fn cancel(self) -> bool {
        self.timer.abort();
        self.task.abort();
        self.task.await.is_ok()
    }
}

/// Await the output of the work.
impl<T> Future for ScheduledTask<T> {
    type Output = Result<T, JoinError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.task).poll(cx)
    }
}

/// Time from now until `instant`, saturating at zero.
fn delay_until(instant: DateTime<Utc>) -> Duration {
    (instant - Utc::now()).to_std().unwrap_or(Duration::ZERO)
}
