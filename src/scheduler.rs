//! Interval scheduler for named jobs.
//!
//! Every job runs on its own tokio task: sleep for the interval, run the
//! handler, repeat. Handler errors are logged and never end the job. All
//! jobs share one [`CancellationToken`], so a single [`Scheduler::stop`]
//! reaches every one of them.
use anyhow::Result;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    async fn run(&self) -> Result<()>;
}

#[async_trait]
impl<F, Fut> JobHandler for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn run(&self) -> Result<()> {
        (self)().await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Created,
    Running,
    Stopped,
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("job {0:?} is already scheduled")]
    DuplicateJob(String),
    #[error("job {0:?} needs a non-zero interval")]
    ZeroInterval(String),
}

struct ScheduledJob {
    name: String,
    state: watch::Receiver<JobState>,
    task: JoinHandle<()>,
}

pub struct Scheduler {
    cancel: CancellationToken,
    jobs: Vec<ScheduledJob>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            jobs: Vec::new(),
        }
    }

    /// Register `handler` under `name` and start its timer right away.
    /// Must be called from within a tokio runtime.
    pub fn schedule<H: JobHandler>(
        &mut self,
        name: impl Into<String>,
        interval: Duration,
        handler: H,
    ) -> Result<(), SchedulerError> {
        let name = name.into();
        if self.jobs.iter().any(|job| job.name == name) {
            return Err(SchedulerError::DuplicateJob(name));
        }
        if interval.is_zero() {
            return Err(SchedulerError::ZeroInterval(name));
        }

        let (state_tx, state_rx) = watch::channel(JobState::Created);
        let task = tokio::spawn(run_job(
            name.clone(),
            interval,
            handler,
            self.cancel.clone(),
            state_tx,
        ));
        info!(job = %name, interval_ms = interval.as_millis() as u64, "added scheduled job");
        self.jobs.push(ScheduledJob {
            name,
            state: state_rx,
            task,
        });
        Ok(())
    }

    pub fn state(&self, name: &str) -> Option<JobState> {
        self.jobs
            .iter()
            .find(|job| job.name == name)
            .map(|job| *job.state.borrow())
    }

    pub fn job_names(&self) -> impl Iterator<Item = &str> {
        self.jobs.iter().map(|job| job.name.as_str())
    }

    /// Token that stops every job when cancelled, e.g. from a signal handler.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn stop(&self) {
        if !self.cancel.is_cancelled() {
            info!(jobs = self.jobs.len(), "scheduled job dispatcher closing");
        }
        self.cancel.cancel();
    }

    /// Resolves once shutdown has been requested.
    pub async fn wait(&self) {
        self.cancel.cancelled().await;
    }

    /// Wait for every job task to exit. Requests shutdown first, so a run
    /// that is in flight finishes and no new run starts.
    pub async fn join(mut self) {
        self.stop();
        let jobs = std::mem::take(&mut self.jobs);
        let (names, tasks): (Vec<_>, Vec<_>) =
            jobs.into_iter().map(|job| (job.name, job.task)).unzip();
        for (name, res) in names.iter().zip(futures::future::join_all(tasks).await) {
            if let Err(err) = res {
                warn!(job = %name, ?err, "scheduled job task ended abnormally");
            }
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_job<H: JobHandler>(
    name: String,
    interval: Duration,
    handler: H,
    cancel: CancellationToken,
    state: watch::Sender<JobState>,
) {
    state.send_replace(JobState::Running);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {
                info!(job = %name, "executing scheduled job");
                if let Err(err) = handler.run().await {
                    error!(job = %name, ?err, "error while executing scheduled job");
                }
            }
        }
    }
    state.send_replace(JobState::Stopped);
    info!(job = %name, "ending scheduled job");
}
