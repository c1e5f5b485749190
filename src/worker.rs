//! Transform worker: consumes jobs, runs the codec, writes outputs and
//! reports outcomes. It never touches the image ledger.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info, instrument, warn};
use validator::Validate;

use crate::codec;
use crate::entities::job::{JobOutcome, TransformJob};
use crate::errors::{QueueError, TransformError, WorkerError};
use crate::queue::Queue;
use crate::storage::BlobStorage;

const QUEUE_ERROR_BACKOFF: Duration = Duration::from_secs(1);
const MAX_PUBLISH_BACKOFF: Duration = Duration::from_secs(30);

pub struct TransformWorker<S, J, O> {
    storage: Arc<S>,
    jobs: Arc<J>,
    outcomes: Arc<O>,
    concurrency: usize,
    job_timeout: Duration,
}

impl<S, J, O> Clone for TransformWorker<S, J, O> {
    fn clone(&self) -> Self {
        TransformWorker {
            storage: Arc::clone(&self.storage),
            jobs: Arc::clone(&self.jobs),
            outcomes: Arc::clone(&self.outcomes),
            concurrency: self.concurrency,
            job_timeout: self.job_timeout,
        }
    }
}

impl<S, J, O> TransformWorker<S, J, O>
where
    S: BlobStorage + 'static,
    J: Queue<TransformJob> + 'static,
    O: Queue<JobOutcome> + 'static,
{
    pub fn new(storage: S, jobs: J, outcomes: O, concurrency: usize, job_timeout: Duration) -> Self {
        TransformWorker {
            storage: Arc::new(storage),
            jobs: Arc::new(jobs),
            outcomes: Arc::new(outcomes),
            concurrency: concurrency.max(1),
            job_timeout,
        }
    }

    /// Runs `concurrency` consumer loops until `shutdown` flips to `true`.
    /// A loop finishes its current job before stopping.
    pub async fn run(self, shutdown: watch::Receiver<bool>) {
        let mut consumers = JoinSet::new();

        for slot in 0..self.concurrency {
            let worker = self.clone();
            let shutdown = shutdown.clone();
            consumers.spawn(async move { worker.consume(slot, shutdown).await });
        }

        info!(concurrency = self.concurrency, "Transform worker started");

        while let Some(result) = consumers.join_next().await {
            if let Err(e) = result {
                error!("Consumer loop terminated abnormally: {}", e);
            }
        }

        info!("Transform worker stopped");
    }

    async fn consume(&self, slot: usize, shutdown: watch::Receiver<bool>) {
        loop {
            let stopping = *shutdown.borrow();
            if stopping {
                break;
            }

            match self.jobs.pop().await {
                Ok(Some(job)) => {
                    self.handle(job).await;
                }
                Ok(None) => {}
                Err(QueueError::Malformed(e)) => {
                    warn!(slot, "Dropping malformed job message: {}", e);
                }
                Err(e) => {
                    error!(slot, "Job queue unavailable: {}", e);
                    tokio::time::sleep(QUEUE_ERROR_BACKOFF).await;
                }
            }
        }
    }

    /// Processes one job and publishes its outcome.
    pub async fn handle(&self, job: TransformJob) -> JobOutcome {
        let outcome = match self.process_job(&job).await {
            Ok(()) => {
                info!(job_id = %job.job_id, destination = %job.destination_path, "Transformation completed");
                JobOutcome::Completed {
                    job_id: job.job_id,
                    destination_path: job.destination_path.clone(),
                }
            }
            Err(e) => {
                error!(job_id = %job.job_id, destination = %job.destination_path, "Transformation failed: {}", e);
                JobOutcome::Failed {
                    job_id: job.job_id,
                    destination_path: job.destination_path.clone(),
                    reason: e.to_string(),
                }
            }
        };

        self.publish(&outcome).await;
        outcome
    }

    /// Pushes `outcome` until the queue accepts it. The output is already
    /// written, so a lost outcome would leave its image pending.
    async fn publish(&self, outcome: &JobOutcome) {
        let mut delay = QUEUE_ERROR_BACKOFF;

        loop {
            match self.outcomes.push(outcome).await {
                Ok(()) => return,
                Err(e @ QueueError::Serialization(_)) => {
                    error!(job_id = %outcome.job_id(), "Job outcome cannot be published: {}", e);
                    return;
                }
                Err(e) => {
                    warn!(job_id = %outcome.job_id(), "Failed to publish job outcome, retrying in {:?}: {}", delay, e);
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(MAX_PUBLISH_BACKOFF);
                }
            }
        }
    }

    /// Read → transform → write. Nothing is written unless the codec succeeds
    /// within the time budget.
    #[instrument(skip(self, job), fields(job_id = %job.job_id, destination = %job.destination_path))]
    pub async fn process_job(&self, job: &TransformJob) -> Result<(), WorkerError> {
        job.spec
            .validate()
            .map_err(|e| TransformError::new(format!("invalid transformation: {}", e)))?;

        let source = self.storage.read(&job.source_path).await?;
        let spec = job.spec.clone();

        let task = tokio::task::spawn_blocking(move || codec::apply(&source, &spec));
        let encoded = match tokio::time::timeout(self.job_timeout, task).await {
            Err(_) => return Err(WorkerError::TimedOut(self.job_timeout.as_secs())),
            Ok(Err(join_err)) => return Err(WorkerError::Aborted(join_err.to_string())),
            Ok(Ok(result)) => result?,
        };

        self.storage.write(&job.destination_path, &encoded).await?;
        Ok(())
    }
}
