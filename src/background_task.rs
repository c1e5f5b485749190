use tokio::time::Duration;

use crate::entities::image::ImageStatus;
use crate::entities::job::JobOutcome;
use crate::errors::{AppError, QueueError};
use crate::queue::Queue;
use crate::repositories::image::ImageRepository;

const RETRY_DELAY: Duration = Duration::from_secs(2);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Settles pending images from worker reports. Runs for the lifetime of the
/// API process.
pub async fn start_outcome_listener<R, Q>(repo: R, outcomes: Q)
where
    R: ImageRepository,
    Q: Queue<JobOutcome>,
{
    run_listener(&repo, &outcomes, RETRY_DELAY).await
}

async fn run_listener<R, Q>(repo: &R, outcomes: &Q, retry_delay: Duration)
where
    R: ImageRepository,
    Q: Queue<JobOutcome>,
{
    tracing::info!("Outcome listener started");

    loop {
        match outcomes.pop().await {
            Ok(Some(outcome)) => settle(repo, &outcome, retry_delay).await,
            Ok(None) => {}
            Err(QueueError::Malformed(e)) => {
                tracing::warn!("Dropping malformed outcome message: {}", e);
            }
            Err(e) => {
                tracing::error!("Outcome queue unavailable: {}", e);
                tokio::time::sleep(retry_delay).await;
            }
        }
    }
}

/// Applies `outcome` until the ledger accepts it. The message has already
/// left the queue, so giving up would leave its image pending forever.
async fn settle<R>(repo: &R, outcome: &JobOutcome, retry_delay: Duration)
where
    R: ImageRepository + ?Sized,
{
    let mut delay = retry_delay;
    let mut attempt: u32 = 1;

    while let Err(e) = apply_outcome(repo, outcome).await {
        tracing::error!(
            job_id = %outcome.job_id(),
            destination = outcome.destination_path(),
            attempt,
            "Failed to record job outcome, retrying in {:?}: {}", delay, e
        );
        tokio::time::sleep(delay).await;
        delay = (delay * 2).min(MAX_RETRY_DELAY);
        attempt += 1;
    }
}

/// Returns the number of rows moved out of `pending`.
pub async fn apply_outcome<R>(repo: &R, outcome: &JobOutcome) -> Result<u64, AppError>
where
    R: ImageRepository + ?Sized,
{
    let (status, reason) = match outcome {
        JobOutcome::Completed { .. } => (ImageStatus::Ready, None),
        JobOutcome::Failed { reason, .. } => (ImageStatus::Failed, Some(reason.clone())),
    };

    let updated = repo
        .record_outcome(outcome.destination_path(), status, reason)
        .await?;

    if updated == 0 {
        tracing::warn!(
            job_id = %outcome.job_id(),
            destination = outcome.destination_path(),
            "No pending image matched job outcome"
        );
    } else {
        tracing::info!(job_id = %outcome.job_id(), status = ?status, "Image status updated");
    }

    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use uuid::Uuid;

    use crate::queue::MemoryQueue;
    use crate::repositories::image::MockImageRepository;

    #[tokio::test]
    async fn completed_outcome_marks_ready() {
        let mut repo = MockImageRepository::new();
        repo.expect_record_outcome()
            .withf(|path, status, reason| {
                path == "out.png" && *status == ImageStatus::Ready && reason.is_none()
            })
            .times(1)
            .returning(|_, _, _| Ok(1));

        let outcome = JobOutcome::Completed { job_id: Uuid::new_v4(), destination_path: "out.png".into() };
        assert_eq!(apply_outcome(&repo, &outcome).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn failed_outcome_carries_reason() {
        let mut repo = MockImageRepository::new();
        repo.expect_record_outcome()
            .withf(|path, status, reason| {
                path == "out.png"
                    && *status == ImageStatus::Failed
                    && reason.as_deref() == Some("transformation failed: bad crop")
            })
            .times(1)
            .returning(|_, _, _| Ok(1));

        let outcome = JobOutcome::Failed {
            job_id: Uuid::new_v4(),
            destination_path: "out.png".into(),
            reason: "transformation failed: bad crop".into(),
        };
        apply_outcome(&repo, &outcome).await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_outcome_is_harmless() {
        let mut repo = MockImageRepository::new();
        repo.expect_record_outcome().returning(|_, _, _| Ok(0));

        let outcome = JobOutcome::Completed { job_id: Uuid::new_v4(), destination_path: "out.png".into() };
        assert_eq!(apply_outcome(&repo, &outcome).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn listener_reapplies_outcome_after_transient_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);

        let mut repo = MockImageRepository::new();
        repo.expect_record_outcome()
            .withf(|path, status, _| path == "out.png" && *status == ImageStatus::Ready)
            .returning(move |_, _, _| {
                if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(AppError::InternalError("connection reset".into()))
                } else {
                    Ok(1)
                }
            });

        let outcomes: Arc<MemoryQueue<JobOutcome>> = Arc::new(MemoryQueue::new(Duration::from_millis(10)));
        outcomes
            .push(&JobOutcome::Completed { job_id: Uuid::new_v4(), destination_path: "out.png".into() })
            .await
            .unwrap();

        let queue = Arc::clone(&outcomes);
        let listener = tokio::spawn(async move {
            run_listener(&repo, &queue, Duration::from_millis(5)).await
        });

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while calls.load(Ordering::SeqCst) < 2 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        listener.abort();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(outcomes.is_empty());
    }
}
