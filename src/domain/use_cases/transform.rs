use uuid::Uuid;
use validator::Validate;

use crate::entities::image::{Image, ImageInsert, ImageStatus};
use crate::entities::job::TransformJob;
use crate::entities::transformation::TransformationSpec;
use crate::errors::AppError;
use crate::queue::Queue;
use crate::repositories::image::ImageRepository;

const ENQUEUE_FAILURE_REASON: &str = "job could not be enqueued";

/// Accepts transformation requests: records the derived image as pending
/// and hands the work to the transform worker.
pub struct TransformHandler<R, Q>
where
    R: ImageRepository,
    Q: Queue<TransformJob>,
{
    pub image_repo: R,
    pub job_queue: Q,
}

impl<R, Q> TransformHandler<R, Q>
where
    R: ImageRepository,
    Q: Queue<TransformJob>,
{
    pub fn new(image_repo: R, job_queue: Q) -> Self {
        TransformHandler { image_repo, job_queue }
    }

    /// Returns the pending record for the output. The row is committed
    /// before the job is published, so the worker never sees a job whose
    /// destination is unknown to the ledger.
    #[tracing::instrument(skip(self, spec))]
    pub async fn dispatch(
        &self,
        image_id: Uuid,
        owner_id: Uuid,
        spec: TransformationSpec,
    ) -> Result<Image, AppError> {
        spec.validate()?;

        let source = self
            .image_repo
            .get_image_by_id_and_owner(&image_id, &owner_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Image not found".to_string()))?;

        let storage_path = format!("{}.{}", Uuid::new_v4(), spec.output_format().extension());
        let insert = ImageInsert::derived_from(&source, storage_path.clone(), storage_path.clone());
        let derived = self.image_repo.create_image(&insert).await?;

        let job = TransformJob::new(source.storage_path.clone(), storage_path, spec);

        if let Err(e) = self.job_queue.push(&job).await {
            tracing::error!(
                image_id = %derived.id,
                job_id = %job.job_id,
                "Failed to enqueue transformation job: {}", e
            );

            if let Err(mark_err) = self
                .image_repo
                .update_status(&derived.id, ImageStatus::Failed, Some(ENQUEUE_FAILURE_REASON.to_string()))
                .await
            {
                tracing::error!(image_id = %derived.id, "Failed to mark image as failed: {}", mark_err);
            }

            return Err(AppError::ServiceUnavailable(
                "Transformation queue is unavailable".to_string(),
            ));
        }

        tracing::info!(
            image_id = %derived.id,
            parent_image_id = %source.id,
            job_id = %job.job_id,
            "Transformation job enqueued"
        );

        Ok(derived)
    }
}
