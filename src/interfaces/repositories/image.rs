use async_trait::async_trait;
use uuid::Uuid;
use std::borrow::Cow;

use crate::{
    entities::image::{Image, ImageInsert, ImageStatus},
    errors::AppError,
    repositories::sqlx_repo::SqlxImageRepo,
};

const IMAGE_COLUMNS: &str =
    "id, filename, storage_path, owner_id, parent_image_id, status, failure_reason, created_at";

/// Ledger of every stored image, original or derived.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageRepository: Send + Sync {
    async fn check_connection(&self) -> Result<(), AppError>;

    async fn create_image(&self, image: &ImageInsert) -> Result<Image, AppError>;

    /// `None` both when the row is missing and when it belongs to someone else.
    async fn get_image_by_id_and_owner(&self, id: &Uuid, owner_id: &Uuid) -> Result<Option<Image>, AppError>;

    /// Newest first.
    async fn list_images_for_owner(&self, owner_id: &Uuid, limit: i64, offset: i64) -> Result<Vec<Image>, AppError>;

    async fn count_images_for_owner(&self, owner_id: &Uuid) -> Result<i64, AppError>;

    async fn update_status(&self, id: &Uuid, status: ImageStatus, failure_reason: Option<String>) -> Result<(), AppError>;

    /// Settles a pending row by storage path. Returns the number of rows
    /// changed; rows that already left `pending` are not touched.
    async fn record_outcome(&self, storage_path: &str, status: ImageStatus, failure_reason: Option<String>) -> Result<u64, AppError>;
}

impl SqlxImageRepo {
    pub fn new(pool: sqlx::PgPool) -> Self {
        SqlxImageRepo { pool }
    }
}

#[async_trait]
impl ImageRepository for SqlxImageRepo {
    async fn check_connection(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(AppError::from)
    }

    async fn create_image(&self, image: &ImageInsert) -> Result<Image, AppError> {
        let sql = format!(
            r#"INSERT INTO images (filename, storage_path, owner_id, parent_image_id, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}"#,
            IMAGE_COLUMNS
        );

        sqlx::query_as::<_, Image>(&sql)
            .bind(&image.filename)
            .bind(&image.storage_path)
            .bind(image.owner_id)
            .bind(image.parent_image_id)
            .bind(image.status)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                match e {
                    sqlx::Error::Database(db_err) if db_err.code() == Some(Cow::Borrowed("23505")) => {
                        AppError::Conflict("Storage path already in use".to_string())
                    }
                    sqlx::Error::Database(db_err) if db_err.code() == Some(Cow::Borrowed("23503")) => {
                        AppError::Conflict("Parent image does not belong to the owner".to_string())
                    }
                    _ => AppError::from(e),
                }
            })
    }

    async fn get_image_by_id_and_owner(&self, id: &Uuid, owner_id: &Uuid) -> Result<Option<Image>, AppError> {
        let sql = format!("SELECT {} FROM images WHERE id = $1 AND owner_id = $2", IMAGE_COLUMNS);

        sqlx::query_as::<_, Image>(&sql)
            .bind(id)
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)
    }

    async fn list_images_for_owner(&self, owner_id: &Uuid, limit: i64, offset: i64) -> Result<Vec<Image>, AppError> {
        let sql = format!(
            r#"SELECT {} FROM images
            WHERE owner_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3"#,
            IMAGE_COLUMNS
        );

        sqlx::query_as::<_, Image>(&sql)
            .bind(owner_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::from)
    }

    async fn count_images_for_owner(&self, owner_id: &Uuid) -> Result<i64, AppError> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM images WHERE owner_id = $1")
            .bind(owner_id)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::from)
    }

    async fn update_status(&self, id: &Uuid, status: ImageStatus, failure_reason: Option<String>) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"UPDATE images
            SET status = $2, failure_reason = $3, updated_at = NOW()
            WHERE id = $1"#,
        )
        .bind(id)
        .bind(status)
        .bind(failure_reason)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Image not found".to_string()));
        }
        Ok(())
    }

    async fn record_outcome(&self, storage_path: &str, status: ImageStatus, failure_reason: Option<String>) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"UPDATE images
            SET status = $2, failure_reason = $3, updated_at = NOW()
            WHERE storage_path = $1 AND status = 'pending'"#,
        )
        .bind(storage_path)
        .bind(status)
        .bind(failure_reason)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
