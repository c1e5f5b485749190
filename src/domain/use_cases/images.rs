use serde::Serialize;
use uuid::Uuid;

use crate::constants::{DEFAULT_PAGE_SIZE, MAX_FILENAME_LEN, MAX_PAGE_SIZE};
use crate::entities::image::{Image, ImageInsert, ImageListQuery, ImageStatus};
use crate::errors::AppError;
use crate::repositories::image::ImageRepository;
use crate::storage::BlobStorage;

#[derive(Debug, Serialize)]
pub struct ImagePage {
    pub items: Vec<Image>,
    pub page: i64,
    pub limit: i64,
    pub total: i64,
}

/// What `GET /images/{id}/content` can answer with.
#[derive(Debug)]
pub enum ImageContent {
    Ready { bytes: Vec<u8>, mime_type: String },
    Pending(Image),
    Failed(Image),
}

pub struct ImageHandler<R, S>
where
    R: ImageRepository,
    S: BlobStorage,
{
    pub image_repo: R,
    pub storage: S,
    max_upload_bytes: usize,
}

impl<R, S> ImageHandler<R, S>
where
    R: ImageRepository,
    S: BlobStorage,
{
    pub fn new(image_repo: R, storage: S, max_upload_bytes: usize) -> Self {
        ImageHandler { image_repo, storage, max_upload_bytes }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    /// Stores an uploaded original. The bytes are sniffed rather than
    /// trusting the client's content type.
    #[tracing::instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn upload(
        &self,
        owner_id: Uuid,
        filename: Option<String>,
        bytes: Vec<u8>,
    ) -> Result<Image, AppError> {
        if bytes.is_empty() {
            return Err(AppError::invalid_field("file", "File is empty."));
        }
        if bytes.len() > self.max_upload_bytes {
            return Err(AppError::PayloadTooLarge(format!(
                "Upload exceeds {} bytes",
                self.max_upload_bytes
            )));
        }

        let kind = infer::get(&bytes)
            .filter(|kind| kind.matcher_type() == infer::MatcherType::Image)
            .ok_or_else(|| AppError::invalid_field("file", "Only images are allowed."))?;

        let storage_path = format!("{}.{}", Uuid::new_v4(), kind.extension());
        let filename = display_name(filename.as_deref()).unwrap_or_else(|| storage_path.clone());

        self.storage.write(&storage_path, &bytes).await?;

        let insert = ImageInsert::original(filename, storage_path, owner_id);
        let image = match self.image_repo.create_image(&insert).await {
            Ok(image) => image,
            Err(e) => {
                if let Err(cleanup) = self.storage.delete(&insert.storage_path).await {
                    tracing::warn!(
                        storage_path = %insert.storage_path,
                        "Failed to remove blob of unrecorded upload: {}", cleanup
                    );
                }
                return Err(e);
            }
        };

        tracing::info!(image_id = %image.id, mime_type = kind.mime_type(), "Image uploaded");
        Ok(image)
    }

    pub async fn get(&self, id: Uuid, owner_id: Uuid) -> Result<Image, AppError> {
        self.image_repo
            .get_image_by_id_and_owner(&id, &owner_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Image not found".to_string()))
    }

    pub async fn list(&self, owner_id: Uuid, query: ImageListQuery) -> Result<ImagePage, AppError> {
        let page = query.page.unwrap_or(1);
        let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE);

        if page < 1 {
            return Err(AppError::invalid_field("page", "Page must be at least 1."));
        }
        if limit < 1 {
            return Err(AppError::invalid_field("limit", "Limit must be at least 1."));
        }

        let limit = limit.min(MAX_PAGE_SIZE);
        let offset = (page - 1).saturating_mul(limit);

        let items = self.image_repo.list_images_for_owner(&owner_id, limit, offset).await?;
        let total = self.image_repo.count_images_for_owner(&owner_id).await?;

        Ok(ImagePage { items, page, limit, total })
    }

    pub async fn content(&self, id: Uuid, owner_id: Uuid) -> Result<ImageContent, AppError> {
        let image = self.get(id, owner_id).await?;

        match image.status {
            ImageStatus::Pending => Ok(ImageContent::Pending(image)),
            ImageStatus::Failed => Ok(ImageContent::Failed(image)),
            ImageStatus::Ready => {
                let bytes = self.storage.read(&image.storage_path).await?;
                let mime_type = infer::get(&bytes)
                    .map(|kind| kind.mime_type().to_string())
                    .unwrap_or_else(|| "application/octet-stream".to_string());
                Ok(ImageContent::Ready { bytes, mime_type })
            }
        }
    }
}

/// Last path segment of a client-supplied name, trimmed and bounded.
fn display_name(raw: Option<&str>) -> Option<String> {
    let name = raw?
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if name.is_empty() || name == "." || name == ".." {
        return None;
    }

    Some(name.chars().take(MAX_FILENAME_LEN).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    use crate::errors::StorageError;
    use crate::repositories::image::MockImageRepository;

    #[derive(Default)]
    struct MapStorage {
        blobs: Mutex<HashMap<String, Vec<u8>>>,
    }

    #[async_trait]
    impl BlobStorage for MapStorage {
        async fn write(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError> {
            self.blobs.lock().insert(path.to_string(), bytes.to_vec());
            Ok(())
        }

        async fn read(&self, path: &str) -> Result<Vec<u8>, StorageError> {
            self.blobs
                .lock()
                .get(path)
                .cloned()
                .ok_or_else(|| StorageError::NotFound(path.to_string()))
        }

        async fn exists(&self, path: &str) -> Result<bool, StorageError> {
            Ok(self.blobs.lock().contains_key(path))
        }

        async fn delete(&self, path: &str) -> Result<(), StorageError> {
            self.blobs.lock().remove(path);
            Ok(())
        }
    }

    // Smallest valid PNG signature + IHDR prefix recognised by `infer`.
    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];

    fn row(insert: &ImageInsert) -> Image {
        Image {
            id: Uuid::new_v4(),
            filename: insert.filename.clone(),
            storage_path: insert.storage_path.clone(),
            owner_id: insert.owner_id,
            parent_image_id: insert.parent_image_id,
            status: insert.status,
            failure_reason: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn upload_stores_bytes_and_records_ready_original() {
        let owner = Uuid::new_v4();
        let mut repo = MockImageRepository::new();
        repo.expect_create_image()
            .withf(move |insert| {
                insert.owner_id == owner
                    && insert.parent_image_id.is_none()
                    && insert.status == ImageStatus::Ready
                    && insert.filename == "holiday.png"
                    && insert.storage_path.ends_with(".png")
            })
            .times(1)
            .returning(|insert| Ok(row(insert)));

        let handler = ImageHandler::new(repo, MapStorage::default(), 1024);
        let image = handler
            .upload(owner, Some("C:\\photos\\holiday.png".into()), PNG_MAGIC.to_vec())
            .await
            .unwrap();

        assert_eq!(handler.storage.read(&image.storage_path).await.unwrap(), PNG_MAGIC);
    }

    #[tokio::test]
    async fn failed_insert_removes_stored_blob() {
        let mut repo = MockImageRepository::new();
        repo.expect_create_image()
            .times(1)
            .returning(|_| Err(AppError::InternalError("connection reset".into())));

        let handler = ImageHandler::new(repo, MapStorage::default(), 1024);
        let err = handler
            .upload(Uuid::new_v4(), Some("photo.png".into()), PNG_MAGIC.to_vec())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::InternalError(_)));
        assert!(handler.storage.blobs.lock().is_empty());
    }

    #[tokio::test]
    async fn non_image_upload_is_rejected() {
        let mut repo = MockImageRepository::new();
        repo.expect_create_image().times(0);

        let handler = ImageHandler::new(repo, MapStorage::default(), 1024);
        let err = handler
            .upload(Uuid::new_v4(), None, b"%PDF-1.7 not an image".to_vec())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::ValidationError(_)));
        assert!(handler.storage.blobs.lock().is_empty());
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected() {
        let handler = ImageHandler::new(MockImageRepository::new(), MapStorage::default(), 4);
        let err = handler.upload(Uuid::new_v4(), None, PNG_MAGIC.to_vec()).await.unwrap_err();
        assert!(matches!(err, AppError::PayloadTooLarge(_)));
    }

    #[tokio::test]
    async fn list_rejects_zero_page_and_caps_limit() {
        let owner = Uuid::new_v4();
        let mut repo = MockImageRepository::new();
        repo.expect_list_images_for_owner()
            .withf(|_, limit, offset| *limit == MAX_PAGE_SIZE && *offset == MAX_PAGE_SIZE)
            .times(1)
            .returning(|_, _, _| Ok(vec![]));
        repo.expect_count_images_for_owner().returning(|_| Ok(0));

        let handler = ImageHandler::new(repo, MapStorage::default(), 1024);

        let err = handler
            .list(owner, ImageListQuery { page: Some(0), limit: None })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));

        let page = handler
            .list(owner, ImageListQuery { page: Some(2), limit: Some(500) })
            .await
            .unwrap();
        assert_eq!(page.limit, MAX_PAGE_SIZE);
    }

    #[tokio::test]
    async fn content_reports_pending_without_reading_storage() {
        let owner = Uuid::new_v4();
        let mut repo = MockImageRepository::new();
        repo.expect_get_image_by_id_and_owner().returning(move |id, owner_id| {
            let mut image = row(&ImageInsert::original("x.png".into(), "missing.png".into(), *owner_id));
            image.id = *id;
            image.status = ImageStatus::Pending;
            Ok(Some(image))
        });

        let handler = ImageHandler::new(repo, MapStorage::default(), 1024);
        let content = handler.content(Uuid::new_v4(), owner).await.unwrap();

        assert!(matches!(content, ImageContent::Pending(_)));
    }

    #[test]
    fn display_name_strips_directories() {
        assert_eq!(display_name(Some("../../etc/passwd")), Some("passwd".into()));
        assert_eq!(display_name(Some("  cat.jpg ")), Some("cat.jpg".into()));
        assert_eq!(display_name(Some("dir/")), None);
        assert_eq!(display_name(None), None);
    }
}
