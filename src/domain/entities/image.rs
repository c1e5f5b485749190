use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Whether the bytes behind `storage_path` exist yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "image_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ImageStatus {
    Pending,
    Ready,
    Failed,
}

/// An uploaded original or a transformation output. Rows are never mutated
/// apart from `status` / `failure_reason`.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Image {
    pub id: Uuid,
    pub filename: String,
    pub storage_path: String,
    pub owner_id: Uuid,
    pub parent_image_id: Option<Uuid>,
    pub status: ImageStatus,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Image {
    pub fn is_original(&self) -> bool {
        self.parent_image_id.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageInsert {
    pub filename: String,
    pub storage_path: String,
    pub owner_id: Uuid,
    pub parent_image_id: Option<Uuid>,
    pub status: ImageStatus,
}

impl ImageInsert {
    /// A freshly uploaded file whose bytes are already stored.
    pub fn original(filename: String, storage_path: String, owner_id: Uuid) -> Self {
        ImageInsert {
            filename,
            storage_path,
            owner_id,
            parent_image_id: None,
            status: ImageStatus::Ready,
        }
    }

    /// The placeholder for a transformation output derived from `parent`.
    /// Ownership is inherited so the parent/child owner invariant holds by construction.
    pub fn derived_from(parent: &Image, filename: String, storage_path: String) -> Self {
        ImageInsert {
            filename,
            storage_path,
            owner_id: parent.owner_id,
            parent_image_id: Some(parent.id),
            status: ImageStatus::Pending,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ImageListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}
