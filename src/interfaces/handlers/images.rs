use actix_multipart::Multipart;
use actix_web::{get, post, web, HttpResponse};
use futures_util::TryStreamExt;
use uuid::Uuid;

use crate::entities::image::ImageListQuery;
use crate::entities::transformation::TransformationSpec;
use crate::errors::AppError;
use crate::use_cases::extractors::AuthClaims;
use crate::use_cases::images::ImageContent;
use crate::AppState;

const FILE_FIELD: &str = "file";

#[post("")]
pub async fn upload_image(
    state: web::Data<AppState>,
    claims: AuthClaims,
    payload: Multipart,
) -> Result<HttpResponse, AppError> {
    let owner_id = claims.user_id()?;
    let limit = state.image_handler.max_upload_bytes();

    let (filename, bytes) = read_file_field(payload, limit).await?;
    let image = state.image_handler.upload(owner_id, filename, bytes).await?;

    Ok(HttpResponse::Created().json(image))
}

#[get("")]
pub async fn list_images(
    state: web::Data<AppState>,
    claims: AuthClaims,
    query: web::Query<ImageListQuery>,
) -> Result<HttpResponse, AppError> {
    let owner_id = claims.user_id()?;
    let page = state.image_handler.list(owner_id, query.into_inner()).await?;

    Ok(HttpResponse::Ok().json(page))
}

#[get("/{id}")]
pub async fn get_image(
    state: web::Data<AppState>,
    claims: AuthClaims,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let owner_id = claims.user_id()?;
    let image = state.image_handler.get(path.into_inner(), owner_id).await?;

    Ok(HttpResponse::Ok().json(image))
}

#[get("/{id}/content")]
pub async fn get_image_content(
    state: web::Data<AppState>,
    claims: AuthClaims,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let owner_id = claims.user_id()?;

    let response = match state.image_handler.content(path.into_inner(), owner_id).await? {
        ImageContent::Ready { bytes, mime_type } => {
            HttpResponse::Ok().content_type(mime_type).body(bytes)
        }
        ImageContent::Pending(image) => HttpResponse::Accepted().json(image),
        ImageContent::Failed(image) => HttpResponse::Conflict().json(serde_json::json!({
            "error": "Transformation failed",
            "details": image.failure_reason,
            "image": image,
        })),
    };

    Ok(response)
}

#[post("/{id}/transform")]
pub async fn transform_image(
    state: web::Data<AppState>,
    claims: AuthClaims,
    path: web::Path<Uuid>,
    spec: web::Json<TransformationSpec>,
) -> Result<HttpResponse, AppError> {
    let owner_id = claims.user_id()?;
    let derived = state
        .transform_handler
        .dispatch(path.into_inner(), owner_id, spec.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(derived))
}

/// Buffers the `file` part, failing as soon as it grows past `limit`.
async fn read_file_field(
    mut payload: Multipart,
    limit: usize,
) -> Result<(Option<String>, Vec<u8>), AppError> {
    while let Some(mut field) = payload.try_next().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_owned);

        let mut bytes = Vec::new();
        while let Some(chunk) = field.try_next().await? {
            if bytes.len() + chunk.len() > limit {
                return Err(AppError::PayloadTooLarge(format!("Upload exceeds {} bytes", limit)));
            }
            bytes.extend_from_slice(&chunk);
        }

        return Ok((filename, bytes));
    }

    Err(AppError::invalid_field(FILE_FIELD, "Missing file field."))
}
