use crate::{
    auth::auth::AuthUser,
    error::AppError,
    storage::{ContentBucket, StoredObject},
};
use actix_web::{HttpRequest, HttpResponse, Responder, http::header, web};
use tracing::info;

/// Upload a document or photo
#[utoipa::path(
    post,
    path = "/api/storage/{folder}",
    params(("folder" = String, Path, description = "Bucket folder, e.g. photos or documents")),
    request_body(content = Vec<u8>, description = "Raw file bytes", content_type = "application/octet-stream"),
    responses(
        (status = 201, description = "Stored", body = StoredObject),
        (status = 400, description = "Empty, oversized or unsupported upload")
    ),
    security(("bearer_auth" = [])),
    tag = "Storage"
)]
pub async fn upload(
    auth: AuthUser,
    bucket: web::Data<ContentBucket>,
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Bytes,
) -> actix_web::Result<impl Responder> {
    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::validation("Content-Type header is required"))?;

    let stored: StoredObject = bucket.put(&path, content_type, &body).await?;
    info!(profile_id = auth.profile_id, path = %stored.path, "Upload stored");
    Ok(HttpResponse::Created().json(stored))
}

/// Public read of a stored object.
#[utoipa::path(
    get,
    path = "/files/{folder}/{file}",
    params(
        ("folder" = String, Path, description = "Bucket folder"),
        ("file" = String, Path, description = "Stored file name")
    ),
    responses(
        (status = 200, description = "File bytes"),
        (status = 404, description = "No such file")
    ),
    tag = "Storage"
)]
pub async fn download(
    bucket: web::Data<ContentBucket>,
    path: web::Path<(String, String)>,
) -> actix_web::Result<impl Responder> {
    let (folder, file) = path.into_inner();
    let bytes = bucket.get(&folder, &file).await?;
    Ok(HttpResponse::Ok()
        .content_type(ContentBucket::content_type_for(&file))
        .body(bytes))
}
