use crate::{
    auth::AuthUser,
    config::Config,
    errors::{ApiError, BlobError},
    files::{FileService, NewUpload},
    pagination::{PageLimits, PageRequest},
    storage::blob::limit_stream,
};
use actix_multipart::Multipart;
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{HttpResponse, web};
use futures_util::TryStreamExt as _;
use serde::Deserialize;
use uuid::Uuid;

const DEFAULT_FILENAME: &str = "upload.bin";
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Deserialize)]
pub struct UploadQuery {
    pub collection_id: Option<String>,
}

pub async fn upload_file(
    cfg: web::Data<Config>,
    files: web::Data<FileService>,
    user: AuthUser,
    q: web::Query<UploadQuery>,
    mut payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let collection_id = match q.collection_id.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(
            Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest("invalid collection_id".into()))?,
        ),
    };

    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|_| ApiError::BadRequest("invalid multipart".into()))?
    {
        if field.name() != Some("file") {
            while field
                .try_next()
                .await
                .map_err(|_| ApiError::BadRequest("invalid multipart".into()))?
                .is_some()
            {}
            continue;
        }
        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename().map(|s| s.to_string()))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_FILENAME.into());
        let content_type = field
            .content_type()
            .map(|m| m.to_string())
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.into());
        let body = field.map_err(|e| BlobError::Stream(e.to_string()));

        let file = files
            .create(
                &user.user_id,
                NewUpload {
                    filename,
                    content_type,
                    collection_id,
                    body: limit_stream(Box::pin(body), cfg.max_upload_size),
                },
            )
            .await?;
        return Ok(HttpResponse::Created().json(file));
    }
    Err(ApiError::BadRequest("no file part".into()))
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub page: Option<String>,
    pub page_size: Option<String>,
}

pub async fn list_files(
    cfg: web::Data<Config>,
    files: web::Data<FileService>,
    user: AuthUser,
    q: web::Query<ListQuery>,
) -> Result<HttpResponse, ApiError> {
    let req = PageRequest::parse(
        q.page.as_deref(),
        q.page_size.as_deref(),
        &PageLimits::from(cfg.get_ref()),
    )?;
    let page = files.list(&user.user_id, req).await?;
    Ok(HttpResponse::Ok().json(page))
}

/// Unparseable ids are reported the same way as unknown ones.
fn file_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound)
}

pub async fn download_file(
    files: web::Data<FileService>,
    user: AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = file_id(&path.into_inner())?;
    let (file, data) = files.open(&user.user_id, id).await?;
    Ok(HttpResponse::Ok()
        .content_type(file.content_type.as_str())
        .insert_header(ContentDisposition {
            disposition: DispositionType::Inline,
            parameters: vec![DispositionParam::Filename(file.display_name.clone())],
        })
        .body(data))
}

pub async fn delete_file(
    files: web::Data<FileService>,
    user: AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = file_id(&path.into_inner())?;
    files.delete(&user.user_id, id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "File deleted successfully" })))
}
