use actix_web::{HttpResponse, http::StatusCode, ResponseError};
use thiserror::Error;
use serde::Serialize;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("unauthenticated")]
    Unauthenticated,
    /// Absent and not-owned files are deliberately the same error.
    #[error("file not found")]
    NotFound,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("blob storage failure")]
    StorageFailure,
    #[error("metadata store failure")]
    StoreFailure,
    #[error("internal server error")]
    Internal,
}

#[derive(Serialize)]
struct ApiErrBody {
    error: String
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::StorageFailure => StatusCode::BAD_GATEWAY,
            ApiError::StoreFailure => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ApiErrBody { error: self.to_string() })
    }
}

/// Failures reported by a blob store backend.
#[derive(Error, Debug)]
pub enum BlobError {
    #[error("blob io: {0}")]
    Io(#[from] std::io::Error),
    #[error("blob not found: {0}")]
    NotFound(String),
    #[error("upload exceeds {0} bytes")]
    TooLarge(usize),
    #[error("upload stream: {0}")]
    Stream(String),
    #[error("blob backend unavailable: {0}")]
    Unavailable(String),
}

/// Failures reported by the metadata store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database: {0}")]
    Database(#[from] sqlx::Error),
    #[error("malformed row: {0}")]
    Corrupt(String),
}

impl From<BlobError> for ApiError {
    fn from(e: BlobError) -> Self {
        match e {
            BlobError::TooLarge(_) => ApiError::BadRequest("file too large".into()),
            BlobError::Stream(_) => ApiError::BadRequest("upload read error".into()),
            other => {
                log::error!("blob store error: {other:?}");
                ApiError::StorageFailure
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        log::error!("metadata store error: {e:?}");
        ApiError::StoreFailure
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::from(e).into()
    }
}
