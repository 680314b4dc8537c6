use actix_web::error::BlockingError;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("malformed upload: {0}")]
    Upload(String),
    #[error("no `file` field in the upload")]
    MissingFile,
    #[error("invalid image file: {0}")]
    Decode(#[from] image::ImageError),
    #[error("inference failed: {0}")]
    Inference(anyhow::Error),
    #[error("model produced no scores")]
    EmptyOutput,
    #[error("model output index {index} has no label ({labels} labels known)")]
    UnknownClass { index: usize, labels: usize },
    #[error("blocking worker pool is unavailable")]
    WorkerGone,
}

impl From<BlockingError> for ApiError {
    fn from(_: BlockingError) -> Self {
        ApiError::WorkerGone
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Upload(_) | ApiError::MissingFile | ApiError::Decode(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Inference(_)
            | ApiError::EmptyOutput
            | ApiError::UnknownClass { .. }
            | ApiError::WorkerGone => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "detail": self.to_string() }))
    }
}
