use actix_multipart::Multipart;
use actix_web::{web, HttpResponse, Result};
use futures_util::StreamExt;
use log::{error, info, warn};

use crate::error::ApiError;
use crate::inference::Predictor;
use crate::models::{HealthResponse, PredictionResponse};

const UPLOAD_FIELD: &str = "file";

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(health)))
        .service(web::resource("/predict").route(web::post().to(predict)));
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse::default())
}

pub async fn predict(
    predictor: web::Data<Predictor>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let image = read_upload(payload).await?;

    let result = web::block(move || predictor.predict(&image)).await?;
    let prediction = result.map_err(|e| {
        error!("Prediction failed: {}", e);
        e
    })?;

    info!(
        "Predicted class: {} (index {}, confidence {})",
        prediction.label, prediction.index, prediction.confidence
    );
    Ok(HttpResponse::Ok().json(PredictionResponse::from(prediction)))
}

/// Reads the `file` part of the form fully into memory, draining any others.
async fn read_upload(mut payload: Multipart) -> Result<Vec<u8>, ApiError> {
    let mut image = None;

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| {
            warn!("Failed to read multipart field: {}", e);
            ApiError::Upload(e.to_string())
        })?;
        let is_upload = field.content_disposition().get_name() == Some(UPLOAD_FIELD);

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| ApiError::Upload(e.to_string()))?;
            if is_upload {
                data.extend_from_slice(&chunk);
            }
        }

        if is_upload && image.is_none() {
            image = Some(data);
        }
    }

    image.ok_or(ApiError::MissingFile)
}
