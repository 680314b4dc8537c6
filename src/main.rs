mod config;
mod error;
mod handlers;
mod inference;
mod models;
#[cfg(test)]
mod test_support;

use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use log::info;

use config::{Settings, ALLOWED_ORIGINS};
use inference::{OnnxClassifier, Predictor};
use models::CLASS_NAMES;

fn cors_policy() -> Cors {
    ALLOWED_ORIGINS
        .iter()
        .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
        .allow_any_method()
        .allow_any_header()
        .supports_credentials()
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let settings = Settings::from_env().context("invalid configuration")?;

    info!("Loading model from {}", settings.model_path.display());
    let classifier = OnnxClassifier::load(&settings.model_path, CLASS_NAMES.len())
        .with_context(|| format!("failed to load model {}", settings.model_path.display()))?;
    let predictor = web::Data::new(Predictor::new(Box::new(classifier)));
    info!("Model ready with {} classes", predictor.labels().len());

    let (host, port) = settings.bind_address();
    info!("Server running at http://{}:{}", host, port);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(cors_policy())
            .app_data(predictor.clone())
            .configure(handlers::configure)
    })
    .bind((host.as_str(), port))?
    .run()
    .await?;

    Ok(())
}
