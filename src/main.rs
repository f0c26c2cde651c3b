use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use dotenvy::dotenv;
use tracing::{info, warn};

mod config;
mod db;
mod error;
mod handlers;
mod imaging;
mod llm;
mod pipeline;
mod state;
mod utils;

use config::{log_level_from, Config, CONFIG};
use db::open_store;
use handlers::json_config;
use llm::{GeminiClient, GeminiSettings};
use pipeline::{CompositionPipeline, FramePolicy};
use state::AppState;
use utils::http::get_http_client;
use utils::logging::init_logging;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let _guards = init_logging(&log_level_from(std::env::var("LOG_LEVEL").ok()));
    let config: &Config = &CONFIG;

    info!("Starting character portrait studio");
    if config.gemini_api_key.trim().is_empty() {
        warn!("GEMINI_API_KEY is not set; generation requests will fail until it is configured");
    }

    let store = open_store(config).await?;
    let generator = Arc::new(GeminiClient::new(
        GeminiSettings::from_config(config),
        get_http_client().clone(),
    ));
    let pipeline = CompositionPipeline::new(generator, FramePolicy::from_config(config));
    let state = web::Data::new(AppState::new(pipeline, store));

    info!(
        "Generation model={} compose_frame={} variation_frame={} body_limit_bytes={}",
        config.gemini_image_model,
        config.compose_frame,
        config.variation_frame,
        config.body_limit_bytes
    );

    let body_limit = config.body_limit_bytes;
    let server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .app_data(json_config(body_limit))
            .configure(handlers::configure)
    })
    .bind(config.bind_address.as_str())?;

    info!("Listening on {}", config.bind_address);
    server.run().await?;
    info!("Server stopped");
    Ok(())
}
