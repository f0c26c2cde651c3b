use actix_web::{web, HttpResponse};
use futures::future::try_join_all;
use tracing::info;

use crate::error::{ApiError, AppResult};
use crate::handlers::protocol::{
    ComposeRequest, ImageResponse, ImagesResponse, LabelRequest, PromptRequest, VariationRequest,
};
use crate::handlers::finish;
use crate::llm::media::ImageBlob;
use crate::state::AppState;
use crate::utils::timing::start_request_timer;

/// Number of candidates returned by the batch endpoints.
pub const BATCH_SIZE: usize = 3;

fn data_uris(images: Vec<ImageBlob>) -> Vec<String> {
    images.iter().map(ImageBlob::to_data_uri).collect()
}

pub async fn generate_one_image(
    state: web::Data<AppState>,
    body: web::Json<PromptRequest>,
) -> Result<HttpResponse, ApiError> {
    let mut timer = start_request_timer("generate-one-image", body.prompt.clone());
    let result: AppResult<ImageBlob> = async {
        let prompt = body.prompt()?;
        state.pipeline.generator().generate_from_text(prompt).await
    }
    .await;

    let image = finish(&mut timer, "Failed to generate image", result)?;
    Ok(HttpResponse::Ok().json(ImageResponse {
        image: image.to_data_uri(),
    }))
}

pub async fn generate_three_images(
    state: web::Data<AppState>,
    body: web::Json<PromptRequest>,
) -> Result<HttpResponse, ApiError> {
    let mut timer = start_request_timer("generate-three-images", body.prompt.clone());
    let result: AppResult<Vec<ImageBlob>> = async {
        let prompt = body.prompt()?;
        let generator = state.pipeline.generator();
        let calls = (0..BATCH_SIZE).map(|_| generator.generate_from_text(prompt));
        try_join_all(calls).await
    }
    .await;

    let images = finish(&mut timer, "Failed to generate images", result)?;
    info!("Generated {} images from text prompt", images.len());
    Ok(HttpResponse::Ok().json(ImagesResponse {
        images: data_uris(images),
    }))
}

pub async fn generate_one_image_from_image(
    state: web::Data<AppState>,
    body: web::Json<ComposeRequest>,
) -> Result<HttpResponse, ApiError> {
    let mut request = body.into_inner();
    let mut timer = start_request_timer("generate-one-image-from-image", request.prompt.clone());
    let result: AppResult<ImageBlob> = async {
        let sources = request.take_image_sources()?;
        let images = sources
            .iter()
            .map(|source| ImageBlob::from_data_uri(source))
            .collect::<AppResult<Vec<_>>>()?;
        state
            .pipeline
            .compose_from_images(
                images,
                request.prompt.as_deref(),
                request.character_names.take(),
            )
            .await
    }
    .await;

    let image = finish(&mut timer, "Failed to generate image from base image", result)?;
    Ok(HttpResponse::Ok().json(ImageResponse {
        image: image.to_data_uri(),
    }))
}

pub async fn generate_more_images(
    state: web::Data<AppState>,
    body: web::Json<VariationRequest>,
) -> Result<HttpResponse, ApiError> {
    let mut timer = start_request_timer("generate-more-images", body.prompt.clone());
    let result: AppResult<Vec<ImageBlob>> = async {
        let image = ImageBlob::from_data_uri(body.base_image()?)?;
        state
            .pipeline
            .variations(image, body.prompt.as_deref(), BATCH_SIZE)
            .await
    }
    .await;

    let images = finish(&mut timer, "Failed to generate more images", result)?;
    Ok(HttpResponse::Ok().json(ImagesResponse {
        images: data_uris(images),
    }))
}

pub async fn process_image_with_name(
    state: web::Data<AppState>,
    body: web::Json<LabelRequest>,
) -> Result<HttpResponse, ApiError> {
    let mut timer = start_request_timer("process-image-with-name", body.character_name.clone());
    let result: AppResult<ImageBlob> = async {
        let (image_data, name) = body.fields()?;
        let image = ImageBlob::from_data_uri(image_data)?;
        state.pipeline.label(image, name.to_string()).await
    }
    .await;

    let image = finish(&mut timer, "Failed to process image", result)
        .map_err(ApiError::with_stack)?;
    Ok(HttpResponse::Ok().json(ImageResponse {
        image: image.to_data_uri(),
    }))
}
