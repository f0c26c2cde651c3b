pub mod characters;
pub mod generate;
pub mod protocol;

use actix_web::{web, HttpResponse};
use tracing::{error, warn};

use crate::error::{ApiError, AppError, AppResult};
use crate::state::AppState;
use crate::utils::timing::{complete_request_timer, RequestTimer};
use protocol::HealthResponse;

/// Closes the request timer and attaches the endpoint's summary to a failure.
pub(crate) fn finish<T>(
    timer: &mut RequestTimer,
    summary: &'static str,
    result: AppResult<T>,
) -> Result<T, ApiError> {
    complete_request_timer(timer, result).map_err(|err| {
        error!("{}: {}", summary, err);
        ApiError::new(summary, err)
    })
}

/// Body ceiling plus a JSON-envelope answer for unreadable bodies.
pub fn json_config(limit_bytes: usize) -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(limit_bytes)
        .error_handler(|err, req| {
            warn!("Rejected request body for {}: {}", req.path(), err);
            ApiError::new(
                "Invalid request body",
                AppError::validation(format!("Invalid request body: {err}")),
            )
            .into()
        })
}

pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    let store = state.store.backend();
    match state.store.health_check().await {
        Ok(()) => HttpResponse::Ok().json(HealthResponse {
            status: "ok",
            store,
            error: None,
        }),
        Err(err) => {
            warn!("Health check failed for {} store: {}", store, err);
            HttpResponse::ServiceUnavailable().json(HealthResponse {
                status: "unavailable",
                store,
                error: Some(err.to_string()),
            })
        }
    }
}

/// Each path is a resource so unsupported methods answer 405.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/health").route(web::get().to(health)))
        .service(
            web::scope("/api")
                .service(
                    web::resource("/generate-one-image")
                        .route(web::post().to(generate::generate_one_image)),
                )
                .service(
                    web::resource("/generate-three-images")
                        .route(web::post().to(generate::generate_three_images)),
                )
                .service(
                    web::resource("/generate-one-image-from-image")
                        .route(web::post().to(generate::generate_one_image_from_image)),
                )
                .service(
                    web::resource("/generate-more-images")
                        .route(web::post().to(generate::generate_more_images)),
                )
                .service(
                    web::resource("/process-image-with-name")
                        .route(web::post().to(generate::process_image_with_name)),
                )
                .service(
                    web::resource("/characters")
                        .route(web::get().to(characters::list_characters))
                        .route(web::post().to(characters::create_character)),
                )
                .service(
                    web::resource("/characters/{id}")
                        .route(web::delete().to(characters::delete_character)),
                ),
        );
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use serde_json::{json, Value};

    use super::*;
    use crate::config::FrameBox;
    use crate::db::database::Database;
    use crate::imaging::test_support::{dimensions, solid_png};
    use crate::llm::media::ImageBlob;
    use crate::llm::test_support::RecordingGenerator;
    use crate::llm::DEFAULT_VARIATION_PROMPT;
    use crate::pipeline::{CompositionPipeline, FramePolicy};

    const POLICY: FramePolicy = FramePolicy {
        compose_frame: FrameBox::new(384, 384),
        variation_frame: FrameBox::new(800, 1200),
        png_quality: 80,
    };

    const REPLY_URI: &str = "data:image/png;base64,CQ==";

    fn reply() -> ImageBlob {
        ImageBlob::png(vec![9])
    }

    async fn state_with(generator: Arc<RecordingGenerator>) -> AppState {
        let store = Database::init("sqlite::memory:").await.unwrap();
        AppState::new(CompositionPipeline::new(generator, POLICY), Arc::new(store))
    }

    macro_rules! service {
        ($state:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($state))
                    .app_data(json_config(8 * 1024 * 1024))
                    .configure(configure),
            )
            .await
        };
    }

    fn post(uri: &str, body: Value) -> actix_web::test::TestRequest {
        test::TestRequest::post().uri(uri).set_json(body)
    }

    #[actix_web::test]
    async fn one_image_from_text() {
        let generator = Arc::new(RecordingGenerator::new(reply()));
        let app = service!(state_with(generator.clone()).await);

        let resp = test::call_service(
            &app,
            post("/api/generate-one-image", json!({ "prompt": "a red fox" })).to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["image"], REPLY_URI);

        let requests = generator.recorded();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].len(), 1);
    }

    #[actix_web::test]
    async fn missing_prompt_is_rejected_without_generation() {
        let generator = Arc::new(RecordingGenerator::new(reply()));
        let app = service!(state_with(generator.clone()).await);

        let resp = test::call_service(
            &app,
            post("/api/generate-one-image", json!({ "prompt": "" })).to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "Prompt is required");
        assert!(generator.recorded().is_empty());
    }

    #[actix_web::test]
    async fn three_images_from_text() {
        let generator = Arc::new(RecordingGenerator::new(reply()));
        let app = service!(state_with(generator.clone()).await);

        let resp = test::call_service(
            &app,
            post("/api/generate-three-images", json!({ "prompt": "castle" })).to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["images"], json!([REPLY_URI, REPLY_URI, REPLY_URI]));
        assert_eq!(generator.recorded().len(), 3);
    }

    #[actix_web::test]
    async fn one_failed_generation_fails_the_three_image_batch() {
        let generator = Arc::new(RecordingGenerator::failing_on(reply(), 2));
        let app = service!(state_with(generator).await);

        let resp = test::call_service(
            &app,
            post("/api/generate-three-images", json!({ "prompt": "castle" })).to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = test::read_body_json(resp).await;
        assert!(body.get("images").is_none());
        assert_eq!(body["message"], "Failed to generate images");
        assert!(body["error"].as_str().is_some_and(|error| !error.is_empty()));
    }

    #[actix_web::test]
    async fn composes_named_reference_images() {
        let generator = Arc::new(RecordingGenerator::new(reply()));
        let app = service!(state_with(generator.clone()).await);
        let first = solid_png(300, 200, [200, 10, 10, 255]).to_data_uri();
        let second = solid_png(100, 300, [10, 10, 200, 255]).to_data_uri();

        let resp = test::call_service(
            &app,
            post(
                "/api/generate-one-image-from-image",
                json!({
                    "baseImages": [first, second],
                    "prompt": "the two of them at a tavern",
                    "characterNames": ["Aria", "Bram"]
                }),
            )
            .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["image"], REPLY_URI);

        let parts = &generator.recorded()[0];
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].as_text(), Some("the two of them at a tavern"));
        for part in &parts[1..] {
            assert_eq!(dimensions(part.as_image().unwrap()), (384, 384));
        }
    }

    #[actix_web::test]
    async fn legacy_base_image_field_is_accepted() {
        let generator = Arc::new(RecordingGenerator::new(reply()));
        let app = service!(state_with(generator.clone()).await);
        let source = solid_png(64, 64, [0, 120, 0, 255]).to_data_uri();

        let resp = test::call_service(
            &app,
            post(
                "/api/generate-one-image-from-image",
                json!({ "baseImage": source }),
            )
            .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let parts = &generator.recorded()[0];
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].as_text(), Some(DEFAULT_VARIATION_PROMPT));
    }

    #[actix_web::test]
    async fn composition_rejects_missing_images_and_misaligned_names() {
        let generator = Arc::new(RecordingGenerator::new(reply()));
        let app = service!(state_with(generator.clone()).await);

        let resp = test::call_service(
            &app,
            post(
                "/api/generate-one-image-from-image",
                json!({ "baseImages": [] }),
            )
            .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let source = solid_png(32, 32, [1, 1, 1, 255]).to_data_uri();
        let resp = test::call_service(
            &app,
            post(
                "/api/generate-one-image-from-image",
                json!({ "baseImages": [source.clone(), source.clone()], "characterNames": ["Solo"] }),
            )
            .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = test::call_service(
            &app,
            post(
                "/api/generate-one-image-from-image",
                json!({
                    "baseImages": [source.clone(), "", source],
                    "characterNames": ["Aria", "Bram", "Cleo"]
                }),
            )
            .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "Base image 2 is empty");
        assert!(generator.recorded().is_empty());
    }

    #[actix_web::test]
    async fn more_images_are_variations_of_the_base_image() {
        let generator = Arc::new(RecordingGenerator::new(reply()));
        let app = service!(state_with(generator.clone()).await);
        let source = solid_png(200, 200, [50, 60, 70, 255]).to_data_uri();

        let resp = test::call_service(
            &app,
            post("/api/generate-more-images", json!({ "baseImage": source })).to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["images"].as_array().map(Vec::len), Some(3));

        let requests = generator.recorded();
        assert_eq!(requests.len(), 3);
        for parts in &requests {
            assert_eq!(dimensions(parts[1].as_image().unwrap()), (800, 1200));
        }

        let resp = test::call_service(
            &app,
            post("/api/generate-more-images", json!({})).to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn process_image_with_name_labels_in_place() {
        let generator = Arc::new(RecordingGenerator::new(reply()));
        let app = service!(state_with(generator.clone()).await);
        let source = solid_png(120, 90, [200, 200, 200, 255]).to_data_uri();

        let resp = test::call_service(
            &app,
            post(
                "/api/process-image-with-name",
                json!({ "imageData": source, "characterName": "Nyx" }),
            )
            .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        let labelled = ImageBlob::from_data_uri(body["image"].as_str().unwrap()).unwrap();
        assert!(labelled.is_png());
        assert_eq!(dimensions(&labelled), (120, 90));
        assert!(generator.recorded().is_empty());
    }

    #[actix_web::test]
    async fn process_image_failures_carry_a_stack() {
        let generator = Arc::new(RecordingGenerator::new(reply()));
        let app = service!(state_with(generator).await);

        let resp = test::call_service(
            &app,
            post(
                "/api/process-image-with-name",
                json!({ "imageData": "data:image/png;base64,AAAA", "characterName": "Nyx" }),
            )
            .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "Failed to process image");
        assert!(body["stack"].as_array().is_some_and(|stack| !stack.is_empty()));

        let resp = test::call_service(
            &app,
            post("/api/process-image-with-name", json!({ "imageData": "AAAA" })).to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn characters_can_be_saved_listed_and_deleted() {
        let generator = Arc::new(RecordingGenerator::new(reply()));
        let app = service!(state_with(generator).await);
        let portrait = solid_png(96, 96, [90, 90, 90, 255]).to_data_uri();

        let resp = test::call_service(
            &app,
            post(
                "/api/characters",
                json!({ "name": "Aria", "imageData": portrait }),
            )
            .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(resp).await;
        let id = body["character"]["id"].as_str().unwrap().to_string();
        assert_eq!(body["character"]["name"], "Aria");

        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/api/characters").to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        let characters = body["characters"].as_array().unwrap();
        assert_eq!(characters.len(), 1);
        let stored = ImageBlob::from_base64(
            characters[0]["image_data"].as_str().unwrap(),
            None,
        )
        .unwrap();
        assert_eq!(dimensions(&stored), (96, 96));

        let delete = || {
            test::TestRequest::delete()
                .uri(&format!("/api/characters/{id}"))
                .to_request()
        };
        let resp = test::call_service(&app, delete()).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        let resp = test::call_service(&app, delete()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn saving_a_character_requires_a_name() {
        let generator = Arc::new(RecordingGenerator::new(reply()));
        let app = service!(state_with(generator).await);
        let portrait = solid_png(16, 16, [0, 0, 0, 255]).to_data_uri();

        let resp = test::call_service(
            &app,
            post("/api/characters", json!({ "imageData": portrait })).to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn unsupported_methods_and_bad_bodies() {
        let generator = Arc::new(RecordingGenerator::new(reply()));
        let app = service!(state_with(generator).await);

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/api/generate-one-image")
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/generate-one-image")
                .insert_header(("content-type", "application/json"))
                .set_payload("{not json")
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert!(body["message"]
            .as_str()
            .is_some_and(|message| message.starts_with("Invalid request body")));
    }

    #[actix_web::test]
    async fn health_reports_the_store() {
        let generator = Arc::new(RecordingGenerator::new(reply()));
        let app = service!(state_with(generator).await);

        let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request())
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["store"], "sqlite");
    }
}
