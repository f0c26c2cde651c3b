use actix_web::{web, HttpResponse};
use tracing::info;

use crate::db::models::CharacterRecord;
use crate::error::{ApiError, AppResult};
use crate::handlers::finish;
use crate::handlers::protocol::{CharacterResponse, CharactersResponse, NewCharacterRequest};
use crate::llm::media::ImageBlob;
use crate::state::AppState;
use crate::utils::timing::start_request_timer;

pub async fn list_characters(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let mut timer = start_request_timer("characters.list", None);
    let result = state.store.list().await;
    let characters = finish(&mut timer, "Failed to load characters", result)?;
    Ok(HttpResponse::Ok().json(CharactersResponse { characters }))
}

/// Labels the portrait with the character's name before saving it.
pub async fn create_character(
    state: web::Data<AppState>,
    body: web::Json<NewCharacterRequest>,
) -> Result<HttpResponse, ApiError> {
    let mut timer = start_request_timer("characters.create", body.name.clone());
    let result: AppResult<CharacterRecord> = async {
        let (name, image_data) = body.fields()?;
        let image = ImageBlob::from_data_uri(image_data)?;
        let labelled = state.pipeline.label(image, name.to_string()).await?;
        state.store.create(name, &labelled).await
    }
    .await;

    let character = finish(&mut timer, "Failed to save character", result)?;
    info!(
        "Saved character {} ({}) to {}",
        character.id,
        character.name,
        state.store.backend()
    );
    Ok(HttpResponse::Created().json(CharacterResponse { character }))
}

pub async fn delete_character(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let mut timer = start_request_timer("characters.delete", Some(id.clone()));
    let result = state.store.delete(&id).await;
    finish(&mut timer, "Failed to delete character", result)?;
    info!("Deleted character {}", id);
    Ok(HttpResponse::NoContent().finish())
}
