use std::sync::Arc;

use crate::db::CharacterStore;
use crate::pipeline::CompositionPipeline;

/// Shared handles only; nothing here is mutated after start-up.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: CompositionPipeline,
    pub store: Arc<dyn CharacterStore>,
}

impl AppState {
    pub fn new(pipeline: CompositionPipeline, store: Arc<dyn CharacterStore>) -> Self {
        Self { pipeline, store }
    }
}
