pub mod codec;
pub mod config;
pub mod error;
pub mod history;
pub mod ingredients;
pub mod models;
pub mod orchestrator;
pub mod service;
pub mod telemetry;
pub mod transport;

use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::orchestrator::GenerationOrchestrator;
use crate::service::{GenerationService, ModelGenerationService};
use crate::transport::{HttpTransport, Transport};

pub use crate::error::RecipeMuseError;
pub use crate::history::{HistoryEntry, HistoryLedger};
pub use crate::ingredients::IngredientSet;
pub use crate::models::{Recipe, RecipeImage};
pub use crate::orchestrator::{Phase, Status, ViewState};

/// Wire the HTTP transport, model-backed service and orchestrator from config.
pub fn build_orchestrator(cfg: &Config) -> Result<GenerationOrchestrator> {
    let transport = Arc::new(HttpTransport::new(&cfg.service, cfg.retry.clone())?);

    let service = ModelGenerationService::new(
        Arc::clone(&transport) as Arc<dyn Transport>,
        &cfg.service,
    );

    tracing::info!(
        "{} {} ready (text model: {}, image model: {})",
        cfg.app.name,
        cfg.app.version,
        cfg.service.text_model,
        cfg.service.image_model
    );

    Ok(GenerationOrchestrator::new(
        Arc::new(service) as Arc<dyn GenerationService>
    ))
}
