pub mod upstream;
pub mod validation;

use crate::{
    config::UpstreamConfig,
    error::{RelayError, Result},
    logger,
    models::{catalog, GenerationMetadata, GenerationRequest, GenerationResult, ModelDescriptor},
};
use chrono::Utc;
use std::sync::Arc;

pub use upstream::{HuggingFaceBackend, InferenceBackend};

/// Stateless relay between clients and the inference provider.
#[derive(Clone)]
pub struct RelayService {
    backend: Arc<dyn InferenceBackend>,
    models: Arc<Vec<ModelDescriptor>>,
}

impl RelayService {
    pub fn new(backend: Arc<dyn InferenceBackend>) -> Self {
        Self::with_models(backend, catalog::all_models())
    }

    pub fn with_models(backend: Arc<dyn InferenceBackend>, models: Vec<ModelDescriptor>) -> Self {
        Self {
            backend,
            models: Arc::new(models),
        }
    }

    pub fn from_config(config: &UpstreamConfig) -> Result<Self> {
        let backend = HuggingFaceBackend::new(config)?;
        Ok(Self::new(Arc::new(backend)))
    }

    pub fn list_models(&self) -> Result<Vec<ModelDescriptor>> {
        if self.models.is_empty() {
            return Err(RelayError::UpstreamUnavailable(
                "Model catalog is empty".into(),
            ));
        }
        Ok(self.models.as_ref().clone())
    }

    pub fn model(&self, model_id: &str) -> Option<ModelDescriptor> {
        catalog::find_model(&self.models, model_id).cloned()
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Validates, normalizes and forwards one request. Single attempt, no retry.
    pub async fn generate(&self, request: GenerationRequest) -> Result<GenerationResult> {
        let model = validation::validate_request(&request, &self.models).map_err(|e| {
            log::warn!("Rejected generation request: {}", e);
            e
        })?;
        let params = validation::normalize(&request, model);

        let preview: String = request.prompt.chars().take(50).collect();
        log::info!("Generating image with model {}: '{}'", model.id, preview);

        let mut timer = logger::timer("upstream text_to_image");
        let image = match self
            .backend
            .text_to_image(&model.id, &request.prompt, &params)
            .await
        {
            Ok(image) => image,
            Err(e) => {
                timer.fail(&e);
                log::error!("Image generation failed ({}): {}", e.kind(), e);
                return Err(e);
            }
        };
        drop(timer);

        Ok(GenerationResult {
            image,
            metadata: GenerationMetadata {
                model_id: model.id.clone(),
                prompt: request.prompt,
                width: params.width,
                height: params.height,
                parameters: params,
                timestamp: Utc::now(),
            },
        })
    }
}
