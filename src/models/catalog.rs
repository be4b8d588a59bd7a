use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DefaultParams {
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub guidance: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub id: String,
    pub name: String,
    pub description: String,
    pub provider: String,
    pub category: String,
    pub estimated_time: String,
    pub tags: Vec<String>,
    pub max_size: u32,
    pub min_steps: u32,
    pub max_steps: u32,
    pub min_guidance: f32,
    pub max_guidance: f32,
    pub supports_negative_prompt: bool,
    pub supports_seed: bool,
    pub default_params: DefaultParams,
}

/// Reduced projection sent to clients that only render a model picker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiModel {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub estimated_time: String,
    pub tags: Vec<String>,
    pub default_params: DefaultParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSummary {
    pub total_models: usize,
    pub categories: BTreeMap<String, usize>,
    pub providers: BTreeMap<String, usize>,
    pub unique_tags: Vec<String>,
}

impl From<&ModelDescriptor> for UiModel {
    fn from(model: &ModelDescriptor) -> Self {
        UiModel {
            id: model.id.clone(),
            name: model.name.clone(),
            description: model.description.clone(),
            category: model.category.clone(),
            estimated_time: model.estimated_time.clone(),
            tags: model.tags.clone(),
            default_params: model.default_params,
        }
    }
}

struct Spec {
    id: &'static str,
    name: &'static str,
    description: &'static str,
    provider: &'static str,
    category: &'static str,
    estimated_time: &'static str,
    tags: &'static [&'static str],
    max_size: u32,
    steps: (u32, u32, u32),
    guidance: (f32, f32, f32),
}

const REGISTRY: &[Spec] = &[
    Spec {
        id: "black-forest-labs/FLUX.1-dev",
        name: "FLUX.1 Dev",
        description: "High-quality image generation model with excellent prompt following",
        provider: "fal-ai",
        category: "general",
        estimated_time: "15-30 seconds",
        tags: &["realistic", "versatile", "high-quality"],
        max_size: 2048,
        steps: (20, 50, 30),
        guidance: (1.0, 20.0, 7.5),
    },
    Spec {
        id: "ByteDance/SDXL-Lightning",
        name: "SDXL Lightning",
        description: "Fast, high-quality image generation optimized for speed",
        provider: "fal-ai",
        category: "fast",
        estimated_time: "5-10 seconds",
        tags: &["fast", "efficient", "realistic"],
        max_size: 1024,
        steps: (4, 20, 8),
        guidance: (1.0, 12.0, 7.0),
    },
    Spec {
        id: "stabilityai/stable-diffusion-xl-base-1.0",
        name: "Stable Diffusion XL",
        description: "Popular and reliable image generation model",
        provider: "replicate",
        category: "general",
        estimated_time: "20-40 seconds",
        tags: &["reliable", "versatile", "popular"],
        max_size: 1536,
        steps: (20, 100, 50),
        guidance: (1.0, 20.0, 7.5),
    },
    Spec {
        id: "ByteDance/Hyper-SD",
        name: "Hyper-SD",
        description: "Advanced model with excellent detail and coherence",
        provider: "fal-ai",
        category: "general",
        estimated_time: "10-20 seconds",
        tags: &["detailed", "coherent", "balanced"],
        max_size: 1024,
        steps: (15, 40, 25),
        guidance: (1.0, 15.0, 7.5),
    },
    Spec {
        id: "Qwen/Qwen-Image",
        name: "Qwen Image",
        description: "Powerful model with strong artistic capabilities",
        provider: "nebius",
        category: "artistic",
        estimated_time: "15-30 seconds",
        tags: &["artistic", "creative", "versatile"],
        max_size: 2048,
        steps: (20, 60, 30),
        guidance: (1.0, 20.0, 8.0),
    },
];

// Every registered model defaults to 768x768.
const DEFAULT_SIZE: u32 = 768;

static AVAILABLE_MODELS: Lazy<Vec<ModelDescriptor>> = Lazy::new(|| {
    REGISTRY
        .iter()
        .map(|spec| ModelDescriptor {
            id: spec.id.to_string(),
            name: spec.name.to_string(),
            description: spec.description.to_string(),
            provider: spec.provider.to_string(),
            category: spec.category.to_string(),
            estimated_time: spec.estimated_time.to_string(),
            tags: spec.tags.iter().map(|t| t.to_string()).collect(),
            max_size: spec.max_size,
            min_steps: spec.steps.0,
            max_steps: spec.steps.1,
            min_guidance: spec.guidance.0,
            max_guidance: spec.guidance.1,
            supports_negative_prompt: true,
            supports_seed: true,
            default_params: DefaultParams {
                width: DEFAULT_SIZE,
                height: DEFAULT_SIZE,
                steps: spec.steps.2,
                guidance: spec.guidance.2,
            },
        })
        .collect()
});

pub fn all_models() -> Vec<ModelDescriptor> {
    AVAILABLE_MODELS.clone()
}

pub fn get_model_by_id(model_id: &str) -> Option<ModelDescriptor> {
    find_model(&AVAILABLE_MODELS, model_id).cloned()
}

pub fn is_valid_model_id(model_id: &str) -> bool {
    find_model(&AVAILABLE_MODELS, model_id).is_some()
}

/// Lookup shared by the relay and the session controller, which holds its own copy.
pub fn find_model<'a>(models: &'a [ModelDescriptor], model_id: &str) -> Option<&'a ModelDescriptor> {
    models.iter().find(|model| model.id == model_id)
}

pub fn models_by_category(models: &[ModelDescriptor], category: &str) -> Vec<ModelDescriptor> {
    models
        .iter()
        .filter(|model| model.category == category)
        .cloned()
        .collect()
}

pub fn models_by_tag(models: &[ModelDescriptor], tag: &str) -> Vec<ModelDescriptor> {
    models
        .iter()
        .filter(|model| model.tags.iter().any(|t| t == tag))
        .cloned()
        .collect()
}

/// Case-insensitive match on name, description or any tag. An empty query matches everything.
pub fn search_models(models: &[ModelDescriptor], query: &str) -> Vec<ModelDescriptor> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return models.to_vec();
    }

    models
        .iter()
        .filter(|model| {
            model.name.to_lowercase().contains(&query)
                || model.description.to_lowercase().contains(&query)
                || model.tags.iter().any(|t| t.to_lowercase().contains(&query))
        })
        .cloned()
        .collect()
}

pub fn models_for_ui(models: &[ModelDescriptor]) -> Vec<UiModel> {
    models.iter().map(UiModel::from).collect()
}

pub fn summary(models: &[ModelDescriptor]) -> CatalogSummary {
    let mut categories = BTreeMap::new();
    let mut providers = BTreeMap::new();
    let mut tags = BTreeSet::new();

    for model in models {
        *categories.entry(model.category.clone()).or_insert(0) += 1;
        *providers.entry(model.provider.clone()).or_insert(0) += 1;
        tags.extend(model.tags.iter().cloned());
    }

    CatalogSummary {
        total_models: models.len(),
        categories,
        providers,
        unique_tags: tags.into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_order_is_stable() {
        let ids: Vec<String> = all_models().into_iter().map(|m| m.id).collect();
        assert_eq!(ids[0], "black-forest-labs/FLUX.1-dev");
        assert_eq!(ids.len(), 5);
    }

    #[test]
    fn test_lookup() {
        let model = get_model_by_id("ByteDance/SDXL-Lightning").unwrap();
        assert_eq!(model.name, "SDXL Lightning");
        assert_eq!(model.default_params.steps, 8);
        assert!(!is_valid_model_id("invalid-model"));
    }

    #[test]
    fn test_filters() {
        let models = all_models();
        assert_eq!(models_by_category(&models, "fast").len(), 1);
        assert_eq!(models_by_tag(&models, "versatile").len(), 3);
        assert_eq!(search_models(&models, "ARTISTIC").len(), 1);
        assert_eq!(search_models(&models, "  ").len(), 5);
    }

    #[test]
    fn test_summary() {
        let summary = summary(&all_models());
        assert_eq!(summary.total_models, 5);
        assert_eq!(summary.categories.get("general"), Some(&3));
        assert_eq!(summary.providers.get("fal-ai"), Some(&3));
        let mut sorted = summary.unique_tags.clone();
        sorted.sort();
        assert_eq!(sorted, summary.unique_tags);
    }

    #[test]
    fn test_ui_projection_keeps_defaults() {
        let ui = models_for_ui(&all_models());
        assert_eq!(ui[4].default_params.guidance, 8.0);
        assert_eq!(ui[4].default_params.width, 768);
    }
}
