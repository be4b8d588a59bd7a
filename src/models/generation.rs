use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub model_id: String,
    pub width: u32,
    pub height: u32,
    pub num_inference_steps: u32,
    pub guidance_scale: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl GenerationRequest {
    /// Request at 768x768, 30 steps, guidance 7.5.
    pub fn new(prompt: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model_id: model_id.into(),
            width: 768,
            height: 768,
            num_inference_steps: 30,
            guidance_scale: 7.5,
            negative_prompt: None,
            seed: None,
        }
    }

    pub fn with_size(mut self, size: u32) -> Self {
        self.width = size;
        self.height = size;
        self
    }

    pub fn with_steps(mut self, steps: u32) -> Self {
        self.num_inference_steps = steps;
        self
    }

    pub fn with_guidance(mut self, guidance: f32) -> Self {
        self.guidance_scale = guidance;
        self
    }

    pub fn with_negative_prompt(mut self, negative_prompt: impl Into<String>) -> Self {
        self.negative_prompt = Some(negative_prompt.into());
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Parameters actually sent upstream, after normalization against the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParameters {
    pub width: u32,
    pub height: u32,
    pub num_inference_steps: u32,
    pub guidance_scale: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationMetadata {
    pub model_id: String,
    pub prompt: String,
    pub width: u32,
    pub height: u32,
    pub parameters: GenerationParameters,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    /// Base64 encoded
    pub image: String,
    pub metadata: GenerationMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_fields_are_omitted() {
        let request = GenerationRequest::new("a red balloon", "m1");
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("negative_prompt").is_none());
        assert!(json.get("seed").is_none());
        assert_eq!(json["num_inference_steps"], 30);
    }

    #[test]
    fn test_wire_body_without_optionals_parses() {
        let body = r#"{"prompt":"p","model_id":"m1","width":512,"height":512,
            "num_inference_steps":30,"guidance_scale":7.5}"#;
        let request: GenerationRequest = serde_json::from_str(body).unwrap();
        assert_eq!(request.width, 512);
        assert_eq!(request.negative_prompt, None);
        assert_eq!(request.seed, None);
    }

    #[test]
    fn test_builder() {
        let request = GenerationRequest::new("p", "m1")
            .with_size(1024)
            .with_steps(12)
            .with_guidance(3.0)
            .with_negative_prompt("blurry")
            .with_seed(42);
        assert_eq!((request.width, request.height), (1024, 1024));
        assert_eq!(request.num_inference_steps, 12);
        assert_eq!(request.seed, Some(42));
    }
}
