use crate::{
    error::{RelayError, Result},
    models::{catalog, GenerationParameters, GenerationRequest, ModelDescriptor},
};

pub const SUPPORTED_SIZES: [u32; 4] = [256, 512, 768, 1024];
pub const MIN_STEPS: u32 = 4;
pub const MAX_STEPS: u32 = 50;
pub const MIN_GUIDANCE: f32 = 1.0;
pub const MAX_GUIDANCE: f32 = 20.0;
pub const MAX_PROMPT_LENGTH: usize = 1000;
pub const MAX_NEGATIVE_PROMPT_LENGTH: usize = 500;
pub const MAX_SEED: u64 = u32::MAX as u64;

pub fn validate_prompt(prompt: &str) -> Result<()> {
    if prompt.trim().is_empty() {
        return Err(RelayError::Validation("Prompt cannot be empty".into()));
    }

    let length = prompt.chars().count();
    if length > MAX_PROMPT_LENGTH {
        return Err(RelayError::Validation(format!(
            "Prompt too long: {} characters (maximum: {})",
            length, MAX_PROMPT_LENGTH
        )));
    }

    Ok(())
}

fn validate_negative_prompt(negative_prompt: Option<&str>) -> Result<()> {
    let Some(negative_prompt) = negative_prompt else {
        return Ok(());
    };

    let length = negative_prompt.chars().count();
    if length > MAX_NEGATIVE_PROMPT_LENGTH {
        return Err(RelayError::Validation(format!(
            "Negative prompt too long: {} characters (maximum: {})",
            length, MAX_NEGATIVE_PROMPT_LENGTH
        )));
    }

    Ok(())
}

fn validate_size(width: u32, height: u32, model: &ModelDescriptor) -> Result<()> {
    if width != height {
        return Err(RelayError::Validation(format!(
            "Image must be square, got {}x{}",
            width, height
        )));
    }

    if !SUPPORTED_SIZES.contains(&width) {
        let allowed: Vec<String> = SUPPORTED_SIZES.iter().map(u32::to_string).collect();
        return Err(RelayError::Validation(format!(
            "Unsupported image size {}; allowed: {}",
            width,
            allowed.join(", ")
        )));
    }

    if width > model.max_size {
        return Err(RelayError::Validation(format!(
            "Size {} exceeds the maximum of {} for model '{}'",
            width, model.max_size, model.id
        )));
    }

    Ok(())
}

fn validate_steps(steps: u32) -> Result<()> {
    if !(MIN_STEPS..=MAX_STEPS).contains(&steps) {
        return Err(RelayError::Validation(format!(
            "Steps {} outside allowed range ({}-{})",
            steps, MIN_STEPS, MAX_STEPS
        )));
    }
    Ok(())
}

fn validate_guidance(guidance: f32) -> Result<()> {
    // NaN fails the range check too.
    if !(MIN_GUIDANCE..=MAX_GUIDANCE).contains(&guidance) {
        return Err(RelayError::Validation(format!(
            "Guidance {} outside allowed range ({}-{})",
            guidance, MIN_GUIDANCE, MAX_GUIDANCE
        )));
    }
    Ok(())
}

fn validate_seed(seed: Option<u64>) -> Result<()> {
    match seed {
        Some(seed) if seed > MAX_SEED => Err(RelayError::Validation(format!(
            "Seed {} too large (maximum: {})",
            seed, MAX_SEED
        ))),
        _ => Ok(()),
    }
}

/// Checks every field against the global limits and resolves the model.
pub fn validate_request<'a>(
    request: &GenerationRequest,
    models: &'a [ModelDescriptor],
) -> Result<&'a ModelDescriptor> {
    validate_prompt(&request.prompt)?;
    validate_negative_prompt(request.negative_prompt.as_deref())?;

    if request.model_id.trim().is_empty() {
        return Err(RelayError::Validation("Model ID is required".into()));
    }
    let model = catalog::find_model(models, &request.model_id).ok_or_else(|| {
        RelayError::Validation(format!("Invalid model ID: '{}'", request.model_id))
    })?;

    validate_size(request.width, request.height, model)?;
    validate_steps(request.num_inference_steps)?;
    validate_guidance(request.guidance_scale)?;
    validate_seed(request.seed)?;

    Ok(model)
}

/// Clamps steps and guidance into the model's own range and drops options it
/// does not support. Blank negative prompts are omitted.
pub fn normalize(request: &GenerationRequest, model: &ModelDescriptor) -> GenerationParameters {
    let negative_prompt = request
        .negative_prompt
        .as_deref()
        .map(str::trim)
        .filter(|np| !np.is_empty() && model.supports_negative_prompt)
        .map(str::to_string);

    GenerationParameters {
        width: request.width,
        height: request.height,
        num_inference_steps: request
            .num_inference_steps
            .max(model.min_steps)
            .min(model.max_steps),
        guidance_scale: request
            .guidance_scale
            .max(model.min_guidance)
            .min(model.max_guidance),
        negative_prompt,
        seed: request.seed.filter(|_| model.supports_seed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::catalog::all_models;

    const FLUX: &str = "black-forest-labs/FLUX.1-dev";
    const LIGHTNING: &str = "ByteDance/SDXL-Lightning";

    fn request() -> GenerationRequest {
        GenerationRequest::new("a red balloon", FLUX).with_size(512)
    }

    fn assert_validation(request: GenerationRequest) {
        let models = all_models();
        let err = validate_request(&request, &models).unwrap_err();
        assert!(matches!(err, RelayError::Validation(_)), "got {:?}", err);
    }

    #[test]
    fn test_valid_request_resolves_model() {
        let models = all_models();
        let model = validate_request(&request(), &models).unwrap();
        assert_eq!(model.id, FLUX);
    }

    #[test]
    fn test_prompt_rules() {
        assert!(validate_prompt("   \n\t").is_err());
        assert!(validate_prompt(&"x".repeat(MAX_PROMPT_LENGTH)).is_ok());
        assert!(validate_prompt(&"x".repeat(MAX_PROMPT_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_rejections() {
        assert_validation(request().with_steps(100));
        assert_validation(request().with_steps(3));
        assert_validation(request().with_guidance(0.5));
        assert_validation(request().with_guidance(f32::NAN));
        assert_validation(request().with_size(500));
        assert_validation(request().with_seed(MAX_SEED + 1));
        assert_validation(request().with_negative_prompt("n".repeat(501)));
        assert_validation(GenerationRequest::new("p", "unknown/model"));

        let mut rect = request();
        rect.height = 768;
        assert_validation(rect);
    }

    #[test]
    fn test_boundaries_accepted() {
        let models = all_models();
        let edge = request().with_steps(MIN_STEPS).with_guidance(MAX_GUIDANCE);
        assert!(validate_request(&edge, &models).is_ok());
        let edge = request().with_steps(MAX_STEPS).with_guidance(MIN_GUIDANCE);
        assert!(validate_request(&edge, &models).is_ok());
    }

    #[test]
    fn test_normalize_clamps_to_model_range() {
        let model = catalog::get_model_by_id(LIGHTNING).unwrap();
        let request = GenerationRequest::new("p", LIGHTNING)
            .with_steps(30)
            .with_guidance(15.0)
            .with_seed(7);
        let params = normalize(&request, &model);
        assert_eq!(params.num_inference_steps, 20);
        assert_eq!(params.guidance_scale, 12.0);
        assert_eq!(params.seed, Some(7));
    }

    #[test]
    fn test_normalize_tolerates_inverted_model_bounds() {
        let mut model = catalog::get_model_by_id(FLUX).unwrap();
        model.min_steps = 50;
        model.max_steps = 4;
        model.min_guidance = f32::NAN;
        model.max_guidance = 5.0;

        let params = normalize(&request().with_steps(30).with_guidance(7.5), &model);
        assert_eq!(params.num_inference_steps, 4);
        assert_eq!(params.guidance_scale, 5.0);
    }

    #[test]
    fn test_normalize_omits_blank_and_unsupported_options() {
        let mut model = catalog::get_model_by_id(FLUX).unwrap();
        let blank = request().with_negative_prompt("   ");
        assert_eq!(normalize(&blank, &model).negative_prompt, None);

        model.supports_seed = false;
        model.supports_negative_prompt = false;
        let full = request().with_negative_prompt("blurry").with_seed(1);
        let params = normalize(&full, &model);
        assert_eq!(params.negative_prompt, None);
        assert_eq!(params.seed, None);
    }
}
