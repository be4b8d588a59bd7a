use crate::{
    config::UpstreamConfig,
    error::{RelayError, Result},
    models::GenerationParameters,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{header, Client, StatusCode};
use serde_json::{json, Value};

/// Outbound half of the relay: turns a validated prompt into base64 image data.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    async fn text_to_image(
        &self,
        model_id: &str,
        prompt: &str,
        params: &GenerationParameters,
    ) -> Result<String>;

    fn name(&self) -> &str;
}

/// Hugging Face hosted inference (`POST {base_url}/models/{model_id}`).
#[derive(Clone)]
pub struct HuggingFaceBackend {
    client: Client,
    base_url: String,
    token: String,
}

impl HuggingFaceBackend {
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        let token = config
            .api_token
            .clone()
            .filter(|token| !token.is_empty())
            .ok_or_else(|| RelayError::Config("Upstream API token is required".into()))?;

        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| RelayError::Config(format!("Failed to build HTTP client: {}", e)))?;

        let base_url = config.base_url.trim_end_matches('/').to_string();
        log::info!(
            "Hugging Face backend configured: endpoint={}, timeout={}s",
            base_url,
            config.timeout_secs
        );

        Ok(Self {
            client,
            base_url,
            token,
        })
    }
}

#[async_trait]
impl InferenceBackend for HuggingFaceBackend {
    async fn text_to_image(
        &self,
        model_id: &str,
        prompt: &str,
        params: &GenerationParameters,
    ) -> Result<String> {
        let url = format!("{}/models/{}", self.base_url, model_id);
        let payload = json!({
            "inputs": prompt,
            "parameters": params,
        });

        log::debug!("POST {} parameters={}", url, payload["parameters"]);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .header(header::ACCEPT, "image/png")
            .json(&payload)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        let body = response
            .bytes()
            .await
            .map_err(classify_transport_error)?;

        decode_image_payload(&content_type, &body)
    }

    fn name(&self) -> &str {
        "huggingface"
    }
}

/// Network failures and timeouts surface as `Timeout`.
pub(crate) fn classify_transport_error(err: reqwest::Error) -> RelayError {
    if err.is_timeout() {
        RelayError::Timeout(format!("Upstream request timed out: {}", err))
    } else if err.is_builder() {
        RelayError::Upstream(format!("Invalid upstream request: {}", err))
    } else if err.is_decode() || err.is_body() {
        RelayError::Upstream(format!("Failed to read upstream response: {}", err))
    } else {
        RelayError::Timeout(format!("Upstream unreachable: {}", err))
    }
}

/// 4xx is the caller's fault and surfaces as validation; everything else is upstream.
pub(crate) fn classify_status(status: StatusCode, body: &str) -> RelayError {
    let detail = extract_error_message(body).unwrap_or_else(|| status.to_string());
    if status.is_client_error() {
        RelayError::Validation(format!("Upstream rejected the request: {}", detail))
    } else {
        RelayError::Upstream(format!("Upstream returned {}: {}", status.as_u16(), detail))
    }
}

fn extract_error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => {
            let error = value.get("error");
            error
                .and_then(Value::as_str)
                .or_else(|| error.and_then(|e| e.get("message")).and_then(Value::as_str))
                .or_else(|| value.get("message").and_then(Value::as_str))
                .map(str::to_string)
        }
        Err(_) => Some(trimmed.chars().take(200).collect()),
    }
}

/// Normalizes either raw image bytes or a JSON body carrying base64 into canonical base64.
pub fn decode_image_payload(content_type: &str, body: &[u8]) -> Result<String> {
    if body.is_empty() {
        return Err(RelayError::Upstream("Upstream returned an empty body".into()));
    }

    let looks_like_json = content_type.starts_with("application/json")
        || matches!(body.iter().find(|b| !b.is_ascii_whitespace()), Some(b'{') | Some(b'['));

    if !looks_like_json {
        return Ok(STANDARD.encode(body));
    }

    let value: Value = serde_json::from_slice(body)
        .map_err(|e| RelayError::Upstream(format!("Malformed upstream response: {}", e)))?;

    let encoded = find_base64_field(&value).ok_or_else(|| {
        RelayError::Upstream("Upstream response did not contain image data".into())
    })?;

    let raw = strip_data_url(encoded);
    let bytes = STANDARD
        .decode(raw.trim())
        .map_err(|e| RelayError::Upstream(format!("Upstream image is not valid base64: {}", e)))?;
    if bytes.is_empty() {
        return Err(RelayError::Upstream("Upstream returned an empty image".into()));
    }

    Ok(STANDARD.encode(bytes))
}

fn find_base64_field(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(s.as_str()),
        Value::Array(items) => items.first().and_then(find_base64_field),
        Value::Object(map) => ["image", "b64_json", "images", "data"]
            .iter()
            .filter_map(|key| map.get(*key))
            .find_map(find_base64_field),
        _ => None,
    }
}

fn strip_data_url(value: &str) -> &str {
    match value.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::spawn_stub;
    use std::time::Duration;

    const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

    fn params() -> GenerationParameters {
        GenerationParameters {
            width: 512,
            height: 512,
            num_inference_steps: 30,
            guidance_scale: 7.5,
            negative_prompt: None,
            seed: None,
        }
    }

    fn backend(base_url: &str, timeout_secs: u64) -> HuggingFaceBackend {
        let config = UpstreamConfig::new()
            .with_token("hf_test")
            .with_base_url(base_url)
            .with_timeout(timeout_secs);
        HuggingFaceBackend::new(&config).unwrap()
    }

    #[test]
    fn test_binary_payload_is_encoded() {
        let encoded = decode_image_payload("image/png", PNG_BYTES).unwrap();
        assert_eq!(STANDARD.decode(encoded).unwrap(), PNG_BYTES);
    }

    #[test]
    fn test_json_payload_variants() {
        let b64 = STANDARD.encode(PNG_BYTES);
        let bodies = [
            format!(r#"{{"image":"{}"}}"#, b64),
            format!(r#"[{{"b64_json":"{}"}}]"#, b64),
            format!(r#"{{"data":[{{"b64_json":"{}"}}]}}"#, b64),
            format!(r#"{{"image":"data:image/png;base64,{}"}}"#, b64),
            format!(r#"{{"images":["{}"]}}"#, b64),
            format!(r#"["{}"]"#, b64),
        ];
        for body in bodies {
            let encoded = decode_image_payload("application/json", body.as_bytes()).unwrap();
            assert_eq!(encoded, b64, "body: {}", body);
        }
    }

    #[test]
    fn test_malformed_payloads_are_upstream_errors() {
        for (content_type, body) in [
            ("application/json", &b"{not json"[..]),
            ("application/json", &br#"{"status":"ok"}"#[..]),
            ("application/json", &br#"{"image":"***"}"#[..]),
            ("image/png", &b""[..]),
        ] {
            let err = decode_image_payload(content_type, body).unwrap_err();
            assert!(matches!(err, RelayError::Upstream(_)), "got {:?}", err);
        }
    }

    #[test]
    fn test_status_classification() {
        let err = classify_status(StatusCode::BAD_REQUEST, r#"{"error":"bad width"}"#);
        assert!(matches!(err, RelayError::Validation(ref msg) if msg.contains("bad width")));
        let err = classify_status(StatusCode::SERVICE_UNAVAILABLE, "loading");
        assert!(matches!(err, RelayError::Upstream(ref msg) if msg.contains("503")));
    }

    #[test]
    fn test_missing_token_is_config_error() {
        let result = HuggingFaceBackend::new(&UpstreamConfig::new());
        assert!(matches!(result, Err(RelayError::Config(_))));
    }

    #[actix_web::test]
    async fn test_binary_response_from_upstream() {
        let url = spawn_stub(200, "image/png", PNG_BYTES.to_vec(), None);
        let image = backend(&url, 5)
            .text_to_image("m1", "a red balloon", &params())
            .await
            .unwrap();
        assert_eq!(image, STANDARD.encode(PNG_BYTES));
    }

    #[actix_web::test]
    async fn test_upstream_4xx_is_validation() {
        let url = spawn_stub(422, "application/json", br#"{"error":"nope"}"#.to_vec(), None);
        let err = backend(&url, 5)
            .text_to_image("m1", "p", &params())
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Validation(_)));
    }

    #[actix_web::test]
    async fn test_upstream_5xx_is_upstream_error() {
        let url = spawn_stub(500, "text/plain", b"boom".to_vec(), None);
        let err = backend(&url, 5)
            .text_to_image("m1", "p", &params())
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Upstream(_)));
    }

    #[actix_web::test]
    async fn test_slow_upstream_is_timeout() {
        let url = spawn_stub(200, "image/png", PNG_BYTES.to_vec(), Some(Duration::from_secs(3)));
        let err = backend(&url, 1)
            .text_to_image("m1", "p", &params())
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Timeout(_)));
    }

    #[actix_web::test]
    async fn test_unreachable_upstream_is_timeout() {
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let err = backend(&format!("http://127.0.0.1:{}", port), 2)
            .text_to_image("m1", "p", &params())
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Timeout(_)));
    }
}
