use crate::{
    error::{RelayError, Result},
    models::{
        GenerateResponse, GenerationRequest, GenerationResult, HealthStatus, ModelDescriptor,
        ModelsResponse,
    },
    relay::{upstream::classify_transport_error, RelayService},
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;

/// What the session controller needs from a relay, local or remote.
#[async_trait]
pub trait RelayApi: Send + Sync {
    async fn list_models(&self) -> Result<Vec<ModelDescriptor>>;
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResult>;
}

#[async_trait]
impl<T: RelayApi + ?Sized> RelayApi for Arc<T> {
    async fn list_models(&self) -> Result<Vec<ModelDescriptor>> {
        (**self).list_models().await
    }

    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResult> {
        (**self).generate(request).await
    }
}

#[async_trait]
impl RelayApi for RelayService {
    async fn list_models(&self) -> Result<Vec<ModelDescriptor>> {
        RelayService::list_models(self)
    }

    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResult> {
        RelayService::generate(self, request).await
    }
}

/// Talks to a relay server over its `/api` surface.
#[derive(Clone)]
pub struct HttpRelayClient {
    client: Client,
    base_url: String,
}

impl HttpRelayClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn health(&self) -> Result<HealthStatus> {
        let response = self
            .client
            .get(self.url("/api/health"))
            .send()
            .await
            .map_err(classify_transport_error)?;

        if !response.status().is_success() {
            return Err(RelayError::Upstream(format!(
                "Health check returned {}",
                response.status()
            )));
        }

        response
            .json::<HealthStatus>()
            .await
            .map_err(|e| RelayError::Upstream(format!("Malformed health response: {}", e)))
    }
}

#[async_trait]
impl RelayApi for HttpRelayClient {
    /// Any failure to obtain the catalog is `UpstreamUnavailable`.
    async fn list_models(&self) -> Result<Vec<ModelDescriptor>> {
        let response = self
            .client
            .get(self.url("/api/models"))
            .send()
            .await
            .map_err(|e| RelayError::UpstreamUnavailable(format!("Catalog request failed: {}", e)))?;

        let status = response.status();
        let body: ModelsResponse = response.json().await.map_err(|e| {
            RelayError::UpstreamUnavailable(format!("Malformed catalog response ({}): {}", status, e))
        })?;

        if !status.is_success() || !body.success {
            return Err(RelayError::UpstreamUnavailable(
                body.error
                    .unwrap_or_else(|| format!("Catalog request returned {}", status)),
            ));
        }

        Ok(body.models)
    }

    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResult> {
        let response = self
            .client
            .post(self.url("/api/generate"))
            .json(&request)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(classify_transport_error)?;
        let body = serde_json::from_slice::<GenerateResponse>(&bytes).ok();

        match body {
            Some(GenerateResponse {
                success: true,
                image: Some(image),
                metadata: Some(metadata),
                ..
            }) if status.is_success() => Ok(GenerationResult { image, metadata }),
            Some(GenerateResponse {
                kind: Some(kind),
                error,
                ..
            }) if !status.is_success() => Err(RelayError::from_kind(
                kind,
                error.unwrap_or_else(|| status.to_string()),
            )),
            Some(GenerateResponse { error, .. }) => Err(classify_relay_status(
                status,
                error.unwrap_or_else(|| status.to_string()),
            )),
            None => Err(classify_relay_status(
                status,
                format!("Malformed relay response ({})", status),
            )),
        }
    }
}

fn classify_relay_status(status: StatusCode, message: String) -> RelayError {
    match status {
        StatusCode::GATEWAY_TIMEOUT => RelayError::Timeout(message),
        s if s.is_client_error() => RelayError::Validation(message),
        _ => RelayError::Upstream(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::spawn_stub;

    fn client(url: &str) -> HttpRelayClient {
        HttpRelayClient::new(url, Duration::from_secs(5)).unwrap()
    }

    fn request() -> GenerationRequest {
        GenerationRequest::new("a red balloon", "m1").with_size(512)
    }

    #[actix_web::test]
    async fn test_generate_success_envelope() {
        let body = br#"{"success":true,"image":"aGVsbG8=","metadata":{
            "model_id":"m1","prompt":"a red balloon","width":512,"height":512,
            "parameters":{"width":512,"height":512,"num_inference_steps":30,"guidance_scale":7.5},
            "timestamp":"2026-10-18T12:00:00Z"}}"#;
        let url = spawn_stub(200, "application/json", body.to_vec(), None);

        let result = client(&url).generate(request()).await.unwrap();
        assert_eq!(result.image, "aGVsbG8=");
        assert_eq!(result.metadata.parameters.num_inference_steps, 30);
    }

    #[actix_web::test]
    async fn test_http_500_is_upstream_error() {
        let url = spawn_stub(500, "text/html", b"<h1>Internal Server Error</h1>".to_vec(), None);
        let err = client(&url).generate(request()).await.unwrap_err();
        assert!(matches!(err, RelayError::Upstream(_)), "got {:?}", err);
    }

    #[actix_web::test]
    async fn test_error_kind_in_envelope_wins() {
        let body = br#"{"success":false,"error":"provider timed out","kind":"timeout"}"#;
        let url = spawn_stub(504, "application/json", body.to_vec(), None);
        let err = client(&url).generate(request()).await.unwrap_err();
        assert!(matches!(err, RelayError::Timeout(ref msg) if msg == "provider timed out"));
    }

    #[actix_web::test]
    async fn test_400_without_kind_is_validation() {
        let body = br#"{"success":false,"error":"Prompt is required"}"#;
        let url = spawn_stub(400, "application/json", body.to_vec(), None);
        let err = client(&url).generate(request()).await.unwrap_err();
        assert!(matches!(err, RelayError::Validation(_)));
    }

    #[actix_web::test]
    async fn test_catalog_failure_is_unavailable() {
        let body = br#"{"success":false,"error":"registry offline"}"#;
        let url = spawn_stub(503, "application/json", body.to_vec(), None);
        let err = client(&url).list_models().await.unwrap_err();
        assert!(matches!(err, RelayError::UpstreamUnavailable(ref msg) if msg == "registry offline"));
    }

    #[actix_web::test]
    async fn test_health() {
        let body = br#"{"status":"healthy","services":{"api":"running"},"timestamp":"2026-10-18T12:00:00Z"}"#;
        let url = spawn_stub(200, "application/json", body.to_vec(), None);
        let health = client(&url).health().await.unwrap();
        assert_eq!(health.status, "healthy");
    }
}
