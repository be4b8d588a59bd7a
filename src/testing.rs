//! Shared fixtures for unit tests.

use crate::{
    error::{RelayError, Result},
    models::{DefaultParams, GenerationParameters, ModelDescriptor},
    relay::InferenceBackend,
};
use actix_web::{http::StatusCode, web, App, HttpResponse, HttpServer};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub(crate) fn test_model(id: &str) -> ModelDescriptor {
    ModelDescriptor {
        id: id.to_string(),
        name: format!("Model {}", id),
        description: "Test model".to_string(),
        provider: "test".to_string(),
        category: "general".to_string(),
        estimated_time: "1 second".to_string(),
        tags: vec!["test".to_string()],
        max_size: 1024,
        min_steps: 4,
        max_steps: 50,
        min_guidance: 1.0,
        max_guidance: 20.0,
        supports_negative_prompt: true,
        supports_seed: true,
        default_params: DefaultParams {
            width: 512,
            height: 512,
            steps: 30,
            guidance: 7.5,
        },
    }
}

pub(crate) fn test_models() -> Vec<ModelDescriptor> {
    vec![test_model("m1"), test_model("m2")]
}

pub(crate) struct CountingBackend {
    calls: AtomicUsize,
    image: Option<String>,
    failure: fn() -> RelayError,
}

impl CountingBackend {
    pub(crate) fn succeeding(image: &str) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            image: Some(image.to_string()),
            failure: || RelayError::Upstream("unused".into()),
        }
    }

    pub(crate) fn failing(failure: fn() -> RelayError) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            image: None,
            failure,
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InferenceBackend for CountingBackend {
    async fn text_to_image(
        &self,
        _model_id: &str,
        _prompt: &str,
        _params: &GenerationParameters,
    ) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.image {
            Some(image) => Ok(image.clone()),
            None => Err((self.failure)()),
        }
    }

    fn name(&self) -> &str {
        "counting"
    }
}

/// Serves one canned response on every path from an ephemeral local port.
/// Must be called from inside an actix system (`#[actix_web::test]`).
pub(crate) fn spawn_stub(
    status: u16,
    content_type: &'static str,
    body: Vec<u8>,
    delay: Option<Duration>,
) -> String {
    let status = StatusCode::from_u16(status).unwrap();
    let server = HttpServer::new(move || {
        let body = body.clone();
        App::new().default_service(web::to(move || {
            let body = body.clone();
            async move {
                if let Some(delay) = delay {
                    actix_web::rt::time::sleep(delay).await;
                }
                HttpResponse::build(status)
                    .content_type(content_type)
                    .body(body)
            }
        }))
    })
    .workers(1)
    .bind(("127.0.0.1", 0))
    .unwrap();

    let addr = server.addrs()[0];
    actix_web::rt::spawn(server.run());
    format!("http://{}", addr)
}
