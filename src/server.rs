//! HTTP surface of the relay.

use crate::{
    config::Config,
    error::{ErrorKind, RelayError},
    models::{
        catalog, ErrorResponse, GenerateResponse, GenerationRequest, HealthStatus,
        ModelDetailResponse, ModelsResponse, SummaryResponse,
    },
    relay::RelayService,
};
use actix_web::{
    error::{InternalError, JsonPayloadError},
    http::StatusCode,
    web, App, HttpRequest, HttpResponse, HttpServer, ResponseError,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;

pub struct AppState {
    pub relay: RelayService,
}

impl ResponseError for RelayError {
    fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Upstream => StatusCode::BAD_GATEWAY,
            ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::UpstreamUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .json(ErrorResponse::new(self.user_message(), Some(self.kind())))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ModelQuery {
    pub category: Option<String>,
    pub tag: Option<String>,
    pub q: Option<String>,
    #[serde(default)]
    pub ui: bool,
}

async fn health(state: web::Data<AppState>) -> HttpResponse {
    let mut services = BTreeMap::new();
    services.insert("api".to_string(), "running".to_string());
    services.insert(
        "upstream".to_string(),
        state.relay.backend_name().to_string(),
    );

    HttpResponse::Ok().json(HealthStatus {
        status: "healthy".to_string(),
        services,
        timestamp: Utc::now(),
    })
}

async fn list_models(
    state: web::Data<AppState>,
    query: web::Query<ModelQuery>,
) -> Result<HttpResponse, RelayError> {
    let mut models = state.relay.list_models()?;

    if let Some(category) = query.category.as_deref() {
        models = catalog::models_by_category(&models, category);
    }
    if let Some(tag) = query.tag.as_deref() {
        models = catalog::models_by_tag(&models, tag);
    }
    if let Some(q) = query.q.as_deref() {
        models = catalog::search_models(&models, q);
    }

    if query.ui {
        let models = catalog::models_for_ui(&models);
        return Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "count": models.len(),
            "models": models,
        })));
    }

    Ok(HttpResponse::Ok().json(ModelsResponse {
        success: true,
        count: models.len(),
        models,
        error: None,
    }))
}

async fn models_summary(state: web::Data<AppState>) -> Result<HttpResponse, RelayError> {
    let models = state.relay.list_models()?;
    Ok(HttpResponse::Ok().json(SummaryResponse {
        success: true,
        summary: catalog::summary(&models),
    }))
}

async fn model_detail(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let model_id = path.into_inner();
    match state.relay.model(&model_id) {
        Some(model) => HttpResponse::Ok().json(ModelDetailResponse {
            success: true,
            model,
        }),
        None => HttpResponse::NotFound().json(ErrorResponse::new(
            format!("Model '{}' not found", model_id),
            None,
        )),
    }
}

async fn generate(
    state: web::Data<AppState>,
    body: web::Json<GenerationRequest>,
) -> Result<HttpResponse, RelayError> {
    let result = state.relay.generate(body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(GenerateResponse {
        success: true,
        image: Some(result.image),
        metadata: Some(result.metadata),
        error: None,
        kind: None,
    }))
}

async fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(ErrorResponse::new("Resource not found", None))
}

fn json_error(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    log::warn!("Rejected malformed request body: {}", err);
    let response = HttpResponse::BadRequest().json(ErrorResponse::new(
        format!("Invalid request body: {}", err),
        Some(ErrorKind::Validation),
    ));
    InternalError::from_response(err, response).into()
}

/// Registers every `/api` route. The summary route must precede the
/// catch-all detail route since model ids contain slashes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error))
        .service(
            web::scope("/api")
                .route("/health", web::get().to(health))
                .route("/models", web::get().to(list_models))
                .route("/models/summary", web::get().to(models_summary))
                .route("/models/{model_id:.*}", web::get().to(model_detail))
                .route("/generate", web::post().to(generate)),
        );
}

pub async fn run(config: &Config, relay: RelayService) -> std::io::Result<()> {
    let state = web::Data::new(AppState { relay });

    log::info!("Listening on {}:{}", config.host, config.port);
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(configure)
            .default_service(web::to(not_found))
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
