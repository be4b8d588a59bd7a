//! Client-side generation lifecycle: one request in flight at a time, a
//! current image, and a bounded gallery persisted through a [`KeyValueStore`].

pub mod client;
pub mod store;

use crate::{
    error::{ErrorKind, RelayError, Result},
    models::{
        catalog, DefaultParams, Gallery, GalleryEntry, GenerationRequest, GenerationResult,
        ModelDescriptor,
    },
    relay::validation,
};
use uuid::Uuid;

pub use client::{HttpRelayClient, RelayApi};
pub use store::{FileStore, KeyValueStore, MemoryStore, Preferences, Theme};
use store::{CATALOG_KEY, GALLERY_KEY};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Validating,
    Submitted { generation_id: u64 },
    Succeeded,
    Failed(ErrorKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogStatus {
    Fresh,
    /// Served from the last catalog that loaded successfully.
    Stale,
    Unavailable,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    Generate(GenerationRequest),
    SelectGalleryEntry(Uuid),
    ChangeModel(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Succeeded(GenerationResult),
    Failed { kind: ErrorKind, message: String },
    /// A generation was already in flight; nothing happened.
    Ignored,
    Selected(GenerationResult),
    ModelChanged { model_id: String, defaults: DefaultParams },
    Rejected { message: String },
}

impl Outcome {
    fn failed(err: &RelayError) -> Self {
        Outcome::Failed {
            kind: err.kind(),
            message: err.user_message(),
        }
    }
}

/// Proof that the in-flight slot was taken for one request.
#[derive(Debug)]
pub struct GenerationTicket {
    id: u64,
    request: GenerationRequest,
}

impl GenerationTicket {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn request(&self) -> &GenerationRequest {
        &self.request
    }
}

pub struct SessionController<R: RelayApi, S: KeyValueStore> {
    relay: R,
    store: S,
    catalog: Vec<ModelDescriptor>,
    catalog_status: CatalogStatus,
    selected_model: Option<String>,
    current: Option<GenerationResult>,
    gallery: Gallery,
    phase: Phase,
    last_phase: Option<Phase>,
    next_generation_id: u64,
}

impl<R: RelayApi, S: KeyValueStore> SessionController<R, S> {
    /// Restores the gallery and loads the model catalog.
    pub async fn start(relay: R, store: S) -> Self {
        let gallery = load_gallery(&store);
        log::info!("Session started with {} gallery entries", gallery.len());

        let mut controller = Self {
            relay,
            store,
            catalog: Vec::new(),
            catalog_status: CatalogStatus::Unavailable,
            selected_model: None,
            current: None,
            gallery,
            phase: Phase::Idle,
            last_phase: None,
            next_generation_id: 1,
        };

        if let Err(e) = controller.refresh_catalog().await {
            log::warn!("Starting with {:?} model catalog: {}", controller.catalog_status, e);
        }
        controller
    }

    /// Reloads the catalog. On failure the previous list is kept, or the cached
    /// copy in the store when nothing was loaded yet.
    pub async fn refresh_catalog(&mut self) -> Result<()> {
        let fetched = match self.relay.list_models().await {
            Ok(models) if models.is_empty() => Err(RelayError::UpstreamUnavailable(
                "Relay returned an empty model catalog".into(),
            )),
            other => other,
        };

        match fetched {
            Ok(models) => {
                self.cache_catalog(&models);
                self.catalog = models;
                self.catalog_status = CatalogStatus::Fresh;
                self.ensure_selected_model();
                Ok(())
            }
            Err(e) => {
                if self.catalog.is_empty() {
                    self.catalog = load_cached_catalog(&self.store);
                }
                self.catalog_status = if self.catalog.is_empty() {
                    CatalogStatus::Unavailable
                } else {
                    CatalogStatus::Stale
                };
                self.ensure_selected_model();
                Err(e)
            }
        }
    }

    pub async fn dispatch(&mut self, intent: Intent) -> Outcome {
        match intent {
            Intent::Generate(request) => {
                let ticket = match self.begin_generation(request) {
                    Ok(ticket) => ticket,
                    Err(outcome) => return outcome,
                };
                let GenerationTicket { id, request } = ticket;
                let result = self.relay.generate(request).await;
                self.complete_generation(id, result)
            }
            Intent::SelectGalleryEntry(id) => self.select_gallery_entry(&id),
            Intent::ChangeModel(model_id) => self.change_model(&model_id),
        }
    }

    /// `Idle -> Validating -> Submitted`. Returns the outcome instead of a
    /// ticket when the request is ignored or fails locally.
    pub fn begin_generation(
        &mut self,
        request: GenerationRequest,
    ) -> std::result::Result<GenerationTicket, Outcome> {
        if let Phase::Submitted { generation_id } = self.phase {
            log::debug!("Ignoring generate while #{} is in flight", generation_id);
            return Err(Outcome::Ignored);
        }

        self.transition(Phase::Validating);
        if let Err(e) = self.validate_locally(&request) {
            log::warn!("Generation rejected locally: {}", e);
            return Err(self.finish(Err(e)));
        }

        let id = self.next_generation_id;
        self.next_generation_id += 1;
        self.transition(Phase::Submitted { generation_id: id });
        Ok(GenerationTicket { id, request })
    }

    /// `Submitted -> Succeeded | Failed -> Idle`. A result for anything but the
    /// in-flight generation is dropped.
    pub fn complete_generation(
        &mut self,
        generation_id: u64,
        result: Result<GenerationResult>,
    ) -> Outcome {
        match self.phase {
            Phase::Submitted { generation_id: current } if current == generation_id => {
                self.finish(result)
            }
            _ => {
                log::warn!("Dropping result of stale generation #{}", generation_id);
                Outcome::Ignored
            }
        }
    }

    fn validate_locally(&self, request: &GenerationRequest) -> Result<()> {
        validation::validate_prompt(&request.prompt)?;
        if self.catalog.is_empty() {
            return Err(RelayError::UpstreamUnavailable(
                "No model catalog is available".into(),
            ));
        }
        validation::validate_request(request, &self.catalog).map(|_| ())
    }

    fn finish(&mut self, result: Result<GenerationResult>) -> Outcome {
        let outcome = match result {
            Ok(result) => {
                self.transition(Phase::Succeeded);
                self.current = Some(result.clone());
                let evicted = self.gallery.push_front(GalleryEntry::from_result(&result));
                if !evicted.is_empty() {
                    log::debug!("Evicted {} gallery entries", evicted.len());
                }
                self.persist_gallery();
                Outcome::Succeeded(result)
            }
            Err(e) => {
                self.transition(Phase::Failed(e.kind()));
                log::warn!("Generation failed: {}", e);
                Outcome::failed(&e)
            }
        };
        self.transition(Phase::Idle);
        outcome
    }

    fn select_gallery_entry(&mut self, id: &Uuid) -> Outcome {
        match self.gallery.get(id) {
            Some(entry) => {
                let result = entry.to_result();
                self.current = Some(result.clone());
                Outcome::Selected(result)
            }
            None => Outcome::Rejected {
                message: "That image is no longer in the gallery".into(),
            },
        }
    }

    fn change_model(&mut self, model_id: &str) -> Outcome {
        match catalog::find_model(&self.catalog, model_id) {
            Some(model) => {
                let defaults = model.default_params;
                self.selected_model = Some(model.id.clone());
                log::debug!("Selected model {}", model_id);
                Outcome::ModelChanged {
                    model_id: model_id.to_string(),
                    defaults,
                }
            }
            None => Outcome::Rejected {
                message: format!("Unknown model '{}'", model_id),
            },
        }
    }

    fn transition(&mut self, next: Phase) {
        log::trace!("Session phase {:?} -> {:?}", self.phase, next);
        if matches!(next, Phase::Succeeded | Phase::Failed(_)) {
            self.last_phase = Some(next);
        }
        self.phase = next;
    }

    fn ensure_selected_model(&mut self) {
        let still_known = self
            .selected_model
            .as_deref()
            .map(|id| catalog::find_model(&self.catalog, id).is_some())
            .unwrap_or(false);
        if !still_known {
            self.selected_model = self.catalog.first().map(|model| model.id.clone());
        }
    }

    fn persist_gallery(&self) {
        let written = serde_json::to_string(&self.gallery)
            .map_err(RelayError::from)
            .and_then(|json| self.store.set(GALLERY_KEY, &json));
        if let Err(e) = written {
            log::warn!("Failed to persist gallery: {}", e);
        }
    }

    fn cache_catalog(&self, models: &[ModelDescriptor]) {
        let written = serde_json::to_string(models)
            .map_err(RelayError::from)
            .and_then(|json| self.store.set(CATALOG_KEY, &json));
        if let Err(e) = written {
            log::warn!("Failed to cache model catalog: {}", e);
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Terminal phase of the most recent generation, if any.
    pub fn last_phase(&self) -> Option<Phase> {
        self.last_phase
    }

    pub fn is_generating(&self) -> bool {
        matches!(self.phase, Phase::Submitted { .. })
    }

    pub fn current(&self) -> Option<&GenerationResult> {
        self.current.as_ref()
    }

    pub fn current_image(&self) -> Option<&str> {
        self.current.as_ref().map(|result| result.image.as_str())
    }

    pub fn gallery(&self) -> &[GalleryEntry] {
        self.gallery.entries()
    }

    pub fn models(&self) -> &[ModelDescriptor] {
        &self.catalog
    }

    pub fn catalog_status(&self) -> CatalogStatus {
        self.catalog_status
    }

    pub fn selected_model(&self) -> Option<&str> {
        self.selected_model.as_deref()
    }
}

/// Missing or unreadable galleries start empty.
fn load_gallery<S: KeyValueStore>(store: &S) -> Gallery {
    let raw = match store.get(GALLERY_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Gallery::new(),
        Err(e) => {
            log::warn!("Failed to read gallery, starting empty: {}", e);
            return Gallery::new();
        }
    };

    match serde_json::from_str::<Vec<GalleryEntry>>(&raw) {
        Ok(entries) => Gallery::from_entries(entries),
        Err(e) => {
            log::warn!("Stored gallery is corrupt, starting empty: {}", e);
            Gallery::new()
        }
    }
}

fn load_cached_catalog<S: KeyValueStore>(store: &S) -> Vec<ModelDescriptor> {
    match store.get(CATALOG_KEY) {
        Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
            log::warn!("Cached model catalog is corrupt: {}", e);
            Vec::new()
        }),
        Ok(None) => Vec::new(),
        Err(e) => {
            log::warn!("Failed to read cached model catalog: {}", e);
            Vec::new()
        }
    }
}
