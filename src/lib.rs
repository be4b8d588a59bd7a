pub mod config;
pub mod error;
pub mod logger;
pub mod models;
pub mod relay;
#[cfg(feature = "server")]
pub mod server;
pub mod session;

#[cfg(test)]
mod testing;

pub use config::{Config, UpstreamConfig};
pub use error::{ErrorKind, RelayError, Result};
pub use models::{
    GalleryEntry, GenerationMetadata, GenerationParameters, GenerationRequest, GenerationResult,
    ModelDescriptor,
};
pub use relay::{HuggingFaceBackend, InferenceBackend, RelayService};
pub use session::{
    FileStore, HttpRelayClient, Intent, KeyValueStore, MemoryStore, Outcome, Phase, RelayApi,
    SessionController,
};
