pub mod catalog;
pub mod common;
pub mod gallery;
pub mod generation;

pub use catalog::{CatalogSummary, DefaultParams, ModelDescriptor, UiModel};
pub use common::*;
pub use gallery::{Gallery, GalleryEntry, MAX_GALLERY_ENTRIES};
pub use generation::*;
