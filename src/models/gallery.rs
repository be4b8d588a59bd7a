use super::generation::{GenerationMetadata, GenerationResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MAX_GALLERY_ENTRIES: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GalleryEntry {
    pub id: Uuid,
    pub image: String,
    pub metadata: GenerationMetadata,
    pub stored_at: DateTime<Utc>,
}

impl GalleryEntry {
    pub fn from_result(result: &GenerationResult) -> Self {
        Self {
            id: Uuid::new_v4(),
            image: result.image.clone(),
            metadata: result.metadata.clone(),
            stored_at: Utc::now(),
        }
    }

    pub fn to_result(&self) -> GenerationResult {
        GenerationResult {
            image: self.image.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

/// Most-recent-first collection, never longer than [`MAX_GALLERY_ENTRIES`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Gallery {
    entries: Vec<GalleryEntry>,
}

impl Gallery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopts a stored collection as-is, only enforcing the bound.
    pub fn from_entries(mut entries: Vec<GalleryEntry>) -> Self {
        entries.truncate(MAX_GALLERY_ENTRIES);
        Self { entries }
    }

    /// Inserts at the front and returns the entries evicted from the tail.
    pub fn push_front(&mut self, entry: GalleryEntry) -> Vec<GalleryEntry> {
        self.entries.insert(0, entry);
        if self.entries.len() > MAX_GALLERY_ENTRIES {
            self.entries.split_off(MAX_GALLERY_ENTRIES)
        } else {
            Vec::new()
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<&GalleryEntry> {
        self.entries.iter().find(|entry| &entry.id == id)
    }

    pub fn entries(&self) -> &[GalleryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
