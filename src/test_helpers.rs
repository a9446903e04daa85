//! Shared test utilities for the rwd-image test suite.
//!
//! Provides a call-counting [`MediaRepository`] double, a metadata builder and
//! a ready-made `hero` registry.
//!
//! # Usage
//!
//! ```text
//! use crate::test_helpers::*;
//!
//! let media = CountingMedia::new(vec![(1, image(1600, &[("mobile", 400)]))]);
//! let registry = hero_registry();
//! // ... resolve against `media` ...
//! assert_eq!(media.fetches(1), 1);
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError};

use crate::media::{
    GeneratedVariant, ImageHandle, ImageId, ImageRef, MediaError, MediaRepository, Metadata,
};
use crate::registry::{SizeRegistry, Templates};

pub const BASE_URL: &str = "http://example.com/uploads";
pub const MOBILE_TEMPLATE: &str = r#"<source media="(max-width: 600px)" srcset="{src}">"#;
pub const DESKTOP_TEMPLATE: &str = r#"<img srcset="{src}" alt="{alt}" title="{title}">"#;

// =========================================================================
// Metadata builders
// =========================================================================

/// Metadata for a 4:3 image stored at `2024/05/photo.jpg` with one generated
/// variant per `(key, width)` pair, stored as `photo-<key>.jpg`.
pub fn image(width: u32, variants: &[(&str, u32)]) -> Metadata {
    Metadata {
        width,
        height: width * 3 / 4,
        file: "2024/05/photo.jpg".to_string(),
        alt: Some("A photo".to_string()),
        sizes: variants
            .iter()
            .map(|(key, w)| {
                (
                    key.to_string(),
                    GeneratedVariant {
                        width: *w,
                        height: w * 3 / 4,
                        file: format!("photo-{key}.jpg"),
                    },
                )
            })
            .collect::<BTreeMap<_, _>>(),
    }
}

// =========================================================================
// Registry fixtures
// =========================================================================

/// Set `hero` with breakpoints `mobile` (400x300) then `desktop` (1200x900).
pub fn hero_registry() -> SizeRegistry {
    let mut registry = SizeRegistry::new();
    registry
        .register_breakpoint(
            "hero",
            "mobile",
            &"400x300".into(),
            Templates {
                picture: Some(MOBILE_TEMPLATE.to_string()),
                background: Some(".hero { background-image: url({src}); }".to_string()),
                srcset: Some("{src} {w}w".to_string()),
                sizes: Some("(max-width: 600px) 100vw".to_string()),
            },
        )
        .unwrap();
    registry
        .register_breakpoint(
            "hero",
            "desktop",
            &"1200x900".into(),
            Templates {
                picture: Some(DESKTOP_TEMPLATE.to_string()),
                background: None,
                srcset: Some("{src} {w}w".to_string()),
                sizes: Some("80vw".to_string()),
            },
        )
        .unwrap();
    registry
}

// =========================================================================
// Counting media repository
// =========================================================================

/// In-memory [`MediaRepository`] that counts metadata fetches per image id.
/// Uses Mutex so it is Sync and can be shared across resolver threads.
#[derive(Default)]
pub struct CountingMedia {
    images: HashMap<ImageId, Metadata>,
    fetches: Mutex<HashMap<ImageId, usize>>,
}

impl CountingMedia {
    pub fn new(images: Vec<(ImageId, Metadata)>) -> Self {
        Self {
            images: images.into_iter().collect(),
            fetches: Mutex::new(HashMap::new()),
        }
    }

    /// Number of `metadata` calls made for `id`.
    pub fn fetches(&self, id: ImageId) -> usize {
        self.fetches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .copied()
            .unwrap_or(0)
    }
}

impl MediaRepository for CountingMedia {
    fn resolve_handle(&self, image: &ImageRef) -> Option<ImageHandle> {
        match image {
            ImageRef::Id(id) => self.images.contains_key(id).then_some(ImageHandle { id: *id }),
            ImageRef::Handle(handle) => self
                .images
                .contains_key(&handle.id)
                .then_some(*handle),
        }
    }

    fn metadata(&self, id: ImageId) -> Result<Metadata, MediaError> {
        *self
            .fetches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(id)
            .or_insert(0) += 1;
        self.images.get(&id).cloned().ok_or(MediaError::NotFound(id))
    }

    fn upload_base_url(&self) -> String {
        BASE_URL.to_string()
    }
}
