//! Collaborator contracts: the host media system and the current request.
//!
//! The engine never generates or stores image files. It reads metadata the
//! host media system already produced (natural dimensions plus one entry per
//! generated size) through [`MediaRepository`], and asks a [`RenderContext`]
//! whether the current request is secure.
//!
//! [`JsonMediaLibrary`] is a file-backed repository for the CLI and tests. It
//! reads a JSON media manifest:
//!
//! ```json
//! {
//!   "base_url": "http://example.com/uploads",
//!   "images": [
//!     {
//!       "id": 42,
//!       "file": "2024/05/dawn.jpg",
//!       "width": 1600,
//!       "height": 1200,
//!       "alt": "Dawn over the lake",
//!       "sizes": {
//!         "mobile": { "width": 400, "height": 300, "file": "dawn-400x300.jpg" }
//!       }
//!     }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Identifier of a host-managed image.
pub type ImageId = u64;

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Image {0} not found")]
    NotFound(ImageId),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A resolved reference to a host-managed image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageHandle {
    pub id: ImageId,
}

/// Anything a caller may use to point at an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImageRef {
    Id(ImageId),
    Handle(ImageHandle),
}

impl From<ImageId> for ImageRef {
    fn from(id: ImageId) -> Self {
        ImageRef::Id(id)
    }
}

impl From<ImageHandle> for ImageRef {
    fn from(handle: ImageHandle) -> Self {
        ImageRef::Handle(handle)
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageRef::Id(id) => write!(f, "{id}"),
            ImageRef::Handle(handle) => write!(f, "{}", handle.id),
        }
    }
}

/// One pre-generated rendition of an image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedVariant {
    pub width: u32,
    pub height: u32,
    /// Path relative to the image's base URL.
    pub file: String,
}

/// Everything the host knows about one image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Natural (full-size) width.
    pub width: u32,
    /// Natural (full-size) height.
    pub height: u32,
    /// Stored path of the original, relative to the upload base URL.
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    /// Generated variants keyed by size key.
    #[serde(default)]
    pub sizes: BTreeMap<String, GeneratedVariant>,
}

impl Metadata {
    pub fn variant(&self, size_key: &str) -> Option<&GeneratedVariant> {
        self.sizes.get(size_key)
    }

    /// Directory part of [`Metadata::file`], empty for files at the upload root.
    pub fn relative_dir(&self) -> &str {
        match self.file.rfind('/') {
            Some(pos) => self.file[..pos].trim_start_matches('/'),
            None => "",
        }
    }
}

/// The host media system, as seen by the engine.
///
/// Implementations must be shareable across threads: concurrent resolution
/// calls read from the same repository.
pub trait MediaRepository: Sync {
    /// Turn a caller-supplied reference into a handle, or `None` when it
    /// points at nothing.
    fn resolve_handle(&self, image: &ImageRef) -> Option<ImageHandle>;

    /// Fetch an image's metadata.
    fn metadata(&self, id: ImageId) -> Result<Metadata, MediaError>;

    /// Base URL all stored files are relative to.
    fn upload_base_url(&self) -> String;
}

/// The request a render happens in. Only used for the scheme upgrade of
/// base URLs.
pub trait RenderContext: Sync {
    fn is_secure_request(&self) -> bool;
    /// Host as sent by the client, including a port when non-default.
    fn current_host(&self) -> &str;
}

/// A plain [`RenderContext`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub secure: bool,
    pub host: String,
}

impl RequestContext {
    pub fn secure(host: impl Into<String>) -> Self {
        Self {
            secure: true,
            host: host.into(),
        }
    }

    pub fn insecure(host: impl Into<String>) -> Self {
        Self {
            secure: false,
            host: host.into(),
        }
    }
}

impl RenderContext for RequestContext {
    fn is_secure_request(&self) -> bool {
        self.secure
    }

    fn current_host(&self) -> &str {
        &self.host
    }
}

/// Media manifest entry: an image id plus its metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ManifestImage {
    id: ImageId,
    #[serde(flatten)]
    metadata: Metadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MediaManifest {
    base_url: String,
    #[serde(default)]
    images: Vec<ManifestImage>,
}

/// A [`MediaRepository`] backed by a JSON media manifest.
#[derive(Debug, Clone, Default)]
pub struct JsonMediaLibrary {
    base_url: String,
    images: HashMap<ImageId, Metadata>,
}

impl JsonMediaLibrary {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            images: HashMap::new(),
        }
    }

    /// Add or replace an image.
    pub fn insert(&mut self, id: ImageId, metadata: Metadata) {
        self.images.insert(id, metadata);
    }

    pub fn from_json(json: &str) -> Result<Self, MediaError> {
        let manifest: MediaManifest = serde_json::from_str(json)?;
        let mut library = Self::new(manifest.base_url);
        for image in manifest.images {
            library.insert(image.id, image.metadata);
        }
        Ok(library)
    }

    pub fn load(path: &Path) -> Result<Self, MediaError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

impl MediaRepository for JsonMediaLibrary {
    fn resolve_handle(&self, image: &ImageRef) -> Option<ImageHandle> {
        match image {
            ImageRef::Id(id) => self
                .images
                .contains_key(id)
                .then_some(ImageHandle { id: *id }),
            ImageRef::Handle(handle) => self
                .images
                .contains_key(&handle.id)
                .then_some(*handle),
        }
    }

    fn metadata(&self, id: ImageId) -> Result<Metadata, MediaError> {
        self.images.get(&id).cloned().ok_or(MediaError::NotFound(id))
    }

    fn upload_base_url(&self) -> String {
        self.base_url.clone()
    }
}
