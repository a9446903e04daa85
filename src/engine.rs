//! Render entry points: resolve plus render in one call.
//!
//! [`ResponsiveImages`] owns everything a render needs that outlives a
//! request (the registry, the media repository and both caches) and takes
//! the request itself as a [`RenderContext`] argument. It is `Sync`, so one
//! engine serves every thread of a host; [`ResponsiveImages::render_batch`]
//! uses that to render many requests on the current rayon pool.
//!
//! ```text
//! RenderRequest ──► resolve_handle ──► VariantResolver ──► render_picture
//!   (size, image,      (primary)        (per breakpoint)    render_img
//!    overrides, ...)                                        render_background
//! ```

use crate::cache::{BaseUrlCache, CacheStats, MetadataCache};
use crate::media::{ImageHandle, ImageRef, MediaRepository, RenderContext};
use crate::registry::{ResponsiveSet, SizeRegistry};
use crate::render::{self, PictureAttributes};
use crate::resolve::{Overrides, Resolution, VariantResolver};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Caller-supplied attributes. Anything left out gets a default: the class
/// is derived from the size key, alt text comes from the primary image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Attributes {
    pub class: Option<String>,
    pub alt: Option<String>,
    pub title: Option<String>,
}

/// Which markup a request renders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderFormat {
    #[default]
    Picture,
    Img,
    Background,
}

/// One render call, as read from a batch file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RenderRequest {
    pub size: String,
    pub image: ImageRef,
    #[serde(default)]
    pub overrides: Overrides,
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default)]
    pub format: RenderFormat,
}

type Renderer = fn(&Resolution, &ResponsiveSet, &PictureAttributes) -> String;

pub struct ResponsiveImages<M> {
    registry: SizeRegistry,
    media: M,
    metadata: MetadataCache,
    base_urls: BaseUrlCache,
}

impl<M: MediaRepository> ResponsiveImages<M> {
    pub fn new(registry: SizeRegistry, media: M) -> Self {
        Self::with_caches(registry, media, MetadataCache::new(), BaseUrlCache::new())
    }

    pub fn with_caches(
        registry: SizeRegistry,
        media: M,
        metadata: MetadataCache,
        base_urls: BaseUrlCache,
    ) -> Self {
        Self {
            registry,
            media,
            metadata,
            base_urls,
        }
    }

    pub fn registry(&self) -> &SizeRegistry {
        &self.registry
    }

    pub fn media(&self) -> &M {
        &self.media
    }

    pub fn metadata_stats(&self) -> CacheStats {
        self.metadata.stats()
    }

    pub fn resolver<'a>(&'a self, context: &'a dyn RenderContext) -> VariantResolver<'a> {
        VariantResolver::new(
            &self.registry,
            &self.media,
            &self.metadata,
            &self.base_urls,
            context,
        )
    }

    /// Resolve `set_key` for `image`. `None` when `image` does not resolve to
    /// a host image.
    pub fn resolve(
        &self,
        set_key: &str,
        image: &ImageRef,
        overrides: &Overrides,
        context: &dyn RenderContext,
    ) -> Option<Resolution> {
        let primary = self.media.resolve_handle(image)?;
        Some(self.resolver(context).resolve(set_key, primary, overrides))
    }

    /// `<picture>` markup for `image` at `set_key`.
    ///
    /// An image that does not resolve renders as the empty string. An unknown
    /// size renders as its warning comment only.
    pub fn render_responsive_image(
        &self,
        set_key: &str,
        image: &ImageRef,
        overrides: &Overrides,
        attributes: &Attributes,
        context: &dyn RenderContext,
    ) -> String {
        self.render_with(set_key, image, overrides, attributes, context, render::render_picture)
    }

    /// A single `<img srcset=... sizes=...>` for `image` at `set_key`.
    pub fn render_img(
        &self,
        set_key: &str,
        image: &ImageRef,
        overrides: &Overrides,
        attributes: &Attributes,
        context: &dyn RenderContext,
    ) -> String {
        self.render_with(set_key, image, overrides, attributes, context, render::render_img)
    }

    /// Background rules for `image` at `set_key`.
    pub fn render_background(
        &self,
        set_key: &str,
        image: &ImageRef,
        overrides: &Overrides,
        attributes: &Attributes,
        context: &dyn RenderContext,
    ) -> String {
        self.render_with(
            set_key,
            image,
            overrides,
            attributes,
            context,
            render::render_background,
        )
    }

    pub fn render(&self, request: &RenderRequest, context: &dyn RenderContext) -> String {
        let renderer: Renderer = match request.format {
            RenderFormat::Picture => render::render_picture,
            RenderFormat::Img => render::render_img,
            RenderFormat::Background => render::render_background,
        };
        self.render_with(
            &request.size,
            &request.image,
            &request.overrides,
            &request.attributes,
            context,
            renderer,
        )
    }

    /// Render every request in parallel on the current rayon pool. Output
    /// order matches input order.
    pub fn render_batch(
        &self,
        requests: &[RenderRequest],
        context: &dyn RenderContext,
    ) -> Vec<String> {
        requests
            .par_iter()
            .map(|request| self.render(request, context))
            .collect()
    }

    fn render_with(
        &self,
        set_key: &str,
        image: &ImageRef,
        overrides: &Overrides,
        attributes: &Attributes,
        context: &dyn RenderContext,
        renderer: Renderer,
    ) -> String {
        let Some(primary) = self.media.resolve_handle(image) else {
            tracing::debug!(size = set_key, %image, "image does not resolve, rendering nothing");
            return String::new();
        };
        let resolution = self.resolver(context).resolve(set_key, primary, overrides);
        let Some(set) = self.registry.find_set(set_key) else {
            return render::warnings_comment(&resolution.warnings);
        };
        let attrs = self.picture_attributes(set_key, primary, attributes);
        renderer(&resolution, set, &attrs)
    }

    fn picture_attributes(
        &self,
        set_key: &str,
        primary: ImageHandle,
        attributes: &Attributes,
    ) -> PictureAttributes {
        let defaults = PictureAttributes::for_size(set_key);
        let alt = match &attributes.alt {
            Some(alt) => alt.clone(),
            None => self
                .metadata
                .get(&self.media, primary.id)
                .and_then(|meta| meta.alt.as_deref().map(default_alt))
                .unwrap_or_default(),
        };
        PictureAttributes {
            class: attributes.class.clone().unwrap_or(defaults.class),
            alt,
            title: attributes.title.clone().unwrap_or_default(),
        }
    }
}

/// Image alt text as usable attribute text: tags stripped, then trimmed.
fn default_alt(alt: &str) -> String {
    render::strip_tags(alt).trim().to_string()
}
