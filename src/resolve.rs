//! Variant resolution: which generated image serves each breakpoint.
//!
//! Given a responsive set, a primary image and optional per-breakpoint
//! override images, [`VariantResolver::resolve`] walks the set's breakpoints
//! in order and picks, for each one, the pre-generated variant of the chosen
//! source image.
//!
//! ## Baseline width (no upscaling)
//!
//! The primary image caps every breakpoint. If the host generated a variant
//! keyed by the set itself (`hero` for set `hero`), its width is the ceiling,
//! otherwise the primary image's natural width is. A breakpoint whose variant
//! is wider than the ceiling is skipped: the caller asked for more pixels
//! than the source holds. A primary image without any metadata has a ceiling
//! of `0`, which rejects every non-degenerate variant.
//!
//! ## Two kinds of skip
//!
//! | Situation | Result |
//! |-----------|--------|
//! | Source has no variant for the breakpoint | skipped, warning `Attachment <id>: missing image size "<set>:<breakpoint>"` |
//! | Variant is wider than the baseline | skipped silently |
//!
//! The first is a configuration problem worth surfacing in the markup; the
//! second is the normal outcome for small source images.
//!
//! ## Overrides
//!
//! An override replaces the primary image for one breakpoint only. Overrides
//! that do not resolve to an image, or name a breakpoint the set lacks, are
//! ignored without a warning.

use crate::cache::{BaseUrlCache, MetadataCache};
use crate::media::{ImageHandle, ImageId, ImageRef, MediaRepository, RenderContext};
use crate::registry::{ResponsiveSet, SizeRegistry};
use maud::html;
use std::collections::BTreeMap;
use std::fmt;

/// Caller-supplied replacement images, keyed by breakpoint.
pub type Overrides = BTreeMap<String, ImageRef>;

/// A non-fatal resolution problem, rendered as an HTML comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning(String);

impl Warning {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    /// The key is caller input and is HTML-escaped.
    pub fn unknown_size(set_key: &str) -> Self {
        let key = html! { (set_key) }.into_string();
        Self(format!("Unknown image size \"{key}\""))
    }

    pub fn missing_variant(image: ImageId, set_key: &str, breakpoint: &str) -> Self {
        Self(format!(
            "Attachment {image}: missing image size \"{set_key}:{breakpoint}\""
        ))
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The variant chosen for one breakpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVariant {
    pub breakpoint_key: String,
    pub width: u32,
    pub height: u32,
    pub source_image_id: ImageId,
    pub url: String,
}

/// Outcome of one resolution call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Resolved variants, in the set's breakpoint order.
    pub variants: Vec<ResolvedVariant>,
    pub warnings: Vec<Warning>,
}

impl Resolution {
    pub fn get(&self, breakpoint_key: &str) -> Option<&ResolvedVariant> {
        self.variants
            .iter()
            .find(|v| v.breakpoint_key == breakpoint_key)
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    fn warn(&mut self, warning: Warning) {
        tracing::debug!(%warning, "resolution warning");
        self.warnings.push(warning);
    }
}

/// Resolves responsive sets against the host media system.
///
/// Borrows everything it needs; building one per request is free.
pub struct VariantResolver<'a> {
    registry: &'a SizeRegistry,
    media: &'a dyn MediaRepository,
    metadata: &'a MetadataCache,
    base_urls: &'a BaseUrlCache,
    context: &'a dyn RenderContext,
}

impl<'a> VariantResolver<'a> {
    pub fn new(
        registry: &'a SizeRegistry,
        media: &'a dyn MediaRepository,
        metadata: &'a MetadataCache,
        base_urls: &'a BaseUrlCache,
        context: &'a dyn RenderContext,
    ) -> Self {
        Self {
            registry,
            media,
            metadata,
            base_urls,
            context,
        }
    }

    /// Resolve `set_key` for `primary`, honouring `overrides`.
    ///
    /// Never fails: an unknown set yields an empty resolution with a single
    /// warning.
    pub fn resolve(&self, set_key: &str, primary: ImageHandle, overrides: &Overrides) -> Resolution {
        let mut resolution = Resolution::default();
        let Some(set) = self.registry.find_set(set_key) else {
            resolution.warn(Warning::unknown_size(set_key));
            return resolution;
        };

        let baseline = self.baseline_width(set, primary);
        for option in set.breakpoints() {
            let source = overrides
                .get(&option.key)
                .and_then(|image| self.media.resolve_handle(image))
                .unwrap_or(primary);

            let variant = self
                .metadata
                .get(self.media, source.id)
                .and_then(|meta| meta.variant(&option.key).cloned());
            let Some(variant) = variant else {
                resolution.warn(Warning::missing_variant(source.id, set.key(), &option.key));
                continue;
            };

            if variant.width > baseline {
                tracing::debug!(
                    set = set.key(),
                    breakpoint = %option.key,
                    width = variant.width,
                    baseline,
                    "skipping variant wider than the source"
                );
                continue;
            }

            let base_url = self
                .base_urls
                .get(self.media, self.metadata, self.context, source.id);
            resolution.variants.push(ResolvedVariant {
                breakpoint_key: option.key.clone(),
                width: variant.width,
                height: variant.height,
                source_image_id: source.id,
                url: format!("{base_url}{}", variant.file),
            });
        }
        resolution
    }

    /// Width no breakpoint may exceed: the primary image's variant for the
    /// set itself, else its natural width, else `0`.
    fn baseline_width(&self, set: &ResponsiveSet, primary: ImageHandle) -> u32 {
        match self.metadata.get(self.media, primary.id) {
            Some(meta) => meta
                .variant(set.key())
                .map_or(meta.width, |variant| variant.width),
            None => 0,
        }
    }
}
