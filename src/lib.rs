//! # rwd-image
//!
//! Responsive image markup from declared sizes. Sizes are declared once (a
//! width, a height, a crop mode, optional magnified variants and optional
//! per-breakpoint templates); at render time a named size is resolved against
//! a host media library into one pre-generated image variant per breakpoint
//! and rendered into `<picture>`, `<img srcset>` or background markup.
//!
//! # Architecture: Register, Resolve, Render
//!
//! ```text
//! 1. Register  sizes.toml        →  SizeRegistry      (once, at startup)
//! 2. Resolve   set + image(s)    →  Resolution        (variants + warnings)
//! 3. Render    Resolution        →  markup String     (templates + comments)
//! ```
//!
//! The registry is built once and only read afterwards. Resolution and
//! rendering never fail: every problem they meet becomes a [`resolve::Warning`]
//! that is rendered as an HTML comment in front of the markup.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`size`] | Raw size parsing, crop modes, magnified ("retina") variants |
//! | [`registry`] | Sizes, breakpoint options and ordered responsive sets |
//! | [`media`] | Host media library and request contracts, JSON-backed library |
//! | [`cache`] | Injectable get-or-compute caches for metadata and base URLs |
//! | [`resolve`] | The variant resolver: overrides, missing variants, no upscaling |
//! | [`render`] | Template substitution and markup rendering |
//! | [`engine`] | Resolve + render entry points, parallel batch rendering |
//! | [`config`] | Layered `sizes.toml` loading, validation, registry building |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## No Upscaling, Silently
//!
//! The primary image's own variant for the set (or its natural width) caps
//! every breakpoint. A breakpoint wider than that is dropped without a
//! warning: it is the expected outcome for small sources. A variant the host
//! never generated is a configuration problem and does warn.
//!
//! ## Explicit Collaborators
//!
//! Nothing reads ambient state. The registry, the media library and the
//! request context are passed in, and both caches sit behind the
//! [`cache::MemoCache`] trait so tests can count or disable lookups.
//!
//! ## Maud for Escaping
//!
//! Wrapper elements and attribute values go through
//! [Maud](https://maud.lambda.xyz/), so caller-supplied text is escaped
//! without a hand-written escaper.

pub mod cache;
pub mod config;
pub mod engine;
pub mod media;
pub mod output;
pub mod registry;
pub mod render;
pub mod resolve;
pub mod size;

#[cfg(test)]
pub(crate) mod test_helpers;
