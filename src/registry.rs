//! Size registry: every registered size, breakpoint option and responsive set.
//!
//! The registry is built once at startup (usually from [`crate::config`]) and
//! then only read. It holds three tables:
//!
//! | Table | Key | Value |
//! |-------|-----|-------|
//! | sizes | size key, including `"<key> @<descriptor>"` magnifications | [`SizeDefinition`] |
//! | options | breakpoint key | [`BreakpointOption`] |
//! | sets | top-level size key | [`ResponsiveSet`] |
//!
//! ## Duplicate keys
//!
//! Registration never rejects a duplicate key: the last registration under a
//! key replaces the previous one in the sizes and options tables, and a
//! breakpoint re-registered within a set replaces its earlier entry in
//! place (keeping its original position). Downstream configs rely on being
//! able to redefine a size by registering it again.

use crate::size::{RawSize, SizeDefinition, SizeError};
use std::collections::{BTreeMap, HashMap};

/// Optional per-breakpoint templates. An absent template means "do not render
/// this aspect for this breakpoint".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Templates {
    /// One line inside `<picture>`, e.g. `<source media="..." srcset="{src}">`.
    pub picture: Option<String>,
    /// One background rule, e.g. a CSS media query with `url("{src}")`.
    pub background: Option<String>,
    /// One `srcset` candidate, e.g. `{src} {w}w`.
    pub srcset: Option<String>,
    /// One `sizes` entry, e.g. `(max-width: 600px) 100vw`.
    pub sizes: Option<String>,
}

impl Templates {
    pub fn picture(template: impl Into<String>) -> Self {
        Self {
            picture: Some(template.into()),
            ..Self::default()
        }
    }
}

/// One breakpoint of a responsive set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakpointOption {
    pub key: String,
    pub size: SizeDefinition,
    pub templates: Templates,
}

/// A named, ordered group of breakpoints. Order is markup emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponsiveSet {
    key: String,
    breakpoints: Vec<BreakpointOption>,
}

impl ResponsiveSet {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            breakpoints: Vec::new(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn breakpoints(&self) -> &[BreakpointOption] {
        &self.breakpoints
    }

    pub fn get(&self, breakpoint_key: &str) -> Option<&BreakpointOption> {
        self.breakpoints.iter().find(|b| b.key == breakpoint_key)
    }

    pub fn len(&self) -> usize {
        self.breakpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakpoints.is_empty()
    }

    /// Append a breakpoint, or replace the one with the same key in place.
    fn insert(&mut self, option: BreakpointOption) {
        match self.breakpoints.iter_mut().find(|b| b.key == option.key) {
            Some(existing) => *existing = option,
            None => self.breakpoints.push(option),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SizeRegistry {
    sizes: HashMap<String, SizeDefinition>,
    options: HashMap<String, BreakpointOption>,
    sets: HashMap<String, ResponsiveSet>,
}

impl SizeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plain size plus one magnified variant per descriptor.
    ///
    /// All factors are checked before anything is inserted, so a failed
    /// registration leaves the registry untouched.
    pub fn register_size(
        &mut self,
        key: &str,
        raw: &RawSize,
        magnifications: &BTreeMap<String, f64>,
    ) -> Result<SizeDefinition, SizeError> {
        let size = SizeDefinition::parse(key, raw)?;
        let derived = magnifications
            .iter()
            .map(|(descriptor, factor)| size.derive_magnification(descriptor, *factor))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(key, %size, magnifications = derived.len(), "registered size");
        self.sizes.insert(size.key().to_string(), size.clone());
        for variant in derived {
            self.sizes.insert(variant.key().to_string(), variant);
        }
        Ok(size)
    }

    /// Register a breakpoint option on its own, outside any set.
    pub fn register(
        &mut self,
        breakpoint_key: &str,
        raw: &RawSize,
        templates: Templates,
    ) -> Result<BreakpointOption, SizeError> {
        let size = SizeDefinition::parse(breakpoint_key, raw)?;
        let option = BreakpointOption {
            key: breakpoint_key.to_string(),
            size: size.clone(),
            templates,
        };
        self.sizes.insert(breakpoint_key.to_string(), size);
        self.options
            .insert(breakpoint_key.to_string(), option.clone());
        Ok(option)
    }

    /// Group breakpoint options under a set key, replacing any previous set
    /// with that key.
    pub fn register_set(
        &mut self,
        set_key: &str,
        options: Vec<BreakpointOption>,
    ) -> &ResponsiveSet {
        let mut set = ResponsiveSet::new(set_key);
        for option in options {
            set.insert(option);
        }
        tracing::debug!(set = set_key, breakpoints = set.len(), "registered set");
        self.sets.insert(set_key.to_string(), set);
        &self.sets[set_key]
    }

    /// Register a breakpoint and append it to `set_key`, creating the set on
    /// first use.
    pub fn register_breakpoint(
        &mut self,
        set_key: &str,
        breakpoint_key: &str,
        raw: &RawSize,
        templates: Templates,
    ) -> Result<BreakpointOption, SizeError> {
        let option = self.register(breakpoint_key, raw, templates)?;
        self.sets
            .entry(set_key.to_string())
            .or_insert_with(|| ResponsiveSet::new(set_key))
            .insert(option.clone());
        tracing::debug!(set = set_key, breakpoint = breakpoint_key, "registered breakpoint");
        Ok(option)
    }

    pub fn find_set(&self, set_key: &str) -> Option<&ResponsiveSet> {
        self.sets.get(set_key)
    }

    pub fn size(&self, key: &str) -> Option<&SizeDefinition> {
        self.sizes.get(key)
    }

    pub fn option(&self, breakpoint_key: &str) -> Option<&BreakpointOption> {
        self.options.get(breakpoint_key)
    }

    /// All registered sizes, sorted by key.
    pub fn sizes(&self) -> Vec<&SizeDefinition> {
        let mut sizes: Vec<_> = self.sizes.values().collect();
        sizes.sort_by(|a, b| a.key().cmp(b.key()));
        sizes
    }

    /// All responsive sets, sorted by key.
    pub fn sets(&self) -> Vec<&ResponsiveSet> {
        let mut sets: Vec<_> = self.sets.values().collect();
        sets.sort_by(|a, b| a.key().cmp(b.key()));
        sets
    }
}
