//! Size definitions: parsing raw size parameters and deriving magnified variants.
//!
//! A size is a `(width, height, crop)` triple identified by a key. Callers
//! describe sizes loosely, in whichever form is convenient in a config file:
//!
//! ```text
//! "400x300"                       → 400 × 300, no crop
//! "400x300x1"                     → 400 × 300, cropped
//! [400, 300]                      → 400 × 300, no crop
//! [400, 300, true]                → 400 × 300, cropped
//! [400, 300, ["center", "top"]]   → 400 × 300, cropped from the top center
//! ```
//!
//! ## Coercion
//!
//! Width and height are coerced permissively: negative numbers and
//! non-numeric text become `0`, numeric text with trailing garbage
//! (`"400px"`) keeps its leading digits. Only structurally broken input is
//! rejected: a list with fewer than two entries, or a token without an `x`
//! between width and height.
//!
//! ## Magnification ("retina") variants
//!
//! [`SizeDefinition::derive_magnification`] scales a definition by a factor
//! and names the result `"<key> @<descriptor>"`, e.g. `"thumb @2x"`. The host
//! media system generates those variants alongside the base size so that
//! high-density displays can be served from them.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SizeError {
    #[error("Wrong size parameters passed for key '{key}': {reason}")]
    Validation { key: String, reason: String },
    #[error("Invalid magnification factor {factor} for '{key}' @{descriptor}")]
    Magnification {
        key: String,
        descriptor: String,
        factor: f64,
    },
}

/// Separator between width, height and crop in the token form (`"400x300"`).
const TOKEN_SEPARATOR: char = 'x';

/// One entry of a list-form size.
///
/// Config files put whatever is handy in a size list; every variant is
/// accepted and coerced when the list is parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawParam {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Position(Vec<String>),
}

impl From<u32> for RawParam {
    fn from(value: u32) -> Self {
        RawParam::Int(value.into())
    }
}

impl From<bool> for RawParam {
    fn from(value: bool) -> Self {
        RawParam::Bool(value)
    }
}

impl From<&str> for RawParam {
    fn from(value: &str) -> Self {
        RawParam::Text(value.to_string())
    }
}

/// Raw, unvalidated size parameters as supplied at registration time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawSize {
    /// `"<width>x<height>"`, optionally followed by `x<crop>`.
    Token(String),
    /// `[width, height]` or `[width, height, crop]`.
    List(Vec<RawParam>),
}

impl From<&str> for RawSize {
    fn from(value: &str) -> Self {
        RawSize::Token(value.to_string())
    }
}

impl From<(u32, u32)> for RawSize {
    fn from((w, h): (u32, u32)) -> Self {
        RawSize::List(vec![w.into(), h.into()])
    }
}

impl From<(u32, u32, bool)> for RawSize {
    fn from((w, h, crop): (u32, u32, bool)) -> Self {
        RawSize::List(vec![w.into(), h.into(), crop.into()])
    }
}

impl fmt::Display for RawSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawSize::Token(token) => write!(f, "\"{token}\""),
            RawSize::List(params) => write!(f, "{params:?}"),
        }
    }
}

/// Horizontal anchor of a positioned crop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Horizontal {
    Left,
    Center,
    Right,
}

/// Vertical anchor of a positioned crop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vertical {
    Top,
    Center,
    Bottom,
}

impl Horizontal {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "left" => Some(Self::Left),
            "center" => Some(Self::Center),
            "right" => Some(Self::Right),
            _ => None,
        }
    }
}

impl Vertical {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "top" => Some(Self::Top),
            "center" => Some(Self::Center),
            "bottom" => Some(Self::Bottom),
            _ => None,
        }
    }
}

/// How a generated variant is fitted to its box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CropSpec {
    /// Scale to fit inside the box, keeping the aspect ratio.
    #[default]
    Disabled,
    /// Fill the box exactly, cropping from the center.
    Enabled,
    /// Fill the box exactly, cropping from the given anchor.
    Positioned(Horizontal, Vertical),
}

impl CropSpec {
    pub fn is_cropped(self) -> bool {
        !matches!(self, CropSpec::Disabled)
    }

    fn from_param(param: Option<&RawParam>) -> Self {
        let Some(param) = param else {
            return CropSpec::Disabled;
        };
        match param {
            RawParam::Bool(b) => Self::flag(*b),
            RawParam::Int(n) => Self::flag(*n != 0),
            RawParam::Float(f) => Self::flag(*f != 0.0),
            RawParam::Text(s) => {
                let s = s.trim();
                Self::flag(s.eq_ignore_ascii_case("true") || leading_integer(s) > 0)
            }
            RawParam::Position(parts) => match parts.as_slice() {
                [h, v] => match (Horizontal::parse(h), Vertical::parse(v)) {
                    (Some(h), Some(v)) => CropSpec::Positioned(h, v),
                    _ => CropSpec::Enabled,
                },
                [] => CropSpec::Disabled,
                _ => CropSpec::Enabled,
            },
        }
    }

    fn flag(enabled: bool) -> Self {
        if enabled {
            CropSpec::Enabled
        } else {
            CropSpec::Disabled
        }
    }
}

impl fmt::Display for CropSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CropSpec::Disabled => write!(f, "fit"),
            CropSpec::Enabled => write!(f, "crop"),
            CropSpec::Positioned(h, v) => write!(f, "crop {h:?}/{v:?}"),
        }
    }
}

/// A validated, immutable size identified by a unique key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeDefinition {
    key: String,
    width: u32,
    height: u32,
    crop: CropSpec,
}

impl SizeDefinition {
    /// Build a definition directly from already-validated values.
    pub fn new(key: impl Into<String>, width: u32, height: u32, crop: CropSpec) -> Self {
        Self {
            key: key.into(),
            width,
            height,
            crop,
        }
    }

    /// Parse raw size parameters into a definition.
    ///
    /// Fails when a list has fewer than two entries or a token has no `x`
    /// separator. Everything else is coerced (see the [module docs](self)).
    pub fn parse(key: &str, raw: &RawSize) -> Result<Self, SizeError> {
        let params: Vec<RawParam> = match raw {
            RawSize::List(params) => {
                if params.len() < 2 {
                    return Err(SizeError::Validation {
                        key: key.to_string(),
                        reason: format!("expected [width, height, crop?], got {raw}"),
                    });
                }
                params.clone()
            }
            RawSize::Token(token) => {
                if !token.contains(TOKEN_SEPARATOR) {
                    return Err(SizeError::Validation {
                        key: key.to_string(),
                        reason: format!("expected \"<width>x<height>\", got {raw}"),
                    });
                }
                token
                    .split(TOKEN_SEPARATOR)
                    .map(|part| RawParam::Text(part.to_string()))
                    .collect()
            }
        };

        Ok(Self {
            key: key.to_string(),
            width: coerce_dimension(&params[0]),
            height: coerce_dimension(&params[1]),
            crop: CropSpec::from_param(params.get(2)),
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn crop(&self) -> CropSpec {
        self.crop
    }

    /// Derive a magnified variant: dimensions scaled by `factor`, same crop,
    /// keyed `"<key> @<descriptor>"`.
    pub fn derive_magnification(&self, descriptor: &str, factor: f64) -> Result<Self, SizeError> {
        if !factor.is_finite() || factor <= 0.0 {
            return Err(SizeError::Magnification {
                key: self.key.clone(),
                descriptor: descriptor.to_string(),
                factor,
            });
        }
        Ok(Self {
            key: magnification_key(&self.key, descriptor),
            width: scale(self.width, factor),
            height: scale(self.height, factor),
            crop: self.crop,
        })
    }
}

impl fmt::Display for SizeDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)?;
        if self.crop.is_cropped() {
            write!(f, " ({})", self.crop)?;
        }
        Ok(())
    }
}

/// Key under which the magnified variant of `key` is registered.
pub fn magnification_key(key: &str, descriptor: &str) -> String {
    format!("{key} @{descriptor}")
}

fn scale(value: u32, factor: f64) -> u32 {
    // Rounded, not truncated: 100 * 0.29 must not land on 28.
    (value as f64 * factor).round().min(u32::MAX as f64) as u32
}

fn coerce_dimension(param: &RawParam) -> u32 {
    match param {
        RawParam::Bool(b) => u32::from(*b),
        RawParam::Int(n) => (*n).clamp(0, u32::MAX as i64) as u32,
        RawParam::Float(f) if f.is_finite() && *f > 0.0 => f.min(u32::MAX as f64) as u32,
        RawParam::Float(_) => 0,
        RawParam::Text(s) => leading_integer(s),
        RawParam::Position(_) => 0,
    }
}

/// Leading decimal digits of `s` as a number; `0` when there are none or
/// the value is negative.
fn leading_integer(s: &str) -> u32 {
    let s = s.trim();
    let s = s.strip_prefix('+').unwrap_or(s);
    let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return 0;
    }
    digits.parse::<u64>().map_or(u32::MAX, |n| n.min(u32::MAX as u64) as u32)
}
