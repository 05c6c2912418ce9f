//! Text normalization for query matching: named transform presets, resolution
//! of caller-supplied normalizer specs, and memoized application.

pub mod builtin;

mod engine;
mod error;
mod options;
mod transform;

pub use crate::engine::NormalizationEngine;
pub use crate::error::NormalizeError;
pub use crate::options::HighlightOptions;
pub use crate::transform::{NormalizerSpec, NormalizerStep, Transform, TransformChain, TransformFn};
