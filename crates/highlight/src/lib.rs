//! Query matching and in-place DOM highlighting.
//!
//! - [`MatchLocator`] finds sorted, non-overlapping term hits in normalized text.
//! - [`NormalizedText`] maps those hits back to original byte offsets.
//! - [`DomHighlighter`] wraps hits in mark elements inside designated
//!   containers and restores the pristine content before every pass.

mod config;
mod error;
mod highlighter;
mod locate;
mod offsets;

pub use crate::config::{HighlightConfig, HighlightSettings, NormalizerConfig};
pub use crate::error::{ConfigError, HighlightError};
pub use crate::highlighter::{DomHighlighter, HighlightOutcome, HighlightRequest, Scope};
pub use crate::locate::{MatchLocator, locate};
pub use crate::offsets::NormalizedText;
