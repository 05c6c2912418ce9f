//! Source/target bindings between UI elements and a [`bus::QueryStore`].
//!
//! A source publishes query text to a channel. A target subscribes to a
//! channel, highlights its own subtree on every change, and reflects its
//! [`core_types::MatchState`] as boolean attributes on its root. Targets
//! share one [`HighlightHost`] per document.

mod controller;
mod error;
mod host;

pub use crate::controller::{Phase, Role, SyncBindingController};
pub use crate::error::BindingError;
pub use crate::host::HighlightHost;
