//! ---
//! story_section: "02-media-coordination"
//! story_subsection: "module"
//! story_type: "source"
//! story_scope: "code"
//! story_description: "Media element contracts and pooled playback admission."
//! story_version: "v0.0.0-prealpha"
//! story_owner: "tbd"
//! ---
//! Media elements and the shared, capacity-bounded media pool used by story pages.

mod element;
mod error;
pub mod memory;
mod pool;

pub use element::{MediaElement, MediaOp, SharedMediaElement};
pub use error::{MediaError, Result};
pub use memory::{MemoryMediaElement, PlaybackState};
pub use pool::{BoundedMediaPool, MediaPool, SharedMediaPool};
pub use r_story_common::MediaKind;
