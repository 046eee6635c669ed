//! ---
//! story_section: "02-media-coordination"
//! story_subsection: "module"
//! story_type: "source"
//! story_scope: "code"
//! story_description: "Media element contracts and pooled playback admission."
//! story_version: "v0.0.0-prealpha"
//! story_owner: "tbd"
//! ---
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MediaError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MediaError {
    #[error("media pool {slot} capacity of {limit} exhausted")]
    CapacityExhausted { slot: &'static str, limit: usize },
    #[error("media element {element} refused playback: {reason}")]
    Playback { element: String, reason: String },
}
