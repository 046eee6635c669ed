//! ---
//! story_section: "01-core-functionality"
//! story_subsection: "module"
//! story_type: "source"
//! story_scope: "code"
//! story_description: "Shared primitives and utilities for the page runtime."
//! story_version: "v0.0.0-prealpha"
//! story_owner: "tbd"
//! ---
//! Core shared primitives for the R-Story workspace.
//! This crate exposes configuration loading and tracing initialisation
//! consumed across the workspace.

pub mod config;
pub mod logging;

pub use config::{
    AnimationSpec, LoadedStoryConfig, LoggingConfig, MediaKind, MediaPoolConfig, MediaSpec,
    MetricsConfig, PageRuntimeConfig, PageSpec, StoryConfig, StoryDocumentConfig,
};
pub use logging::{init_tracing, LogFormat};
