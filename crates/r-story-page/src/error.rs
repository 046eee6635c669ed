//! ---
//! story_section: "01-page-lifecycle"
//! story_subsection: "module"
//! story_type: "source"
//! story_scope: "code"
//! story_description: "Page lifecycle controller and its collaborators."
//! story_version: "v0.0.0-prealpha"
//! story_owner: "tbd"
//! ---
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PageError>;

/// Failures surfaced to the orchestrator by a page controller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PageError {
    #[error("page {page}: animation failed: {source}")]
    Animation {
        page: String,
        #[source]
        source: AnimationError,
    },
    #[error("page {page}: media task {op} aborted: {reason}")]
    MediaTask {
        page: String,
        op: &'static str,
        reason: String,
    },
}

/// Failures raised by an animation manager.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AnimationError {
    #[error("target {target} uses unknown preset '{preset}'")]
    UnknownPreset { target: String, preset: String },
    #[error("target {target} has invalid {attribute} '{value}'")]
    InvalidTiming {
        target: String,
        attribute: &'static str,
        value: String,
    },
    #[error("first frame for {target} failed: {reason}")]
    FirstFrame { target: String, reason: String },
}

/// Problems found while interpreting page attributes.
///
/// These never abort an operation; they are recorded as diagnostics and the
/// offending value is treated as absent.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ElementError {
    #[error("attribute {attribute} on page {page} is malformed: '{value}'")]
    MalformedAttribute {
        page: String,
        attribute: &'static str,
        value: String,
    },
    #[error("attribute {attribute} on page {page} targets unknown page '{target}'")]
    UnknownTarget {
        page: String,
        attribute: &'static str,
        target: String,
    },
}
