//! ---
//! story_section: "03-logging-metrics"
//! story_subsection: "module"
//! story_type: "source"
//! story_scope: "code"
//! story_description: "Structured logging adapters and sinks."
//! story_version: "v0.0.0-prealpha"
//! story_owner: "tbd"
//! ---
#![warn(missing_docs)]

use tracing::Level;
use tracing_subscriber::{fmt as subscriber_fmt, prelude::*, EnvFilter, Registry};

/// Context-carrying logging macros.
pub mod macros;

#[doc(hidden)]
pub use tracing as __tracing;

/// Initialize a baseline tracing subscriber suitable for development.
pub fn init() {
    let _ = Registry::default()
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(subscriber_fmt::layer())
        .try_init();
}

/// Structured logging context propagated by the convenience macros.
#[derive(Debug, Default, Clone)]
pub struct LogContext<'a> {
    /// Story the page belongs to.
    pub story: Option<&'a str>,
    /// Page identifier associated with the log event.
    pub page: Option<&'a str>,
    /// Hop count from the visible page.
    pub distance: Option<u32>,
    /// Lifecycle phase (build, layout, activate, ...).
    pub phase: Option<&'a str>,
}

impl<'a> LogContext<'a> {
    /// Create an empty logging context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a story identifier.
    pub fn with_story(mut self, story: &'a str) -> Self {
        self.story = Some(story);
        self
    }

    /// Attach a page identifier.
    pub fn with_page(mut self, page: &'a str) -> Self {
        self.page = Some(page);
        self
    }

    /// Attach a distance value.
    pub fn with_distance(mut self, distance: u32) -> Self {
        self.distance = Some(distance);
        self
    }

    /// Attach a lifecycle phase descriptor.
    pub fn with_phase(mut self, phase: &'a str) -> Self {
        self.phase = Some(phase);
        self
    }
}

/// High-level outcome used when emitting lifecycle log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleOutcome {
    /// The transition completed.
    Success,
    /// The transition was skipped because it was already applied.
    Skipped,
    /// The transition failed or was aborted.
    Fault,
}

impl LifecycleOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            LifecycleOutcome::Success => "success",
            LifecycleOutcome::Skipped => "skipped",
            LifecycleOutcome::Fault => "fault",
        }
    }
}

/// Emit a standardized page lifecycle event with an outcome.
pub fn log_lifecycle_event(
    context: Option<&LogContext>,
    event: &str,
    message: &str,
    outcome: LifecycleOutcome,
) {
    let ctx = context.cloned().unwrap_or_default();
    macro_rules! emit {
        ($level:expr) => {
            tracing::event!(
                $level,
                event,
                outcome = outcome.as_str(),
                story = ctx.story.unwrap_or(""),
                page = ctx.page.unwrap_or(""),
                distance = ctx.distance.unwrap_or_default(),
                phase = ctx.phase.unwrap_or(""),
                message = %message
            )
        };
    }
    match outcome {
        LifecycleOutcome::Success => emit!(Level::INFO),
        LifecycleOutcome::Skipped => emit!(Level::DEBUG),
        LifecycleOutcome::Fault => emit!(Level::ERROR),
    }
}
