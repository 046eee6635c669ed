//! ---
//! story_section: "03-logging-metrics"
//! story_subsection: "module"
//! story_type: "source"
//! story_scope: "code"
//! story_description: "Structured logging adapters and sinks."
//! story_version: "v0.0.0-prealpha"
//! story_owner: "tbd"
//! ---
//! Level-specific logging macros carrying a [`LogContext`](crate::LogContext).
//!
//! ```ignore
//! story_debug!(context = LogContext::new().with_page("cover"), "distance set to {}", 2);
//! story_warn!("pool not resolved yet");
//! ```

#[doc(hidden)]
#[macro_export]
macro_rules! __story_event {
    ($level:expr, context = $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        $crate::__tracing::event!(
            $level,
            story = ctx.story.unwrap_or(""),
            page = ctx.page.unwrap_or(""),
            distance = ctx.distance.unwrap_or_default(),
            phase = ctx.phase.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
    ($level:expr, $($arg:tt)+) => {{
        $crate::__tracing::event!($level, message = %format_args!($($arg)+));
    }};
}

/// Info-level event, optionally prefixed with `context = <LogContext>`.
#[macro_export]
macro_rules! story_info {
    ($($arg:tt)+) => {
        $crate::__story_event!($crate::__tracing::Level::INFO, $($arg)+)
    };
}

/// Debug-level event, optionally prefixed with `context = <LogContext>`.
#[macro_export]
macro_rules! story_debug {
    ($($arg:tt)+) => {
        $crate::__story_event!($crate::__tracing::Level::DEBUG, $($arg)+)
    };
}

/// Warn-level event, optionally prefixed with `context = <LogContext>`.
#[macro_export]
macro_rules! story_warn {
    ($($arg:tt)+) => {
        $crate::__story_event!($crate::__tracing::Level::WARN, $($arg)+)
    };
}

/// Error-level event, optionally prefixed with `context = <LogContext>`.
#[macro_export]
macro_rules! story_error {
    ($($arg:tt)+) => {
        $crate::__story_event!($crate::__tracing::Level::ERROR, $($arg)+)
    };
}
