//! ---
//! story_section: "01-page-lifecycle"
//! story_subsection: "module"
//! story_type: "source"
//! story_scope: "code"
//! story_description: "Page lifecycle controller and its collaborators."
//! story_version: "v0.0.0-prealpha"
//! story_owner: "tbd"
//! ---
//! Advancement modes deciding when a page asks to move on.
//!
//! Every mode exposes the same three listener slots. A page controller wires
//! them to its navigation methods once, on build, and then only starts and
//! stops the advancement as it becomes active or inactive.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use r_story_common::PageRuntimeConfig;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::diagnostics::DiagnosticLog;
use crate::element::{attr, PageElement};
use crate::error::ElementError;

/// Whether an advance was requested by a timer or by the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceKind {
    Manual,
    Automatic,
}

impl AdvanceKind {
    pub fn is_automatic(self) -> bool {
        matches!(self, AdvanceKind::Automatic)
    }
}

/// Screen region tapped by the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapRegion {
    Previous,
    Next,
}

pub type PreviousListener = Arc<dyn Fn() + Send + Sync>;
pub type AdvanceListener = Arc<dyn Fn(AdvanceKind) + Send + Sync>;
pub type ProgressListener = Arc<dyn Fn(f64) + Send + Sync>;

/// Listener slots shared between an advancement and its background task.
#[derive(Default)]
pub struct Listeners {
    previous: RwLock<Vec<PreviousListener>>,
    advance: RwLock<Vec<AdvanceListener>>,
    progress: RwLock<Vec<ProgressListener>>,
}

impl Listeners {
    pub fn add_previous(&self, listener: PreviousListener) {
        self.previous.write().push(listener);
    }

    pub fn add_advance(&self, listener: AdvanceListener) {
        self.advance.write().push(listener);
    }

    pub fn add_progress(&self, listener: ProgressListener) {
        self.progress.write().push(listener);
    }

    pub fn on_previous(&self) {
        for listener in self.previous.read().iter() {
            listener();
        }
    }

    pub fn on_advance(&self, kind: AdvanceKind) {
        for listener in self.advance.read().iter() {
            listener(kind);
        }
    }

    pub fn on_progress(&self, progress: f64) {
        let progress = progress.clamp(0.0, 1.0);
        for listener in self.progress.read().iter() {
            listener(progress);
        }
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("previous", &self.previous.read().len())
            .field("advance", &self.advance.read().len())
            .field("progress", &self.progress.read().len())
            .finish()
    }
}

/// Source of previous/advance/progress signals for a single page.
pub trait AdvancementConfig: Send + Sync + fmt::Debug {
    fn add_previous_listener(&self, listener: PreviousListener);

    fn add_advance_listener(&self, listener: AdvanceListener);

    fn add_progress_listener(&self, listener: ProgressListener);

    fn start(&self);

    fn stop(&self);

    fn is_running(&self) -> bool;

    /// Feed a reader tap. Returns whether the tap was handled.
    fn tap(&self, _region: TapRegion) -> bool {
        false
    }
}

/// Advances only when the reader taps.
#[derive(Debug, Default)]
pub struct ManualAdvancement {
    listeners: Listeners,
    running: AtomicBool,
}

impl ManualAdvancement {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AdvancementConfig for ManualAdvancement {
    fn add_previous_listener(&self, listener: PreviousListener) {
        self.listeners.add_previous(listener);
    }

    fn add_advance_listener(&self, listener: AdvanceListener) {
        self.listeners.add_advance(listener);
    }

    fn add_progress_listener(&self, listener: ProgressListener) {
        self.listeners.add_progress(listener);
    }

    fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn tap(&self, region: TapRegion) -> bool {
        if !self.is_running() {
            return false;
        }
        match region {
            TapRegion::Previous => self.listeners.on_previous(),
            TapRegion::Next => self.listeners.on_advance(AdvanceKind::Manual),
        }
        true
    }
}

/// Advances automatically once a fixed duration elapsed, reporting progress
/// at a regular interval until then.
#[derive(Debug)]
pub struct TimeBasedAdvancement {
    duration: Duration,
    interval: Duration,
    listeners: Arc<Listeners>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TimeBasedAdvancement {
    pub fn new(duration: Duration, interval: Duration) -> Self {
        Self {
            duration,
            interval,
            listeners: Arc::new(Listeners::default()),
            task: Mutex::new(None),
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl AdvancementConfig for TimeBasedAdvancement {
    fn add_previous_listener(&self, listener: PreviousListener) {
        self.listeners.add_previous(listener);
    }

    fn add_advance_listener(&self, listener: AdvanceListener) {
        self.listeners.add_advance(listener);
    }

    fn add_progress_listener(&self, listener: ProgressListener) {
        self.listeners.add_progress(listener);
    }

    fn start(&self) {
        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }
        let Ok(handle) = Handle::try_current() else {
            warn!("no tokio runtime available; timed advancement not started");
            return;
        };
        let listeners = self.listeners.clone();
        let duration = self.duration;
        let period = self.interval;
        *task = Some(handle.spawn(async move {
            let started = Instant::now();
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let elapsed = started.elapsed();
                if elapsed >= duration {
                    listeners.on_progress(1.0);
                    debug!(?duration, "timed advancement elapsed");
                    listeners.on_advance(AdvanceKind::Automatic);
                    break;
                }
                listeners.on_progress(elapsed.as_secs_f64() / duration.as_secs_f64());
            }
        }));
    }

    fn stop(&self) {
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
        }
    }

    fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for TimeBasedAdvancement {
    fn drop(&mut self) {
        if let Some(handle) = self.task.get_mut().take() {
            handle.abort();
        }
    }
}

/// Fans every call out to several advancement modes.
#[derive(Debug)]
pub struct CompositeAdvancement {
    parts: Vec<Box<dyn AdvancementConfig>>,
}

impl CompositeAdvancement {
    pub fn new(parts: Vec<Box<dyn AdvancementConfig>>) -> Self {
        Self { parts }
    }
}

impl AdvancementConfig for CompositeAdvancement {
    fn add_previous_listener(&self, listener: PreviousListener) {
        for part in &self.parts {
            part.add_previous_listener(listener.clone());
        }
    }

    fn add_advance_listener(&self, listener: AdvanceListener) {
        for part in &self.parts {
            part.add_advance_listener(listener.clone());
        }
    }

    fn add_progress_listener(&self, listener: ProgressListener) {
        for part in &self.parts {
            part.add_progress_listener(listener.clone());
        }
    }

    fn start(&self) {
        self.parts.iter().for_each(|part| part.start());
    }

    fn stop(&self) {
        self.parts.iter().for_each(|part| part.stop());
    }

    fn is_running(&self) -> bool {
        self.parts.iter().any(|part| part.is_running())
    }

    fn tap(&self, region: TapRegion) -> bool {
        self.parts.iter().any(|part| part.tap(region))
    }
}

/// Chooses the advancement mode of a page.
pub trait AdvancementFactory: Send + Sync + fmt::Debug {
    fn create(
        &self,
        element: &dyn PageElement,
        config: &PageRuntimeConfig,
        diagnostics: &DiagnosticLog,
    ) -> Box<dyn AdvancementConfig>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultAdvancementFactory;

impl AdvancementFactory for DefaultAdvancementFactory {
    fn create(
        &self,
        element: &dyn PageElement,
        config: &PageRuntimeConfig,
        diagnostics: &DiagnosticLog,
    ) -> Box<dyn AdvancementConfig> {
        advancement_for_page(element, config, diagnostics)
    }
}

/// Manual taps everywhere; pages with a valid `auto-advance-after`, or a
/// configured default, also get a timer.
pub fn advancement_for_page(
    element: &dyn PageElement,
    config: &PageRuntimeConfig,
    diagnostics: &DiagnosticLog,
) -> Box<dyn AdvancementConfig> {
    let duration = match element.attribute(attr::AUTO_ADVANCE_AFTER) {
        None => config.default_advance_after,
        Some(raw) => match parse_duration_attr(&raw) {
            Some(duration) => Some(duration),
            None => {
                diagnostics.warn(ElementError::MalformedAttribute {
                    page: element.id().to_owned(),
                    attribute: attr::AUTO_ADVANCE_AFTER,
                    value: raw,
                });
                config.default_advance_after
            }
        },
    };

    let manual: Box<dyn AdvancementConfig> = Box::new(ManualAdvancement::new());
    let Some(duration) = duration else {
        return manual;
    };
    debug!(page = element.id(), ?duration, "page advances on a timer");
    let timer: Box<dyn AdvancementConfig> = Box::new(TimeBasedAdvancement::new(
        duration,
        config.progress_interval,
    ));
    Box::new(CompositeAdvancement::new(vec![timer, manual]))
}

/// Parse `"5s"`, `"1.5s"` or `"750ms"`.
pub fn parse_duration_attr(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Some(millis) = value.strip_suffix("ms") {
        return millis.trim().parse::<u64>().ok().map(Duration::from_millis);
    }
    let seconds = value.strip_suffix('s')?.trim().parse::<f64>().ok()?;
    // rejects negative, non-finite and out-of-range values
    Duration::try_from_secs_f64(seconds).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::StoryDocument;

    fn recorder() -> (Arc<Mutex<Vec<f64>>>, Arc<Mutex<Vec<AdvanceKind>>>) {
        (Arc::new(Mutex::new(Vec::new())), Arc::new(Mutex::new(Vec::new())))
    }

    #[test]
    fn parses_duration_attributes() {
        assert_eq!(parse_duration_attr("5s"), Some(Duration::from_secs(5)));
        assert_eq!(parse_duration_attr(" 750ms "), Some(Duration::from_millis(750)));
        assert_eq!(parse_duration_attr("1.5s"), Some(Duration::from_millis(1500)));
        assert_eq!(parse_duration_attr("soon"), None);
        assert_eq!(parse_duration_attr("-1s"), None);
        assert_eq!(parse_duration_attr("10"), None);
        assert_eq!(parse_duration_attr("1e20s"), None);
        assert_eq!(parse_duration_attr("infs"), None);
        assert_eq!(parse_duration_attr("99999999999999999999ms"), None);
    }

    #[test]
    fn manual_taps_only_count_while_running() {
        let advancement = ManualAdvancement::new();
        let (_, advances) = recorder();
        let sink = advances.clone();
        advancement.add_advance_listener(Arc::new(move |kind| sink.lock().push(kind)));

        assert!(!advancement.tap(TapRegion::Next));
        advancement.start();
        assert!(advancement.tap(TapRegion::Next));
        advancement.stop();
        assert!(!advancement.tap(TapRegion::Next));
        assert_eq!(*advances.lock(), vec![AdvanceKind::Manual]);
    }

    #[tokio::test(start_paused = true)]
    async fn timed_advancement_reports_increasing_progress_then_advances_once() {
        let advancement =
            TimeBasedAdvancement::new(Duration::from_millis(500), Duration::from_millis(100));
        let (progress, advances) = recorder();
        let progress_sink = progress.clone();
        let advance_sink = advances.clone();
        advancement.add_progress_listener(Arc::new(move |p| progress_sink.lock().push(p)));
        advancement.add_advance_listener(Arc::new(move |kind| advance_sink.lock().push(kind)));

        advancement.start();
        advancement.start();
        tokio::time::sleep(Duration::from_millis(1_000)).await;

        let progress = progress.lock().clone();
        assert!(progress.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(progress.last().copied(), Some(1.0));
        assert_eq!(*advances.lock(), vec![AdvanceKind::Automatic]);
        assert!(!advancement.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn stopping_the_timer_suppresses_the_advance() {
        let advancement =
            TimeBasedAdvancement::new(Duration::from_millis(500), Duration::from_millis(100));
        let (_, advances) = recorder();
        let sink = advances.clone();
        advancement.add_advance_listener(Arc::new(move |kind| sink.lock().push(kind)));

        advancement.start();
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(advancement.is_running());
        advancement.stop();
        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert!(advances.lock().is_empty());
        assert!(!advancement.is_running());
    }

    #[test]
    fn factory_falls_back_to_manual_on_malformed_timer() {
        let document = StoryDocument::new(None);
        let page = document.append_page("cover");
        page.set_attribute(attr::AUTO_ADVANCE_AFTER, "eventually");
        let diagnostics = DiagnosticLog::new();
        let advancement =
            advancement_for_page(&*page, &PageRuntimeConfig::default(), &diagnostics);
        advancement.start();
        assert!(advancement.tap(TapRegion::Previous));
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn oversized_timer_is_treated_as_malformed() {
        let document = StoryDocument::new(None);
        let page = document.append_page("cover");
        page.set_attribute(attr::AUTO_ADVANCE_AFTER, "1e20s");
        let diagnostics = DiagnosticLog::new();
        let advancement =
            advancement_for_page(&*page, &PageRuntimeConfig::default(), &diagnostics);
        advancement.start();
        assert!(advancement.tap(TapRegion::Next));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics.entries()[0].message.contains("1e20s"));
    }

    #[tokio::test(start_paused = true)]
    async fn configured_default_times_pages_without_attribute() {
        let document = StoryDocument::new(None);
        let page = document.append_page("cover");
        let config = PageRuntimeConfig {
            default_advance_after: Some(Duration::from_millis(300)),
            ..PageRuntimeConfig::default()
        };
        let advancement = advancement_for_page(&*page, &config, &DiagnosticLog::new());
        let (_, advances) = recorder();
        let sink = advances.clone();
        advancement.add_advance_listener(Arc::new(move |kind| sink.lock().push(kind)));

        advancement.start();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(*advances.lock(), vec![AdvanceKind::Automatic]);
        // manual taps stay available after the timer finished
        assert!(advancement.tap(TapRegion::Next));
    }
}
