//! ---
//! story_section: "01-page-lifecycle"
//! story_subsection: "module"
//! story_type: "source"
//! story_scope: "code"
//! story_description: "Page lifecycle controller and its collaborators."
//! story_version: "v0.0.0-prealpha"
//! story_owner: "tbd"
//! ---
//! Lifecycle controller owning one story page.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future;
use parking_lot::Mutex;
use r_story_common::PageRuntimeConfig;
use r_story_logging::{log_lifecycle_event, story_debug, LifecycleOutcome, LogContext};
use r_story_media::MediaOp;
use r_story_metrics::PageMetrics;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use url::Url;

use crate::advancement::{AdvancementConfig, AdvancementFactory, DefaultAdvancementFactory};
use crate::animation::{AnimationGate, AnimationManagerFactory, SequencedAnimationFactory};
use crate::diagnostics::DiagnosticLog;
use crate::element::{attr, SharedPageElement};
use crate::error::{PageError, Result};
use crate::events::{EventSink, PageEvent};
use crate::media::{LifecycleTasks, MediaCoordinator, MediaTask, PendingMediaPool};
use crate::navigation::PageNavigator;

/// Pages at most this many steps away preload their media.
pub const PRELOAD_WINDOW: u32 = 2;

const PRELOAD_AUTO: &str = "auto";

#[derive(Debug, Clone, Copy, Default)]
struct PageState {
    active: bool,
    distance: u32,
}

/// Builder wiring a [`PageController`] to its collaborators.
#[derive(Debug)]
pub struct PageControllerBuilder {
    element: SharedPageElement,
    pending_pool: PendingMediaPool,
    events: EventSink,
    runtime: PageRuntimeConfig,
    animation_factory: Arc<dyn AnimationManagerFactory>,
    advancement_factory: Arc<dyn AdvancementFactory>,
    story_url: Option<Url>,
    metrics: Option<PageMetrics>,
}

impl PageControllerBuilder {
    /// Runtime knobs such as development mode and the media load timeout.
    pub fn runtime_config(mut self, runtime: PageRuntimeConfig) -> Self {
        self.runtime = runtime;
        self
    }

    pub fn animation_factory(mut self, factory: Arc<dyn AnimationManagerFactory>) -> Self {
        self.animation_factory = factory;
        self
    }

    pub fn advancement_factory(mut self, factory: Arc<dyn AdvancementFactory>) -> Self {
        self.advancement_factory = factory;
        self
    }

    pub fn story_url(mut self, url: Option<Url>) -> Self {
        self.story_url = url;
        self
    }

    pub fn metrics(mut self, metrics: PageMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build the controller.
    ///
    /// Media discovery starts immediately. Must be called from within a
    /// tokio runtime for readiness tracking to make progress on its own.
    pub fn build(self) -> PageController {
        let element = self.element;
        let page_id = element.id().to_owned();
        let diagnostics = DiagnosticLog::new();
        let ctx = LogContext::new().with_page(&page_id).with_phase("build");

        for media in element.media_elements() {
            media.set_attribute(attr::PRELOAD, PRELOAD_AUTO);
        }

        let media = MediaCoordinator::new(
            element.clone(),
            self.pending_pool,
            self.runtime.media_load_timeout,
            diagnostics.clone(),
        );
        let readiness_watch = Handle::try_current().ok().map(|handle| {
            let ready = media.ready();
            let page_id = page_id.clone();
            handle.spawn(async move {
                ready.await;
                story_debug!(context = LogContext::new().with_page(&page_id), "media ready");
            })
        });

        let animations = AnimationGate::for_page(
            &element,
            self.animation_factory.as_ref(),
            self.story_url.as_ref(),
        );
        let advancement =
            self.advancement_factory
                .create(element.as_ref(), &self.runtime, &diagnostics);

        let navigator = PageNavigator::new(element.clone(), self.events.clone(), diagnostics.clone())
            .with_metrics(self.metrics.clone());
        wire_advancement(advancement.as_ref(), &navigator, &self.events, &page_id);

        let state = PageState {
            active: element.has_attribute(attr::ACTIVE),
            distance: element
                .attribute(attr::DISTANCE)
                .and_then(|value| value.trim().parse().ok())
                .unwrap_or_default(),
        };

        story_debug!(
            context = ctx,
            "page built (media: {}, animated: {})",
            media.media_elements().len(),
            animations.is_present()
        );

        PageController {
            element,
            navigator,
            media,
            animations,
            advancement,
            events: self.events,
            diagnostics,
            runtime: self.runtime,
            story_url: self.story_url,
            metrics: self.metrics,
            state: Mutex::new(state),
            dev_log_reported: AtomicBool::new(false),
            readiness_watch,
        }
    }
}

fn wire_advancement(
    advancement: &dyn AdvancementConfig,
    navigator: &PageNavigator,
    events: &EventSink,
    page_id: &str,
) {
    let previous = navigator.clone();
    advancement.add_previous_listener(Arc::new(move || previous.previous()));

    let next = navigator.clone();
    advancement.add_advance_listener(Arc::new(move |kind| next.next(kind.is_automatic())));

    let sink = events.clone();
    let page_id = page_id.to_owned();
    advancement.add_progress_listener(Arc::new(move |progress| {
        sink.emit(PageEvent::Progress {
            page_id: page_id.clone(),
            progress: progress.clamp(0.0, 1.0),
        })
    }));
}

/// Governs one page as it becomes active, inactive or moves relative to the
/// visible page.
///
/// Lifecycle transitions return the [`LifecycleTasks`] they spawned so that
/// callers may wait for the media pool to apply them; dropping the handles
/// does not cancel anything. Transition methods spawn tasks and therefore
/// must run inside a tokio runtime.
#[derive(Debug)]
pub struct PageController {
    element: SharedPageElement,
    navigator: PageNavigator,
    media: MediaCoordinator,
    animations: AnimationGate,
    advancement: Box<dyn AdvancementConfig>,
    events: EventSink,
    diagnostics: DiagnosticLog,
    runtime: PageRuntimeConfig,
    story_url: Option<Url>,
    metrics: Option<PageMetrics>,
    state: Mutex<PageState>,
    dev_log_reported: AtomicBool,
    readiness_watch: Option<JoinHandle<()>>,
}

impl PageController {
    /// Start building a controller for `element`.
    pub fn builder(
        element: SharedPageElement,
        pending_pool: PendingMediaPool,
        events: EventSink,
    ) -> PageControllerBuilder {
        PageControllerBuilder {
            element,
            pending_pool,
            events,
            runtime: PageRuntimeConfig::default(),
            animation_factory: Arc::new(SequencedAnimationFactory),
            advancement_factory: Arc::new(DefaultAdvancementFactory),
            story_url: None,
            metrics: None,
        }
    }

    pub fn page_id(&self) -> &str {
        self.element.id()
    }

    pub fn element(&self) -> &SharedPageElement {
        &self.element
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().active
    }

    pub fn distance(&self) -> u32 {
        self.state.lock().distance
    }

    /// Mute all media, then wait for the first animation frame and the media pool.
    pub async fn layout(&self) -> Result<()> {
        self.mute_all_media().detach();

        let first_frame = async {
            self.animations
                .apply_first_frame()
                .await
                .map_err(|source| PageError::Animation {
                    page: self.page_id().to_owned(),
                    source,
                })
        };
        let pool = async {
            self.media.pool().await;
            Ok::<(), PageError>(())
        };

        let ctx = self.log_context("layout");
        match future::try_join(first_frame, pool).await {
            Ok(_) => {
                log_lifecycle_event(Some(&ctx), "page.layout", "layout complete", LifecycleOutcome::Success);
                Ok(())
            }
            Err(err) => {
                log_lifecycle_event(Some(&ctx), "page.layout", &err.to_string(), LifecycleOutcome::Fault);
                Err(err)
            }
        }
    }

    /// Activate or deactivate the page.
    pub fn set_active(&self, active: bool) -> LifecycleTasks {
        self.state.lock().active = active;
        let mut tasks = LifecycleTasks::default();
        if active {
            self.activate(&mut tasks);
        } else {
            self.deactivate(&mut tasks);
        }
        tasks
    }

    fn activate(&self, tasks: &mut LifecycleTasks) {
        self.element.set_attribute(attr::ACTIVE, "");
        self.advancement.start();
        self.mark_loaded();
        self.emit_audio_state();
        tasks.push(self.media.run(MediaOp::Register));
        tasks.push(self.media.run(MediaOp::Play));
        self.animations.animate_in();
        if self.runtime.development_mode {
            self.report_dev_log();
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_activation(self.page_id());
        }
        log_lifecycle_event(
            Some(&self.log_context("activate")),
            "page.activate",
            "page activated",
            LifecycleOutcome::Success,
        );
    }

    fn deactivate(&self, tasks: &mut LifecycleTasks) {
        self.element.remove_attribute(attr::ACTIVE);
        tasks.push(self.media.run(MediaOp::Pause { rewind: true }));
        self.advancement.stop();
        self.animations.cancel_all();
        log_lifecycle_event(
            Some(&self.log_context("deactivate")),
            "page.deactivate",
            "page deactivated",
            LifecycleOutcome::Success,
        );
    }

    /// Record how many steps the page is from the visible one and prepare its media.
    pub fn set_distance(&self, distance: u32) -> LifecycleTasks {
        self.state.lock().distance = distance;
        self.element
            .set_attribute(attr::DISTANCE, &distance.to_string());
        self.element.set_style(
            "transform",
            &format!("translateY({}%)", u64::from(distance) * 100),
        );

        let mut tasks = LifecycleTasks::default();
        tasks.push(self.media.run(MediaOp::Register));
        if distance > 0 && distance <= PRELOAD_WINDOW {
            tasks.push(self.media.run(MediaOp::Preload));
        }
        story_debug!(context = self.log_context("distance"), "distance set to {}", distance);
        tasks
    }

    pub fn mute_all_media(&self) -> MediaTask {
        self.media.run(MediaOp::Mute)
    }

    pub fn unmute_all_media(&self) -> MediaTask {
        self.media.run(MediaOp::Unmute)
    }

    pub fn next_page_id(&self, is_automatic: bool) -> Option<String> {
        self.navigator.next_page_id(is_automatic)
    }

    pub fn previous_page_id(&self) -> Option<String> {
        self.navigator.previous_page_id()
    }

    pub fn adjacent_page_ids(&self) -> Vec<String> {
        self.navigator.adjacent_page_ids()
    }

    pub fn next(&self, is_automatic: bool) {
        self.navigator.next(is_automatic);
    }

    pub fn previous(&self) {
        self.navigator.previous();
    }

    pub fn advancement(&self) -> &dyn AdvancementConfig {
        self.advancement.as_ref()
    }

    pub fn media(&self) -> &MediaCoordinator {
        &self.media
    }

    pub fn diagnostics(&self) -> &DiagnosticLog {
        &self.diagnostics
    }

    fn mark_loaded(&self) {
        if !self.element.has_attribute(attr::LOADED) {
            self.element.set_attribute(attr::LOADED, "");
        }
    }

    fn emit_audio_state(&self) {
        let page_id = self.page_id().to_owned();
        let has_audio = self
            .media
            .media_elements()
            .iter()
            .any(|media| media.has_audio());
        self.events.emit(if has_audio {
            PageEvent::AudioPlaying { page_id }
        } else {
            PageEvent::AudioStopped { page_id }
        });
    }

    /// Report collected diagnostics once, after the current transition finished.
    fn report_dev_log(&self) {
        if self.dev_log_reported.swap(true, Ordering::SeqCst) {
            log_lifecycle_event(
                Some(&self.log_context("activate")),
                "page.dev_log",
                "diagnostics already reported",
                LifecycleOutcome::Skipped,
            );
            return;
        }
        let diagnostics = self.diagnostics.clone();
        let events = self.events.clone();
        let page_id = self.page_id().to_owned();
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            events.emit(PageEvent::DevLogEntriesAvailable {
                page_id,
                entries: diagnostics.entries(),
            });
        });
    }

    fn log_context(&self, phase: &'static str) -> LogContext<'_> {
        let ctx = LogContext::new()
            .with_page(self.page_id())
            .with_distance(self.distance())
            .with_phase(phase);
        match &self.story_url {
            Some(url) => ctx.with_story(url.as_str()),
            None => ctx,
        }
    }

    /// Canonical URL of the story this page belongs to.
    pub fn story_url(&self) -> Option<&Url> {
        self.story_url.as_ref()
    }
}

impl Drop for PageController {
    fn drop(&mut self) {
        self.advancement.stop();
        self.animations.cancel_all();
        if let Some(watch) = self.readiness_watch.take() {
            watch.abort();
        }
    }
}
