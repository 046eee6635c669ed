//! ---
//! story_section: "01-page-lifecycle"
//! story_subsection: "module"
//! story_type: "source"
//! story_scope: "code"
//! story_description: "Page lifecycle controller and its collaborators."
//! story_version: "v0.0.0-prealpha"
//! story_owner: "tbd"
//! ---
//! Entrance animations for descendants tagged with `animate-in`.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use url::Url;

use crate::advancement::parse_duration_attr;
use crate::element::{attr, SharedAnimatedNode, SharedPageElement};
use crate::error::AnimationError;

const DEFAULT_DURATION: Duration = Duration::from_millis(500);

/// Plays entrance animations for a single page.
#[async_trait]
pub trait AnimationManager: Send + Sync + fmt::Debug {
    /// Put every target into its pre-animation state. Idempotent.
    async fn apply_first_frame(&self) -> Result<(), AnimationError>;

    fn animate_in(&self);

    fn cancel_all(&self);
}

/// Builds the animation manager of a page that carries animation metadata.
pub trait AnimationManagerFactory: Send + Sync + fmt::Debug {
    fn create(
        &self,
        element: &SharedPageElement,
        story_url: Option<&Url>,
    ) -> Result<Arc<dyn AnimationManager>, AnimationError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SequencedAnimationFactory;

impl AnimationManagerFactory for SequencedAnimationFactory {
    fn create(
        &self,
        element: &SharedPageElement,
        story_url: Option<&Url>,
    ) -> Result<Arc<dyn AnimationManager>, AnimationError> {
        debug!(
            page = element.id(),
            story = story_url.map(Url::as_str).unwrap_or(""),
            "creating animation manager"
        );
        Ok(Arc::new(SequencedAnimationManager::new(element)?))
    }
}

/// Optional animation manager. Every call is a no-op when the page has none.
///
/// A manager that failed to build is remembered and reported by
/// [`AnimationGate::apply_first_frame`].
#[derive(Debug, Default)]
pub struct AnimationGate {
    manager: Option<Arc<dyn AnimationManager>>,
    setup_error: Option<AnimationError>,
}

impl AnimationGate {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn for_page(
        element: &SharedPageElement,
        factory: &dyn AnimationManagerFactory,
        story_url: Option<&Url>,
    ) -> Self {
        if !element.has_animation_metadata() {
            return Self::none();
        }
        match factory.create(element, story_url) {
            Ok(manager) => Self {
                manager: Some(manager),
                setup_error: None,
            },
            Err(err) => {
                warn!(page = element.id(), error = %err, "animation manager unavailable");
                Self {
                    manager: None,
                    setup_error: Some(err),
                }
            }
        }
    }

    pub fn is_present(&self) -> bool {
        self.manager.is_some()
    }

    pub async fn apply_first_frame(&self) -> Result<(), AnimationError> {
        if let Some(err) = &self.setup_error {
            return Err(err.clone());
        }
        match &self.manager {
            Some(manager) => manager.apply_first_frame().await,
            None => Ok(()),
        }
    }

    pub fn animate_in(&self) {
        if let Some(manager) = &self.manager {
            manager.animate_in();
        }
    }

    pub fn cancel_all(&self) {
        if let Some(manager) = &self.manager {
            manager.cancel_all();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Preset {
    name: &'static str,
    property: &'static str,
    from: &'static str,
    to: &'static str,
}

const PRESETS: &[Preset] = &[
    Preset {
        name: "fade-in",
        property: "opacity",
        from: "0",
        to: "1",
    },
    Preset {
        name: "fly-in-left",
        property: "transform",
        from: "translateX(-100vw)",
        to: "translateX(0)",
    },
    Preset {
        name: "fly-in-right",
        property: "transform",
        from: "translateX(100vw)",
        to: "translateX(0)",
    },
    Preset {
        name: "fly-in-top",
        property: "transform",
        from: "translateY(-100vh)",
        to: "translateY(0)",
    },
    Preset {
        name: "fly-in-bottom",
        property: "transform",
        from: "translateY(100vh)",
        to: "translateY(0)",
    },
    Preset {
        name: "zoom-in",
        property: "transform",
        from: "scale(0)",
        to: "scale(1)",
    },
];

fn preset(name: &str) -> Option<Preset> {
    PRESETS.iter().copied().find(|preset| preset.name == name.trim())
}

#[derive(Debug)]
struct AnimationTarget {
    node: SharedAnimatedNode,
    preset: Preset,
    delay: Duration,
    duration: Duration,
}

impl AnimationTarget {
    fn parse(node: SharedAnimatedNode) -> Result<Self, AnimationError> {
        let name = node.attribute(attr::ANIMATE_IN).unwrap_or_default();
        let preset = preset(&name).ok_or_else(|| AnimationError::UnknownPreset {
            target: node.id().to_owned(),
            preset: name.clone(),
        })?;
        let delay = timing(&node, attr::ANIMATE_IN_DELAY)?.unwrap_or_default();
        let duration = timing(&node, attr::ANIMATE_IN_DURATION)?.unwrap_or(DEFAULT_DURATION);
        Ok(Self {
            node,
            preset,
            delay,
            duration,
        })
    }

    fn write_first_frame(&self) -> Result<(), AnimationError> {
        self.node.set_style("transition", "none");
        self.node.set_style(self.preset.property, self.preset.from);
        if self.node.style(self.preset.property).as_deref() != Some(self.preset.from) {
            return Err(AnimationError::FirstFrame {
                target: self.node.id().to_owned(),
                reason: format!("{} was not applied", self.preset.property),
            });
        }
        Ok(())
    }

    fn write_last_frame(&self) {
        self.node.set_style(
            "transition",
            &format!("{} {}ms", self.preset.property, self.duration.as_millis()),
        );
        self.node.set_style(self.preset.property, self.preset.to);
    }
}

fn timing(node: &SharedAnimatedNode, attribute: &'static str) -> Result<Option<Duration>, AnimationError> {
    let Some(value) = node.attribute(attribute) else {
        return Ok(None);
    };
    parse_duration_attr(&value)
        .map(Some)
        .ok_or_else(|| AnimationError::InvalidTiming {
            target: node.id().to_owned(),
            attribute,
            value,
        })
}

/// Timer-driven animation engine writing start and end styles per target.
#[derive(Debug)]
pub struct SequencedAnimationManager {
    page_id: String,
    targets: Arc<Vec<AnimationTarget>>,
    first_frame_applied: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SequencedAnimationManager {
    pub fn new(element: &SharedPageElement) -> Result<Self, AnimationError> {
        let targets = element
            .animated_descendants()
            .into_iter()
            .map(AnimationTarget::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            page_id: element.id().to_owned(),
            targets: Arc::new(targets),
            first_frame_applied: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
        })
    }

    pub fn target_count(&self) -> usize {
        self.targets.len()
    }

    /// Animations scheduled and not yet finished.
    pub fn running_count(&self) -> usize {
        self.tasks
            .lock()
            .iter()
            .filter(|task| !task.is_finished())
            .count()
    }

    fn write_first_frames(&self) -> Result<(), AnimationError> {
        for target in self.targets.iter() {
            target.write_first_frame()?;
        }
        self.first_frame_applied.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl AnimationManager for SequencedAnimationManager {
    async fn apply_first_frame(&self) -> Result<(), AnimationError> {
        if self.first_frame_applied.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.write_first_frames()
    }

    fn animate_in(&self) {
        if !self.first_frame_applied.load(Ordering::SeqCst) {
            if let Err(err) = self.write_first_frames() {
                warn!(page = %self.page_id, error = %err, "first frame not applied before animating");
            }
        }
        let Ok(handle) = Handle::try_current() else {
            warn!(page = %self.page_id, "no tokio runtime; jumping to last frame");
            self.targets.iter().for_each(AnimationTarget::write_last_frame);
            return;
        };

        let mut tasks = self.tasks.lock();
        tasks.retain(|task| !task.is_finished());
        for index in 0..self.targets.len() {
            let targets = self.targets.clone();
            tasks.push(handle.spawn(async move {
                let target = &targets[index];
                if !target.delay.is_zero() {
                    tokio::time::sleep(target.delay).await;
                }
                target.write_last_frame();
                tokio::time::sleep(target.duration).await;
            }));
        }
        debug!(page = %self.page_id, targets = self.targets.len(), "animate in scheduled");
    }

    fn cancel_all(&self) {
        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        if tasks.is_empty() {
            return;
        }
        for task in &tasks {
            task.abort();
        }
        if let Err(err) = self.write_first_frames() {
            warn!(page = %self.page_id, error = %err, "unable to reset animations");
        }
        debug!(page = %self.page_id, cancelled = tasks.len(), "animations cancelled");
    }
}

impl Drop for SequencedAnimationManager {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
    }
}
