//! ---
//! story_section: "01-page-lifecycle"
//! story_subsection: "module"
//! story_type: "source"
//! story_scope: "code"
//! story_description: "Page lifecycle controller and its collaborators."
//! story_version: "v0.0.0-prealpha"
//! story_owner: "tbd"
//! ---
//! Story page lifecycle.
//!
//! A [`PageController`] owns one page of a story. It resolves navigation
//! targets, coordinates media readiness with the shared media pool, drives
//! entrance animations and starts or stops the page's advancement as the
//! orchestrator activates pages and moves them closer to or further from the
//! visible one. Everything the orchestrator needs to hear about arrives as a
//! [`PageEvent`] on a channel.

pub mod advancement;
pub mod animation;
mod controller;
pub mod diagnostics;
pub mod document;
pub mod element;
mod error;
mod events;
mod media;
mod navigation;

pub use advancement::{
    advancement_for_page, AdvanceKind, AdvancementConfig, AdvancementFactory,
    CompositeAdvancement, DefaultAdvancementFactory, ManualAdvancement, TapRegion,
    TimeBasedAdvancement,
};
pub use animation::{
    AnimationGate, AnimationManager, AnimationManagerFactory, SequencedAnimationFactory,
    SequencedAnimationManager,
};
pub use controller::{PageController, PageControllerBuilder, PRELOAD_WINDOW};
pub use diagnostics::{DiagnosticEntry, DiagnosticLevel, DiagnosticLog};
pub use document::{MemoryNode, MemoryPageElement, StoryDocument};
pub use element::{AnimatedNode, PageElement, SharedPageElement, PAGE_TAG};
pub use error::{AnimationError, ElementError, PageError, Result};
pub use events::{event_channel, EventSink, PageEvent, PageEventReceiver};
pub use media::{
    media_pool_channel, LifecycleTasks, MediaBatchOutcome, MediaCoordinator, MediaPoolResolver,
    MediaTask, PendingMediaPool,
};
pub use navigation::{PageNavigator, BOOKEND_PAGE_ID};
