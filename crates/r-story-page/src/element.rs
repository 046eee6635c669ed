//! ---
//! story_section: "01-page-lifecycle"
//! story_subsection: "module"
//! story_type: "source"
//! story_scope: "code"
//! story_description: "Page lifecycle controller and its collaborators."
//! story_version: "v0.0.0-prealpha"
//! story_owner: "tbd"
//! ---
//! Typed adapter over the rendering surface.
//!
//! The controller never inspects markup directly; it only goes through
//! [`PageElement`], which the in-memory [`crate::document::StoryDocument`]
//! implements for tests and the CLI.

use std::fmt;
use std::sync::Arc;

use r_story_media::SharedMediaElement;

/// Tag carried by every page element.
pub const PAGE_TAG: &str = "story-page";

/// Attribute names read or written by the controller.
pub mod attr {
    pub const ACTIVE: &str = "active";
    pub const DISTANCE: &str = "distance";
    pub const ADVANCE_TO: &str = "advance-to";
    pub const AUTO_ADVANCE_TO: &str = "auto-advance-to";
    pub const AUTO_ADVANCE_AFTER: &str = "auto-advance-after";
    pub const LOADED: &str = "loaded";
    pub const PRELOAD: &str = "preload";
    pub const ANIMATE_IN: &str = "animate-in";
    pub const ANIMATE_IN_DELAY: &str = "animate-in-delay";
    pub const ANIMATE_IN_DURATION: &str = "animate-in-duration";
}

pub type SharedPageElement = Arc<dyn PageElement>;
pub type SharedAnimatedNode = Arc<dyn AnimatedNode>;

/// Page-level view of the rendering surface.
pub trait PageElement: Send + Sync + fmt::Debug {
    fn id(&self) -> &str;

    fn tag_name(&self) -> &str;

    fn attribute(&self, name: &str) -> Option<String>;

    fn set_attribute(&self, name: &str, value: &str);

    fn remove_attribute(&self, name: &str);

    fn set_style(&self, property: &str, value: &str);

    fn style(&self, property: &str) -> Option<String>;

    fn previous_sibling(&self) -> Option<SharedPageElement>;

    fn next_sibling(&self) -> Option<SharedPageElement>;

    /// Descendant audio/video elements in document order.
    fn media_elements(&self) -> Vec<SharedMediaElement>;

    /// Descendants carrying `animate-in` metadata, in document order.
    fn animated_descendants(&self) -> Vec<SharedAnimatedNode>;

    fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    fn is_page(&self) -> bool {
        self.tag_name().eq_ignore_ascii_case(PAGE_TAG)
    }

    fn has_animation_metadata(&self) -> bool {
        !self.animated_descendants().is_empty()
    }
}

/// Descendant node targeted by an entrance animation.
pub trait AnimatedNode: Send + Sync + fmt::Debug {
    fn id(&self) -> &str;

    fn attribute(&self, name: &str) -> Option<String>;

    fn set_style(&self, property: &str, value: &str);

    fn style(&self, property: &str) -> Option<String>;
}
