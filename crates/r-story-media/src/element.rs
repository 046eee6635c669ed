//! ---
//! story_section: "02-media-coordination"
//! story_subsection: "module"
//! story_type: "source"
//! story_scope: "code"
//! story_description: "Media element contracts and pooled playback admission."
//! story_version: "v0.0.0-prealpha"
//! story_owner: "tbd"
//! ---
use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::error::Result;
use crate::MediaKind;

/// Non-owning handle to a playable element shared between a page and the pool.
pub type SharedMediaElement = Arc<dyn MediaElement>;

/// Narrow surface of an audio/video element.
///
/// Pages only read attributes, set the preload hint and wait for load end.
/// The playback methods are reserved for the media pool.
pub trait MediaElement: Send + Sync + fmt::Debug {
    /// Stable identifier, unique within a document.
    fn id(&self) -> &str;

    fn kind(&self) -> MediaKind;

    /// Whether the element carries an audio track or has decoded audio bytes.
    fn has_audio(&self) -> bool;

    fn attribute(&self, name: &str) -> Option<String>;

    fn set_attribute(&self, name: &str, value: &str);

    /// Future resolving once the element signalled "load end".
    fn load_end(&self) -> BoxFuture<'static, ()>;

    fn start_playback(&self) -> Result<()>;

    fn stop_playback(&self, rewind: bool);

    fn set_muted(&self, muted: bool);

    fn begin_preload(&self);

    /// Release pooled resources after the pool evicted the element.
    fn release(&self);
}

/// Bulk operations a page can request for all of its media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaOp {
    Register,
    Preload,
    Play,
    Pause { rewind: bool },
    Mute,
    Unmute,
}

impl MediaOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaOp::Register => "register",
            MediaOp::Preload => "preload",
            MediaOp::Play => "play",
            MediaOp::Pause { .. } => "pause",
            MediaOp::Mute => "mute",
            MediaOp::Unmute => "unmute",
        }
    }
}

impl fmt::Display for MediaOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
