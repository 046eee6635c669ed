//! ---
//! story_section: "02-media-coordination"
//! story_subsection: "module"
//! story_type: "source"
//! story_scope: "code"
//! story_description: "Media element contracts and pooled playback admission."
//! story_version: "v0.0.0-prealpha"
//! story_owner: "tbd"
//! ---
//! In-memory media element used by the document model, the CLI and tests.

use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use indexmap::IndexMap;
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::element::MediaElement;
use crate::error::{MediaError, Result};
use crate::MediaKind;

/// Observable playback state of a [`MemoryMediaElement`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackState {
    pub playing: bool,
    pub muted: bool,
    pub position: Duration,
    pub preloading: bool,
    pub play_count: u32,
    pub release_count: u32,
}

#[derive(Debug)]
pub struct MemoryMediaElement {
    id: String,
    kind: MediaKind,
    has_audio: bool,
    attributes: Mutex<IndexMap<String, String>>,
    state: Mutex<PlaybackState>,
    loaded: watch::Sender<bool>,
    playback_refusal: Mutex<Option<String>>,
}

impl MemoryMediaElement {
    /// Create an element that has not reported load end yet.
    pub fn new(id: impl Into<String>, kind: MediaKind, has_audio: bool) -> Self {
        let (loaded, _) = watch::channel(false);
        Self {
            id: id.into(),
            kind,
            has_audio,
            attributes: Mutex::new(IndexMap::new()),
            state: Mutex::new(PlaybackState::default()),
            loaded,
            playback_refusal: Mutex::new(None),
        }
    }

    /// Create an element whose load already ended.
    pub fn loaded(id: impl Into<String>, kind: MediaKind, has_audio: bool) -> Self {
        let element = Self::new(id, kind, has_audio);
        element.mark_loaded();
        element
    }

    pub fn mark_loaded(&self) {
        self.loaded.send_replace(true);
    }

    pub fn is_loaded(&self) -> bool {
        *self.loaded.borrow()
    }

    /// Make subsequent `start_playback` calls fail, e.g. to emulate blocked autoplay.
    pub fn refuse_playback(&self, reason: impl Into<String>) {
        *self.playback_refusal.lock() = Some(reason.into());
    }

    pub fn seek(&self, position: Duration) {
        self.state.lock().position = position;
    }

    pub fn snapshot(&self) -> PlaybackState {
        self.state.lock().clone()
    }
}

impl MediaElement for MemoryMediaElement {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> MediaKind {
        self.kind
    }

    fn has_audio(&self) -> bool {
        self.has_audio
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.attributes.lock().get(name).cloned()
    }

    fn set_attribute(&self, name: &str, value: &str) {
        self.attributes
            .lock()
            .insert(name.to_owned(), value.to_owned());
    }

    fn load_end(&self) -> BoxFuture<'static, ()> {
        let mut loaded = self.loaded.subscribe();
        async move {
            // A dropped sender means the element left the document.
            let _ = loaded.wait_for(|done| *done).await;
        }
        .boxed()
    }

    fn start_playback(&self) -> Result<()> {
        if let Some(reason) = self.playback_refusal.lock().clone() {
            return Err(MediaError::Playback {
                element: self.id.clone(),
                reason,
            });
        }
        let mut state = self.state.lock();
        if !state.playing {
            state.playing = true;
            state.play_count += 1;
        }
        Ok(())
    }

    fn stop_playback(&self, rewind: bool) {
        let mut state = self.state.lock();
        state.playing = false;
        if rewind {
            state.position = Duration::ZERO;
        }
    }

    fn set_muted(&self, muted: bool) {
        self.state.lock().muted = muted;
    }

    fn begin_preload(&self) {
        self.state.lock().preloading = true;
    }

    fn release(&self) {
        let mut state = self.state.lock();
        state.playing = false;
        state.preloading = false;
        state.release_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn load_end_resolves_after_mark_loaded() {
        let element = MemoryMediaElement::new("clip", MediaKind::Video, true);
        let pending = element.load_end();
        assert!(!element.is_loaded());
        element.mark_loaded();
        tokio::time::timeout(Duration::from_secs(1), pending)
            .await
            .expect("load end resolves");
    }

    #[test]
    fn pause_with_rewind_resets_position() {
        let element = MemoryMediaElement::loaded("clip", MediaKind::Audio, true);
        element.start_playback().unwrap();
        element.seek(Duration::from_secs(3));
        element.stop_playback(false);
        assert_eq!(element.snapshot().position, Duration::from_secs(3));
        element.stop_playback(true);
        let state = element.snapshot();
        assert!(!state.playing);
        assert_eq!(state.position, Duration::ZERO);
    }

    #[test]
    fn refused_playback_reports_error() {
        let element = MemoryMediaElement::loaded("clip", MediaKind::Video, false);
        element.refuse_playback("autoplay blocked");
        let err = element.start_playback().unwrap_err();
        assert!(matches!(err, MediaError::Playback { .. }));
        assert!(!element.snapshot().playing);
    }
}
