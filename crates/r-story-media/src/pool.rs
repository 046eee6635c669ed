//! ---
//! story_section: "02-media-coordination"
//! story_subsection: "module"
//! story_type: "source"
//! story_scope: "code"
//! story_description: "Media element contracts and pooled playback admission."
//! story_version: "v0.0.0-prealpha"
//! story_owner: "tbd"
//! ---
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::Mutex;
use r_story_common::MediaPoolConfig;
use r_story_metrics::MediaPoolMetrics;
use tracing::{debug, info, warn};

use crate::element::{MediaOp, SharedMediaElement};
use crate::error::{MediaError, Result};

/// Pool handle shared by every page of a story.
pub type SharedMediaPool = Arc<dyn MediaPool>;

/// Shared manager that owns playback resources for all pages.
///
/// Every operation is idempotent and safe to call redundantly. Implementations
/// serialise conflicting requests and enforce any global capacity.
#[async_trait]
pub trait MediaPool: Send + Sync + fmt::Debug {
    async fn register(&self, element: &SharedMediaElement) -> Result<()>;

    async fn preload(&self, element: &SharedMediaElement) -> Result<()>;

    async fn play(&self, element: &SharedMediaElement) -> Result<()>;

    async fn pause(&self, element: &SharedMediaElement, rewind: bool) -> Result<()>;

    async fn mute(&self, element: &SharedMediaElement) -> Result<()>;

    async fn unmute(&self, element: &SharedMediaElement) -> Result<()>;

    /// Dispatch a bulk operation to the matching pool call.
    async fn apply(&self, op: MediaOp, element: &SharedMediaElement) -> Result<()> {
        match op {
            MediaOp::Register => self.register(element).await,
            MediaOp::Preload => self.preload(element).await,
            MediaOp::Play => self.play(element).await,
            MediaOp::Pause { rewind } => self.pause(element, rewind).await,
            MediaOp::Mute => self.mute(element).await,
            MediaOp::Unmute => self.unmute(element).await,
        }
    }
}

#[derive(Debug, Default)]
struct PoolInner {
    /// Registration order doubles as eviction order.
    registered: IndexMap<String, SharedMediaElement>,
    /// Oldest admitted playback first.
    playing: VecDeque<String>,
    preloaded: HashSet<String>,
}

/// Media pool with a bounded-concurrency admission policy.
///
/// * Admitting a `play` while `max_playing` elements are playing evicts the
///   element that started playing first.
/// * Registering beyond `max_registered` evicts the oldest registration that
///   is not currently playing.
#[derive(Debug)]
pub struct BoundedMediaPool {
    limits: MediaPoolConfig,
    inner: Mutex<PoolInner>,
    metrics: Option<MediaPoolMetrics>,
}

impl BoundedMediaPool {
    pub fn new(limits: MediaPoolConfig) -> Self {
        Self {
            limits,
            inner: Mutex::new(PoolInner::default()),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: MediaPoolMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn limits(&self) -> &MediaPoolConfig {
        &self.limits
    }

    pub fn is_registered(&self, element_id: &str) -> bool {
        self.inner.lock().registered.contains_key(element_id)
    }

    pub fn is_preloaded(&self, element_id: &str) -> bool {
        self.inner.lock().preloaded.contains(element_id)
    }

    pub fn registered_ids(&self) -> Vec<String> {
        self.inner.lock().registered.keys().cloned().collect()
    }

    /// Playing elements, oldest admission first.
    pub fn playing_ids(&self) -> Vec<String> {
        self.inner.lock().playing.iter().cloned().collect()
    }

    fn register_locked(&self, inner: &mut PoolInner, element: &SharedMediaElement) -> Result<()> {
        if inner.registered.contains_key(element.id()) {
            return Ok(());
        }
        if inner.registered.len() >= self.limits.max_registered {
            let Some(victim_id) = inner
                .registered
                .keys()
                .find(|id| !inner.playing.contains(*id))
                .cloned()
            else {
                warn!(element = element.id(), limit = self.limits.max_registered, "no evictable registration");
                return Err(MediaError::CapacityExhausted {
                    slot: "registered",
                    limit: self.limits.max_registered,
                });
            };
            if let Some(victim) = inner.registered.shift_remove(&victim_id) {
                inner.preloaded.remove(&victim_id);
                victim.release();
                info!(evicted = %victim_id, admitted = element.id(), "evicted media registration");
                self.record_eviction("registered");
            }
        }
        inner
            .registered
            .insert(element.id().to_owned(), element.clone());
        debug!(element = element.id(), kind = element.kind().tag_name(), "registered media element");
        self.publish(inner);
        Ok(())
    }

    fn record_eviction(&self, slot: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_eviction(slot);
        }
    }

    fn record_operation(&self, op: MediaOp) {
        if let Some(metrics) = &self.metrics {
            metrics.record_operation(op.as_str());
        }
    }

    fn publish(&self, inner: &PoolInner) {
        if let Some(metrics) = &self.metrics {
            metrics.set_registered(inner.registered.len());
            metrics.set_playing(inner.playing.len());
        }
    }
}

#[async_trait]
impl MediaPool for BoundedMediaPool {
    async fn register(&self, element: &SharedMediaElement) -> Result<()> {
        let mut inner = self.inner.lock();
        self.record_operation(MediaOp::Register);
        self.register_locked(&mut inner, element)
    }

    async fn preload(&self, element: &SharedMediaElement) -> Result<()> {
        let mut inner = self.inner.lock();
        self.record_operation(MediaOp::Preload);
        self.register_locked(&mut inner, element)?;
        if inner.preloaded.insert(element.id().to_owned()) {
            element.begin_preload();
            debug!(element = element.id(), "preloading media element");
        }
        Ok(())
    }

    async fn play(&self, element: &SharedMediaElement) -> Result<()> {
        let mut inner = self.inner.lock();
        self.record_operation(MediaOp::Play);
        self.register_locked(&mut inner, element)?;
        if inner.playing.iter().any(|id| id == element.id()) {
            return Ok(());
        }
        // a refused start must leave the current players untouched
        element.start_playback()?;
        if inner.playing.len() >= self.limits.max_playing {
            if let Some(victim_id) = inner.playing.pop_front() {
                if let Some(victim) = inner.registered.get(&victim_id) {
                    victim.stop_playback(false);
                }
                info!(evicted = %victim_id, admitted = element.id(), "evicted playing media");
                self.record_eviction("playing");
            }
        }
        inner.playing.push_back(element.id().to_owned());
        self.publish(&inner);
        Ok(())
    }

    async fn pause(&self, element: &SharedMediaElement, rewind: bool) -> Result<()> {
        let mut inner = self.inner.lock();
        self.record_operation(MediaOp::Pause { rewind });
        inner.playing.retain(|id| id != element.id());
        element.stop_playback(rewind);
        self.publish(&inner);
        Ok(())
    }

    async fn mute(&self, element: &SharedMediaElement) -> Result<()> {
        let _inner = self.inner.lock();
        self.record_operation(MediaOp::Mute);
        element.set_muted(true);
        Ok(())
    }

    async fn unmute(&self, element: &SharedMediaElement) -> Result<()> {
        let _inner = self.inner.lock();
        self.record_operation(MediaOp::Unmute);
        element.set_muted(false);
        Ok(())
    }
}
