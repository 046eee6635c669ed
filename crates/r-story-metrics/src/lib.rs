//! ---
//! story_section: "03-logging-metrics"
//! story_subsection: "module"
//! story_type: "source"
//! story_scope: "code"
//! story_description: "Metrics collection and export utilities."
//! story_version: "v0.0.0-prealpha"
//! story_owner: "tbd"
//! ---
use std::sync::Arc;

use anyhow::{Context, Result};
use prometheus::{IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Shared registry type used across crates.
pub type SharedRegistry = Arc<Registry>;

/// Produce a new shared registry.
pub fn new_registry() -> SharedRegistry {
    Arc::new(Registry::new())
}

/// Encode every metric family in the registry using the text exposition format.
pub fn render_text(registry: &Registry) -> Result<String> {
    let families = registry.gather();
    TextEncoder::new()
        .encode_to_string(&families)
        .context("failed to encode metrics")
}

/// Gauges and counters describing the shared media pool.
#[derive(Clone, Debug)]
pub struct MediaPoolMetrics {
    registry: SharedRegistry,
    playing: IntGauge,
    registered: IntGauge,
    evictions: IntCounterVec,
    operations: IntCounterVec,
}

impl MediaPoolMetrics {
    pub fn new(registry: SharedRegistry) -> Result<Self> {
        let playing = IntGauge::with_opts(Opts::new(
            "r_story_media_playing",
            "Number of media elements currently admitted for playback",
        ))?;
        registry.register(Box::new(playing.clone()))?;

        let registered = IntGauge::with_opts(Opts::new(
            "r_story_media_registered",
            "Number of media elements registered with the pool",
        ))?;
        registry.register(Box::new(registered.clone()))?;

        let evictions = IntCounterVec::new(
            Opts::new(
                "r_story_media_evictions_total",
                "Media elements evicted to honour pool capacity, by slot",
            ),
            &["slot"],
        )?;
        registry.register(Box::new(evictions.clone()))?;

        let operations = IntCounterVec::new(
            Opts::new(
                "r_story_media_operations_total",
                "Media pool operations applied, by operation",
            ),
            &["op"],
        )?;
        registry.register(Box::new(operations.clone()))?;

        Ok(Self {
            registry,
            playing,
            registered,
            evictions,
            operations,
        })
    }

    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    pub fn set_playing(&self, count: usize) {
        self.playing.set(count as i64);
    }

    pub fn set_registered(&self, count: usize) {
        self.registered.set(count as i64);
    }

    pub fn record_eviction(&self, slot: &str) {
        self.evictions.with_label_values(&[slot]).inc();
    }

    pub fn record_operation(&self, op: &str) {
        self.operations.with_label_values(&[op]).inc();
    }
}

/// Counters describing page lifecycle transitions and navigation requests.
#[derive(Clone, Debug)]
pub struct PageMetrics {
    registry: SharedRegistry,
    activations: IntCounterVec,
    navigations: IntCounterVec,
}

impl PageMetrics {
    pub fn new(registry: SharedRegistry) -> Result<Self> {
        let activations = IntCounterVec::new(
            Opts::new(
                "r_story_page_activations_total",
                "Count of page activations by page",
            ),
            &["page"],
        )?;
        registry.register(Box::new(activations.clone()))?;

        let navigations = IntCounterVec::new(
            Opts::new(
                "r_story_page_navigations_total",
                "Count of navigation requests by source page and kind",
            ),
            &["page", "kind"],
        )?;
        registry.register(Box::new(navigations.clone()))?;

        Ok(Self {
            registry,
            activations,
            navigations,
        })
    }

    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    pub fn record_activation(&self, page: &str) {
        self.activations.with_label_values(&[page]).inc();
    }

    pub fn record_navigation(&self, page: &str, kind: &str) {
        self.navigations.with_label_values(&[page, kind]).inc();
    }
}

pub use prometheus;
