//! ---
//! story_section: "02-media-coordination"
//! story_subsection: "tests"
//! story_type: "source"
//! story_scope: "code"
//! story_description: "Media element contracts and pooled playback admission."
//! story_version: "v0.0.0-prealpha"
//! story_owner: "tbd"
//! ---
use std::sync::Arc;

use r_story_common::MediaPoolConfig;
use r_story_media::{
    BoundedMediaPool, MediaKind, MediaOp, MediaPool, MemoryMediaElement, SharedMediaElement,
};
use r_story_metrics::{new_registry, render_text, MediaPoolMetrics};

fn elements(count: usize) -> Vec<(Arc<MemoryMediaElement>, SharedMediaElement)> {
    (0..count)
        .map(|idx| {
            let concrete = Arc::new(MemoryMediaElement::loaded(
                format!("media-{idx}"),
                MediaKind::Video,
                idx % 2 == 0,
            ));
            let shared: SharedMediaElement = concrete.clone();
            (concrete, shared)
        })
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_plays_never_exceed_cap() {
    let pool = Arc::new(BoundedMediaPool::new(MediaPoolConfig {
        max_playing: 3,
        max_registered: 32,
    }));
    let media = elements(24);

    let mut tasks = Vec::new();
    for (_, element) in &media {
        let pool = pool.clone();
        let element = element.clone();
        tasks.push(tokio::spawn(async move {
            pool.play(&element).await.expect("play admitted");
        }));
    }
    for task in tasks {
        task.await.expect("task joined");
    }

    assert_eq!(pool.playing_ids().len(), 3);
    let actually_playing = media
        .iter()
        .filter(|(state, _)| state.snapshot().playing)
        .count();
    assert_eq!(actually_playing, 3);
}

#[tokio::test]
async fn apply_dispatches_every_operation() {
    let pool = BoundedMediaPool::new(MediaPoolConfig::default());
    let media = elements(1);
    let (state, element) = &media[0];

    pool.apply(MediaOp::Preload, element).await.unwrap();
    assert!(pool.is_preloaded("media-0"));
    pool.apply(MediaOp::Mute, element).await.unwrap();
    assert!(state.snapshot().muted);
    pool.apply(MediaOp::Play, element).await.unwrap();
    assert!(state.snapshot().playing);
    pool.apply(MediaOp::Unmute, element).await.unwrap();
    assert!(!state.snapshot().muted);
    pool.apply(MediaOp::Pause { rewind: true }, element)
        .await
        .unwrap();
    assert!(!state.snapshot().playing);
    assert!(pool.playing_ids().is_empty());
}

#[tokio::test]
async fn metrics_follow_pool_state() {
    let registry = new_registry();
    let metrics = MediaPoolMetrics::new(registry.clone()).unwrap();
    let pool = BoundedMediaPool::new(MediaPoolConfig {
        max_playing: 1,
        max_registered: 4,
    })
    .with_metrics(metrics);
    let media = elements(2);
    pool.play(&media[0].1).await.unwrap();
    pool.play(&media[1].1).await.unwrap();

    let text = render_text(&registry).unwrap();
    assert!(text.contains("r_story_media_playing 1"));
    assert!(text.contains("r_story_media_registered 2"));
    assert!(text.contains("r_story_media_evictions_total{slot=\"playing\"} 1"));
    assert!(text.contains("r_story_media_operations_total{op=\"play\"} 2"));
}
