//! ---
//! story_section: "01-page-lifecycle"
//! story_subsection: "tests"
//! story_type: "source"
//! story_scope: "code"
//! story_description: "Page lifecycle controller and its collaborators."
//! story_version: "v0.0.0-prealpha"
//! story_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use r_story_common::{MediaPoolConfig, PageRuntimeConfig};
use r_story_media::{BoundedMediaPool, MediaElement, MediaKind, MediaOp, MemoryMediaElement};
use r_story_page::element::attr;
use r_story_page::{
    event_channel, media_pool_channel, AnimationError, EventSink, MediaPoolResolver, MemoryNode,
    MemoryPageElement, PageController, PageElement, PageError, PageEvent, PageEventReceiver,
    StoryDocument, TapRegion, BOOKEND_PAGE_ID,
};

fn story(ids: &[&str]) -> StoryDocument {
    let document = StoryDocument::new(None);
    for id in ids {
        document.append_page(id);
    }
    document
}

fn with_media(page: &MemoryPageElement, id: &str, kind: MediaKind, has_audio: bool) -> Arc<MemoryMediaElement> {
    let media = Arc::new(MemoryMediaElement::loaded(id, kind, has_audio));
    page.add_media(media.clone());
    media
}

fn controller(
    document: &StoryDocument,
    page_id: &str,
    events: &EventSink,
    runtime: PageRuntimeConfig,
) -> (PageController, MediaPoolResolver) {
    let element = document.page(page_id).expect("page exists");
    let (resolver, pending) = media_pool_channel();
    let controller = PageController::builder(element, pending, events.clone())
        .runtime_config(runtime)
        .build();
    (controller, resolver)
}

fn pool(max_playing: usize) -> Arc<BoundedMediaPool> {
    Arc::new(BoundedMediaPool::new(MediaPoolConfig {
        max_playing,
        max_registered: 8,
    }))
}

fn drain(rx: &mut PageEventReceiver) -> Vec<PageEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn distance_round_trips_and_positions_the_page() {
    let document = story(&["a"]);
    let (sink, _rx) = event_channel();
    let (page, resolver) = controller(&document, "a", &sink, PageRuntimeConfig::default());
    resolver.resolve(pool(2));

    for distance in [0, 1, 2, 3, 17, u32::MAX] {
        page.set_distance(distance).settled().await.expect("tasks settle");
        assert_eq!(page.distance(), distance);
        assert_eq!(
            page.element().attribute(attr::DISTANCE),
            Some(distance.to_string())
        );
    }
    page.set_distance(3);
    assert_eq!(
        page.element().style("transform").as_deref(),
        Some("translateY(300%)")
    );
}

#[tokio::test]
async fn preload_is_requested_only_near_the_visible_page() {
    let document = story(&["a"]);
    let element = document.element("a").expect("a");
    with_media(&element, "clip", MediaKind::Video, true);
    let (sink, _rx) = event_channel();
    let (page, resolver) = controller(&document, "a", &sink, PageRuntimeConfig::default());
    let pool = pool(2);
    resolver.resolve(pool.clone());

    for distance in 0..=4u32 {
        let tasks = page.set_distance(distance);
        let ops = tasks.ops();
        assert!(ops.contains(&MediaOp::Register));
        assert_eq!(
            ops.contains(&MediaOp::Preload),
            distance > 0 && distance <= 2,
            "distance {distance}"
        );
        tasks.settled().await.expect("tasks settle");
    }
    assert!(pool.is_registered("clip"));
    assert!(pool.is_preloaded("clip"));
}

#[tokio::test]
async fn build_marks_media_for_eager_preload() {
    let document = story(&["a"]);
    let element = document.element("a").expect("a");
    let media = with_media(&element, "clip", MediaKind::Video, true);
    let (sink, _rx) = event_channel();
    let (_page, _resolver) = controller(&document, "a", &sink, PageRuntimeConfig::default());
    assert_eq!(media.attribute(attr::PRELOAD).as_deref(), Some("auto"));
}

#[tokio::test]
async fn navigation_prefers_overrides_by_advance_kind() {
    let document = story(&["a", "b", "c", "d"]);
    let b = document.element("b").expect("b");
    b.set_attribute(attr::AUTO_ADVANCE_TO, "d");
    b.set_attribute(attr::ADVANCE_TO, "a");
    let (sink, _rx) = event_channel();
    let (page, _resolver) = controller(&document, "b", &sink, PageRuntimeConfig::default());

    assert_eq!(page.next_page_id(true).as_deref(), Some("d"));
    assert_eq!(page.next_page_id(false).as_deref(), Some("a"));
    assert_eq!(page.previous_page_id().as_deref(), Some("a"));

    b.remove_attribute(attr::ADVANCE_TO);
    assert_eq!(page.next_page_id(false).as_deref(), Some("c"));
}

#[tokio::test]
async fn adjacent_ids_are_unique() {
    let document = story(&["A", "X", "B"]);
    let x = document.element("X").expect("X");
    x.set_attribute(attr::ADVANCE_TO, "B");
    x.set_attribute(attr::AUTO_ADVANCE_TO, "B");
    let (sink, _rx) = event_channel();
    let (page, _resolver) = controller(&document, "X", &sink, PageRuntimeConfig::default());
    assert_eq!(page.adjacent_page_ids(), vec!["B", "A"]);
}

#[tokio::test]
async fn previous_on_first_page_reports_no_previous_once() {
    let document = story(&["a", "b"]);
    let (sink, mut rx) = event_channel();
    let (page, _resolver) = controller(&document, "a", &sink, PageRuntimeConfig::default());

    page.previous();
    assert_eq!(
        drain(&mut rx),
        vec![PageEvent::NoPreviousPage {
            page_id: "a".into()
        }]
    );
}

#[tokio::test]
async fn next_on_last_page_switches_to_bookend() {
    let document = story(&["a", "b"]);
    let (sink, mut rx) = event_channel();
    let (page, _resolver) = controller(&document, "b", &sink, PageRuntimeConfig::default());

    page.next(true);
    assert_eq!(
        drain(&mut rx),
        vec![PageEvent::SwitchPage {
            source_page_id: "b".into(),
            target_page_id: BOOKEND_PAGE_ID.into()
        }]
    );
}

#[tokio::test]
async fn mute_before_pool_resolves_applies_afterwards() {
    let document = story(&["a"]);
    let element = document.element("a").expect("a");
    let media = with_media(&element, "song", MediaKind::Audio, true);
    let (sink, _rx) = event_channel();
    let (page, resolver) = controller(&document, "a", &sink, PageRuntimeConfig::default());

    let task = page.mute_all_media();
    tokio::task::yield_now().await;
    assert!(!media.snapshot().muted);

    resolver.resolve(pool(2));
    let outcome = task.outcome().await.expect("task joins");
    assert_eq!(outcome.applied, 1);
    assert!(media.snapshot().muted);

    page.unmute_all_media().outcome().await.expect("task joins");
    assert!(!media.snapshot().muted);
}

#[tokio::test(start_paused = true)]
async fn layout_waits_for_the_pool_and_mutes_media() {
    let document = story(&["a"]);
    let element = document.element("a").expect("a");
    let media = with_media(&element, "clip", MediaKind::Video, true);
    let (sink, _rx) = event_channel();
    let (page, resolver) = controller(&document, "a", &sink, PageRuntimeConfig::default());

    let pending = tokio::time::timeout(Duration::from_millis(100), page.layout()).await;
    assert!(pending.is_err());

    resolver.resolve(pool(2));
    page.layout().await.expect("layout completes");
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(media.snapshot().muted);
}

#[tokio::test]
async fn layout_surfaces_animation_failures() {
    let document = story(&["a"]);
    let element = document.element("a").expect("a");
    element.add_animated_node(Arc::new(
        MemoryNode::new("title").with_attribute(attr::ANIMATE_IN, "wobble"),
    ));
    let (sink, _rx) = event_channel();
    let (page, resolver) = controller(&document, "a", &sink, PageRuntimeConfig::default());
    resolver.resolve(pool(2));

    let err = page.layout().await.unwrap_err();
    assert!(matches!(
        err,
        PageError::Animation {
            source: AnimationError::UnknownPreset { .. },
            ..
        }
    ));
}

#[tokio::test]
async fn activation_plays_media_and_reports_audio() {
    let document = story(&["a", "b"]);
    let a = document.element("a").expect("a");
    let song = with_media(&a, "song", MediaKind::Audio, true);
    let (sink, mut rx) = event_channel();
    let (page, resolver) = controller(&document, "a", &sink, PageRuntimeConfig::default());
    let (silent, silent_resolver) = controller(&document, "b", &sink, PageRuntimeConfig::default());
    let pool = pool(2);
    resolver.resolve(pool.clone());
    silent_resolver.resolve(pool.clone());

    page.set_active(true).settled().await.expect("activation settles");
    assert!(page.is_active());
    assert!(page.element().has_attribute(attr::ACTIVE));
    assert!(page.element().has_attribute(attr::LOADED));
    assert!(song.snapshot().playing);
    assert_eq!(pool.playing_ids(), vec!["song".to_owned()]);

    silent.set_active(true).settled().await.expect("activation settles");
    assert_eq!(
        drain(&mut rx),
        vec![
            PageEvent::AudioPlaying {
                page_id: "a".into()
            },
            PageEvent::AudioStopped {
                page_id: "b".into()
            },
        ]
    );
}

#[tokio::test]
async fn deactivation_pauses_rewinds_and_stops_advancement() {
    let document = story(&["a", "b"]);
    let a = document.element("a").expect("a");
    a.set_attribute(attr::AUTO_ADVANCE_AFTER, "5s");
    let clip = with_media(&a, "clip", MediaKind::Video, false);
    let (sink, _rx) = event_channel();
    let (page, resolver) = controller(&document, "a", &sink, PageRuntimeConfig::default());
    resolver.resolve(pool(2));

    page.set_active(true).settled().await.expect("activation settles");
    assert!(page.advancement().is_running());
    clip.seek(Duration::from_secs(3));

    page.set_active(false).settled().await.expect("deactivation settles");
    assert!(!page.is_active());
    assert!(!page.element().has_attribute(attr::ACTIVE));
    assert!(!page.advancement().is_running());
    let state = clip.snapshot();
    assert!(!state.playing);
    assert_eq!(state.position, Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn timed_page_reports_progress_then_advances_automatically() {
    let document = story(&["a", "b", "c"]);
    let a = document.element("a").expect("a");
    a.set_attribute(attr::AUTO_ADVANCE_AFTER, "500ms");
    a.set_attribute(attr::AUTO_ADVANCE_TO, "c");
    let (sink, mut rx) = event_channel();
    let (page, resolver) = controller(&document, "a", &sink, PageRuntimeConfig::default());
    resolver.resolve(pool(2));

    page.set_active(true);
    tokio::time::sleep(Duration::from_secs(1)).await;

    let events = drain(&mut rx);
    let progress: Vec<f64> = events
        .iter()
        .filter_map(|event| match event {
            PageEvent::Progress { progress, .. } => Some(*progress),
            _ => None,
        })
        .collect();
    assert!(progress.len() >= 2);
    assert!(progress.windows(2).all(|pair| pair[0] < pair[1]));
    assert!(progress.iter().all(|p| (0.0..=1.0).contains(p)));

    let switches: Vec<&PageEvent> = events
        .iter()
        .filter(|event| matches!(event, PageEvent::SwitchPage { .. }))
        .collect();
    assert_eq!(
        switches,
        vec![&PageEvent::SwitchPage {
            source_page_id: "a".into(),
            target_page_id: "c".into()
        }]
    );
}

#[tokio::test]
async fn taps_navigate_only_while_active() {
    let document = story(&["a", "b"]);
    let (sink, mut rx) = event_channel();
    let (page, resolver) = controller(&document, "b", &sink, PageRuntimeConfig::default());
    resolver.resolve(pool(2));

    assert!(!page.advancement().tap(TapRegion::Previous));
    page.set_active(true);
    assert!(page.advancement().tap(TapRegion::Previous));
    assert!(page.advancement().tap(TapRegion::Next));

    let switches: Vec<PageEvent> = drain(&mut rx)
        .into_iter()
        .filter(|event| matches!(event, PageEvent::SwitchPage { .. }))
        .collect();
    assert_eq!(
        switches,
        vec![
            PageEvent::SwitchPage {
                source_page_id: "b".into(),
                target_page_id: "a".into()
            },
            PageEvent::SwitchPage {
                source_page_id: "b".into(),
                target_page_id: BOOKEND_PAGE_ID.into()
            },
        ]
    );
}

#[tokio::test]
async fn oversized_timings_do_not_abort_build() {
    let document = story(&["a", "b"]);
    let a = document.element("a").expect("a");
    a.set_attribute(attr::AUTO_ADVANCE_AFTER, "1e20s");
    let (sink, _rx) = event_channel();
    let (page, resolver) = controller(&document, "a", &sink, PageRuntimeConfig::default());
    resolver.resolve(pool(2));

    assert_eq!(page.diagnostics().len(), 1);
    page.set_active(true);
    assert!(page.advancement().tap(TapRegion::Next));
}

#[tokio::test]
async fn development_mode_reports_diagnostics_once() {
    let document = story(&["a"]);
    let a = document.element("a").expect("a");
    a.set_attribute(attr::AUTO_ADVANCE_AFTER, "whenever");
    let (sink, mut rx) = event_channel();
    let runtime = PageRuntimeConfig {
        development_mode: true,
        ..PageRuntimeConfig::default()
    };
    let (page, resolver) = controller(&document, "a", &sink, runtime);
    resolver.resolve(pool(2));

    page.set_active(true);
    page.set_active(false);
    page.set_active(true);
    tokio::time::sleep(Duration::from_millis(20)).await;

    let reports: Vec<PageEvent> = drain(&mut rx)
        .into_iter()
        .filter(|event| matches!(event, PageEvent::DevLogEntriesAvailable { .. }))
        .collect();
    assert_eq!(reports.len(), 1);
    let PageEvent::DevLogEntriesAvailable { entries, .. } = &reports[0] else {
        unreachable!("filtered above");
    };
    assert_eq!(entries.len(), 1);
    assert!(entries[0].message.contains("auto-advance-after"));
}

#[tokio::test]
async fn story_url_follows_the_page_through_repeated_activation() {
    let document = story(&["a"]);
    let (sink, mut rx) = event_channel();
    let url = url::Url::parse("https://stories.example.com/harbour/").expect("url");
    let (resolver, pending) = media_pool_channel();
    let page = PageController::builder(document.page("a").expect("a"), pending, sink)
        .runtime_config(PageRuntimeConfig {
            development_mode: true,
            ..PageRuntimeConfig::default()
        })
        .story_url(Some(url.clone()))
        .build();
    resolver.resolve(pool(1));

    page.set_active(true);
    page.set_active(true);
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(page.story_url(), Some(&url));
    let reports = drain(&mut rx)
        .into_iter()
        .filter(|event| matches!(event, PageEvent::DevLogEntriesAvailable { .. }))
        .count();
    assert_eq!(reports, 1);
}

#[tokio::test]
async fn shared_pool_caps_playback_across_pages() {
    let document = story(&["a", "b", "c"]);
    let (sink, _rx) = event_channel();
    let pool = pool(1);
    let mut pages = Vec::new();
    for id in ["a", "b", "c"] {
        let element = document.element(id).expect("page");
        with_media(&element, &format!("{id}-clip"), MediaKind::Video, true);
        let (page, resolver) = controller(&document, id, &sink, PageRuntimeConfig::default());
        resolver.resolve(pool.clone());
        pages.push(page);
    }

    for page in &pages {
        page.set_active(true).settled().await.expect("activation settles");
        assert!(pool.playing_ids().len() <= 1);
    }
    assert_eq!(pool.playing_ids(), vec!["c-clip".to_owned()]);
}
