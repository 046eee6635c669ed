//! ---
//! story_section: "04-tooling"
//! story_subsection: "binary"
//! story_type: "source"
//! story_scope: "code"
//! story_description: "Control CLI for validating and playing stories."
//! story_version: "v0.0.0-prealpha"
//! story_owner: "tbd"
//! ---
//! Minimal orchestrator driving page controllers through a story.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Args;
use indexmap::IndexMap;
use r_story_common::StoryConfig;
use r_story_media::{BoundedMediaPool, SharedMediaPool};
use r_story_metrics::{new_registry, render_text, MediaPoolMetrics, PageMetrics};
use r_story_page::{
    event_channel, media_pool_channel, PageController, PageEvent, StoryDocument, TapRegion,
    BOOKEND_PAGE_ID,
};
use tokio::signal;
use tracing::{info, warn};

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Page to open first; defaults to the first page of the story.
    #[arg(long, value_name = "PAGE")]
    start: Option<String>,

    /// Quiet period after which the reader taps forward.
    #[arg(long = "dwell-ms", value_name = "MILLIS", default_value_t = 1_500)]
    dwell_ms: u64,

    /// Stop after this many page switches.
    #[arg(long = "max-steps", value_name = "COUNT", default_value_t = 64)]
    max_steps: usize,

    /// Upper bound for a page's layout (media readiness and first frame).
    #[arg(long = "layout-timeout-ms", value_name = "MILLIS", default_value_t = 5_000)]
    layout_timeout_ms: u64,

    /// Print prometheus metrics when the story ends.
    #[arg(long = "print-metrics")]
    print_metrics: bool,
}

pub async fn run(config: StoryConfig, args: RunArgs) -> Result<()> {
    let registry = new_registry();
    let (pool_metrics, page_metrics) = if config.metrics.enabled {
        (
            Some(MediaPoolMetrics::new(registry.clone())?),
            Some(PageMetrics::new(registry.clone())?),
        )
    } else {
        (None, None)
    };

    let mut pool = BoundedMediaPool::new(config.media_pool.clone());
    if let Some(metrics) = pool_metrics {
        pool = pool.with_metrics(metrics);
    }
    let pool: SharedMediaPool = Arc::new(pool);

    let document = StoryDocument::from_config(&config.story);
    let (sink, mut events) = event_channel();
    let mut pages: IndexMap<String, PageController> = IndexMap::new();
    for page_id in document.page_ids() {
        let element = document
            .page(&page_id)
            .with_context(|| format!("page {page_id} missing from document"))?;
        let (resolver, pending) = media_pool_channel();
        let mut builder = PageController::builder(element, pending, sink.clone())
            .runtime_config(config.page.clone())
            .story_url(document.url().cloned());
        if let Some(metrics) = &page_metrics {
            builder = builder.metrics(metrics.clone());
        }
        let controller = builder.build();
        resolver.resolve(pool.clone());
        pages.insert(page_id, controller);
    }

    let layout_timeout = Duration::from_millis(args.layout_timeout_ms);
    for page in pages.values() {
        match tokio::time::timeout(layout_timeout, page.layout()).await {
            Ok(result) => result.with_context(|| format!("layout of page {} failed", page.page_id()))?,
            Err(_) => warn!(page = page.page_id(), ?layout_timeout, "layout still pending; continuing"),
        }
    }

    let mut current = match args.start {
        Some(start) if pages.contains_key(&start) => start,
        Some(start) => return Err(anyhow!("unknown start page '{start}'")),
        None => pages
            .keys()
            .next()
            .cloned()
            .context("story has no pages")?,
    };
    show(&pages, &current);

    let dwell = Duration::from_millis(args.dwell_ms);
    let mut steps = 0;
    loop {
        let event = tokio::select! {
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
            _ = tokio::time::sleep(dwell) => {
                if let Some(page) = pages.get(&current) {
                    page.advancement().tap(TapRegion::Next);
                }
                continue;
            }
            _ = signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        };
        println!("{}", serde_json::to_string(&event)?);

        let PageEvent::SwitchPage {
            source_page_id,
            target_page_id,
        } = event
        else {
            continue;
        };
        if source_page_id != current {
            continue;
        }
        if let Some(page) = pages.get(&current) {
            drop(page.set_active(false));
        }
        if target_page_id == BOOKEND_PAGE_ID {
            info!(last_page = %current, "reached end of story");
            break;
        }
        if !pages.contains_key(&target_page_id) {
            warn!(target = %target_page_id, "switch to unknown page; stopping");
            break;
        }
        current = target_page_id;
        show(&pages, &current);

        steps += 1;
        if steps >= args.max_steps {
            info!(steps, "step limit reached");
            break;
        }
    }

    if args.print_metrics {
        print!("{}", render_text(&registry)?);
    }
    Ok(())
}

/// Make `current` the visible page and reposition the pages around it.
fn show(pages: &IndexMap<String, PageController>, current: &str) {
    for (page_id, distance) in distances(pages, current) {
        if let Some(page) = pages.get(&page_id) {
            drop(page.set_distance(distance));
        }
    }
    if let Some(page) = pages.get(current) {
        drop(page.set_active(true));
        info!(page = current, "page shown");
    }
}

/// Hop counts from `current` along adjacent page links.
fn distances(pages: &IndexMap<String, PageController>, current: &str) -> HashMap<String, u32> {
    let mut distances = HashMap::from([(current.to_owned(), 0)]);
    let mut queue = VecDeque::from([current.to_owned()]);
    while let Some(page_id) = queue.pop_front() {
        let Some(page) = pages.get(&page_id) else {
            continue;
        };
        let distance = distances[&page_id];
        for neighbour in page.adjacent_page_ids() {
            if pages.contains_key(&neighbour) && !distances.contains_key(&neighbour) {
                distances.insert(neighbour.clone(), distance + 1);
                queue.push_back(neighbour);
            }
        }
    }
    distances
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn distances_follow_adjacent_links() {
        let config: StoryConfig = r#"
[story.pages.a]
[story.pages.b]
advance-to = "d"
[story.pages.c]
[story.pages.d]
"#
        .parse()
        .expect("config");
        let document = StoryDocument::from_config(&config.story);
        let (sink, _rx) = event_channel();
        let pages: IndexMap<String, PageController> = document
            .page_ids()
            .into_iter()
            .map(|id| {
                let element = document.page(&id).expect("page");
                let (_resolver, pending) = media_pool_channel();
                (id, PageController::builder(element, pending, sink.clone()).build())
            })
            .collect();

        let distances = distances(&pages, "a");
        assert_eq!(distances["a"], 0);
        assert_eq!(distances["b"], 1);
        assert_eq!(distances["d"], 2);
        assert_eq!(distances["c"], 3);
    }
}
