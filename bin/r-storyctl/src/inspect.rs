//! ---
//! story_section: "04-tooling"
//! story_subsection: "binary"
//! story_type: "source"
//! story_scope: "code"
//! story_description: "Control CLI for validating and playing stories."
//! story_version: "v0.0.0-prealpha"
//! story_owner: "tbd"
//! ---
use anyhow::{anyhow, Context, Result};
use clap::Args;
use r_story_common::{LoadedStoryConfig, StoryConfig};
use r_story_logging::{log_lifecycle_event, LifecycleOutcome, LogContext};
use r_story_page::{
    advancement_for_page, event_channel, DiagnosticEntry, DiagnosticLog, PageNavigator,
    SequencedAnimationManager, StoryDocument,
};
use serde::Serialize;

#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// Fail when any page reports a diagnostic.
    #[arg(long)]
    strict: bool,
}

#[derive(Debug, Args)]
pub struct AdjacentArgs {
    /// Emit JSON instead of one line per page.
    #[arg(long)]
    json: bool,
}

/// What the page runtime would make of a single page.
#[derive(Debug, Serialize)]
pub struct PageReport {
    pub page: String,
    pub adjacent: Vec<String>,
    pub diagnostics: Vec<DiagnosticEntry>,
    pub animation_error: Option<String>,
}

impl PageReport {
    fn problem_count(&self) -> usize {
        self.diagnostics.len() + usize::from(self.animation_error.is_some())
    }
}

/// Interpret every page the way a page controller would, without playing anything.
pub fn inspect_story(config: &StoryConfig) -> Result<Vec<PageReport>> {
    let document = StoryDocument::from_config(&config.story);
    let (events, _rx) = event_channel();
    document
        .page_ids()
        .into_iter()
        .map(|page_id| {
            let element = document
                .page(&page_id)
                .with_context(|| format!("page {page_id} vanished from the document"))?;
            let diagnostics = DiagnosticLog::new();
            advancement_for_page(element.as_ref(), &config.page, &diagnostics);
            let navigator = PageNavigator::new(element.clone(), events.clone(), diagnostics.clone());
            let adjacent = navigator.adjacent_page_ids();
            let animation_error = SequencedAnimationManager::new(&element)
                .err()
                .map(|err| err.to_string());
            Ok(PageReport {
                page: page_id,
                adjacent,
                diagnostics: diagnostics.entries(),
                animation_error,
            })
        })
        .collect()
}

pub fn validate(loaded: &LoadedStoryConfig, args: ValidateArgs) -> Result<()> {
    let reports = inspect_story(&loaded.config)?;
    println!(
        "configuration {} parsed: {} pages",
        loaded.source.display(),
        reports.len()
    );

    let mut problems = 0;
    for report in &reports {
        for entry in &report.diagnostics {
            println!("  [{}] {:?}: {}", report.page, entry.level, entry.message);
        }
        if let Some(err) = &report.animation_error {
            println!("  [{}] animation: {}", report.page, err);
        }
        problems += report.problem_count();
    }

    let ctx = LogContext::new().with_phase("validate");
    if problems > 0 && args.strict {
        log_lifecycle_event(
            Some(&ctx),
            "story.validate",
            "story has diagnostics",
            LifecycleOutcome::Fault,
        );
        return Err(anyhow!("{problems} problem(s) reported"));
    }
    log_lifecycle_event(
        Some(&ctx),
        "story.validate",
        "story validated",
        LifecycleOutcome::Success,
    );
    println!("{problems} problem(s) reported");
    Ok(())
}

pub fn adjacent(config: &StoryConfig, args: AdjacentArgs) -> Result<()> {
    let reports = inspect_story(config)?;
    if args.json {
        let map: Vec<_> = reports
            .iter()
            .map(|report| serde_json::json!({ "page": report.page, "adjacent": report.adjacent }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&map)?);
        return Ok(());
    }
    for report in reports {
        println!("{} -> {}", report.page, report.adjacent.join(", "));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    const STORY: &str = r#"
[story.pages.cover]
auto-advance-after = "soon"

[story.pages.middle]
advance-to = "closing"
auto-advance-to = "closing"
animations = [{ target = "title", preset = "spin" }]

[story.pages.closing]
advance-to = "nowhere"
"#;

    #[test]
    fn reports_adjacency_and_diagnostics() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("story.toml");
        fs::write(&path, STORY).expect("write config");
        let config = StoryConfig::from_path(&path).expect("config loads");

        let reports = inspect_story(&config).expect("inspection succeeds");
        let pages: Vec<_> = reports.iter().map(|r| r.page.as_str()).collect();
        assert_eq!(pages, vec!["cover", "middle", "closing"]);

        assert_eq!(reports[0].adjacent, vec!["middle"]);
        assert_eq!(reports[0].problem_count(), 1);

        assert_eq!(reports[1].adjacent, vec!["closing", "cover"]);
        assert!(reports[1].animation_error.is_some());

        assert_eq!(reports[2].adjacent, vec!["middle"]);
        assert!(reports[2].diagnostics[0].message.contains("nowhere"));
    }
}
