//! ---
//! story_section: "01-page-lifecycle"
//! story_subsection: "module"
//! story_type: "source"
//! story_scope: "code"
//! story_description: "Page lifecycle controller and its collaborators."
//! story_version: "v0.0.0-prealpha"
//! story_owner: "tbd"
//! ---
//! Resolution of navigation targets from sibling order and override attributes.

use r_story_logging::{story_debug, LogContext};
use r_story_metrics::PageMetrics;

use crate::diagnostics::DiagnosticLog;
use crate::element::{attr, PageElement, SharedPageElement};
use crate::error::ElementError;
use crate::events::{EventSink, PageEvent};

/// Reserved id of the end-of-story element.
pub const BOOKEND_PAGE_ID: &str = "story-bookend";

/// Navigation half of a page controller.
#[derive(Debug, Clone)]
pub struct PageNavigator {
    element: SharedPageElement,
    events: EventSink,
    diagnostics: DiagnosticLog,
    metrics: Option<PageMetrics>,
}

impl PageNavigator {
    pub fn new(element: SharedPageElement, events: EventSink, diagnostics: DiagnosticLog) -> Self {
        Self {
            element,
            events,
            diagnostics,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Option<PageMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn page_id(&self) -> &str {
        self.element.id()
    }

    /// Id of the page reached by advancing.
    ///
    /// Automatic advances prefer `auto-advance-to`; both kinds then honour
    /// `advance-to` before falling back to the next sibling page.
    pub fn next_page_id(&self, is_automatic: bool) -> Option<String> {
        if is_automatic {
            if let Some(target) = self.override_target(attr::AUTO_ADVANCE_TO) {
                return Some(target);
            }
        }
        if let Some(target) = self.override_target(attr::ADVANCE_TO) {
            return Some(target);
        }
        self.element
            .next_sibling()
            .filter(|sibling| sibling.is_page())
            .map(|sibling| sibling.id().to_owned())
    }

    pub fn previous_page_id(&self) -> Option<String> {
        self.element
            .previous_sibling()
            .filter(|sibling| sibling.is_page())
            .map(|sibling| sibling.id().to_owned())
    }

    /// Pages reachable in one step, without duplicates.
    pub fn adjacent_page_ids(&self) -> Vec<String> {
        let automatic = self.next_page_id(true);
        let manual = self.next_page_id(false).filter(|id| Some(id) != automatic.as_ref());
        let previous = self.previous_page_id();

        let mut adjacent: Vec<String> = Vec::with_capacity(3);
        for id in [automatic, manual, previous].into_iter().flatten() {
            if !adjacent.contains(&id) {
                adjacent.push(id);
            }
        }
        adjacent
    }

    /// Request a switch to the previous page, or report that none exists.
    pub fn previous(&self) {
        let ctx = LogContext::new()
            .with_page(self.page_id())
            .with_phase("navigate");
        match self.previous_page_id() {
            Some(target) => {
                story_debug!(context = ctx, "switching to previous page {}", target);
                self.record_navigation("previous");
                self.switch_to(target);
            }
            None => {
                story_debug!(context = ctx, "no previous page");
                self.record_navigation("no-previous");
                self.events.emit(PageEvent::NoPreviousPage {
                    page_id: self.page_id().to_owned(),
                });
            }
        }
    }

    /// Request a switch to the next page, ending at the bookend.
    pub fn next(&self, is_automatic: bool) {
        let target = self
            .next_page_id(is_automatic)
            .unwrap_or_else(|| BOOKEND_PAGE_ID.to_owned());
        let ctx = LogContext::new()
            .with_page(self.page_id())
            .with_phase("navigate");
        story_debug!(context = ctx, "switching to next page {} (automatic: {})", target, is_automatic);
        self.record_navigation(if is_automatic {
            "next-automatic"
        } else {
            "next-manual"
        });
        self.switch_to(target);
    }

    fn switch_to(&self, target_page_id: String) {
        self.events.emit(PageEvent::SwitchPage {
            source_page_id: self.page_id().to_owned(),
            target_page_id,
        });
    }

    fn record_navigation(&self, kind: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_navigation(self.page_id(), kind);
        }
    }

    /// Read an override attribute, discarding malformed or dangling values.
    fn override_target(&self, attribute: &'static str) -> Option<String> {
        let value = self.element.attribute(attribute)?;
        match validate_target(self.element.as_ref(), attribute, &value) {
            Ok(target) => Some(target),
            Err(err) => {
                self.diagnostics.warn(&err);
                let ctx = LogContext::new().with_page(self.page_id());
                story_debug!(context = ctx, "ignoring override: {}", err);
                None
            }
        }
    }
}

fn validate_target(
    element: &dyn PageElement,
    attribute: &'static str,
    value: &str,
) -> Result<String, ElementError> {
    let target = value.trim();
    if target.is_empty() || target.chars().any(char::is_whitespace) {
        return Err(ElementError::MalformedAttribute {
            page: element.id().to_owned(),
            attribute,
            value: value.to_owned(),
        });
    }
    if target == BOOKEND_PAGE_ID || target == element.id() || sibling_page_exists(element, target) {
        return Ok(target.to_owned());
    }
    Err(ElementError::UnknownTarget {
        page: element.id().to_owned(),
        attribute,
        target: target.to_owned(),
    })
}

fn sibling_page_exists(element: &dyn PageElement, target: &str) -> bool {
    let matches = |candidate: &SharedPageElement| candidate.is_page() && candidate.id() == target;

    let mut cursor = element.previous_sibling();
    while let Some(sibling) = cursor {
        if matches(&sibling) {
            return true;
        }
        cursor = sibling.previous_sibling();
    }
    let mut cursor = element.next_sibling();
    while let Some(sibling) = cursor {
        if matches(&sibling) {
            return true;
        }
        cursor = sibling.next_sibling();
    }
    false
}
