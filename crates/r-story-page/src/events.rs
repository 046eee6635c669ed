//! ---
//! story_section: "01-page-lifecycle"
//! story_subsection: "module"
//! story_type: "source"
//! story_scope: "code"
//! story_description: "Page lifecycle controller and its collaborators."
//! story_version: "v0.0.0-prealpha"
//! story_owner: "tbd"
//! ---
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

use crate::diagnostics::DiagnosticEntry;

/// Lifecycle and navigation notifications raised by a page for its orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PageEvent {
    SwitchPage {
        source_page_id: String,
        target_page_id: String,
    },
    NoPreviousPage {
        page_id: String,
    },
    AudioPlaying {
        page_id: String,
    },
    AudioStopped {
        page_id: String,
    },
    Progress {
        page_id: String,
        progress: f64,
    },
    DevLogEntriesAvailable {
        page_id: String,
        entries: Vec<DiagnosticEntry>,
    },
}

impl PageEvent {
    /// Page that raised the event.
    pub fn page_id(&self) -> &str {
        match self {
            PageEvent::SwitchPage { source_page_id, .. } => source_page_id,
            PageEvent::NoPreviousPage { page_id }
            | PageEvent::AudioPlaying { page_id }
            | PageEvent::AudioStopped { page_id }
            | PageEvent::Progress { page_id, .. }
            | PageEvent::DevLogEntriesAvailable { page_id, .. } => page_id,
        }
    }
}

pub type PageEventReceiver = mpsc::UnboundedReceiver<PageEvent>;

/// Sending half shared by every collaborator of a page.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<PageEvent>,
}

impl EventSink {
    pub fn new(tx: mpsc::UnboundedSender<PageEvent>) -> Self {
        Self { tx }
    }

    /// Deliver an event. A closed channel is not an error for the page.
    pub fn emit(&self, event: PageEvent) {
        if let Err(err) = self.tx.send(event) {
            debug!(page = err.0.page_id(), "event receiver dropped; discarding page event");
        }
    }
}

/// Create an event channel for one or more pages.
pub fn event_channel() -> (EventSink, PageEventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSink::new(tx), rx)
}
