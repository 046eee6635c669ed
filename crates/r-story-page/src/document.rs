//! ---
//! story_section: "01-page-lifecycle"
//! story_subsection: "module"
//! story_type: "source"
//! story_scope: "code"
//! story_description: "Page lifecycle controller and its collaborators."
//! story_version: "v0.0.0-prealpha"
//! story_owner: "tbd"
//! ---
//! In-memory story document implementing the element adapter.

use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use r_story_common::{MediaSpec, StoryDocumentConfig};
use r_story_media::{MemoryMediaElement, SharedMediaElement};
use tokio::runtime::Handle;
use tracing::{debug, warn};
use url::Url;

use crate::element::{
    attr, AnimatedNode, PageElement, SharedAnimatedNode, SharedPageElement, PAGE_TAG,
};

#[derive(Debug, Default)]
struct DocumentInner {
    elements: RwLock<Vec<Arc<MemoryPageElement>>>,
}

/// Ordered list of sibling elements forming a story.
#[derive(Debug, Clone, Default)]
pub struct StoryDocument {
    url: Option<Url>,
    inner: Arc<DocumentInner>,
}

impl StoryDocument {
    pub fn new(url: Option<Url>) -> Self {
        Self {
            url,
            inner: Arc::new(DocumentInner::default()),
        }
    }

    /// Build the document described by configuration.
    ///
    /// Media with a load delay finish loading on a tokio timer, so this should be
    /// called from within a runtime; outside one they are marked loaded at once.
    pub fn from_config(config: &StoryDocumentConfig) -> Self {
        let document = Self::new(config.url.clone());
        for (page_id, spec) in &config.pages {
            let page = document.append_page(page_id);
            if let Some(value) = &spec.advance_to {
                page.set_attribute(attr::ADVANCE_TO, value);
            }
            if let Some(value) = &spec.auto_advance_to {
                page.set_attribute(attr::AUTO_ADVANCE_TO, value);
            }
            if let Some(value) = &spec.auto_advance_after {
                page.set_attribute(attr::AUTO_ADVANCE_AFTER, value);
            }
            for media in &spec.media {
                let element = Arc::new(MemoryMediaElement::new(
                    media.id.clone(),
                    media.kind,
                    media.has_audio,
                ));
                schedule_load(&element, media);
                page.add_media(element);
            }
            for animation in &spec.animations {
                let node = MemoryNode::new(animation.target.clone())
                    .with_attribute(attr::ANIMATE_IN, &animation.preset)
                    .with_attribute(
                        attr::ANIMATE_IN_DELAY,
                        &format!("{}ms", animation.delay.as_millis()),
                    )
                    .with_attribute(
                        attr::ANIMATE_IN_DURATION,
                        &format!("{}ms", animation.duration.as_millis()),
                    );
                page.add_animated_node(Arc::new(node));
            }
        }
        debug!(pages = document.page_ids().len(), "story document built");
        document
    }

    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    pub fn append_page(&self, page_id: &str) -> Arc<MemoryPageElement> {
        self.append_element(page_id, PAGE_TAG)
    }

    /// Append any sibling element, page or not.
    pub fn append_element(&self, id: &str, tag_name: &str) -> Arc<MemoryPageElement> {
        let element = Arc::new(MemoryPageElement {
            id: id.to_owned(),
            tag_name: tag_name.to_owned(),
            document: Arc::downgrade(&self.inner),
            attributes: Mutex::new(IndexMap::new()),
            styles: Mutex::new(IndexMap::new()),
            media: Mutex::new(Vec::new()),
            nodes: Mutex::new(Vec::new()),
        });
        self.inner.elements.write().push(element.clone());
        element
    }

    /// Detach an element; its former neighbours become siblings.
    pub fn remove(&self, id: &str) -> Option<Arc<MemoryPageElement>> {
        let mut elements = self.inner.elements.write();
        let index = elements.iter().position(|element| element.id == id)?;
        Some(elements.remove(index))
    }

    pub fn element(&self, id: &str) -> Option<Arc<MemoryPageElement>> {
        self.inner
            .elements
            .read()
            .iter()
            .find(|element| element.id == id)
            .cloned()
    }

    pub fn page(&self, id: &str) -> Option<SharedPageElement> {
        self.element(id)
            .filter(|element| element.is_page())
            .map(|element| element as SharedPageElement)
    }

    /// Page ids in document order.
    pub fn page_ids(&self) -> Vec<String> {
        self.inner
            .elements
            .read()
            .iter()
            .filter(|element| element.is_page())
            .map(|element| element.id.clone())
            .collect()
    }
}

fn schedule_load(element: &Arc<MemoryMediaElement>, spec: &MediaSpec) {
    if spec.stalled {
        debug!(media = %spec.id, "media configured to stall");
        return;
    }
    let Some(delay) = spec.load_delay else {
        element.mark_loaded();
        return;
    };
    match Handle::try_current() {
        Ok(handle) => {
            let element = element.clone();
            handle.spawn(async move {
                tokio::time::sleep(delay).await;
                element.mark_loaded();
            });
        }
        Err(_) => {
            warn!(media = %spec.id, "no runtime to schedule media load; marking loaded");
            element.mark_loaded();
        }
    }
}

/// Sibling element of a [`StoryDocument`].
#[derive(Debug)]
pub struct MemoryPageElement {
    id: String,
    tag_name: String,
    document: Weak<DocumentInner>,
    attributes: Mutex<IndexMap<String, String>>,
    styles: Mutex<IndexMap<String, String>>,
    media: Mutex<Vec<Arc<MemoryMediaElement>>>,
    nodes: Mutex<Vec<Arc<MemoryNode>>>,
}

impl MemoryPageElement {
    pub fn add_media(&self, media: Arc<MemoryMediaElement>) {
        self.media.lock().push(media);
    }

    pub fn add_animated_node(&self, node: Arc<MemoryNode>) {
        self.nodes.lock().push(node);
    }

    /// Concrete media handles, for inspection.
    pub fn media(&self) -> Vec<Arc<MemoryMediaElement>> {
        self.media.lock().clone()
    }

    pub fn nodes(&self) -> Vec<Arc<MemoryNode>> {
        self.nodes.lock().clone()
    }

    fn sibling(&self, offset: isize) -> Option<SharedPageElement> {
        let document = self.document.upgrade()?;
        let elements = document.elements.read();
        let index = elements.iter().position(|element| element.id == self.id)?;
        let target = index.checked_add_signed(offset)?;
        elements
            .get(target)
            .map(|element| element.clone() as SharedPageElement)
    }
}

impl PageElement for MemoryPageElement {
    fn id(&self) -> &str {
        &self.id
    }

    fn tag_name(&self) -> &str {
        &self.tag_name
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.attributes.lock().get(name).cloned()
    }

    fn set_attribute(&self, name: &str, value: &str) {
        self.attributes
            .lock()
            .insert(name.to_owned(), value.to_owned());
    }

    fn remove_attribute(&self, name: &str) {
        self.attributes.lock().shift_remove(name);
    }

    fn set_style(&self, property: &str, value: &str) {
        self.styles
            .lock()
            .insert(property.to_owned(), value.to_owned());
    }

    fn style(&self, property: &str) -> Option<String> {
        self.styles.lock().get(property).cloned()
    }

    fn previous_sibling(&self) -> Option<SharedPageElement> {
        self.sibling(-1)
    }

    fn next_sibling(&self) -> Option<SharedPageElement> {
        self.sibling(1)
    }

    fn media_elements(&self) -> Vec<SharedMediaElement> {
        self.media
            .lock()
            .iter()
            .map(|media| media.clone() as SharedMediaElement)
            .collect()
    }

    fn animated_descendants(&self) -> Vec<SharedAnimatedNode> {
        self.nodes
            .lock()
            .iter()
            .filter(|node| node.attribute(attr::ANIMATE_IN).is_some())
            .map(|node| node.clone() as SharedAnimatedNode)
            .collect()
    }
}

/// Descendant node with attributes and inline styles.
#[derive(Debug)]
pub struct MemoryNode {
    id: String,
    attributes: Mutex<IndexMap<String, String>>,
    styles: Mutex<IndexMap<String, String>>,
}

impl MemoryNode {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: Mutex::new(IndexMap::new()),
            styles: Mutex::new(IndexMap::new()),
        }
    }

    pub fn with_attribute(self, name: &str, value: &str) -> Self {
        self.attributes
            .lock()
            .insert(name.to_owned(), value.to_owned());
        self
    }
}

impl AnimatedNode for MemoryNode {
    fn id(&self) -> &str {
        &self.id
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.attributes.lock().get(name).cloned()
    }

    fn set_style(&self, property: &str, value: &str) {
        self.styles
            .lock()
            .insert(property.to_owned(), value.to_owned());
    }

    fn style(&self, property: &str) -> Option<String> {
        self.styles.lock().get(property).cloned()
    }
}
