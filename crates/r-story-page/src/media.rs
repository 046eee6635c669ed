//! ---
//! story_section: "01-page-lifecycle"
//! story_subsection: "module"
//! story_type: "source"
//! story_scope: "code"
//! story_description: "Page lifecycle controller and its collaborators."
//! story_version: "v0.0.0-prealpha"
//! story_owner: "tbd"
//! ---
//! Media readiness and deferred access to the shared media pool.
//!
//! A page learns about the pool only after construction, through the
//! [`MediaPoolResolver`] kept by the orchestrator. Every bulk media call
//! captures the page's elements immediately and applies the pool operation
//! once both the pool is known and the page's own media finished loading.

use std::fmt;
use std::time::Duration;

use futures::future::{self, BoxFuture, FutureExt, Shared};
use r_story_media::{MediaOp, SharedMediaElement, SharedMediaPool};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::diagnostics::DiagnosticLog;
use crate::element::SharedPageElement;
use crate::error::{PageError, Result};

type ReadyFuture = Shared<BoxFuture<'static, ()>>;
type PoolFuture = Shared<BoxFuture<'static, SharedMediaPool>>;

/// Orchestrator half of the one-shot pool hand-off.
#[derive(Debug)]
pub struct MediaPoolResolver {
    tx: oneshot::Sender<SharedMediaPool>,
}

impl MediaPoolResolver {
    /// Hand the shared pool to the page. Returns `false` if the page is gone.
    pub fn resolve(self, pool: SharedMediaPool) -> bool {
        self.tx.send(pool).is_ok()
    }
}

/// Page half of the one-shot pool hand-off.
#[derive(Debug)]
pub struct PendingMediaPool {
    rx: oneshot::Receiver<SharedMediaPool>,
}

pub fn media_pool_channel() -> (MediaPoolResolver, PendingMediaPool) {
    let (tx, rx) = oneshot::channel();
    (MediaPoolResolver { tx }, PendingMediaPool { rx })
}

/// Result of applying one pool operation to every media element of a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaBatchOutcome {
    pub op: MediaOp,
    pub applied: usize,
    /// Ids of elements the pool rejected.
    pub failed: Vec<String>,
}

impl MediaBatchOutcome {
    fn new(op: MediaOp) -> Self {
        Self {
            op,
            applied: 0,
            failed: Vec::new(),
        }
    }

    pub fn attempted(&self) -> usize {
        self.applied + self.failed.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Handle to a spawned bulk media operation.
///
/// Dropping the handle detaches the task; the operation still runs.
#[derive(Debug)]
pub struct MediaTask {
    page_id: String,
    op: MediaOp,
    handle: JoinHandle<MediaBatchOutcome>,
}

impl MediaTask {
    pub fn op(&self) -> MediaOp {
        self.op
    }

    pub async fn outcome(self) -> Result<MediaBatchOutcome> {
        let op = self.op;
        self.handle.await.map_err(|err| PageError::MediaTask {
            page: self.page_id,
            op: op.as_str(),
            reason: err.to_string(),
        })
    }

    pub fn detach(self) {
        drop(self.handle);
    }
}

/// Media tasks started by one lifecycle transition, in the order they were issued.
#[derive(Debug, Default)]
pub struct LifecycleTasks {
    tasks: Vec<MediaTask>,
}

impl LifecycleTasks {
    pub(crate) fn push(&mut self, task: MediaTask) {
        self.tasks.push(task);
    }

    pub fn ops(&self) -> Vec<MediaOp> {
        self.tasks.iter().map(MediaTask::op).collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait for every task of the transition.
    pub async fn settled(self) -> Result<Vec<MediaBatchOutcome>> {
        let mut outcomes = Vec::with_capacity(self.tasks.len());
        for task in self.tasks {
            outcomes.push(task.outcome().await?);
        }
        Ok(outcomes)
    }
}

/// Per-page gatekeeper between media elements and the shared pool.
#[derive(Clone)]
pub struct MediaCoordinator {
    element: SharedPageElement,
    ready: ReadyFuture,
    pool: PoolFuture,
    diagnostics: DiagnosticLog,
}

impl MediaCoordinator {
    /// Capture the page's media and start waiting for them to load.
    pub fn new(
        element: SharedPageElement,
        pending: PendingMediaPool,
        load_timeout: Option<Duration>,
        diagnostics: DiagnosticLog,
    ) -> Self {
        let ready = readiness(&element, load_timeout, &diagnostics);
        let pool = deferred_pool(element.id().to_owned(), pending, ready.clone());
        Self {
            element,
            ready,
            pool,
            diagnostics,
        }
    }

    /// Resolves once every media element present at construction loaded.
    pub fn ready(&self) -> impl std::future::Future<Output = ()> + Send + 'static {
        self.ready.clone()
    }

    pub fn is_ready(&self) -> bool {
        self.ready.peek().is_some()
    }

    /// Resolves with the pool, never before [`MediaCoordinator::ready`].
    pub fn pool(&self) -> impl std::future::Future<Output = SharedMediaPool> + Send + 'static {
        self.pool.clone()
    }

    pub fn media_elements(&self) -> Vec<SharedMediaElement> {
        self.element.media_elements()
    }

    /// Apply `op` to every media element of the page once the pool is available.
    ///
    /// Must be called from within a tokio runtime.
    pub fn run(&self, op: MediaOp) -> MediaTask {
        let elements = self.element.media_elements();
        let page_id = self.element.id().to_owned();
        let pool = self.pool.clone();
        let diagnostics = self.diagnostics.clone();
        let task_page = page_id.clone();

        let handle = tokio::spawn(async move {
            let pool = pool.await;
            let mut outcome = MediaBatchOutcome::new(op);
            for element in &elements {
                match pool.apply(op, element).await {
                    Ok(()) => outcome.applied += 1,
                    Err(err) => {
                        warn!(page = %task_page, media = element.id(), %op, error = %err, "media pool operation failed");
                        diagnostics.error(format!("{op} failed for media {}: {err}", element.id()));
                        outcome.failed.push(element.id().to_owned());
                    }
                }
            }
            debug!(page = %task_page, %op, applied = outcome.applied, failed = outcome.failed.len(), "media batch applied");
            outcome
        });

        MediaTask {
            page_id,
            op,
            handle,
        }
    }
}

impl fmt::Debug for MediaCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaCoordinator")
            .field("page", &self.element.id())
            .field("ready", &self.is_ready())
            .field("pool_available", &self.pool.peek().is_some())
            .finish()
    }
}

fn readiness(
    element: &SharedPageElement,
    load_timeout: Option<Duration>,
    diagnostics: &DiagnosticLog,
) -> ReadyFuture {
    let loads: Vec<BoxFuture<'static, ()>> = element
        .media_elements()
        .into_iter()
        .map(|media| {
            let media_id = media.id().to_owned();
            let load = media.load_end();
            let diagnostics = diagnostics.clone();
            async move {
                let Some(limit) = load_timeout else {
                    load.await;
                    return;
                };
                if tokio::time::timeout(limit, load).await.is_err() {
                    warn!(media = %media_id, ?limit, "media load timed out; treating as loaded");
                    diagnostics.warn(format!(
                        "media {media_id} did not finish loading within {}ms",
                        limit.as_millis()
                    ));
                }
            }
            .boxed()
        })
        .collect();
    let page_id = element.id().to_owned();
    async move {
        let count = loads.len();
        future::join_all(loads).await;
        debug!(page = %page_id, media = count, "page media loaded");
    }
    .boxed()
    .shared()
}

fn deferred_pool(page_id: String, pending: PendingMediaPool, ready: ReadyFuture) -> PoolFuture {
    async move {
        let pool = match pending.rx.await {
            Ok(pool) => pool,
            Err(_) => {
                debug!(page = %page_id, "media pool resolver dropped; media operations stay pending");
                future::pending::<SharedMediaPool>().await
            }
        };
        ready.await;
        pool
    }
    .boxed()
    .shared()
}
