//! Documentation collector: turns a fetch job into display text on a worker thread.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use crate::error::Error;
use crate::examples::{self, SnippetLoader};
use crate::providers::{DocumentationProvider, ProviderRegistry};
use crate::resolver::Resolution;
use crate::source::SourceTree;
use crate::task::{CancelToken, ElementFuture};
use crate::types::ElementRef;

/// Shown when there is nothing to document.
pub const NO_EXAMPLE_FOUND: &str = "No example found.";

/// Placeholder while an empty surface waits for its first result.
pub const FETCHING: &str = "Fetching Documentation...";

/// Shown while the project index is being built.
pub const INDEX_NOT_READY: &str = "Documentation is not available until indices are built.";

/// Shown for any unexpected failure; details go to the log.
pub const INTERNAL_ERROR: &str = "Cannot fetch remote documentation: internal error";

/// The element a job documents: known up front or still being resolved.
#[derive(Debug, Clone)]
pub enum TargetHandle {
    /// Resolution still running on a worker.
    Pending(ElementFuture),
    /// Already resolved.
    Ready(ElementRef),
}

impl TargetHandle {
    /// The element if it is available without waiting.
    pub fn now(&self) -> Option<ElementRef> {
        return match self {
            TargetHandle::Pending(future) => future.get_now().and_then(|r| return r.target().cloned()),
            TargetHandle::Ready(element) => Some(element.clone()),
        };
    }
}

/// One documentation fetch.
#[derive(Debug, Clone)]
pub struct FetchJob {
    /// Anchor inside the rendered text to scroll to.
    pub anchor: Option<String>,
    /// Use the provider's hover variant.
    pub on_hover: bool,
    /// Context element the target was found from.
    pub original: Option<ElementRef>,
    /// Text supplied by the caller; skips generation.
    pub precomputed: Option<String>,
    /// Element to document.
    pub target: TargetHandle,
}

impl FetchJob {
    /// Plain job for an element.
    pub fn new(target: TargetHandle, original: Option<ElementRef>) -> Self {
        return Self {
            anchor: None,
            on_hover: false,
            original,
            precomputed: None,
            target,
        };
    }
}

/// Result of running a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The job was cancelled before it finished.
    Cancelled,
    /// Documentation for an element; `None` when there is nothing to show.
    Documentation {
        /// Element the text describes.
        element: ElementRef,
        /// Generated text; empty keeps the surface's current text.
        text: Option<String>,
    },
    /// A message not bound to any element.
    Message(String),
}

/// Produces documentation text for fetch jobs.
#[derive(Clone)]
pub struct DocumentationCollector {
    /// Upper bound to wait for a pending target.
    fetch_wait: Duration,
    /// Snippet source for registry hits.
    loader: Arc<dyn SnippetLoader>,
    /// Documentation providers by language.
    providers: ProviderRegistry,
    /// Shared source tree.
    tree: Arc<RwLock<SourceTree>>,
}

impl std::fmt::Debug for DocumentationCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        return f
            .debug_struct("DocumentationCollector")
            .field("fetch_wait", &self.fetch_wait)
            .field("providers", &self.providers)
            .finish_non_exhaustive();
    }
}

impl DocumentationCollector {
    /// Collector over a shared tree.
    pub fn new(
        tree: Arc<RwLock<SourceTree>>,
        providers: ProviderRegistry,
        loader: Arc<dyn SnippetLoader>,
        fetch_wait: Duration,
    ) -> Self {
        return Self {
            fetch_wait,
            loader,
            providers,
            tree,
        };
    }

    /// Outcome of a job carrying precomputed text, without waiting for its target.
    /// `None` for jobs without precomputed text.
    pub fn precomputed(&self, job: &FetchJob) -> Option<FetchOutcome> {
        let text = job.precomputed.as_ref()?;
        let element = job.target.now().filter(|e| return self.tree.read().is_valid(e));
        let Some(element) = element else {
            tracing::debug!("collect.precomputed_target_gone");
            return Some(FetchOutcome::Message(NO_EXAMPLE_FOUND.to_string()));
        };
        return Some(FetchOutcome::Documentation {
            element,
            text: Some(text.clone()),
        });
    }

    /// Run a job to completion on the calling thread. Never fails: every
    /// failure, including a panicking provider, becomes a message.
    pub fn run(&self, job: &FetchJob, token: &CancelToken) -> FetchOutcome {
        if let Some(outcome) = self.precomputed(job) {
            return outcome;
        }
        if token.is_cancelled() {
            return FetchOutcome::Cancelled;
        }

        let element = match &job.target {
            TargetHandle::Ready(element) => Some(element.clone()),
            TargetHandle::Pending(future) => match future.wait_cancellable(token, self.fetch_wait) {
                Some(Resolution::Target(element)) => Some(element),
                Some(Resolution::NotReady) => return FetchOutcome::Message(INDEX_NOT_READY.to_string()),
                Some(Resolution::Nothing) | None => None,
            },
        };
        if token.is_cancelled() {
            return FetchOutcome::Cancelled;
        }
        let Some(element) = element.filter(|e| return self.tree.read().is_valid(e)) else {
            tracing::debug!("collect.target_gone");
            return FetchOutcome::Message(NO_EXAMPLE_FOUND.to_string());
        };

        tracing::debug!(element = %element, "collect.start");
        return match self.documentation(&element, job) {
            Ok(text) => FetchOutcome::Documentation { element, text },
            Err(Error::IndexNotReady) => {
                tracing::warn!(element = %element, "collect.index_not_ready");
                FetchOutcome::Message(INDEX_NOT_READY.to_string())
            },
            Err(e) => {
                tracing::error!(element = %element, error = ?e, "collect.failed");
                FetchOutcome::Message(INTERNAL_ERROR.to_string())
            },
        };
    }

    /// Documentation text for a resolved element.
    ///
    /// References go to the providers; members with a declaring type go to the
    /// example registry; anything else has no documentation.
    ///
    /// # Errors
    ///
    /// Returns `Error::IndexNotReady`, `Error::Provider` (also for a panicking provider),
    /// `Error::ResourceNotFound`, or `Error::Io`.
    pub fn documentation(&self, element: &ElementRef, job: &FetchJob) -> Result<Option<String>, Error> {
        let tree = self.tree.read();
        let Some(resolved) = tree.element(element) else {
            return Ok(None);
        };
        let original = element
            .original()
            .or(job.original.as_ref())
            .and_then(|o| return tree.element(o));

        if resolved.is_reference() {
            let provider = self.providers.for_element(&tree, Some(&resolved), original.as_ref());
            let names = provider.names();
            tracing::debug!(providers = ?names, "collect.provider");
            let generated = panic::catch_unwind(AssertUnwindSafe(|| {
                return if job.on_hover {
                    provider.generate_hover_doc(&tree, &resolved, original.as_ref())
                } else {
                    provider.generate_doc(&tree, &resolved, original.as_ref())
                };
            }));
            return generated.unwrap_or_else(|payload| {
                return Err(Error::Provider {
                    provider: names.first().copied().unwrap_or("none"),
                    reason: panic_reason(payload.as_ref()),
                });
            });
        }

        let Some(key) = resolved.example_key() else {
            return Ok(None);
        };
        let Some(path) = examples::lookup(&key) else {
            tracing::debug!(key = %key.lookup_key(), "collect.no_example");
            return Ok(None);
        };
        drop(tree);
        return self.loader.load(path).map(Some);
    }
}

/// Message carried by a panic payload.
fn panic_reason(payload: &(dyn Any + Send)) -> String {
    return payload
        .downcast_ref::<&str>()
        .map(|s| return (*s).to_string())
        .or_else(|| return payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| return "panic".to_string());
}
