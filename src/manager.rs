//! Popup and tool-window reconciliation.
//!
//! `DocumentationManager` lives on the thread that owns the host's widgets.
//! Resolution and documentation generation run on scheduler workers; their
//! results come back as `UiEvent`s and are applied in `dispatch_ui_events`.
//! A surface only ever shows the result of its most recently scheduled job.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{select, Receiver, RecvTimeoutError, Sender};
use parking_lot::RwLock;

use crate::collector::{
    DocumentationCollector, FetchJob, FetchOutcome, TargetHandle, FETCHING, INDEX_NOT_READY, NO_EXAMPLE_FOUND,
};
use crate::config::Config;
use crate::error::Error;
use crate::examples::SnippetLoader;
use crate::link::{self, Link};
use crate::providers::{DocumentationProvider, ProviderRegistry};
use crate::resolver::{EditorContext, Resolution, TargetResolver};
use crate::scheduler::FetchScheduler;
use crate::settings::{self, Settings};
use crate::source::SourceTree;
use crate::surface::{Binding, DisplaySurface, FocusContext, FocusToken, SurfaceHost, SurfaceKind};
use crate::task::{CancelToken, ElementFuture};
use crate::types::{ElementRef, JobId, ProjectId, SurfaceId};

/// Editor actions that never close the popup.
const IGNORED_ACTIONS: [&str; 5] = [
    "EditorDown",
    "EditorUp",
    "EditorPageDown",
    "EditorPageUp",
    "EditorEscape",
];

/// Action places inside the documentation UI itself.
const IGNORED_PLACES: [&str; 2] = ["JavadocInplaceSettings", "JavadocToolbar"];

/// Messages from background threads to the owning thread.
#[derive(Debug)]
enum UiEvent {
    /// The auto-update interval elapsed.
    AutoUpdateTick,
    /// A fetch job finished.
    Fetched {
        /// Anchor to scroll to.
        anchor: Option<String>,
        /// Job that produced the outcome.
        job: JobId,
        /// What to show.
        outcome: FetchOutcome,
        /// Surface the job was scheduled for.
        surface: SurfaceId,
    },
    /// A resolution that outlived the synchronous wait completed.
    TargetResolved {
        /// Trigger the resolution belongs to.
        request: u64,
        /// Its result.
        resolution: Resolution,
    },
}

/// How a display trigger should behave.
#[derive(Debug, Clone, Default)]
struct Trigger {
    /// Use the providers' hover documentation.
    on_hover: bool,
    /// Text to show instead of generating documentation.
    precomputed: Option<String>,
    /// Move focus into the surface.
    request_focus: bool,
}

/// A trigger whose resolution did not finish within the synchronous wait.
#[derive(Debug)]
struct PendingShow {
    /// Context element of the trigger.
    original: Option<ElementRef>,
    /// Trigger id carried by the completion event.
    request: u64,
    /// How to show once resolved.
    trigger: Trigger,
}

/// A resolution running on a worker for the latest trigger.
struct Resolving {
    /// Completed by the worker, or with `Nothing` when superseded.
    future: ElementFuture,
    /// Keeps a queued resolution from starting.
    token: CancelToken,
}

impl Resolving {
    /// Stop the resolution and release anyone waiting on its target.
    fn cancel(&self) {
        self.token.cancel();
        self.future.complete(Resolution::Nothing);
    }
}

/// One live surface and what it shows.
struct SurfaceSlot {
    /// Current content and bound element.
    binding: Binding,
    /// Popup or tool window.
    kind: SurfaceKind,
    /// Last job fetched into the surface, replayed on conversion.
    last_job: Option<FetchJob>,
    /// Most recently scheduled job; older results are dropped.
    latest_job: Option<JobId>,
    /// The widget.
    surface: Box<dyn DisplaySurface>,
}

/// Ticker thread that drives auto-update while the tool window is visible.
struct AutoUpdate {
    /// Thread handle, joined on drop.
    handle: Option<JoinHandle<()>>,
    /// Stops the ticker.
    stop: CancelToken,
}

impl AutoUpdate {
    /// Start ticking every `interval`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the thread cannot be spawned.
    fn start(interval: Duration, events: Sender<UiEvent>) -> Result<Self, Error> {
        let stop = CancelToken::new();
        let stopped = stop.clone();
        let handle = thread::Builder::new()
            .name("quickdoc-auto-update".to_string())
            .spawn(move || {
                let ticks = crossbeam_channel::tick(interval);
                loop {
                    select! {
                        recv(stopped.cancelled()) -> _ => break,
                        recv(ticks) -> _ => {
                            if events.send(UiEvent::AutoUpdateTick).is_err() {
                                break;
                            }
                        },
                    }
                }
            })?;
        return Ok(Self {
            handle: Some(handle),
            stop,
        });
    }
}

impl Drop for AutoUpdate {
    fn drop(&mut self) {
        self.stop.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Owns the popup and tool window of one project and keeps them in sync with
/// the user's focus.
pub struct DocumentationManager<H: SurfaceHost> {
    /// Running ticker, if auto-update is active.
    auto_update: Option<AutoUpdate>,
    /// Popup closes on a click outside it.
    close_on_click_outside: bool,
    /// Popup closes on any key press.
    close_on_sneeze: bool,
    /// Produces documentation on workers.
    collector: DocumentationCollector,
    /// Timing and pool settings.
    config: Config,
    /// Receiving end of background results.
    events_rx: Receiver<UiEvent>,
    /// Sending end handed to background work.
    events_tx: Sender<UiEvent>,
    /// Documentation fetches scheduled so far.
    fetch_count: usize,
    /// Component focused when the popup opened.
    focused_before_popup: Option<FocusToken>,
    /// Embedding environment.
    host: H,
    /// Next trigger id.
    next_request: u64,
    /// Next surface id.
    next_surface: u64,
    /// Trigger waiting for a slow resolution.
    pending_show: Option<PendingShow>,
    /// Current popup.
    popup: Option<SurfaceId>,
    /// Project every element must belong to.
    project: ProjectId,
    /// Resolutions started so far.
    resolution_count: usize,
    /// Turns contexts into targets.
    resolver: TargetResolver,
    /// Resolution started by the latest trigger.
    resolving: Option<Resolving>,
    /// Debounced per-surface job queue.
    scheduler: FetchScheduler,
    /// Persisted preferences.
    settings: Settings,
    /// Live surfaces.
    slots: HashMap<SurfaceId, SurfaceSlot>,
    /// Current tool window.
    tool_window: Option<SurfaceId>,
    /// Shared source tree.
    tree: Arc<RwLock<SourceTree>>,
}

impl<H: SurfaceHost> std::fmt::Debug for DocumentationManager<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        return f
            .debug_struct("DocumentationManager")
            .field("fetch_count", &self.fetch_count)
            .field("popup", &self.popup)
            .field("project", &self.project)
            .field("resolution_count", &self.resolution_count)
            .field("tool_window", &self.tool_window)
            .finish_non_exhaustive();
    }
}

impl<H: SurfaceHost> DocumentationManager<H> {
    /// Manager with the built-in providers.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the worker threads cannot be spawned.
    pub fn new(
        host: H,
        tree: Arc<RwLock<SourceTree>>,
        config: Config,
        settings: Settings,
        loader: Arc<dyn SnippetLoader>,
    ) -> Result<Self, Error> {
        return Self::with_providers(host, tree, config, settings, loader, ProviderRegistry::with_defaults());
    }

    /// Manager with an explicit provider registry.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the worker threads cannot be spawned.
    pub fn with_providers(
        host: H,
        tree: Arc<RwLock<SourceTree>>,
        config: Config,
        settings: Settings,
        loader: Arc<dyn SnippetLoader>,
        providers: ProviderRegistry,
    ) -> Result<Self, Error> {
        let project = tree.read().project();
        let scheduler = FetchScheduler::new(config.debounce, config.worker_threads)?;
        let collector = DocumentationCollector::new(Arc::clone(&tree), providers.clone(), loader, config.fetch_wait);
        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        return Ok(Self {
            auto_update: None,
            close_on_click_outside: true,
            close_on_sneeze: false,
            collector,
            config,
            events_rx,
            events_tx,
            fetch_count: 0,
            focused_before_popup: None,
            host,
            next_request: 1,
            next_surface: 1,
            pending_show: None,
            popup: None,
            project,
            resolution_count: 0,
            resolver: TargetResolver::new(project, providers),
            resolving: None,
            scheduler,
            settings,
            slots: HashMap::new(),
            tool_window: None,
            tree,
        });
    }

    // ── Accessors ──────────────────────────────────────────────────────

    /// The embedding host.
    pub const fn host(&self) -> &H {
        return &self.host;
    }

    /// The embedding host, mutably.
    pub const fn host_mut(&mut self) -> &mut H {
        return &mut self.host;
    }

    /// Persisted preferences.
    pub const fn settings(&self) -> &Settings {
        return &self.settings;
    }

    /// Shared source tree.
    pub const fn tree(&self) -> &Arc<RwLock<SourceTree>> {
        return &self.tree;
    }

    /// Documentation fetches scheduled so far.
    pub const fn fetch_count(&self) -> usize {
        return self.fetch_count;
    }

    /// Target resolutions started so far.
    pub const fn resolution_count(&self) -> usize {
        return self.resolution_count;
    }

    /// Whether the auto-update ticker is running.
    pub const fn is_auto_updating(&self) -> bool {
        return self.auto_update.is_some();
    }

    /// Id of the live surface of a kind.
    pub const fn surface_id(&self, kind: SurfaceKind) -> Option<SurfaceId> {
        return match kind {
            SurfaceKind::Popup => self.popup,
            SurfaceKind::ToolWindow => self.tool_window,
        };
    }

    /// What the live surface of a kind shows.
    pub fn binding(&self, kind: SurfaceKind) -> Option<&Binding> {
        let id = self.surface_id(kind)?;
        return self.slots.get(&id).map(|slot| return &slot.binding);
    }

    // ── Entry points ───────────────────────────────────────────────────

    /// Show documentation for whatever is at the caret.
    pub fn show_for_editor(&mut self, context: EditorContext, request_focus: bool) {
        self.close_on_sneeze = false;
        self.trigger(
            context,
            Trigger {
                request_focus,
                ..Trigger::default()
            },
        );
    }

    /// Show hover documentation; the popup closes on the next key press.
    pub fn show_on_hover(&mut self, context: EditorContext) {
        self.trigger(
            context,
            Trigger {
                on_hover: true,
                ..Trigger::default()
            },
        );
        self.close_on_sneeze = true;
    }

    /// Show documentation for an element selected outside an editor.
    ///
    /// # Panics
    ///
    /// Panics if the element belongs to another project.
    pub fn show_for_element(&mut self, element: ElementRef, original: Option<ElementRef>) {
        assert!(
            element.project == self.project,
            "element {element} belongs to project {} but this manager serves project {}",
            element.project.0,
            self.project.0
        );
        if !self.tree.read().is_valid(&element) {
            return;
        }
        self.do_show(TargetHandle::Ready(element), original, &Trigger::default());
    }

    /// The highlighted completion item changed while documentation is showing.
    /// Items no provider can map show "No example found." for the caret target.
    pub fn update_for_lookup(&mut self, context: EditorContext) {
        if self.tool_window.is_none() && self.live_popup().is_none() {
            return;
        }
        let mappable = {
            let tree = self.tree.read();
            match &context.lookup {
                None => false,
                Some(item) => {
                    let own = item.target.as_ref().is_some_and(|t| return tree.is_valid(t));
                    let from_provider = tree
                        .context_element(context.file, context.offset)
                        .map(|original| {
                            return self
                                .resolver
                                .providers()
                                .for_file(&tree, context.file)
                                .element_for_lookup_item(&tree, item, &original);
                        })
                        .transpose()
                        .unwrap_or_else(|e| {
                            tracing::warn!(error = %e, "lookup.map_failed");
                            return None;
                        })
                        .flatten();
                    own || from_provider.is_some()
                },
            }
        };
        if mappable {
            self.trigger(context, Trigger::default());
            return;
        }
        let mut context = context;
        context.lookup = None;
        self.trigger(
            context,
            Trigger {
                precomputed: Some(NO_EXAMPLE_FOUND.to_string()),
                ..Trigger::default()
            },
        );
    }

    /// Follow a link clicked in a surface. `context` defaults to the surface's bound element.
    pub fn navigate_by_link(&mut self, kind: SurfaceKind, context: Option<ElementRef>, url: &str) {
        let Some(id) = self.surface_id(kind) else {
            return;
        };
        let bound = self.slots.get(&id).and_then(|slot| return slot.binding.element.clone());
        let Some(context) = context.or(bound) else {
            return;
        };
        match Link::parse(url) {
            Link::External => {},
            Link::OpenSettings(target) => self.host.open_settings(&target),
            Link::Element { anchor, reference } => {
                let resolved = self.resolver.resolve_link(&self.tree.read(), &reference, Some(&context));
                match resolved {
                    Ok(Some(target)) => {
                        let job = FetchJob {
                            anchor,
                            on_hover: false,
                            original: None,
                            precomputed: None,
                            target: TargetHandle::Ready(target),
                        };
                        self.fetch(id, job);
                    },
                    Ok(None) => tracing::debug!(reference = %reference, "link.no_target"),
                    Err(e) => tracing::warn!(reference = %reference, error = %e, "link.resolve_failed"),
                }
            },
            Link::Unresolved(url) => {
                let text = link::unresolved_message(&url);
                self.pending_show = None;
                self.schedule(id, None, move |_| {
                    return FetchOutcome::Documentation {
                        element: context,
                        text: Some(text),
                    };
                });
            },
        }
    }

    /// Move the popup's content into the tool window and close the popup.
    /// An up-to-date binding is carried over as is; anything else is fetched again.
    pub fn convert_to_tool_window(&mut self) {
        let Some(popup_id) = self.popup.take() else {
            return;
        };
        let Some(mut popup) = self.slots.remove(&popup_id) else {
            return;
        };
        self.scheduler.cancel(popup_id);
        let up_to_date = popup.binding.is_up_to_date(&self.tree.read());

        let id = match self.tool_window {
            Some(id) => id,
            None => self.create_tool_window(popup.binding.element.as_ref()),
        };
        if up_to_date {
            tracing::debug!(surface = id.0, "convert.migrate");
            let binding = popup.binding.clone();
            self.set_binding(id, binding.text, binding.element, binding.anchor);
            if let Some(slot) = self.slots.get_mut(&id) {
                slot.last_job = popup.last_job.take();
            }
        } else if let Some(mut job) = popup.last_job.take() {
            tracing::debug!(surface = id.0, "convert.refetch");
            job.precomputed = None;
            self.fetch(id, job);
        } else if !popup.binding.is_empty() {
            let binding = popup.binding.clone();
            self.set_binding(id, binding.text, None, binding.anchor);
        }
        popup.surface.dispose();
        self.close_on_sneeze = false;
    }

    /// Leave tool-window mode: drop the tool window, clear the preference, and
    /// refresh documentation for the component that had focus before.
    pub fn restore_popup_behavior(&mut self) {
        let Some(id) = self.tool_window.take() else {
            return;
        };
        self.cancel_resolution();
        self.dispose_slot(id);
        if let Err(e) = self.settings.set_bool(settings::SHOW_IN_TOOL_WINDOW, false) {
            tracing::warn!(error = %e, "settings.write_failed");
        }
        self.restart_auto_update(false);

        let Some(previous) = self.focused_before_popup else {
            return;
        };
        if self.host.is_component_showing(previous) {
            self.host.request_focus(previous);
            self.update_component_for(previous, true);
        }
    }

    /// Dispose a surface. Late results for it are dropped. Removing the tool
    /// window's content restores popup behaviour.
    pub fn dismiss(&mut self, kind: SurfaceKind) {
        match kind {
            SurfaceKind::Popup => {
                if let Some(id) = self.popup.take() {
                    self.cancel_resolution();
                    self.dispose_slot(id);
                }
                self.close_on_sneeze = false;
            },
            SurfaceKind::ToolWindow => self.on_tool_window_content_removed(),
        }
    }

    /// Close the popup and give focus back to what had it before.
    pub fn close_popup(&mut self) {
        let Some(id) = self.popup.take() else {
            return;
        };
        self.close_on_sneeze = false;
        self.cancel_resolution();
        self.dispose_slot(id);
        if let Some(previous) = self.focused_before_popup {
            self.host.request_focus(previous);
        }
    }

    /// Persist the auto-update preference and apply it.
    ///
    /// # Errors
    ///
    /// Returns `Error::TomlSer` or `Error::Io` if the preference cannot be saved.
    pub fn set_auto_update(&mut self, enabled: bool) -> Result<(), Error> {
        self.settings.set_bool(settings::AUTO_UPDATE_ENABLED, enabled)?;
        let showing = self
            .tool_window
            .and_then(|id| return self.slots.get(&id))
            .is_some_and(|slot| return slot.surface.is_showing());
        self.restart_auto_update(enabled && showing);
        return Ok(());
    }

    // ── Host event hooks ───────────────────────────────────────────────

    /// An action is about to run; unrelated actions close the popup.
    pub fn before_action_performed(&mut self, action_id: &str, place: &str) {
        if self.live_popup().is_none() || self.host.lookup_active() {
            return;
        }
        if IGNORED_ACTIONS.contains(&action_id) || IGNORED_PLACES.contains(&place) {
            return;
        }
        self.close_popup();
    }

    /// The user typed in the editor; the popup closes unless a completion list is active.
    pub fn before_editor_typing(&mut self) {
        if self.live_popup().is_some() && !self.host.lookup_active() {
            self.dismiss(SurfaceKind::Popup);
        }
    }

    /// A key was pressed while the popup had focus. Returns whether the key was consumed.
    pub fn on_popup_key(&mut self, is_close_request: bool) -> bool {
        if self.close_on_sneeze {
            self.close_popup();
        }
        if is_close_request && self.popup.is_some() {
            self.close_popup();
            return true;
        }
        return false;
    }

    /// The user clicked inside the popup; it no longer closes on key presses.
    pub const fn on_popup_clicked(&mut self) {
        self.close_on_sneeze = false;
    }

    /// The user clicked outside the popup.
    pub fn on_click_outside(&mut self) {
        if self.close_on_click_outside && self.popup.is_some() {
            self.dismiss(SurfaceKind::Popup);
        }
    }

    /// The tool window was shown or hidden by the user.
    pub fn on_tool_window_visibility(&mut self, visible: bool) {
        if self.tool_window.is_none() {
            return;
        }
        let enabled = visible && self.settings.auto_update_enabled();
        self.restart_auto_update(enabled);
    }

    /// The tool window's content was closed.
    pub fn on_tool_window_content_removed(&mut self) {
        self.restore_popup_behavior();
    }

    // ── Event loop ─────────────────────────────────────────────────────

    /// Apply every background result that has arrived. Returns how many were handled.
    pub fn dispatch_ui_events(&mut self) -> usize {
        let mut handled: usize = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle(event);
            handled = handled.saturating_add(1);
        }
        return handled;
    }

    /// Dispatch events until no background work is outstanding.
    /// Returns `false` if `timeout` passed first.
    pub fn run_until_idle(&mut self, timeout: Duration) -> bool {
        return self.run_until(timeout, |manager| {
            return manager.scheduler.is_idle() && manager.events_rx.is_empty();
        });
    }

    /// Dispatch events until `done` holds. Returns `false` if `timeout` passed first.
    pub fn run_until(&mut self, timeout: Duration, mut done: impl FnMut(&Self) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.dispatch_ui_events();
            if done(self) {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let wait = deadline.saturating_duration_since(now).min(Duration::from_millis(5));
            match self.events_rx.recv_timeout(wait) {
                Ok(event) => self.handle(event),
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => {},
            }
        }
    }

    // ── Internals ──────────────────────────────────────────────────────

    /// Route one background message.
    fn handle(&mut self, event: UiEvent) {
        match event {
            UiEvent::AutoUpdateTick => self.on_auto_update_tick(),
            UiEvent::Fetched {
                anchor,
                job,
                outcome,
                surface,
            } => self.apply(surface, Some(job), outcome, anchor),
            UiEvent::TargetResolved { request, resolution } => {
                let current = self.pending_show.as_ref().is_some_and(|p| return p.request == request);
                if !current {
                    tracing::debug!(request, "show.resolution_superseded");
                    return;
                }
                if let Some(pending) = self.pending_show.take() {
                    self.on_resolved(resolution, pending.original, &pending.trigger);
                }
            },
        }
    }

    /// Resolve a context on a worker, wait briefly, then show.
    fn trigger(&mut self, context: EditorContext, trigger: Trigger) {
        let request = self.next_request;
        self.next_request = self.next_request.saturating_add(1);
        self.resolution_count = self.resolution_count.saturating_add(1);
        self.pending_show = None;
        self.cancel_resolution();

        let original = self.tree.read().context_element(context.file, context.offset);
        let future = ElementFuture::new();
        let remote = future.clone();
        let resolver = self.resolver.clone();
        let tree = Arc::clone(&self.tree);
        tracing::debug!(request, file = context.file.0, offset = context.offset, "show.trigger");
        let token = self.scheduler.submit(Box::new(move |_, _| {
            let resolution = resolver.resolve(&tree.read(), &context);
            remote.complete(resolution);
        }));
        self.resolving = Some(Resolving {
            future: future.clone(),
            token,
        });

        if let Some(resolution) = future.wait_timeout(self.config.resolve_timeout) {
            self.on_resolved(resolution, original, &trigger);
            return;
        }

        tracing::debug!(request, "show.resolve_timeout");
        if self.tool_window.is_none() && self.live_popup().is_none() {
            self.do_show(TargetHandle::Pending(future), original, &trigger);
            return;
        }
        self.pending_show = Some(PendingShow {
            original,
            request,
            trigger,
        });
        let events = self.events_tx.clone();
        future.on_complete(move |resolution| {
            let _ = events.send(UiEvent::TargetResolved {
                request,
                resolution: resolution.clone(),
            });
        });
    }

    /// Act on a finished resolution.
    fn on_resolved(&mut self, resolution: Resolution, original: Option<ElementRef>, trigger: &Trigger) {
        match resolution {
            Resolution::Target(element) => self.do_show(TargetHandle::Ready(element), original, trigger),
            Resolution::NotReady => self.show_message(INDEX_NOT_READY, trigger),
            Resolution::Nothing => match &trigger.precomputed {
                Some(text) => self.show_message(text, trigger),
                None => tracing::debug!("show.nothing_at_caret"),
            },
        }
    }

    /// Decide between creating a surface, refreshing an existing one, or only focusing it.
    fn do_show(&mut self, target: TargetHandle, original: Option<ElementRef>, trigger: &Trigger) {
        let job = FetchJob {
            anchor: None,
            on_hover: trigger.on_hover,
            original,
            precomputed: trigger.precomputed.clone(),
            target,
        };

        if self.tool_window.is_none() && self.settings.show_in_tool_window() {
            let id = self.create_tool_window(job.target.now().as_ref());
            self.fetch(id, job);
            return;
        }
        if let Some(id) = self.tool_window {
            self.refresh(id, job, trigger.request_focus);
            if let Some(slot) = self.slots.get_mut(&id)
                && !slot.surface.is_showing()
            {
                slot.surface.show();
            }
            return;
        }
        if let Some(id) = self.live_popup() {
            self.refresh(id, job, trigger.request_focus);
            return;
        }
        let id = self.create_popup(trigger.request_focus);
        self.fetch(id, job);
    }

    /// Existing surface: focus only when it already shows this element up to date.
    /// Precomputed text is always applied.
    fn refresh(&mut self, id: SurfaceId, job: FetchJob, request_focus: bool) {
        let Some(element) = job.target.now() else {
            self.fetch(id, job);
            return;
        };
        let Some(slot) = self.slots.get_mut(&id) else {
            return;
        };
        let (same, up_to_date) = {
            let tree = self.tree.read();
            let same = slot
                .binding
                .element
                .as_ref()
                .is_some_and(|bound| return tree.are_equivalent(bound, &element));
            (same, slot.binding.is_up_to_date(&tree))
        };
        if same && request_focus {
            slot.surface.request_focus();
        }
        if same && up_to_date && job.precomputed.is_none() {
            tracing::debug!(surface = id.0, element = %element, "show.up_to_date");
            // A fetch still running for another element must not replace this one.
            slot.latest_job = None;
            self.scheduler.cancel(id);
            return;
        }
        self.fetch(id, job);
    }

    /// Show a fixed message in the current surface, creating one if needed.
    fn show_message(&mut self, text: &str, trigger: &Trigger) {
        let id = match (self.tool_window, self.live_popup()) {
            (Some(id), _) | (None, Some(id)) => id,
            (None, None) if self.settings.show_in_tool_window() => self.create_tool_window(None),
            (None, None) => self.create_popup(trigger.request_focus),
        };
        self.scheduler.cancel(id);
        if let Some(slot) = self.slots.get_mut(&id) {
            slot.latest_job = None;
        }
        self.set_binding(id, text.to_string(), None, None);
    }

    /// Cancel the surface's current job and fetch `job` into it.
    fn fetch(&mut self, id: SurfaceId, job: FetchJob) {
        self.pending_show = None;
        if let Some(slot) = self.slots.get_mut(&id) {
            slot.last_job = Some(job.clone());
        }
        if let Some(outcome) = self.collector.precomputed(&job) {
            tracing::debug!(surface = id.0, "fetch.precomputed");
            self.scheduler.cancel(id);
            if let Some(slot) = self.slots.get_mut(&id) {
                slot.latest_job = None;
            }
            self.apply(id, None, outcome, job.anchor);
            return;
        }
        let collector = self.collector.clone();
        let anchor = job.anchor.clone();
        self.schedule(id, anchor, move |token| return collector.run(&job, token));
    }

    /// Schedule background work for a surface; its outcome comes back as an event.
    fn schedule<F>(&mut self, id: SurfaceId, anchor: Option<String>, work: F)
    where
        F: FnOnce(&CancelToken) -> FetchOutcome + Send + 'static,
    {
        let Some(slot) = self.slots.get(&id) else {
            return;
        };
        if slot.binding.is_empty() {
            self.set_binding(id, FETCHING.to_string(), None, None);
        }
        self.fetch_count = self.fetch_count.saturating_add(1);
        let events = self.events_tx.clone();
        let handle = self.scheduler.schedule(
            id,
            Box::new(move |job, token| {
                let outcome = work(token);
                if token.is_cancelled() || outcome == FetchOutcome::Cancelled {
                    tracing::debug!(job = job.0, "fetch.cancelled");
                    return;
                }
                let _ = events.send(UiEvent::Fetched {
                    anchor,
                    job,
                    outcome,
                    surface: id,
                });
            }),
        );
        tracing::debug!(surface = id.0, job = handle.id.0, "fetch.scheduled");
        if let Some(slot) = self.slots.get_mut(&id) {
            slot.latest_job = Some(handle.id);
        }
    }

    /// Apply a job's outcome, unless the surface is gone or a newer job exists.
    fn apply(&mut self, id: SurfaceId, job: Option<JobId>, outcome: FetchOutcome, anchor: Option<String>) {
        let Some(slot) = self.slots.get(&id) else {
            tracing::debug!(surface = id.0, "apply.surface_gone");
            return;
        };
        if job.is_some() && slot.latest_job != job {
            tracing::debug!(surface = id.0, job = ?job, latest = ?slot.latest_job, "apply.stale");
            return;
        }
        match outcome {
            FetchOutcome::Cancelled => {},
            FetchOutcome::Message(text) => self.set_binding(id, text, None, None),
            FetchOutcome::Documentation { element, text } => {
                if !self.tree.read().is_valid(&element) {
                    tracing::debug!(surface = id.0, element = %element, "apply.element_invalid");
                    return;
                }
                match text {
                    None => self.set_binding(id, NO_EXAMPLE_FOUND.to_string(), Some(element), None),
                    Some(text) if text.is_empty() => {
                        let current = slot.binding.text.clone();
                        self.set_binding(id, current, Some(element), None);
                    },
                    Some(text) => self.set_binding(id, text, Some(element), anchor),
                }
            },
        }
    }

    /// Display text and record what it is bound to.
    fn set_binding(&mut self, id: SurfaceId, text: String, element: Option<ElementRef>, anchor: Option<String>) {
        let (stamp, title) = {
            let tree = self.tree.read();
            let title = element.as_ref().map(|e| return self.host.title_for(&tree, e));
            (tree.modification_stamp(), title)
        };
        let Some(slot) = self.slots.get_mut(&id) else {
            return;
        };
        slot.surface.set_content(&text, anchor.as_deref());
        if slot.kind == SurfaceKind::ToolWindow
            && let Some(title) = title
        {
            slot.surface.set_title(&title);
        }
        slot.binding = Binding {
            anchor,
            element,
            stamp,
            text,
        };
    }

    /// Stop the latest trigger's resolution if it is still queued or running.
    fn cancel_resolution(&mut self) {
        if let Some(resolving) = self.resolving.take() {
            resolving.cancel();
        }
    }

    /// Allocate a surface id.
    fn next_surface_id(&mut self) -> SurfaceId {
        let id = SurfaceId(self.next_surface);
        self.next_surface = self.next_surface.saturating_add(1);
        return id;
    }

    /// Create a surface and register its slot.
    fn create_slot(&mut self, kind: SurfaceKind) -> SurfaceId {
        let id = self.next_surface_id();
        let surface = self.host.create_surface(kind, id);
        tracing::debug!(surface = id.0, kind = ?kind, "surface.create");
        self.slots.insert(
            id,
            SurfaceSlot {
                binding: Binding::default(),
                kind,
                last_job: None,
                latest_job: None,
                surface,
            },
        );
        return id;
    }

    /// Open a popup, remembering who had focus.
    fn create_popup(&mut self, request_focus: bool) -> SurfaceId {
        self.focused_before_popup = self.host.focused_component();
        self.close_on_click_outside = !self.host.lookup_active();
        let id = self.create_slot(SurfaceKind::Popup);
        if let Some(slot) = self.slots.get_mut(&id) {
            slot.surface.show();
            if request_focus {
                slot.surface.request_focus();
            }
        }
        self.popup = Some(id);
        return id;
    }

    /// Open the tool window, persist the preference, and start auto-update.
    fn create_tool_window(&mut self, element: Option<&ElementRef>) -> SurfaceId {
        let id = self.create_slot(SurfaceKind::ToolWindow);
        let title = element
            .map(|e| return self.host.title_for(&self.tree.read(), e))
            .unwrap_or_default();
        if let Some(slot) = self.slots.get_mut(&id) {
            slot.surface.set_title(&title);
            slot.surface.show();
        }
        self.tool_window = Some(id);
        tracing::debug!(surface = id.0, tool_window = %self.host.tool_window_id(), "tool_window.register");
        if let Err(e) = self.settings.set_bool(settings::SHOW_IN_TOOL_WINDOW, true) {
            tracing::warn!(error = %e, "settings.write_failed");
        }
        self.restart_auto_update(self.settings.auto_update_enabled());
        return id;
    }

    /// The popup if it is still on screen. A popup hidden behind our back is disposed.
    fn live_popup(&mut self) -> Option<SurfaceId> {
        let id = self.popup?;
        let showing = self.slots.get(&id).is_some_and(|slot| return slot.surface.is_showing());
        if showing {
            return Some(id);
        }
        self.popup = None;
        self.dispose_slot(id);
        return None;
    }

    /// Dispose a surface, cancel its job, and forget any show still waiting to resolve.
    fn dispose_slot(&mut self, id: SurfaceId) {
        self.pending_show = None;
        self.scheduler.cancel(id);
        if let Some(mut slot) = self.slots.remove(&id) {
            tracing::debug!(surface = id.0, kind = ?slot.kind, "surface.dispose");
            slot.surface.dispose();
        }
    }

    /// Start or stop the auto-update ticker.
    fn restart_auto_update(&mut self, enabled: bool) {
        self.auto_update = None;
        if !enabled {
            return;
        }
        match AutoUpdate::start(self.config.auto_update_interval, self.events_tx.clone()) {
            Ok(ticker) => self.auto_update = Some(ticker),
            Err(e) => tracing::error!(error = %e, "auto_update.start_failed"),
        }
    }

    /// Re-resolve the focused context while the tool window is visible and the user is idle.
    fn on_auto_update_tick(&mut self) {
        if self.auto_update.is_none() || !self.host.is_idle() {
            return;
        }
        let visible = self
            .tool_window
            .and_then(|id| return self.slots.get(&id))
            .is_some_and(|slot| return slot.surface.is_showing());
        if !visible {
            return;
        }
        if let Some(component) = self.host.focused_component() {
            self.update_component_for(component, false);
        }
    }

    /// Show documentation for what a component is focused on.
    fn update_component_for(&mut self, component: FocusToken, request_focus: bool) {
        match self.host.focused_context(component) {
            Some(FocusContext::Editor(context)) => self.show_for_editor(context, request_focus),
            Some(FocusContext::Element(element)) => {
                if element.project == self.project {
                    self.show_for_element(element.clone(), Some(element));
                }
            },
            None => {},
        }
    }
}

impl<H: SurfaceHost> Drop for DocumentationManager<H> {
    fn drop(&mut self) {
        self.auto_update = None;
        self.cancel_resolution();
        self.scheduler.cancel_all();
        for (_, mut slot) in self.slots.drain() {
            slot.surface.dispose();
        }
    }
}
