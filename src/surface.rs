//! Display surfaces, their bindings, and the host that creates them.
//!
//! The manager never draws anything itself: the host hands out surfaces and
//! reports focus, and the manager only calls the methods below on the thread
//! that owns it.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::resolver::EditorContext;
use crate::source::SourceTree;
use crate::types::{ElementRef, SurfaceId};

/// The two kinds of surface documentation can appear in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceKind {
    /// Transient popup next to the caret.
    Popup,
    /// Docked, persistent panel.
    ToolWindow,
}

/// A panel that renders documentation text with hyperlinks.
pub trait DisplaySurface {
    /// Release the widget. Called exactly once.
    fn dispose(&mut self);

    /// Hide without disposing.
    fn hide(&mut self);

    /// Whether the surface is currently visible.
    fn is_showing(&self) -> bool;

    /// Move keyboard focus into the surface.
    fn request_focus(&mut self);

    /// Replace the rendered text, scrolling to `anchor` when given.
    fn set_content(&mut self, text: &str, anchor: Option<&str>);

    /// Tab or window title.
    fn set_title(&mut self, title: &str);

    /// Make the surface visible.
    fn show(&mut self);
}

/// What a surface currently shows and for which element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Binding {
    /// Anchor the text was scrolled to.
    pub anchor: Option<String>,
    /// Element the text documents; `None` for messages.
    pub element: Option<ElementRef>,
    /// Project modification stamp when the element was bound.
    pub stamp: u64,
    /// Text currently displayed.
    pub text: String,
}

impl Binding {
    /// The bound element is still valid and nothing changed since binding.
    pub fn is_up_to_date(&self, tree: &SourceTree) -> bool {
        return self
            .element
            .as_ref()
            .is_some_and(|e| return tree.is_valid(e) && self.stamp == tree.modification_stamp());
    }

    /// Nothing has been displayed yet.
    pub fn is_empty(&self) -> bool {
        return self.text.is_empty();
    }
}

/// Opaque identity of a focusable host component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FocusToken(
    /// Host-assigned component number.
    pub u64,
);

/// What a focused component is showing, as far as documentation is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FocusContext {
    /// An editor with a caret (and maybe a completion list).
    Editor(EditorContext),
    /// A component that exposes a selected element, e.g. a project tree.
    Element(ElementRef),
}

/// Everything the manager needs from the embedding environment.
pub trait SurfaceHost {
    /// Create a surface of the given kind. The manager owns it from now on.
    fn create_surface(&mut self, kind: SurfaceKind, id: SurfaceId) -> Box<dyn DisplaySurface>;

    /// Component that currently has keyboard focus.
    fn focused_component(&self) -> Option<FocusToken>;

    /// Documentation context of a component, if it has one.
    fn focused_context(&self, component: FocusToken) -> Option<FocusContext>;

    /// Whether a component is still on screen.
    fn is_component_showing(&self, component: FocusToken) -> bool;

    /// Whether the user is idle; auto-update only runs when idle.
    fn is_idle(&self) -> bool {
        return true;
    }

    /// Whether a completion list is active in the editor.
    fn lookup_active(&self) -> bool {
        return false;
    }

    /// Open the settings page a `open…` link points at.
    fn open_settings(&mut self, target: &str);

    /// Give focus back to a component.
    fn request_focus(&mut self, component: FocusToken);

    /// Title of the tool-window tab for an element.
    fn title_for(&self, tree: &SourceTree, element: &ElementRef) -> String {
        return tree.element(element).map(|e| return e.name).unwrap_or_default();
    }

    /// Id the tool window registers under.
    fn tool_window_id(&self) -> String;
}

// ── In-memory surfaces ─────────────────────────────────────────────

/// Everything a `MemorySurface` recorded.
#[derive(Debug, Clone, Default)]
pub struct SurfaceState {
    /// Anchor of the last `set_content`.
    pub anchor: Option<String>,
    /// Current text.
    pub content: String,
    /// Set once disposed.
    pub disposed: bool,
    /// Number of `request_focus` calls.
    pub focus_requests: usize,
    /// Every text ever set, oldest first.
    pub history: Vec<String>,
    /// Calls that arrived after `dispose`.
    pub mutations_after_dispose: usize,
    /// Visibility.
    pub showing: bool,
    /// Current title.
    pub title: String,
}

/// Shared view of a `MemorySurface`'s state, kept by whoever created it.
#[derive(Debug, Clone, Default)]
pub struct SurfaceProbe {
    /// Shared state.
    state: Arc<Mutex<SurfaceState>>,
}

impl SurfaceProbe {
    /// Copy of the recorded state.
    pub fn snapshot(&self) -> SurfaceState {
        return self.state.lock().clone();
    }

    /// Current text.
    pub fn content(&self) -> String {
        return self.state.lock().content.clone();
    }

    /// Whether the surface was disposed.
    pub fn is_disposed(&self) -> bool {
        return self.state.lock().disposed;
    }

    /// Whether the surface is visible.
    pub fn is_showing(&self) -> bool {
        return self.state.lock().showing;
    }

    /// Simulate the user hiding the surface.
    pub fn set_showing(&self, showing: bool) {
        self.state.lock().showing = showing;
    }
}

/// Surface that renders into memory. Used by the CLI and tests.
#[derive(Debug, Default)]
pub struct MemorySurface {
    /// Recorded state, shared with the probe.
    probe: SurfaceProbe,
}

impl MemorySurface {
    /// A hidden, empty surface and its probe.
    pub fn new() -> (Self, SurfaceProbe) {
        let probe = SurfaceProbe::default();
        return (Self { probe: probe.clone() }, probe);
    }

    /// Apply a mutation, counting it if the surface is already gone.
    fn mutate(&self, f: impl FnOnce(&mut SurfaceState)) {
        let mut state = self.probe.state.lock();
        if state.disposed {
            state.mutations_after_dispose = state.mutations_after_dispose.saturating_add(1);
            return;
        }
        f(&mut state);
    }
}

impl DisplaySurface for MemorySurface {
    fn dispose(&mut self) {
        let mut state = self.probe.state.lock();
        if state.disposed {
            state.mutations_after_dispose = state.mutations_after_dispose.saturating_add(1);
        }
        state.disposed = true;
        state.showing = false;
    }

    fn hide(&mut self) {
        self.mutate(|s| {
            s.showing = false;
        });
    }

    fn is_showing(&self) -> bool {
        return self.probe.is_showing();
    }

    fn request_focus(&mut self) {
        self.mutate(|s| {
            s.focus_requests = s.focus_requests.saturating_add(1);
        });
    }

    fn set_content(&mut self, text: &str, anchor: Option<&str>) {
        self.mutate(|s| {
            s.content = text.to_string();
            s.anchor = anchor.map(str::to_string);
            s.history.push(text.to_string());
        });
    }

    fn set_title(&mut self, title: &str) {
        self.mutate(|s| {
            s.title = title.to_string();
        });
    }

    fn show(&mut self) {
        self.mutate(|s| {
            s.showing = true;
        });
    }
}

// ── In-memory host ─────────────────────────────────────────────────

/// Scriptable host backed by `MemorySurface`s.
#[derive(Debug)]
pub struct MemoryHost {
    /// Context reported per component.
    contexts: HashMap<FocusToken, FocusContext>,
    /// Component with focus.
    focused: Option<FocusToken>,
    /// Components reported as not showing.
    hidden: Vec<FocusToken>,
    /// Idle flag for auto-update.
    idle: bool,
    /// Completion list flag.
    lookup_active: bool,
    /// Focus requests received, oldest first.
    refocused: Vec<FocusToken>,
    /// Settings pages opened via links.
    settings_opened: Vec<String>,
    /// Every surface created, in creation order.
    surfaces: Vec<(SurfaceId, SurfaceKind, SurfaceProbe)>,
    /// Tool-window id.
    tool_window_id: String,
}

impl Default for MemoryHost {
    fn default() -> Self {
        return Self::new("Documentation");
    }
}

impl MemoryHost {
    /// Idle host with nothing focused.
    pub fn new(tool_window_id: &str) -> Self {
        return Self {
            contexts: HashMap::new(),
            focused: None,
            hidden: Vec::new(),
            idle: true,
            lookup_active: false,
            refocused: Vec::new(),
            settings_opened: Vec::new(),
            surfaces: Vec::new(),
            tool_window_id: tool_window_id.to_string(),
        };
    }

    /// Focus a component that shows `context`.
    pub fn focus(&mut self, component: FocusToken, context: FocusContext) {
        self.contexts.insert(component, context);
        self.hidden.retain(|c| return *c != component);
        self.focused = Some(component);
    }

    /// Move focus away from every known component.
    pub fn clear_focus(&mut self) {
        self.focused = None;
    }

    /// Mark a component as no longer on screen.
    pub fn hide_component(&mut self, component: FocusToken) {
        if !self.hidden.contains(&component) {
            self.hidden.push(component);
        }
    }

    /// Set the idle flag.
    pub fn set_idle(&mut self, idle: bool) {
        self.idle = idle;
    }

    /// Set the completion-list flag.
    pub fn set_lookup_active(&mut self, active: bool) {
        self.lookup_active = active;
    }

    /// Probes of every surface created so far.
    pub fn surfaces(&self) -> &[(SurfaceId, SurfaceKind, SurfaceProbe)] {
        return &self.surfaces;
    }

    /// Probe of the most recently created surface of a kind.
    pub fn last_surface(&self, kind: SurfaceKind) -> Option<&SurfaceProbe> {
        return self
            .surfaces
            .iter()
            .rev()
            .find(|(_, k, _)| return *k == kind)
            .map(|(_, _, probe)| return probe);
    }

    /// Number of surfaces created of a kind.
    pub fn created(&self, kind: SurfaceKind) -> usize {
        return self.surfaces.iter().filter(|(_, k, _)| return *k == kind).count();
    }

    /// Focus requests received.
    pub fn refocused(&self) -> &[FocusToken] {
        return &self.refocused;
    }

    /// Settings pages opened via links.
    pub fn settings_opened(&self) -> &[String] {
        return &self.settings_opened;
    }
}

impl SurfaceHost for MemoryHost {
    fn create_surface(&mut self, kind: SurfaceKind, id: SurfaceId) -> Box<dyn DisplaySurface> {
        let (surface, probe) = MemorySurface::new();
        self.surfaces.push((id, kind, probe));
        return Box::new(surface);
    }

    fn focused_component(&self) -> Option<FocusToken> {
        return self.focused;
    }

    fn focused_context(&self, component: FocusToken) -> Option<FocusContext> {
        return self.contexts.get(&component).cloned();
    }

    fn is_component_showing(&self, component: FocusToken) -> bool {
        return self.contexts.contains_key(&component) && !self.hidden.contains(&component);
    }

    fn is_idle(&self) -> bool {
        return self.idle;
    }

    fn lookup_active(&self) -> bool {
        return self.lookup_active;
    }

    fn open_settings(&mut self, target: &str) {
        self.settings_opened.push(target.to_string());
    }

    fn request_focus(&mut self, component: FocusToken) {
        self.refocused.push(component);
    }

    fn tool_window_id(&self) -> String {
        return self.tool_window_id.clone();
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::types::{ElementKey, ProjectId};

    #[test]
    fn binding_goes_stale_on_any_edit() {
        let mut tree = SourceTree::new(ProjectId(1), 1024);
        let id = tree.add_file(Path::new("A.java"), "class A { void a() {} }").unwrap();
        let key = tree.declaration_at(id, 16).unwrap();
        let binding = Binding {
            anchor: None,
            element: Some(tree.mint(key)),
            stamp: tree.modification_stamp(),
            text: "doc".to_string(),
        };
        assert!(binding.is_up_to_date(&tree));

        tree.add_file(Path::new("B.java"), "class B {}").unwrap();
        assert!(!binding.is_up_to_date(&tree));
    }

    #[test]
    fn unbound_text_is_never_up_to_date() {
        let tree = SourceTree::new(ProjectId(1), 1024);
        let binding = Binding {
            text: "No example found.".to_string(),
            ..Binding::default()
        };
        assert!(!binding.is_up_to_date(&tree));
        assert!(!binding.is_empty());
        assert!(Binding::default().is_empty());
    }

    #[test]
    fn disposed_surface_counts_late_mutations() {
        let (mut surface, probe) = MemorySurface::new();
        surface.set_content("first", None);
        surface.show();
        surface.dispose();
        surface.set_content("late", Some("anchor"));
        surface.request_focus();

        let state = probe.snapshot();
        assert_eq!(state.content, "first");
        assert_eq!(state.history, vec!["first".to_string()]);
        assert_eq!(state.mutations_after_dispose, 2);
        assert!(!state.showing);
    }

    #[test]
    fn host_tracks_created_surfaces_and_focus() {
        let mut host = MemoryHost::default();
        let tree = SourceTree::new(ProjectId(1), 1024);
        let mut popup = host.create_surface(SurfaceKind::Popup, SurfaceId(1));
        popup.set_content("hello", None);
        assert_eq!(host.created(SurfaceKind::Popup), 1);
        assert_eq!(host.last_surface(SurfaceKind::Popup).unwrap().content(), "hello");

        let component = FocusToken(3);
        host.focus(component, FocusContext::Element(tree.mint(ElementKey::File(crate::types::FileId(0)))));
        assert!(host.is_component_showing(component));
        host.hide_component(component);
        assert!(!host.is_component_showing(component));
    }
}
