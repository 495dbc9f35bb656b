use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use quickdoc::collector::NO_EXAMPLE_FOUND;
use quickdoc::config::Config;
use quickdoc::error::Error;
use quickdoc::examples::{EmbeddedSnippets, SnippetLoader};
use quickdoc::manager::DocumentationManager;
use quickdoc::providers::java::JavaProvider;
use quickdoc::providers::{DocumentationProvider, ProviderRegistry};
use quickdoc::resolver::{EditorContext, LookupItem};
use quickdoc::settings::{self, Settings};
use quickdoc::source::{Element, SourceTree};
use quickdoc::surface::{FocusContext, FocusToken, MemoryHost, SurfaceKind};
use quickdoc::types::{ElementKey, ElementRef, FileId, Language, ProjectId};

const WORDS: &str = "package com.acme;\n\
    import java.util.List;\n\
    import java.util.stream.Collectors;\n\
    public class Words {\n\
        public Object byLength(List<String> words) {\n\
            return words.stream().collect(Collectors.groupingBy(String::length, Collectors.toList()));\n\
        }\n\
        public Object lengths(List<String> words) {\n\
            return words.stream().map(String::length);\n\
        }\n\
    }\n";

const GROUPING_BY: &str = "/examples/Collectors/Collectors.groupingBy.html";
const MAP: &str = "/examples/Stream/Stream.map1.html";
const WAIT: Duration = Duration::from_secs(10);

/// Blocks loads of one resource until released.
struct GatedLoader {
    gated: &'static str,
    release: Receiver<()>,
    started: Sender<()>,
}

impl SnippetLoader for GatedLoader {
    fn load(&self, path: &str) -> Result<String, Error> {
        if path == self.gated {
            let _ = self.started.send(());
            let _ = self.release.recv_timeout(WAIT);
        }
        return EmbeddedSnippets.load(path);
    }
}

struct Gate {
    release: Sender<()>,
    started: Receiver<()>,
}

fn gated(path: &'static str) -> (Arc<dyn SnippetLoader>, Gate) {
    let (release_tx, release_rx) = crossbeam_channel::unbounded();
    let (started_tx, started_rx) = crossbeam_channel::unbounded();
    let loader = GatedLoader {
        gated: path,
        release: release_rx,
        started: started_tx,
    };
    return (
        Arc::new(loader),
        Gate {
            release: release_tx,
            started: started_rx,
        },
    );
}

/// Java provider that records every caret offset it is asked to resolve.
#[derive(Default)]
struct RecordingJava {
    offsets: Mutex<Vec<usize>>,
}

impl DocumentationProvider for RecordingJava {
    fn name(&self) -> &'static str {
        return "recording-java";
    }

    fn custom_element(
        &self,
        tree: &SourceTree,
        file: FileId,
        offset: usize,
        context: Option<&ElementRef>,
    ) -> Result<Option<ElementKey>, Error> {
        self.offsets.lock().push(offset);
        return JavaProvider.custom_element(tree, file, offset, context);
    }

    fn adjust_element(
        &self,
        tree: &SourceTree,
        file: FileId,
        offset: usize,
        raw: Option<&ElementKey>,
    ) -> Option<ElementKey> {
        return JavaProvider.adjust_element(tree, file, offset, raw);
    }

    fn generate_doc(
        &self,
        tree: &SourceTree,
        element: &Element,
        original: Option<&Element>,
    ) -> Result<Option<String>, Error> {
        return JavaProvider.generate_doc(tree, element, original);
    }
}

/// One worker, so a blocked fetch holds back every later resolution.
fn single_worker() -> Config {
    return Config {
        resolve_timeout: Duration::from_millis(500),
        worker_threads: 1,
        ..config()
    };
}

fn config() -> Config {
    return Config {
        auto_update_interval: Duration::from_millis(20),
        resolve_timeout: WAIT,
        worker_threads: 3,
        ..Config::default()
    };
}

fn manager_with(
    config: Config,
    settings: Settings,
    loader: Arc<dyn SnippetLoader>,
) -> (DocumentationManager<MemoryHost>, FileId) {
    let mut tree = SourceTree::new(ProjectId(1), 1024 * 1024);
    let id = tree.add_file(Path::new("com/acme/Words.java"), WORDS).unwrap();
    let manager = DocumentationManager::new(
        MemoryHost::default(),
        Arc::new(RwLock::new(tree)),
        config,
        settings,
        loader,
    )
    .unwrap();
    return (manager, id);
}

fn manager() -> (DocumentationManager<MemoryHost>, FileId) {
    return manager_with(config(), Settings::in_memory(), Arc::new(EmbeddedSnippets));
}

fn at(file: FileId, needle: &str) -> EditorContext {
    return EditorContext::at(file, WORDS.find(needle).unwrap());
}

fn snippet(path: &str) -> String {
    return EmbeddedSnippets.load(path).unwrap();
}

fn shown(manager: &DocumentationManager<MemoryHost>, kind: SurfaceKind) -> String {
    return manager.binding(kind).map(|b| return b.text.clone()).unwrap_or_default();
}

#[test]
fn grouping_by_with_two_arguments_shows_its_snippet() {
    let (mut manager, file) = manager();
    manager.show_for_editor(at(file, "groupingBy"), true);
    assert!(manager.run_until_idle(WAIT));

    assert_eq!(shown(&manager, SurfaceKind::Popup), snippet(GROUPING_BY));
    let probe = manager.host().last_surface(SurfaceKind::Popup).unwrap();
    assert!(probe.is_showing());
    assert_eq!(probe.snapshot().focus_requests, 1);
    assert_eq!(manager.fetch_count(), 1);
}

#[test]
fn stale_results_never_overwrite_newer_ones() {
    let (loader, gate) = gated(GROUPING_BY);
    let (mut manager, file) = manager_with(config(), Settings::in_memory(), loader);

    manager.show_for_editor(at(file, "groupingBy"), false);
    gate.started.recv_timeout(WAIT).unwrap();

    manager.show_for_editor(at(file, "map("), false);
    let map = snippet(MAP);
    assert!(manager.run_until(WAIT, |m| return shown(m, SurfaceKind::Popup) == map));

    gate.release.send(()).unwrap();
    assert!(manager.run_until_idle(WAIT));

    let state = manager.host().last_surface(SurfaceKind::Popup).unwrap().snapshot();
    assert_eq!(state.content, map);
    assert!(!state.history.contains(&snippet(GROUPING_BY)));
    assert_eq!(manager.host().created(SurfaceKind::Popup), 1);
}

#[test]
fn equivalent_retrigger_only_refocuses() {
    let (mut manager, file) = manager();
    manager.show_for_editor(at(file, "groupingBy"), true);
    assert!(manager.run_until_idle(WAIT));

    manager.show_for_editor(at(file, "groupingBy"), true);
    assert!(manager.run_until_idle(WAIT));

    let probe = manager.host().last_surface(SurfaceKind::Popup).unwrap();
    assert_eq!(manager.fetch_count(), 1);
    assert_eq!(manager.resolution_count(), 2);
    assert_eq!(probe.snapshot().focus_requests, 2);
    assert_eq!(manager.host().created(SurfaceKind::Popup), 1);
}

#[test]
fn edits_make_the_surface_stale() {
    let (mut manager, file) = manager();
    manager.show_for_editor(at(file, "groupingBy"), false);
    assert!(manager.run_until_idle(WAIT));

    manager.tree().write().edit_file(file, WORDS).unwrap();
    manager.show_for_editor(at(file, "groupingBy"), false);
    assert!(manager.run_until_idle(WAIT));

    assert_eq!(manager.fetch_count(), 2);
    assert_eq!(shown(&manager, SurfaceKind::Popup), snippet(GROUPING_BY));
}

#[test]
fn disposing_during_a_fetch_drops_its_result() {
    let (loader, gate) = gated(GROUPING_BY);
    let (mut manager, file) = manager_with(config(), Settings::in_memory(), loader);

    manager.show_for_editor(at(file, "groupingBy"), false);
    gate.started.recv_timeout(WAIT).unwrap();
    manager.dismiss(SurfaceKind::Popup);
    gate.release.send(()).unwrap();
    assert!(manager.run_until_idle(WAIT));

    let state = manager.host().last_surface(SurfaceKind::Popup).unwrap().snapshot();
    assert!(state.disposed);
    assert_eq!(state.mutations_after_dispose, 0);
    assert!(manager.surface_id(SurfaceKind::Popup).is_none());
}

#[test]
fn popup_converts_to_tool_window_without_refetching() {
    let (mut manager, file) = manager();
    manager.show_for_editor(at(file, "groupingBy"), false);
    assert!(manager.run_until_idle(WAIT));

    manager.convert_to_tool_window();
    assert!(manager.run_until_idle(WAIT));

    assert_eq!(manager.fetch_count(), 1);
    assert_eq!(shown(&manager, SurfaceKind::ToolWindow), snippet(GROUPING_BY));
    assert!(manager.host().last_surface(SurfaceKind::Popup).unwrap().is_disposed());
    let tool = manager.host().last_surface(SurfaceKind::ToolWindow).unwrap().snapshot();
    assert!(tool.showing);
    assert_eq!(tool.title, "groupingBy");
    assert!(manager.settings().show_in_tool_window());
}

#[test]
fn stale_popup_is_refetched_into_the_tool_window() {
    let (mut manager, file) = manager();
    manager.show_for_editor(at(file, "groupingBy"), false);
    assert!(manager.run_until_idle(WAIT));

    manager.tree().write().edit_file(file, WORDS).unwrap();
    manager.convert_to_tool_window();
    assert!(manager.run_until_idle(WAIT));

    assert_eq!(manager.fetch_count(), 2);
    assert_eq!(shown(&manager, SurfaceKind::ToolWindow), snippet(GROUPING_BY));
}

#[test]
fn restoring_popup_mode_resolves_once_for_the_previous_focus() {
    let (mut manager, file) = manager();
    let editor = FocusToken(1);
    manager
        .host_mut()
        .focus(editor, FocusContext::Editor(at(file, "groupingBy")));

    manager.show_for_editor(at(file, "groupingBy"), true);
    assert!(manager.run_until_idle(WAIT));
    manager.convert_to_tool_window();
    manager.set_auto_update(false).unwrap();
    let before = manager.resolution_count();

    manager.on_tool_window_content_removed();
    assert!(manager.run_until_idle(WAIT));

    assert_eq!(manager.resolution_count(), before + 1);
    assert!(manager.surface_id(SurfaceKind::ToolWindow).is_none());
    assert!(manager.host().last_surface(SurfaceKind::ToolWindow).unwrap().is_disposed());
    assert!(!manager.settings().show_in_tool_window());
    assert!(!manager.is_auto_updating());
    assert_eq!(manager.host().refocused(), [editor]);
    assert_eq!(shown(&manager, SurfaceKind::Popup), snippet(GROUPING_BY));
}

#[test]
fn restoring_without_a_tool_window_does_nothing() {
    let (mut manager, _) = manager();
    manager.restore_popup_behavior();
    assert_eq!(manager.resolution_count(), 0);
    assert!(manager.host().surfaces().is_empty());
}

#[test]
fn tool_window_preference_opens_the_tool_window_directly() {
    let mut settings = Settings::in_memory();
    settings.set_bool(settings::SHOW_IN_TOOL_WINDOW, true).unwrap();
    let (mut manager, file) = manager_with(config(), settings, Arc::new(EmbeddedSnippets));

    manager.show_for_editor(at(file, "map("), false);
    assert!(manager.run_until_idle(WAIT));

    assert_eq!(manager.host().created(SurfaceKind::Popup), 0);
    assert_eq!(shown(&manager, SurfaceKind::ToolWindow), snippet(MAP));
    assert!(manager.is_auto_updating());

    manager.on_tool_window_visibility(false);
    assert!(!manager.is_auto_updating());
    manager.on_tool_window_visibility(true);
    assert!(manager.is_auto_updating());
}

#[test]
fn auto_update_follows_the_focused_editor() {
    let mut settings = Settings::in_memory();
    settings.set_bool(settings::SHOW_IN_TOOL_WINDOW, true).unwrap();
    let (mut manager, file) = manager_with(config(), settings, Arc::new(EmbeddedSnippets));
    let editor = FocusToken(7);

    manager.host_mut().focus(editor, FocusContext::Editor(at(file, "groupingBy")));
    manager.show_for_editor(at(file, "groupingBy"), false);
    assert!(manager.run_until_idle(WAIT));

    manager.host_mut().focus(editor, FocusContext::Editor(at(file, "map(")));
    let map = snippet(MAP);
    assert!(manager.run_until(WAIT, |m| return shown(m, SurfaceKind::ToolWindow) == map));
}

#[test]
fn auto_update_waits_for_an_idle_user() {
    let mut settings = Settings::in_memory();
    settings.set_bool(settings::SHOW_IN_TOOL_WINDOW, true).unwrap();
    let (mut manager, file) = manager_with(config(), settings, Arc::new(EmbeddedSnippets));
    let editor = FocusToken(7);

    manager.show_for_editor(at(file, "groupingBy"), false);
    assert!(manager.run_until_idle(WAIT));
    manager.host_mut().set_idle(false);
    manager.host_mut().focus(editor, FocusContext::Editor(at(file, "map(")));

    let map = snippet(MAP);
    assert!(!manager.run_until(Duration::from_millis(200), |m| {
        return shown(m, SurfaceKind::ToolWindow) == map;
    }));
    assert_eq!(manager.resolution_count(), 1);
}

#[test]
fn slow_resolution_still_fills_the_surface() {
    let config = Config {
        resolve_timeout: Duration::ZERO,
        ..config()
    };
    let (mut manager, file) = manager_with(config, Settings::in_memory(), Arc::new(EmbeddedSnippets));

    manager.show_for_editor(at(file, "groupingBy"), false);
    let grouping = snippet(GROUPING_BY);
    assert!(manager.run_until(WAIT, |m| return shown(m, SurfaceKind::Popup) == grouping));

    manager.show_for_editor(at(file, "map("), false);
    let map = snippet(MAP);
    assert!(manager.run_until(WAIT, |m| return shown(m, SurfaceKind::Popup) == map));
    assert!(manager.run_until_idle(WAIT));
    assert_eq!(manager.host().created(SurfaceKind::Popup), 1);
}

#[test]
fn unmappable_lookup_item_shows_no_example() {
    let (mut manager, file) = manager();
    manager.show_for_editor(at(file, "groupingBy"), false);
    assert!(manager.run_until_idle(WAIT));

    let mut context = at(file, "groupingBy");
    context.lookup = Some(LookupItem {
        arity: None,
        label: "frobnicate".to_string(),
        qualifier: None,
        target: None,
    });
    manager.update_for_lookup(context);
    assert!(manager.run_until_idle(WAIT));

    let binding = manager.binding(SurfaceKind::Popup).unwrap();
    assert_eq!(binding.text, NO_EXAMPLE_FOUND);
    assert!(binding.element.is_some());
}

#[test]
fn mappable_lookup_item_documents_the_proposal() {
    let (mut manager, file) = manager();
    manager.show_for_editor(at(file, "map("), false);
    assert!(manager.run_until_idle(WAIT));

    let mut context = at(file, "map(");
    context.lookup = Some(LookupItem {
        arity: Some(1),
        label: "groupingBy".to_string(),
        qualifier: Some("Collectors".to_string()),
        target: None,
    });
    manager.update_for_lookup(context);
    assert!(manager.run_until_idle(WAIT));

    assert_eq!(shown(&manager, SurfaceKind::Popup), snippet(GROUPING_BY));
}

#[test]
fn lookup_updates_need_a_visible_surface() {
    let (mut manager, file) = manager();
    let mut context = at(file, "map(");
    context.lookup = Some(LookupItem {
        arity: Some(1),
        label: "filter".to_string(),
        qualifier: None,
        target: None,
    });
    manager.update_for_lookup(context);
    assert!(manager.run_until_idle(WAIT));
    assert!(manager.host().surfaces().is_empty());
    assert_eq!(manager.resolution_count(), 0);
}

#[test]
fn element_links_navigate_with_their_anchor() {
    let (mut manager, file) = manager();
    manager.show_for_editor(at(file, "groupingBy"), false);
    assert!(manager.run_until_idle(WAIT));

    manager.navigate_by_link(SurfaceKind::Popup, None, "psi_element://java.util.stream.Stream.map/1#usage");
    assert!(manager.run_until_idle(WAIT));

    let probe = manager.host().last_surface(SurfaceKind::Popup).unwrap();
    assert_eq!(probe.content(), snippet(MAP));
    assert_eq!(probe.snapshot().anchor.as_deref(), Some("usage"));
}

#[test]
fn escape_closes_the_popup_and_restores_focus() {
    let (mut manager, file) = manager();
    let editor = FocusToken(2);
    manager.host_mut().focus(editor, FocusContext::Editor(at(file, "groupingBy")));
    manager.show_for_editor(at(file, "groupingBy"), true);
    assert!(manager.run_until_idle(WAIT));

    assert!(!manager.on_popup_key(false));
    assert!(manager.surface_id(SurfaceKind::Popup).is_some());
    assert!(manager.on_popup_key(true));
    assert!(manager.surface_id(SurfaceKind::Popup).is_none());
    assert_eq!(manager.host().refocused(), [editor]);
}

#[test]
fn hover_popup_closes_on_the_next_key() {
    let (mut manager, file) = manager();
    manager.show_on_hover(at(file, "groupingBy"));
    assert!(manager.run_until_idle(WAIT));
    assert!(manager.surface_id(SurfaceKind::Popup).is_some());

    manager.on_popup_key(false);
    assert!(manager.surface_id(SurfaceKind::Popup).is_none());
}

#[test]
fn clicking_into_a_hover_popup_keeps_it_open() {
    let (mut manager, file) = manager();
    manager.show_on_hover(at(file, "groupingBy"));
    assert!(manager.run_until_idle(WAIT));

    manager.on_popup_clicked();
    manager.on_popup_key(false);
    assert!(manager.surface_id(SurfaceKind::Popup).is_some());
}

#[test]
fn click_outside_keeps_popups_opened_during_completion() {
    let (mut manager, file) = manager();
    manager.host_mut().set_lookup_active(true);
    manager.show_for_editor(at(file, "groupingBy"), false);
    assert!(manager.run_until_idle(WAIT));

    manager.on_click_outside();
    assert!(manager.surface_id(SurfaceKind::Popup).is_some());

    manager.dismiss(SurfaceKind::Popup);
    manager.host_mut().set_lookup_active(false);
    manager.show_for_editor(at(file, "groupingBy"), false);
    assert!(manager.run_until_idle(WAIT));
    manager.on_click_outside();
    assert!(manager.surface_id(SurfaceKind::Popup).is_none());
}

#[test]
#[should_panic(expected = "belongs to project")]
fn elements_from_another_project_are_rejected() {
    let (mut manager, _) = manager();
    let foreign = SourceTree::new(ProjectId(2), 1024).mint(quickdoc::types::ElementKey::File(FileId(0)));
    manager.show_for_element(foreign, None);
}

#[test]
fn late_resolution_does_not_reopen_a_closed_popup() {
    let (loader, gate) = gated(GROUPING_BY);
    let (mut manager, file) = manager_with(single_worker(), Settings::in_memory(), loader);

    manager.show_for_editor(at(file, "groupingBy"), true);
    gate.started.recv_timeout(WAIT).unwrap();
    manager.show_for_editor(at(file, "map("), true);
    manager.close_popup();

    gate.release.send(()).unwrap();
    assert!(manager.run_until_idle(WAIT));

    assert_eq!(manager.host().created(SurfaceKind::Popup), 1);
    assert!(manager.surface_id(SurfaceKind::Popup).is_none());
    let state = manager.host().last_surface(SurfaceKind::Popup).unwrap().snapshot();
    assert!(state.disposed);
    assert_eq!(state.mutations_after_dispose, 0);
}

#[test]
fn returning_to_the_shown_element_drops_the_fetch_in_flight() {
    let (loader, gate) = gated(MAP);
    let (mut manager, file) = manager_with(config(), Settings::in_memory(), loader);

    manager.show_for_editor(at(file, "groupingBy"), false);
    assert!(manager.run_until_idle(WAIT));
    manager.show_for_editor(at(file, "map("), false);
    gate.started.recv_timeout(WAIT).unwrap();
    manager.show_for_editor(at(file, "groupingBy"), false);

    gate.release.send(()).unwrap();
    assert!(manager.run_until_idle(WAIT));

    let state = manager.host().last_surface(SurfaceKind::Popup).unwrap().snapshot();
    assert_eq!(state.content, snippet(GROUPING_BY));
    assert!(!state.history.contains(&snippet(MAP)));
    assert_eq!(manager.fetch_count(), 2);
}

#[test]
fn superseded_resolution_never_runs() {
    let (loader, gate) = gated(GROUPING_BY);
    let recording = Arc::new(RecordingJava::default());
    let mut providers = ProviderRegistry::with_defaults();
    providers.register(Language::Java, Arc::clone(&recording) as Arc<dyn DocumentationProvider>);
    let mut tree = SourceTree::new(ProjectId(1), 1024 * 1024);
    let file = tree.add_file(Path::new("com/acme/Words.java"), WORDS).unwrap();
    let mut manager = DocumentationManager::with_providers(
        MemoryHost::default(),
        Arc::new(RwLock::new(tree)),
        single_worker(),
        Settings::in_memory(),
        loader,
        providers,
    )
    .unwrap();

    manager.show_for_editor(at(file, "groupingBy"), false);
    gate.started.recv_timeout(WAIT).unwrap();
    manager.show_for_editor(at(file, "map("), false);
    manager.show_for_editor(at(file, "toList"), false);

    gate.release.send(()).unwrap();
    assert!(manager.run_until_idle(WAIT));

    let superseded = WORDS.find("map(").unwrap();
    let offsets = recording.offsets.lock().clone();
    assert!(!offsets.contains(&superseded), "superseded resolution ran: {offsets:?}");
    assert!(offsets.contains(&WORDS.find("toList").unwrap()));
    assert_eq!(manager.resolution_count(), 3);
}
