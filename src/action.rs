//! The "show example" editor action.

use crate::manager::DocumentationManager;
use crate::resolver::EditorContext;
use crate::source::SourceTree;
use crate::surface::{SurfaceHost, SurfaceKind};
use crate::types::{ElementRef, ProjectId};

/// What the action sees when it is updated or performed.
#[derive(Debug, Clone, Default)]
pub struct ActionContext {
    /// Editor with its caret, if invoked from one.
    pub editor: Option<EditorContext>,
    /// Element selected outside an editor.
    pub element: Option<ElementRef>,
    /// Invoked from the editor gutter.
    pub from_gutter: bool,
    /// A completion list is active.
    pub lookup_active: bool,
    /// Open project, if any.
    pub project: Option<ProjectId>,
}

/// Shows the example for the element at the caret, or for the selected element.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShowExampleAction;

impl ShowExampleAction {
    /// Whether the action is available.
    pub fn is_enabled(&self, context: &ActionContext, tree: &SourceTree) -> bool {
        if context.project.is_none() || (context.editor.is_none() && context.element.is_none()) {
            return false;
        }
        if context.lookup_active {
            return true;
        }
        if context.from_gutter {
            return false;
        }
        let Some(editor) = &context.editor else {
            return false;
        };
        return tree.file(editor.file).is_some() || context.element.is_some();
    }

    /// Run the action. Focus moves into the documentation unless a completion
    /// list is active and no popup is showing yet.
    pub fn perform<H: SurfaceHost>(&self, manager: &mut DocumentationManager<H>, context: &ActionContext) {
        let has_popup = manager.surface_id(SurfaceKind::Popup).is_some();
        let request_focus = has_popup || !context.lookup_active;
        if let Some(editor) = &context.editor {
            manager.show_for_editor(editor.clone(), request_focus);
            return;
        }
        if let Some(element) = &context.element {
            manager.show_for_element(element.clone(), Some(element.clone()));
        }
    }
}
