//! Rust indexing and call resolution.

use tree_sitter::Node;

use super::{CallSite, Declaration, DeclarationKind, IndexBuilder, Receiver, SourceFile, SourceTree};
use crate::error::Error;
use crate::types::{ElementKey, Language};

/// Enclosing naming context during the walk.
#[derive(Default, Clone)]
struct Scope {
    /// Self type of the innermost `impl` or `trait` block.
    impl_type: Option<String>,
}

/// Walk a Rust syntax tree into the builder.
pub(super) fn index(root: Node<'_>, builder: &mut IndexBuilder<'_>) {
    walk(root, builder, &Scope::default());
}

/// Visit every child of a node.
fn walk_children(node: Node<'_>, builder: &mut IndexBuilder<'_>, scope: &Scope) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        walk(child, builder, scope);
    }
}

fn walk(node: Node<'_>, builder: &mut IndexBuilder<'_>, scope: &Scope) {
    match node.kind() {
        "function_item" | "function_signature_item" => {
            let Some(name_node) = node.child_by_field_name("name") else {
                walk_children(node, builder, scope);
                return;
            };
            let name = builder.text(name_node).to_string();
            let parameter_count = node.child_by_field_name("parameters").map_or(0, |params| {
                let mut cursor = params.walk();
                return params
                    .named_children(&mut cursor)
                    .filter(|p| return p.kind() == "parameter")
                    .count();
            });
            let header_end = node
                .child_by_field_name("body")
                .map_or(node.end_byte(), |b| return b.start_byte());
            let signature = builder.signature(node.start_byte(), header_end);
            builder.push_declaration(Declaration {
                byte_range: node.byte_range(),
                declaring_type: scope.impl_type.clone(),
                doc: None,
                kind: DeclarationKind::Member { parameter_count },
                name: name.clone(),
                name_range: name_node.byte_range(),
                qualified_name: qualify(scope, &name),
                signature,
            });
            walk_children(node, builder, scope);
        },
        "impl_item" => {
            let impl_type = node
                .child_by_field_name("type")
                .map(|t| return strip_generics(builder.text(t)).to_string());
            let inner = Scope { impl_type };
            walk_children(node, builder, &inner);
        },
        "struct_item" | "enum_item" | "trait_item" | "type_item" | "union_item" => {
            let Some(name_node) = node.child_by_field_name("name") else {
                walk_children(node, builder, scope);
                return;
            };
            let name = builder.text(name_node).to_string();
            let header_end = node
                .child_by_field_name("body")
                .map_or(node.end_byte(), |b| return b.start_byte());
            let signature = builder.signature(node.start_byte(), header_end);
            builder.push_declaration(Declaration {
                byte_range: node.byte_range(),
                declaring_type: None,
                doc: None,
                kind: DeclarationKind::Type,
                name: name.clone(),
                name_range: name_node.byte_range(),
                qualified_name: name.clone(),
                signature,
            });
            let inner = if node.kind() == "trait_item" {
                Scope { impl_type: Some(name) }
            } else {
                scope.clone()
            };
            walk_children(node, builder, &inner);
        },
        "const_item" | "static_item" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = builder.text(name_node).to_string();
                let signature = builder.signature(node.start_byte(), node.end_byte());
                builder.push_declaration(Declaration {
                    byte_range: node.byte_range(),
                    declaring_type: scope.impl_type.clone(),
                    doc: None,
                    kind: DeclarationKind::Field,
                    name: name.clone(),
                    name_range: name_node.byte_range(),
                    qualified_name: qualify(scope, &name),
                    signature,
                });
            }
            walk_children(node, builder, scope);
        },
        "call_expression" => {
            if let Some(call) = parse_call(node, builder, scope) {
                builder.push_call(call);
            }
            walk_children(node, builder, scope);
        },
        "line_comment" | "block_comment" => {
            let text = builder.text(node);
            let doc = (text.starts_with("///") && !text.starts_with("////"))
                || (text.starts_with("/**") && !text.starts_with("/**/"));
            let owner_start = if doc { documented_sibling(node).map(|n| return n.start_byte()) } else { None };
            builder.push_comment(node.byte_range(), doc, owner_start);
        },
        _ => walk_children(node, builder, scope),
    }
}

/// `Type.name`, or just `name` for free functions.
fn qualify(scope: &Scope, name: &str) -> String {
    return scope
        .impl_type
        .as_ref()
        .map_or_else(|| return name.to_string(), |t| return format!("{t}.{name}"));
}

/// `Foo<T>` becomes `Foo`.
fn strip_generics(text: &str) -> &str {
    return text.split('<').next().unwrap_or(text).trim();
}

/// The item a doc comment sits in front of, skipping comments and attributes.
fn documented_sibling(comment: Node<'_>) -> Option<Node<'_>> {
    let mut next = comment.next_named_sibling();
    while let Some(node) = next {
        if !matches!(node.kind(), "line_comment" | "block_comment" | "attribute_item") {
            return Some(node);
        }
        next = node.next_named_sibling();
    }
    return None;
}

/// Build a call site from a `call_expression` node.
fn parse_call(node: Node<'_>, builder: &IndexBuilder<'_>, scope: &Scope) -> Option<CallSite> {
    let mut function = node.child_by_field_name("function")?;
    if function.kind() == "generic_function" {
        function = function.child_by_field_name("function")?;
    }
    let arguments = node.child_by_field_name("arguments")?;

    let (name_node, receiver) = match function.kind() {
        "identifier" => (function, Receiver::None),
        "scoped_identifier" => {
            let name = function.child_by_field_name("name")?;
            let receiver = match function.child_by_field_name("path") {
                None => Receiver::None,
                Some(path) => {
                    let text = builder.text(path);
                    if text == "Self" {
                        Receiver::SelfRef
                    } else {
                        Receiver::Type(strip_generics(text).to_string())
                    }
                },
            };
            (name, receiver)
        },
        "field_expression" => {
            let name = function.child_by_field_name("field")?;
            let value = function.child_by_field_name("value")?;
            let receiver = match value.kind() {
                "self" => Receiver::SelfRef,
                "call_expression" => Receiver::Expression {
                    last_call: called_name(value, builder),
                    text: builder.text(value).to_string(),
                },
                _ => Receiver::Expression {
                    last_call: None,
                    text: builder.text(value).to_string(),
                },
            };
            (name, receiver)
        },
        _ => return None,
    };

    let mut cursor = arguments.walk();
    let argument_count = arguments
        .named_children(&mut cursor)
        .filter(|a| return !matches!(a.kind(), "line_comment" | "block_comment" | "attribute_item"))
        .count();
    return Some(CallSite {
        argument_count,
        arguments_range: arguments.byte_range(),
        byte_range: node.byte_range(),
        enclosing_type: scope.impl_type.clone(),
        name: builder.text(name_node).to_string(),
        name_range: name_node.byte_range(),
        receiver,
    });
}

/// Name of the function a call expression invokes.
fn called_name(call: Node<'_>, builder: &IndexBuilder<'_>) -> Option<String> {
    let function = call.child_by_field_name("function")?;
    let name = match function.kind() {
        "identifier" => function,
        "scoped_identifier" => function.child_by_field_name("name")?,
        "field_expression" => function.child_by_field_name("field")?,
        _ => return None,
    };
    return Some(builder.text(name).to_string());
}

/// Resolve what a Rust call invokes.
///
/// # Errors
///
/// Returns `Error::IndexNotReady` when a cross-file lookup is needed during indexing.
pub(super) fn resolve_call(
    tree: &SourceTree,
    file: &SourceFile,
    call: &CallSite,
) -> Result<Option<ElementKey>, Error> {
    return match &call.receiver {
        Receiver::None => {
            if let Some(key) = file_member(file, None, call) {
                return Ok(Some(key));
            }
            let free: Vec<ElementKey> = tree
                .find_members_named(&call.name, call.argument_count)?
                .into_iter()
                .filter(|k| {
                    return matches!(k, ElementKey::Declaration { qualified_name, .. } if *qualified_name == call.name);
                })
                .collect();
            Ok(single(free))
        },
        Receiver::SelfRef => Ok(file_member(file, call.enclosing_type.as_deref(), call)),
        Receiver::Type(path) => {
            let type_name = path.rsplit("::").next().unwrap_or(path);
            if tree.find_type(type_name)?.is_some() {
                return tree.find_member(type_name, &call.name, call.argument_count);
            }
            // Methods called through `Type::` include the receiver in the argument list.
            Ok(Some(ElementKey::External {
                declaring_type: path.clone(),
                language: Language::Rust,
                name: call.name.clone(),
                parameter_count: call.argument_count,
            }))
        },
        Receiver::Expression { .. } => Ok(single(tree.find_members_named(&call.name, call.argument_count)?)),
    };
}

/// A function in the calling file with the given self type.
fn file_member(file: &SourceFile, declaring_type: Option<&str>, call: &CallSite) -> Option<ElementKey> {
    let decl = file.index.declarations.iter().find(|d| {
        return d.declaring_type.as_deref() == declaring_type
            && d.name == call.name
            && d.parameter_count() == Some(call.argument_count);
    })?;
    return Some(ElementKey::Declaration {
        file: file.id,
        parameter_count: decl.parameter_count(),
        qualified_name: decl.qualified_name.clone(),
    });
}

/// The candidate when there is exactly one.
fn single(mut candidates: Vec<ElementKey>) -> Option<ElementKey> {
    if candidates.len() == 1 {
        return candidates.pop();
    }
    return None;
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::types::ProjectId;

    const SHAPES: &str = r"
/// A circle.
#[derive(Debug)]
pub struct Circle {
    radius: f64,
}

impl Circle {
    /// Area of the circle.
    pub fn area(&self) -> f64 {
        self.scale(self.radius)
    }

    fn scale(&self, r: f64) -> f64 {
        r * r * 3.14
    }
}

fn main() {
    let c = Circle { radius: 1.0 };
    let v = Vec::with_capacity(4);
    println!();
    c.area();
    helper(1, 2);
}

fn helper(a: i32, b: i32) -> i32 { a + b }
";

    fn tree() -> (SourceTree, crate::types::FileId) {
        let mut tree = SourceTree::new(ProjectId(1), 1024 * 1024);
        let id = tree.add_file(Path::new("src/shapes.rs"), SHAPES).unwrap();
        return (tree, id);
    }

    fn target(tree: &SourceTree, id: crate::types::FileId, needle: &str) -> Option<ElementKey> {
        return tree.find_target_element(id, SHAPES.find(needle).unwrap()).unwrap();
    }

    #[test]
    fn impl_methods_exclude_self_from_arity() {
        let (tree, id) = tree();
        let file = tree.file(id).unwrap();
        let area = file.index.declarations.iter().find(|d| d.name == "area").unwrap();
        assert_eq!(area.qualified_name, "Circle.area");
        assert_eq!(area.parameter_count(), Some(0));
        assert!(area.doc.as_deref().unwrap().starts_with("/// Area of the circle."));
    }

    #[test]
    fn doc_comments_skip_attributes() {
        let (tree, id) = tree();
        let file = tree.file(id).unwrap();
        let circle = file.index.declarations.iter().find(|d| d.name == "Circle").unwrap();
        assert!(circle.doc.as_deref().unwrap().contains("A circle."));
    }

    #[test]
    fn self_calls_resolve_within_the_impl() {
        let (tree, id) = tree();
        assert!(matches!(
            target(&tree, id, "scale(self"),
            Some(ElementKey::Declaration { qualified_name, .. }) if qualified_name == "Circle.scale"
        ));
    }

    #[test]
    fn free_functions_resolve_by_arity() {
        let (tree, id) = tree();
        assert!(matches!(
            target(&tree, id, "helper(1"),
            Some(ElementKey::Declaration { qualified_name, .. }) if qualified_name == "helper"
        ));
    }

    #[test]
    fn unknown_type_paths_are_external() {
        let (tree, id) = tree();
        assert_eq!(
            target(&tree, id, "with_capacity"),
            Some(ElementKey::External {
                declaring_type: "Vec".to_string(),
                language: Language::Rust,
                name: "with_capacity".to_string(),
                parameter_count: 1,
            })
        );
    }

    #[test]
    fn method_calls_on_values_resolve_when_unambiguous() {
        let (tree, id) = tree();
        assert!(matches!(
            target(&tree, id, "area();"),
            Some(ElementKey::Declaration { qualified_name, .. }) if qualified_name == "Circle.area"
        ));
    }
}
