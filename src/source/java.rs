//! Java indexing and call resolution.

use tree_sitter::Node;

use super::{
    CallSite, Declaration, DeclarationKind, Import, IndexBuilder, Receiver, SourceFile, SourceTree,
};
use crate::error::Error;
use crate::types::{ElementKey, Language};

/// Calls whose result is a `java.util.stream.Stream`.
pub const STREAM_PRODUCERS: &[&str] = &[
    "boxed",
    "distinct",
    "dropWhile",
    "filter",
    "flatMap",
    "limit",
    "map",
    "mapToObj",
    "parallelStream",
    "peek",
    "skip",
    "sorted",
    "stream",
    "takeWhile",
];

/// Types visible in every Java file without an import.
const JAVA_LANG_TYPES: &[&str] = &[
    "Boolean",
    "Character",
    "Double",
    "Integer",
    "Iterable",
    "Long",
    "Math",
    "Object",
    "String",
    "StringBuilder",
    "System",
    "Thread",
];

/// Enclosing naming context during the walk.
#[derive(Default, Clone)]
struct Scope {
    /// Qualified name of the innermost enclosing type.
    type_name: Option<String>,
}

/// Walk a Java syntax tree into the builder.
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

/// Index one node and recurse into the parts that can hold more declarations or calls.
fn walk(node: Node<'_>, builder: &mut IndexBuilder<'_>, scope: &Scope) {
    match node.kind() {
        "package_declaration" => {
            let mut cursor = node.walk();
            let name = node
                .named_children(&mut cursor)
                .find(|c| return matches!(c.kind(), "scoped_identifier" | "identifier"));
            if let Some(name) = name {
                let package = builder.text(name).to_string();
                builder.set_package(package);
            }
        },
        "import_declaration" => {
            if let Some(import) = parse_import(node, builder) {
                builder.push_import(import);
            }
        },
        "class_declaration"
        | "interface_declaration"
        | "enum_declaration"
        | "record_declaration"
        | "annotation_type_declaration" => {
            let Some(name_node) = node.child_by_field_name("name") else {
                walk_children(node, builder, scope);
                return;
            };
            let name = builder.text(name_node).to_string();
            let qualified_name = match (&scope.type_name, &builder.index.package) {
                (Some(outer), _) => format!("{outer}.{name}"),
                (None, Some(package)) => format!("{package}.{name}"),
                (None, None) => name.clone(),
            };
            let header_end = node
                .child_by_field_name("body")
                .map_or(node.end_byte(), |b| return b.start_byte());
            let signature = builder.signature(node.start_byte(), header_end);
            builder.push_declaration(Declaration {
                byte_range: node.byte_range(),
                declaring_type: scope.type_name.clone(),
                doc: None,
                kind: DeclarationKind::Type,
                name,
                name_range: name_node.byte_range(),
                qualified_name: qualified_name.clone(),
                signature,
            });
            let inner = Scope {
                type_name: Some(qualified_name),
            };
            walk_children(node, builder, &inner);
        },
        "method_declaration" | "constructor_declaration" => {
            let Some(name_node) = node.child_by_field_name("name") else {
                walk_children(node, builder, scope);
                return;
            };
            let name = builder.text(name_node).to_string();
            let parameter_count = node.child_by_field_name("parameters").map_or(0, |params| {
                let mut cursor = params.walk();
                return params
                    .named_children(&mut cursor)
                    .filter(|p| return matches!(p.kind(), "formal_parameter" | "spread_parameter"))
                    .count();
            });
            let header_end = node
                .child_by_field_name("body")
                .map_or(node.end_byte(), |b| return b.start_byte());
            let signature = builder.signature(node.start_byte(), header_end);
            builder.push_declaration(Declaration {
                byte_range: node.byte_range(),
                declaring_type: scope.type_name.clone(),
                doc: None,
                kind: DeclarationKind::Member { parameter_count },
                name: name.clone(),
                name_range: name_node.byte_range(),
                qualified_name: qualify(scope, &name),
                signature,
            });
            walk_children(node, builder, scope);
        },
        "field_declaration" | "constant_declaration" => {
            let mut cursor = node.walk();
            let declarators: Vec<Node<'_>> = node
                .named_children(&mut cursor)
                .filter(|c| return c.kind() == "variable_declarator")
                .collect();
            let signature = builder.signature(node.start_byte(), node.end_byte());
            for declarator in &declarators {
                let Some(name_node) = declarator.child_by_field_name("name") else {
                    continue;
                };
                let name = builder.text(name_node).to_string();
                builder.push_declaration(Declaration {
                    byte_range: node.byte_range(),
                    declaring_type: scope.type_name.clone(),
                    doc: None,
                    kind: DeclarationKind::Field,
                    name: name.clone(),
                    name_range: name_node.byte_range(),
                    qualified_name: qualify(scope, &name),
                    signature: signature.clone(),
                });
            }
            walk_children(node, builder, scope);
        },
        "method_invocation" => {
            if let Some(call) = parse_call(node, builder, scope) {
                builder.push_call(call);
            }
            walk_children(node, builder, scope);
        },
        "block_comment" | "line_comment" => {
            let doc = node.kind() == "block_comment" && builder.text(node).starts_with("/**");
            let owner_start = if doc { documented_sibling(node).map(|n| return n.start_byte()) } else { None };
            builder.push_comment(node.byte_range(), doc, owner_start);
        },
        _ => walk_children(node, builder, scope),
    }
}

/// `Outer.name`, or just `name` at top level.
fn qualify(scope: &Scope, name: &str) -> String {
    return scope
        .type_name
        .as_ref()
        .map_or_else(|| return name.to_string(), |t| return format!("{t}.{name}"));
}

/// The declaration a doc comment sits in front of, skipping other comments.
fn documented_sibling(comment: Node<'_>) -> Option<Node<'_>> {
    let mut next = comment.next_named_sibling();
    while let Some(node) = next {
        if !matches!(node.kind(), "block_comment" | "line_comment") {
            return Some(node);
        }
        next = node.next_named_sibling();
    }
    return None;
}

/// Parse `import [static] a.b.C[.*];`.
fn parse_import(node: Node<'_>, builder: &IndexBuilder<'_>) -> Option<Import> {
    let mut is_static = false;
    let mut wildcard = false;
    let mut path = None;
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "static" => is_static = true,
            "asterisk" => wildcard = true,
            "scoped_identifier" | "identifier" => path = Some(builder.text(child).to_string()),
            _ => {},
        }
    }
    return path.map(|path| {
        return Import {
            is_static,
            path,
            wildcard,
        };
    });
}

/// Build a call site from a `method_invocation` node.
fn parse_call(node: Node<'_>, builder: &IndexBuilder<'_>, scope: &Scope) -> Option<CallSite> {
    let name_node = node.child_by_field_name("name")?;
    let arguments = node.child_by_field_name("arguments")?;
    let mut cursor = arguments.walk();
    let argument_count = arguments
        .named_children(&mut cursor)
        .filter(|a| return !matches!(a.kind(), "block_comment" | "line_comment"))
        .count();
    return Some(CallSite {
        argument_count,
        arguments_range: arguments.byte_range(),
        byte_range: node.byte_range(),
        enclosing_type: scope.type_name.clone(),
        name: builder.text(name_node).to_string(),
        name_range: name_node.byte_range(),
        receiver: classify_receiver(node.child_by_field_name("object"), builder),
    });
}

/// Decide what a call's receiver expression denotes.
fn classify_receiver(object: Option<Node<'_>>, builder: &IndexBuilder<'_>) -> Receiver {
    let Some(object) = object else {
        return Receiver::None;
    };
    let text = builder.text(object).to_string();
    return match object.kind() {
        "this" | "super" => Receiver::SelfRef,
        "identifier" | "field_access" | "scoped_identifier" if looks_like_type_path(&text) => {
            Receiver::Type(text)
        },
        "method_invocation" => Receiver::Expression {
            last_call: object
                .child_by_field_name("name")
                .map(|n| return builder.text(n).to_string()),
            text,
        },
        _ => Receiver::Expression { last_call: None, text },
    };
}

/// `Collectors`, `java.util.stream.Collectors`: identifier segments ending in a capitalized one.
fn looks_like_type_path(text: &str) -> bool {
    let mut segments = text.split('.').peekable();
    while let Some(segment) = segments.next() {
        if segment.is_empty() || !segment.chars().all(|c| return c.is_alphanumeric() || c == '_') {
            return false;
        }
        if segments.peek().is_none() {
            return segment.chars().next().is_some_and(char::is_uppercase);
        }
    }
    return false;
}

/// Resolve what a Java call invokes.
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
            if let Some(key) = same_file_member(file, call) {
                return Ok(Some(key));
            }
            let Some(declaring_type) = static_import_for(file, &call.name) else {
                return Ok(None);
            };
            member_in_type(tree, &declaring_type, &call.name, call.argument_count)
        },
        Receiver::SelfRef => Ok(same_file_member(file, call)),
        Receiver::Type(name) => {
            let Some(qualified) = resolve_type_name(tree, file, name)? else {
                return Ok(None);
            };
            member_in_type(tree, &qualified, &call.name, call.argument_count)
        },
        Receiver::Expression { .. } => Ok(None),
    };
}

/// A member with matching name and arity in the calling file, preferring the enclosing type.
fn same_file_member(file: &SourceFile, call: &CallSite) -> Option<ElementKey> {
    let candidates = || {
        return file.index.declarations.iter().filter(|d| {
            return d.name == call.name && d.parameter_count() == Some(call.argument_count);
        });
    };
    let decl = candidates()
        .find(|d| return d.declaring_type == call.enclosing_type)
        .or_else(|| return candidates().next())?;
    return Some(ElementKey::Declaration {
        file: file.id,
        parameter_count: decl.parameter_count(),
        qualified_name: decl.qualified_name.clone(),
    });
}

/// Declaring type of a statically imported member.
fn static_import_for(file: &SourceFile, name: &str) -> Option<String> {
    let suffix = format!(".{name}");
    let explicit = file.index.imports.iter().find(|i| {
        return i.is_static && !i.wildcard && i.path.ends_with(&suffix);
    });
    if let Some(import) = explicit {
        return import.path.strip_suffix(&suffix).map(str::to_string);
    }
    let mut wildcards = file.index.imports.iter().filter(|i| return i.is_static && i.wildcard);
    let only = wildcards.next()?;
    if wildcards.next().is_some() {
        return None;
    }
    return Some(only.path.clone());
}

/// A project member, or an external member when the type is not in the project.
fn member_in_type(
    tree: &SourceTree,
    qualified_type: &str,
    name: &str,
    parameter_count: usize,
) -> Result<Option<ElementKey>, Error> {
    if tree.find_type(qualified_type)?.is_some() {
        return tree.find_member(qualified_type, name, parameter_count);
    }
    return Ok(Some(ElementKey::External {
        declaring_type: qualified_type.to_string(),
        language: Language::Java,
        name: name.to_string(),
        parameter_count,
    }));
}

/// Qualify a simple type name using the file's imports and package.
///
/// # Errors
///
/// Returns `Error::IndexNotReady` when project types must be consulted during indexing.
pub fn resolve_type_name(tree: &SourceTree, file: &SourceFile, name: &str) -> Result<Option<String>, Error> {
    if name.contains('.') {
        return Ok(Some(name.to_string()));
    }

    let suffix = format!(".{name}");
    let explicit = file.index.imports.iter().find(|i| {
        return !i.is_static && !i.wildcard && (i.path.ends_with(&suffix) || i.path == name);
    });
    if let Some(import) = explicit {
        return Ok(Some(import.path.clone()));
    }

    let same_package = file
        .index
        .package
        .as_ref()
        .map_or_else(|| return name.to_string(), |p| return format!("{p}.{name}"));
    if tree.find_type(&same_package)?.is_some() {
        return Ok(Some(same_package));
    }

    let wildcards: Vec<&Import> = file
        .index
        .imports
        .iter()
        .filter(|i| return !i.is_static && i.wildcard)
        .collect();
    for import in &wildcards {
        let candidate = format!("{}.{name}", import.path);
        if tree.find_type(&candidate)?.is_some() {
            return Ok(Some(candidate));
        }
    }

    if JAVA_LANG_TYPES.contains(&name) {
        return Ok(Some(format!("java.lang.{name}")));
    }

    // With one on-demand import left, it is the only place the type can come from.
    if let [only] = wildcards.as_slice() {
        return Ok(Some(format!("{}.{name}", only.path)));
    }
    return Ok(None);
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::types::ProjectId;

    fn load(files: &[(&str, &str)]) -> SourceTree {
        let mut tree = SourceTree::new(ProjectId(1), 1024 * 1024);
        for (path, text) in files {
            tree.add_file(Path::new(path), text).unwrap();
        }
        return tree;
    }

    fn target(tree: &SourceTree, path: &str, needle: &str) -> Option<ElementKey> {
        let id = tree.file_by_path(Path::new(path)).unwrap();
        let text = &tree.file(id).unwrap().text;
        return tree.find_target_element(id, text.find(needle).unwrap()).unwrap();
    }

    #[test]
    fn type_paths_need_a_capitalized_last_segment() {
        assert!(looks_like_type_path("Collectors"));
        assert!(looks_like_type_path("java.util.stream.Collectors"));
        assert!(!looks_like_type_path("words"));
        assert!(!looks_like_type_path("this.words"));
        assert!(!looks_like_type_path("a.b()"));
    }

    #[test]
    fn static_imports_resolve_unqualified_calls() {
        let tree = load(&[(
            "A.java",
            "import static java.util.stream.Collectors.groupingBy;\n\
             class A { Object f(java.util.List<String> w) { return groupingBy(String::length); } }\n",
        )]);
        assert_eq!(
            target(&tree, "A.java", "groupingBy(String"),
            Some(ElementKey::External {
                declaring_type: "java.util.stream.Collectors".to_string(),
                language: Language::Java,
                name: "groupingBy".to_string(),
                parameter_count: 1,
            })
        );
    }

    #[test]
    fn project_types_resolve_to_declarations() {
        let tree = load(&[
            (
                "p/Util.java",
                "package p;\npublic class Util { public static int twice(int x) { return x * 2; } }\n",
            ),
            ("p/Main.java", "package p;\nclass Main { int run() { return Util.twice(4); } }\n"),
        ]);
        assert!(matches!(
            target(&tree, "p/Main.java", "twice"),
            Some(ElementKey::Declaration { qualified_name, parameter_count: Some(1), .. })
                if qualified_name == "p.Util.twice"
        ));
    }

    #[test]
    fn project_members_with_wrong_arity_do_not_resolve() {
        let tree = load(&[
            ("p/Util.java", "package p;\npublic class Util { static int twice(int x) { return x; } }\n"),
            ("p/Main.java", "package p;\nclass Main { int run() { return Util.twice(4, 5); } }\n"),
        ]);
        assert_eq!(target(&tree, "p/Main.java", "twice"), None);
    }

    #[test]
    fn wildcard_import_qualifies_unknown_types() {
        let tree = load(&[(
            "A.java",
            "import java.util.stream.*;\nclass A { Object f() { return Collectors.toList(); } }\n",
        )]);
        assert!(matches!(
            target(&tree, "A.java", "toList"),
            Some(ElementKey::External { declaring_type, .. }) if declaring_type == "java.util.stream.Collectors"
        ));
    }

    #[test]
    fn java_lang_types_need_no_import() {
        let tree = load(&[("A.java", "class A { Object f() { return String.valueOf(1); } }\n")]);
        assert!(matches!(
            target(&tree, "A.java", "valueOf"),
            Some(ElementKey::External { declaring_type, .. }) if declaring_type == "java.lang.String"
        ));
    }

    #[test]
    fn expression_receivers_are_left_to_providers() {
        let tree = load(&[("A.java", "class A { Object f(java.util.List<String> w) { return w.stream(); } }\n")]);
        assert_eq!(target(&tree, "A.java", "stream"), None);
    }
}
