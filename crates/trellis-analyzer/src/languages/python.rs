//! Python language analyzer

use super::{node_text, qualify, symbol_entity};
use crate::analyzer::{LanguageAnalyzer, ParsedFile};
use crate::parser::{self, line_of};
use std::path::Path;
use tree_sitter::Node;
use trellis_core::{
    EngineError, Entity, EntityId, EntityKind, Language, RelationKind, SymbolReference, Visibility,
};

pub struct PythonAnalyzer;

impl LanguageAnalyzer for PythonAnalyzer {
    fn language(&self) -> Language {
        Language::Python
    }

    fn parse(&self, path: &Path, content: &[u8]) -> Result<ParsedFile, EngineError> {
        parser::parse_source(Language::Python, path, content)
    }

    fn extract_symbols(&self, path: &Path, parsed: &ParsedFile) -> Vec<Entity> {
        let mut symbols = Vec::new();
        let mut scopes: Vec<String> = Vec::new();
        collect_symbols(
            parsed.tree.root_node(),
            &parsed.source,
            path,
            &mut scopes,
            false,
            &mut symbols,
        );
        symbols
    }

    fn detect_relationships(
        &self,
        path: &Path,
        parsed: &ParsedFile,
        file_entity: EntityId,
        _symbols: &[Entity],
    ) -> Vec<SymbolReference> {
        let mut refs = Vec::new();
        let mut scopes: Vec<String> = Vec::new();
        let mut enclosing = Vec::new();
        collect_references(
            parsed.tree.root_node(),
            &parsed.source,
            path,
            file_entity,
            &mut scopes,
            &mut enclosing,
            false,
            &mut refs,
        );
        refs
    }
}

/// Leading underscore is the Python privacy convention.
fn visibility_of(name: &str) -> Visibility {
    if name.starts_with('_') {
        Visibility::Private
    } else {
        Visibility::Public
    }
}

/// First line of a function/class docstring, when the body opens with one.
fn doc_summary_of(node: Node, source: &str) -> Option<String> {
    let body = node.child_by_field_name("body")?;
    let first = body.named_child(0)?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let string = first.named_child(0)?;
    if string.kind() != "string" {
        return None;
    }
    let text = node_text(string, source);
    let stripped = text.trim_matches(|c| c == '"' || c == '\'');
    stripped.lines().next().map(|l| l.trim().to_string())
}

fn signature_of(node: Node, source: &str) -> Option<String> {
    let name = node.child_by_field_name("name")?;
    let parameters = node.child_by_field_name("parameters")?;
    Some(format!(
        "def {}{}",
        node_text(name, source),
        node_text(parameters, source)
    ))
}

fn collect_symbols(
    node: Node,
    source: &str,
    path: &Path,
    scopes: &mut Vec<String>,
    in_class: bool,
    out: &mut Vec<Entity>,
) {
    if node.is_error() {
        return;
    }

    match node.kind() {
        "function_definition" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = node_text(name_node, source).to_string();
                let kind = if in_class {
                    EntityKind::Method
                } else {
                    EntityKind::Function
                };
                let mut entity = symbol_entity(
                    path,
                    node,
                    kind,
                    &name,
                    qualify(path, scopes, &name),
                    Language::Python,
                    visibility_of(&name),
                    signature_of(node, source),
                );
                entity.doc_summary = doc_summary_of(node, source);
                out.push(entity);
                scopes.push(name);
                if let Some(body) = node.child_by_field_name("body") {
                    collect_children(body, source, path, scopes, false, out);
                }
                scopes.pop();
            }
            return;
        }
        "class_definition" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = node_text(name_node, source).to_string();
                let mut entity = symbol_entity(
                    path,
                    node,
                    EntityKind::Class,
                    &name,
                    qualify(path, scopes, &name),
                    Language::Python,
                    visibility_of(&name),
                    None,
                );
                entity.doc_summary = doc_summary_of(node, source);
                out.push(entity);
                scopes.push(name);
                if let Some(body) = node.child_by_field_name("body") {
                    collect_children(body, source, path, scopes, true, out);
                }
                scopes.pop();
            }
            return;
        }
        "assignment" => {
            // Module-level `NAME = ...` declares a variable.
            if scopes.is_empty() && !in_class {
                if let Some(left) = node.child_by_field_name("left") {
                    if left.kind() == "identifier" {
                        let name = node_text(left, source).to_string();
                        out.push(symbol_entity(
                            path,
                            node,
                            EntityKind::Variable,
                            &name,
                            qualify(path, scopes, &name),
                            Language::Python,
                            visibility_of(&name),
                            None,
                        ));
                    }
                }
            }
            return;
        }
        _ => {}
    }

    collect_children(node, source, path, scopes, in_class, out);
}

fn collect_children(
    node: Node,
    source: &str,
    path: &Path,
    scopes: &mut Vec<String>,
    in_class: bool,
    out: &mut Vec<Entity>,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_symbols(child, source, path, scopes, in_class, out);
    }
}

/// Callee name: `f(...)` or `obj.method(...)`.
fn callee_name(node: Node, source: &str) -> Option<String> {
    match node.kind() {
        "identifier" => Some(node_text(node, source).to_string()),
        "attribute" => node
            .child_by_field_name("attribute")
            .map(|n| node_text(n, source).to_string()),
        _ => None,
    }
}

#[allow(clippy::too_many_arguments)]
fn collect_references(
    node: Node,
    source: &str,
    path: &Path,
    file_entity: EntityId,
    scopes: &mut Vec<String>,
    enclosing: &mut Vec<EntityId>,
    in_class: bool,
    out: &mut Vec<SymbolReference>,
) {
    if node.is_error() {
        return;
    }

    let from = enclosing.last().copied().unwrap_or(file_entity);

    match node.kind() {
        "import_statement" => {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                let module = match child.kind() {
                    "dotted_name" => Some(node_text(child, source)),
                    "aliased_import" => child
                        .child_by_field_name("name")
                        .map(|n| node_text(n, source)),
                    _ => None,
                };
                if let Some(module) = module {
                    out.push(SymbolReference {
                        from,
                        name: module.to_string(),
                        kind: RelationKind::Import,
                        line: line_of(node),
                    });
                }
            }
            return;
        }
        "import_from_statement" => {
            if let Some(module) = node.child_by_field_name("module_name") {
                out.push(SymbolReference {
                    from,
                    name: node_text(module, source).to_string(),
                    kind: RelationKind::Import,
                    line: line_of(node),
                });
            }
            return;
        }
        "call" => {
            if let Some(function) = node.child_by_field_name("function") {
                if let Some(name) = callee_name(function, source) {
                    out.push(SymbolReference {
                        from,
                        name,
                        kind: RelationKind::Call,
                        line: line_of(node),
                    });
                }
            }
            descend(
                node, source, path, file_entity, scopes, enclosing, in_class, out,
            );
            return;
        }
        "assignment" => {
            if let Some(right) = node.child_by_field_name("right") {
                if right.kind() == "identifier" {
                    out.push(SymbolReference {
                        from,
                        name: node_text(right, source).to_string(),
                        kind: RelationKind::DataFlow,
                        line: line_of(node),
                    });
                }
            }
            descend(
                node, source, path, file_entity, scopes, enclosing, in_class, out,
            );
            return;
        }
        "decorator" => {
            if let Some(inner) = node.named_child(0) {
                let name = match inner.kind() {
                    "identifier" => Some(node_text(inner, source).to_string()),
                    "attribute" => callee_name(inner, source),
                    "call" => inner
                        .child_by_field_name("function")
                        .and_then(|f| callee_name(f, source)),
                    _ => None,
                };
                if let Some(name) = name {
                    out.push(SymbolReference {
                        from,
                        name,
                        kind: RelationKind::Reference,
                        line: line_of(node),
                    });
                }
            }
            return;
        }
        "function_definition" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = node_text(name_node, source).to_string();
                let kind = if in_class {
                    EntityKind::Method
                } else {
                    EntityKind::Function
                };
                let id = EntityId::new(path, kind, &qualify(path, scopes, &name));
                scopes.push(name);
                enclosing.push(id);
                if let Some(body) = node.child_by_field_name("body") {
                    descend(body, source, path, file_entity, scopes, enclosing, false, out);
                }
                enclosing.pop();
                scopes.pop();
            }
            return;
        }
        "class_definition" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = node_text(name_node, source).to_string();
                let id = EntityId::new(path, EntityKind::Class, &qualify(path, scopes, &name));
                // Superclasses in the argument list.
                if let Some(superclasses) = node.child_by_field_name("superclasses") {
                    let mut cursor = superclasses.walk();
                    for argument in superclasses.named_children(&mut cursor) {
                        if let Some(base) = callee_name(argument, source) {
                            out.push(SymbolReference {
                                from: id,
                                name: base,
                                kind: RelationKind::Inherit,
                                line: line_of(node),
                            });
                        }
                    }
                }
                scopes.push(name);
                enclosing.push(id);
                if let Some(body) = node.child_by_field_name("body") {
                    descend(body, source, path, file_entity, scopes, enclosing, true, out);
                }
                enclosing.pop();
                scopes.pop();
            }
            return;
        }
        _ => {}
    }

    descend(
        node, source, path, file_entity, scopes, enclosing, in_class, out,
    );
}

#[allow(clippy::too_many_arguments)]
fn descend(
    node: Node,
    source: &str,
    path: &Path,
    file_entity: EntityId,
    scopes: &mut Vec<String>,
    enclosing: &mut Vec<EntityId>,
    in_class: bool,
    out: &mut Vec<SymbolReference>,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_references(
            child, source, path, file_entity, scopes, enclosing, in_class, out,
        );
    }
}
