//! Shared walker for the ECMAScript family
//!
//! The TypeScript grammar is a superset of the JavaScript one and both use
//! the same node kinds for the common subset, so one walker serves both
//! analyzers; TypeScript-only declarations simply never match under the
//! JavaScript grammar.

use super::{node_text, qualify, symbol_entity};
use crate::parser::line_of;
use std::path::Path;
use tree_sitter::Node;
use trellis_core::{
    Entity, EntityId, EntityKind, Language, RelationKind, SymbolReference, Visibility,
};

pub(crate) fn collect_symbols(
    node: Node,
    source: &str,
    path: &Path,
    language: Language,
    scopes: &mut Vec<String>,
    exported: bool,
    out: &mut Vec<Entity>,
) {
    if node.is_error() {
        return;
    }

    let visibility = if exported {
        Visibility::Public
    } else {
        Visibility::Private
    };

    match node.kind() {
        "export_statement" => {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                collect_symbols(child, source, path, language, scopes, true, out);
            }
            return;
        }
        "function_declaration" | "generator_function_declaration" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = node_text(name_node, source).to_string();
                out.push(symbol_entity(
                    path,
                    node,
                    EntityKind::Function,
                    &name,
                    qualify(path, scopes, &name),
                    language,
                    visibility,
                    None,
                ));
            }
            return;
        }
        "class_declaration" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = node_text(name_node, source).to_string();
                out.push(symbol_entity(
                    path,
                    node,
                    EntityKind::Class,
                    &name,
                    qualify(path, scopes, &name),
                    language,
                    visibility,
                    None,
                ));
                scopes.push(name);
                if let Some(body) = node.child_by_field_name("body") {
                    let mut cursor = body.walk();
                    for member in body.named_children(&mut cursor) {
                        if member.kind() == "method_definition" {
                            if let Some(method_name) = member.child_by_field_name("name") {
                                let method = node_text(method_name, source).to_string();
                                out.push(symbol_entity(
                                    path,
                                    member,
                                    EntityKind::Method,
                                    &method,
                                    qualify(path, scopes, &method),
                                    language,
                                    visibility,
                                    None,
                                ));
                            }
                        }
                    }
                }
                scopes.pop();
            }
            return;
        }
        "lexical_declaration" | "variable_declaration" => {
            let mut cursor = node.walk();
            for declarator in node.named_children(&mut cursor) {
                if declarator.kind() != "variable_declarator" {
                    continue;
                }
                let Some(name_node) = declarator.child_by_field_name("name") else {
                    continue;
                };
                if name_node.kind() != "identifier" {
                    continue;
                }
                let name = node_text(name_node, source).to_string();
                let value_kind = declarator
                    .child_by_field_name("value")
                    .map(|v| v.kind())
                    .unwrap_or_default();
                let kind = match value_kind {
                    "arrow_function" | "function_expression" | "function" => EntityKind::Function,
                    _ if scopes.is_empty() => EntityKind::Variable,
                    _ => continue,
                };
                out.push(symbol_entity(
                    path,
                    declarator,
                    kind,
                    &name,
                    qualify(path, scopes, &name),
                    language,
                    visibility,
                    None,
                ));
            }
            return;
        }
        // TypeScript-only declarations; never match under the JS grammar.
        "interface_declaration" | "type_alias_declaration" | "enum_declaration" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = node_text(name_node, source).to_string();
                let kind = match node.kind() {
                    "interface_declaration" => EntityKind::Interface,
                    "type_alias_declaration" => EntityKind::TypeAlias,
                    _ => EntityKind::Enum,
                };
                out.push(symbol_entity(
                    path,
                    node,
                    kind,
                    &name,
                    qualify(path, scopes, &name),
                    language,
                    visibility,
                    None,
                ));
            }
            return;
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_symbols(child, source, path, language, scopes, exported, out);
    }
}

/// Callee name: `f(...)` or `obj.method(...)`.
fn callee_name(node: Node, source: &str) -> Option<String> {
    match node.kind() {
        "identifier" => Some(node_text(node, source).to_string()),
        "member_expression" => node
            .child_by_field_name("property")
            .map(|n| node_text(n, source).to_string()),
        _ => None,
    }
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn collect_references(
    node: Node,
    source: &str,
    path: &Path,
    file_entity: EntityId,
    scopes: &mut Vec<String>,
    enclosing: &mut Vec<EntityId>,
    out: &mut Vec<SymbolReference>,
) {
    if node.is_error() {
        return;
    }

    let from = enclosing.last().copied().unwrap_or(file_entity);

    match node.kind() {
        "import_statement" => {
            if let Some(source_node) = node.child_by_field_name("source") {
                let module = node_text(source_node, source)
                    .trim_matches('"')
                    .trim_matches('\'')
                    .to_string();
                out.push(SymbolReference {
                    from,
                    name: module,
                    kind: RelationKind::Import,
                    line: line_of(node),
                });
            }
            return;
        }
        "call_expression" => {
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
            descend(node, source, path, file_entity, scopes, enclosing, out);
            return;
        }
        "new_expression" => {
            if let Some(constructor) = node.child_by_field_name("constructor") {
                if let Some(name) = callee_name(constructor, source) {
                    out.push(SymbolReference {
                        from,
                        name,
                        kind: RelationKind::Compose,
                        line: line_of(node),
                    });
                }
            }
            descend(node, source, path, file_entity, scopes, enclosing, out);
            return;
        }
        "function_declaration" | "generator_function_declaration" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = node_text(name_node, source).to_string();
                let id = EntityId::new(path, EntityKind::Function, &qualify(path, scopes, &name));
                scopes.push(name);
                enclosing.push(id);
                descend(node, source, path, file_entity, scopes, enclosing, out);
                enclosing.pop();
                scopes.pop();
            }
            return;
        }
        "class_declaration" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = node_text(name_node, source).to_string();
                let id = EntityId::new(path, EntityKind::Class, &qualify(path, scopes, &name));
                // `extends` base in the heritage clause.
                let mut cursor = node.walk();
                for child in node.children(&mut cursor) {
                    if child.kind() == "class_heritage" {
                        collect_heritage(child, source, id, out);
                    }
                }
                scopes.push(name);
                enclosing.push(id);
                if let Some(body) = node.child_by_field_name("body") {
                    let mut cursor = body.walk();
                    for member in body.named_children(&mut cursor) {
                        if member.kind() == "method_definition" {
                            if let Some(method_name) = member.child_by_field_name("name") {
                                let method = node_text(method_name, source).to_string();
                                let method_id = EntityId::new(
                                    path,
                                    EntityKind::Method,
                                    &qualify(path, scopes, &method),
                                );
                                enclosing.push(method_id);
                                descend(member, source, path, file_entity, scopes, enclosing, out);
                                enclosing.pop();
                            }
                        } else {
                            descend(member, source, path, file_entity, scopes, enclosing, out);
                        }
                    }
                }
                enclosing.pop();
                scopes.pop();
            }
            return;
        }
        _ => {}
    }

    descend(node, source, path, file_entity, scopes, enclosing, out);
}

/// Identifiers under `extends` / `implements` clauses.
fn collect_heritage(node: Node, source: &str, from: EntityId, out: &mut Vec<SymbolReference>) {
    if matches!(node.kind(), "identifier" | "type_identifier") {
        out.push(SymbolReference {
            from,
            name: node_text(node, source).to_string(),
            kind: RelationKind::Inherit,
            line: line_of(node),
        });
        return;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_heritage(child, source, from, out);
    }
}

fn descend(
    node: Node,
    source: &str,
    path: &Path,
    file_entity: EntityId,
    scopes: &mut Vec<String>,
    enclosing: &mut Vec<EntityId>,
    out: &mut Vec<SymbolReference>,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_references(child, source, path, file_entity, scopes, enclosing, out);
    }
}
