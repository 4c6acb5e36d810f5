//! Rust language analyzer — the reference implementation for the
//! capability interface. Extracts modules, functions, types, and constants;
//! detects imports, calls, trait impls, field composition, and parameter
//! type references.

use super::{node_text, qualify, symbol_entity};
use crate::analyzer::{LanguageAnalyzer, ParsedFile};
use crate::parser::{self, line_of};
use std::path::Path;
use tree_sitter::Node;
use trellis_core::{
    EngineError, Entity, EntityId, EntityKind, Language, RelationKind, SymbolReference, Visibility,
};

pub struct RustAnalyzer;

impl LanguageAnalyzer for RustAnalyzer {
    fn language(&self) -> Language {
        Language::Rust
    }

    fn parse(&self, path: &Path, content: &[u8]) -> Result<ParsedFile, EngineError> {
        parser::parse_source(Language::Rust, path, content)
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
        symbols: &[Entity],
    ) -> Vec<SymbolReference> {
        let mut refs = Vec::new();
        let mut enclosing = Vec::new();
        let mut scopes: Vec<String> = Vec::new();
        collect_references(
            parsed.tree.root_node(),
            &parsed.source,
            path,
            file_entity,
            symbols,
            &mut scopes,
            &mut enclosing,
            false,
            &mut refs,
        );
        refs
    }
}

fn visibility_of(node: Node) -> Visibility {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "visibility_modifier" {
            return Visibility::Public;
        }
    }
    Visibility::Private
}

/// First line of the `///` block immediately above a declaration.
fn doc_summary_of(node: Node, source: &str) -> Option<String> {
    let mut first_doc: Option<String> = None;
    let mut cursor = node.prev_sibling();
    while let Some(sibling) = cursor {
        if sibling.kind() != "line_comment" {
            break;
        }
        let text = node_text(sibling, source);
        let Some(stripped) = text.strip_prefix("///") else {
            break;
        };
        first_doc = Some(stripped.trim().to_string());
        cursor = sibling.prev_sibling();
    }
    first_doc
}

/// Declaration text up to the body, for the typed `signature` field.
fn signature_of(node: Node, source: &str) -> Option<String> {
    let body = node.child_by_field_name("body")?;
    let text = source.get(node.start_byte()..body.start_byte())?;
    Some(text.split_whitespace().collect::<Vec<_>>().join(" "))
}

fn collect_symbols(
    node: Node,
    source: &str,
    path: &Path,
    scopes: &mut Vec<String>,
    in_impl: bool,
    out: &mut Vec<Entity>,
) {
    if node.is_error() {
        return;
    }

    match node.kind() {
        "mod_item" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = node_text(name_node, source).to_string();
                let mut entity = symbol_entity(
                    path,
                    node,
                    EntityKind::Module,
                    &name,
                    qualify(path, scopes, &name),
                    Language::Rust,
                    visibility_of(node),
                    None,
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
        "function_item" | "function_signature_item" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = node_text(name_node, source).to_string();
                let kind = if in_impl {
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
                    Language::Rust,
                    visibility_of(node),
                    signature_of(node, source),
                );
                entity.doc_summary = doc_summary_of(node, source);
                out.push(entity);
                // Nested functions still count; qualify them by their parent.
                scopes.push(name);
                if let Some(body) = node.child_by_field_name("body") {
                    collect_children(body, source, path, scopes, false, out);
                }
                scopes.pop();
            }
            return;
        }
        "struct_item" | "enum_item" | "trait_item" | "type_item" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = node_text(name_node, source).to_string();
                let kind = match node.kind() {
                    "struct_item" => EntityKind::Struct,
                    "enum_item" => EntityKind::Enum,
                    "trait_item" => EntityKind::Interface,
                    _ => EntityKind::TypeAlias,
                };
                let mut entity = symbol_entity(
                    path,
                    node,
                    kind,
                    &name,
                    qualify(path, scopes, &name),
                    Language::Rust,
                    visibility_of(node),
                    None,
                );
                entity.doc_summary = doc_summary_of(node, source);
                out.push(entity);
                if node.kind() == "trait_item" {
                    scopes.push(name);
                    if let Some(body) = node.child_by_field_name("body") {
                        collect_children(body, source, path, scopes, true, out);
                    }
                    scopes.pop();
                }
            }
            return;
        }
        "const_item" | "static_item" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = node_text(name_node, source).to_string();
                out.push(symbol_entity(
                    path,
                    node,
                    EntityKind::Constant,
                    &name,
                    qualify(path, scopes, &name),
                    Language::Rust,
                    visibility_of(node),
                    None,
                ));
            }
            return;
        }
        "impl_item" => {
            // No entity for the impl block itself; methods live under the
            // implemented type's scope.
            if let Some(type_node) = node.child_by_field_name("type") {
                let type_name = base_type_name(type_node, source);
                scopes.push(type_name);
                if let Some(body) = node.child_by_field_name("body") {
                    collect_children(body, source, path, scopes, true, out);
                }
                scopes.pop();
            }
            return;
        }
        _ => {}
    }

    collect_children(node, source, path, scopes, in_impl, out);
}

fn collect_children(
    node: Node,
    source: &str,
    path: &Path,
    scopes: &mut Vec<String>,
    in_impl: bool,
    out: &mut Vec<Entity>,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_symbols(child, source, path, scopes, in_impl, out);
    }
}

/// `Foo` from `Foo`, `Foo<T>`, or `a::b::Foo`.
fn base_type_name(node: Node, source: &str) -> String {
    match node.kind() {
        "generic_type" => node
            .child_by_field_name("type")
            .map(|t| base_type_name(t, source))
            .unwrap_or_default(),
        "scoped_type_identifier" | "scoped_identifier" => node
            .child_by_field_name("name")
            .map(|t| node_text(t, source).to_string())
            .unwrap_or_default(),
        _ => node_text(node, source).to_string(),
    }
}

/// Callee name from the `function` child of a call expression.
fn callee_name(node: Node, source: &str) -> Option<String> {
    match node.kind() {
        "identifier" => Some(node_text(node, source).to_string()),
        "scoped_identifier" => node
            .child_by_field_name("name")
            .map(|n| node_text(n, source).to_string()),
        "field_expression" => node
            .child_by_field_name("field")
            .map(|n| node_text(n, source).to_string()),
        "generic_function" => node
            .child_by_field_name("function")
            .and_then(|n| callee_name(n, source)),
        _ => None,
    }
}

#[allow(clippy::too_many_arguments)]
fn collect_references(
    node: Node,
    source: &str,
    path: &Path,
    file_entity: EntityId,
    symbols: &[Entity],
    scopes: &mut Vec<String>,
    enclosing: &mut Vec<EntityId>,
    in_impl: bool,
    out: &mut Vec<SymbolReference>,
) {
    if node.is_error() {
        return;
    }

    let from = enclosing.last().copied().unwrap_or(file_entity);

    match node.kind() {
        "use_declaration" => {
            if let Some(argument) = node.child_by_field_name("argument") {
                out.push(SymbolReference {
                    from,
                    name: node_text(argument, source).to_string(),
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
            // Receivers and arguments may contain nested calls.
            descend(
                node, source, path, file_entity, symbols, scopes, enclosing, in_impl, out,
            );
            return;
        }
        "let_declaration" => {
            // `let x = y;` — the value flows from a named symbol.
            if let Some(value) = node.child_by_field_name("value") {
                if value.kind() == "identifier" {
                    out.push(SymbolReference {
                        from,
                        name: node_text(value, source).to_string(),
                        kind: RelationKind::DataFlow,
                        line: line_of(node),
                    });
                }
            }
            descend(
                node, source, path, file_entity, symbols, scopes, enclosing, in_impl, out,
            );
            return;
        }
        "field_declaration" => {
            // Struct fields compose their field types.
            if let Some(type_node) = node.child_by_field_name("type") {
                let name = base_type_name(type_node, source);
                if !name.is_empty() {
                    out.push(SymbolReference {
                        from,
                        name,
                        kind: RelationKind::Compose,
                        line: line_of(node),
                    });
                }
            }
            return;
        }
        "parameters" => {
            collect_type_references(node, source, from, out);
            return;
        }
        "mod_item" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = node_text(name_node, source).to_string();
                let id = EntityId::new(path, EntityKind::Module, &qualify(path, scopes, &name));
                scopes.push(name);
                enclosing.push(id);
                if let Some(body) = node.child_by_field_name("body") {
                    descend(
                        body, source, path, file_entity, symbols, scopes, enclosing, false, out,
                    );
                }
                enclosing.pop();
                scopes.pop();
            }
            return;
        }
        "function_item" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = node_text(name_node, source).to_string();
                let kind = if in_impl {
                    EntityKind::Method
                } else {
                    EntityKind::Function
                };
                let id = EntityId::new(path, kind, &qualify(path, scopes, &name));
                scopes.push(name);
                enclosing.push(id);
                if let Some(parameters) = node.child_by_field_name("parameters") {
                    collect_type_references(parameters, source, id, out);
                }
                if let Some(body) = node.child_by_field_name("body") {
                    descend(
                        body, source, path, file_entity, symbols, scopes, enclosing, false, out,
                    );
                }
                enclosing.pop();
                scopes.pop();
            }
            return;
        }
        "struct_item" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = node_text(name_node, source).to_string();
                let id = EntityId::new(path, EntityKind::Struct, &qualify(path, scopes, &name));
                enclosing.push(id);
                if let Some(body) = node.child_by_field_name("body") {
                    descend(
                        body, source, path, file_entity, symbols, scopes, enclosing, in_impl, out,
                    );
                }
                enclosing.pop();
            }
            return;
        }
        "trait_item" => {
            // Default method bodies resolve under the trait's scope.
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = node_text(name_node, source).to_string();
                let id = EntityId::new(path, EntityKind::Interface, &qualify(path, scopes, &name));
                scopes.push(name);
                enclosing.push(id);
                if let Some(body) = node.child_by_field_name("body") {
                    descend(
                        body, source, path, file_entity, symbols, scopes, enclosing, true, out,
                    );
                }
                enclosing.pop();
                scopes.pop();
            }
            return;
        }
        "impl_item" => {
            let type_name = node
                .child_by_field_name("type")
                .map(|t| base_type_name(t, source))
                .unwrap_or_default();
            // `impl Trait for Type` inherits the trait's contract.
            if let Some(trait_node) = node.child_by_field_name("trait") {
                let impl_from = symbols
                    .iter()
                    .find(|s| s.name == type_name)
                    .map(|s| s.id)
                    .unwrap_or(file_entity);
                out.push(SymbolReference {
                    from: impl_from,
                    name: base_type_name(trait_node, source),
                    kind: RelationKind::Inherit,
                    line: line_of(node),
                });
            }
            if !type_name.is_empty() {
                scopes.push(type_name);
                if let Some(body) = node.child_by_field_name("body") {
                    descend(
                        body, source, path, file_entity, symbols, scopes, enclosing, true, out,
                    );
                }
                scopes.pop();
            }
            return;
        }
        _ => {}
    }

    descend(
        node, source, path, file_entity, symbols, scopes, enclosing, in_impl, out,
    );
}

#[allow(clippy::too_many_arguments)]
fn descend(
    node: Node,
    source: &str,
    path: &Path,
    file_entity: EntityId,
    symbols: &[Entity],
    scopes: &mut Vec<String>,
    enclosing: &mut Vec<EntityId>,
    in_impl: bool,
    out: &mut Vec<SymbolReference>,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_references(
            child, source, path, file_entity, symbols, scopes, enclosing, in_impl, out,
        );
    }
}

/// Every `type_identifier` under a parameter list is a type reference.
fn collect_type_references(node: Node, source: &str, from: EntityId, out: &mut Vec<SymbolReference>) {
    if node.kind() == "type_identifier" {
        out.push(SymbolReference {
            from,
            name: node_text(node, source).to_string(),
            kind: RelationKind::Reference,
            line: line_of(node),
        });
        return;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_type_references(child, source, from, out);
    }
}
