//! Reference resolution against the repository symbol index
//!
//! Resolution is two-phase: symbols declared in the referencing file shadow
//! everything else (local scope shadows imports), then the repository-wide
//! index is consulted. A name that resolves nowhere becomes an `External`
//! edge — never a dropped one — and a name with several candidates becomes
//! one `Ambiguous` edge per candidate, so downstream consumers see every
//! option instead of a guess.

use dashmap::DashMap;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use trellis_core::{
    Diagnostic, DiagnosticKind, Entity, EntityId, RelationKind, Relationship, Resolution,
    SymbolReference,
};

/// Thread-safe symbol index. Built during merge, read concurrently during
/// resolution; `remove_file` supports incremental re-indexing.
#[derive(Default)]
pub struct SymbolTable {
    /// Bare name -> declaring entities, repository-wide.
    by_name: DashMap<String, Vec<EntityId>>,
    /// File stem -> file entities, for module-path import resolution.
    module_files: DashMap<String, Vec<EntityId>>,
    /// File path -> (name, id) pairs declared in that file.
    file_symbols: DashMap<PathBuf, Vec<(String, EntityId)>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable::default()
    }

    /// Register a file entity under its module stem.
    pub fn insert_file(&self, path: &Path) {
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            let id = EntityId::for_file(path);
            let mut entry = self.module_files.entry(stem.to_string()).or_default();
            if !entry.contains(&id) {
                entry.push(id);
            }
        }
    }

    /// Register a declared symbol.
    pub fn insert_symbol(&self, entity: &Entity) {
        self.by_name
            .entry(entity.name.clone())
            .or_default()
            .push(entity.id);
        self.file_symbols
            .entry(entity.file_path.clone())
            .or_default()
            .push((entity.name.clone(), entity.id));
    }

    /// Drop everything a file declared. Returns the names that were
    /// declared, so the updater can find references that may now dangle.
    pub fn remove_file(&self, path: &Path) -> Vec<String> {
        let mut names = Vec::new();
        if let Some((_, symbols)) = self.file_symbols.remove(&path.to_path_buf()) {
            for (name, id) in symbols {
                if let Some(mut ids) = self.by_name.get_mut(&name) {
                    ids.retain(|&candidate| candidate != id);
                }
                names.push(name);
            }
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            let file_id = EntityId::for_file(path);
            if let Some(mut ids) = self.module_files.get_mut(stem) {
                ids.retain(|&candidate| candidate != file_id);
            }
        }
        names.sort();
        names.dedup();
        names
    }

    /// Names declared in a file, for change-impact computation.
    pub fn names_in_file(&self, path: &Path) -> Vec<String> {
        let mut names: Vec<String> = self
            .file_symbols
            .get(&path.to_path_buf())
            .map(|entry| entry.iter().map(|(name, _)| name.clone()).collect())
            .unwrap_or_default();
        names.sort();
        names.dedup();
        names
    }

    fn lookup_in_file(&self, path: &Path, name: &str) -> Vec<EntityId> {
        self.file_symbols
            .get(&path.to_path_buf())
            .map(|entry| {
                entry
                    .iter()
                    .filter(|(candidate, _)| candidate == name)
                    .map(|&(_, id)| id)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn lookup_name(&self, name: &str) -> Vec<EntityId> {
        self.by_name
            .get(name)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    fn lookup_module(&self, stem: &str) -> Vec<EntityId> {
        self.module_files
            .get(stem)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }
}

/// Edges plus the placeholder entities and diagnostics resolution produced.
/// Placeholders must be inserted into the graph before the edges.
#[derive(Debug, Default)]
pub struct ResolutionOutcome {
    pub edges: Vec<Relationship>,
    pub externals: Vec<Entity>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Resolve one file's raw references.
pub fn resolve_references(
    table: &SymbolTable,
    path: &Path,
    references: &[SymbolReference],
) -> ResolutionOutcome {
    let mut outcome = ResolutionOutcome::default();

    for reference in references {
        let candidates = if reference.kind == RelationKind::Import {
            resolve_import(table, &reference.name)
        } else {
            resolve_symbol(table, path, &reference.name)
        };

        match candidates.len() {
            0 => {
                outcome.externals.push(Entity::external(&reference.name));
                outcome.edges.push(edge(
                    reference,
                    path,
                    EntityId::external(&reference.name),
                    Resolution::External,
                ));
                if reference.kind != RelationKind::Import {
                    outcome.diagnostics.push(
                        Diagnostic::new(
                            path,
                            DiagnosticKind::UnresolvedReference,
                            format!("unresolved reference to `{}`", reference.name),
                        )
                        .at_line(reference.line),
                    );
                }
            }
            1 => {
                outcome
                    .edges
                    .push(edge(reference, path, candidates[0], Resolution::Resolved));
            }
            _ => {
                // Several candidates: surface all of them, sorted by
                // identifier for deterministic output, tagged ambiguous.
                let mut sorted = candidates;
                sorted.sort();
                sorted.dedup();
                for candidate in sorted {
                    outcome
                        .edges
                        .push(edge(reference, path, candidate, Resolution::Ambiguous));
                }
            }
        }
    }

    outcome
}

fn edge(
    reference: &SymbolReference,
    path: &Path,
    target: EntityId,
    resolution: Resolution,
) -> Relationship {
    Relationship {
        source: reference.from,
        target,
        kind: reference.kind,
        resolution,
        site_file: Some(path.to_path_buf()),
        site_line: Some(reference.line),
        metadata: Default::default(),
    }
}

/// Same-file symbols first; only when the local scope has no match does the
/// repository-wide index answer.
fn resolve_symbol(table: &SymbolTable, path: &Path, name: &str) -> Vec<EntityId> {
    let local = table.lookup_in_file(path, name);
    if !local.is_empty() {
        return local;
    }
    table.lookup_name(name)
}

/// Import paths resolve against file stems, rightmost segment first, then
/// fall back to a symbol lookup (`from x import y` references `y` itself).
fn resolve_import(table: &SymbolTable, module_path: &str) -> Vec<EntityId> {
    let segments = import_segments(module_path);

    for segment in segments.iter().rev() {
        let files = table.lookup_module(segment);
        if !files.is_empty() {
            return files;
        }
    }
    if let Some(last) = segments.last() {
        let symbols = table.lookup_name(last);
        if !symbols.is_empty() {
            return symbols;
        }
    }
    Vec::new()
}

fn import_segments(module_path: &str) -> Vec<&str> {
    module_path
        .split(|c: char| c == ':' || c == '.' || c == '/')
        .filter(|s| !s.is_empty() && *s != "crate" && *s != "super" && *s != "self")
        .collect()
}

/// Names whose declaration (or disappearance) can change how these
/// references resolve. The updater indexes referencing files under these
/// names so a changed file pulls in exactly its dependents, not the whole
/// repository.
pub fn trigger_names(references: &[SymbolReference]) -> HashSet<String> {
    let mut names = HashSet::new();
    for reference in references {
        if reference.kind == RelationKind::Import {
            for segment in import_segments(&reference.name) {
                names.insert(segment.to_string());
            }
        } else {
            names.insert(reference.name.clone());
        }
    }
    names
}
