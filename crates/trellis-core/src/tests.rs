//! Unit tests for trellis-core

use crate::graph::CodeGraph;
use crate::model::*;
use crate::query::CancelToken;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

fn entity(name: &str, kind: EntityKind) -> Entity {
    let path = PathBuf::from("src/test.rs");
    Entity {
        id: EntityId::new(&path, kind, name),
        kind,
        name: name.to_string(),
        qualified_name: name.to_string(),
        file_path: path,
        span: None,
        visibility: Visibility::Unknown,
        language: Some(Language::Rust),
        signature: None,
        doc_summary: None,
        metadata: HashMap::new(),
    }
}

fn call(source: EntityId, target: EntityId) -> Relationship {
    Relationship {
        source,
        target,
        kind: RelationKind::Call,
        resolution: Resolution::Resolved,
        site_file: Some(PathBuf::from("src/test.rs")),
        site_line: Some(1),
        metadata: HashMap::new(),
    }
}

#[test]
fn entity_id_is_stable() {
    let path = PathBuf::from("src/lib.rs");
    let id = EntityId::new(&path, EntityKind::Function, "lib::run");
    let same = EntityId::new(&path, EntityKind::Function, "lib::run");
    assert_eq!(id, same);

    let different_name = EntityId::new(&path, EntityKind::Function, "lib::stop");
    assert_ne!(id, different_name);

    let different_kind = EntityId::new(&path, EntityKind::Struct, "lib::run");
    assert_ne!(id, different_kind);

    let different_file = EntityId::new(Path::new("src/other.rs"), EntityKind::Function, "lib::run");
    assert_ne!(id, different_file);
}

#[test]
fn same_identifier_replaces_in_place() {
    let mut graph = CodeGraph::new();
    let a = graph.add_entity(entity("a", EntityKind::Function));
    let b = graph.add_entity(entity("b", EntityKind::Function));
    graph.add_edge(call(a, b));

    // Re-adding under the same identifier swaps the value, keeps the edge.
    let mut replacement = entity("a", EntityKind::Function);
    replacement.signature = Some("fn a() -> i32".to_string());
    graph.add_entity(replacement);

    assert_eq!(graph.entity_count(), 2);
    assert_eq!(graph.edge_count(), 1);
    assert_eq!(
        graph.entity(a).unwrap().signature.as_deref(),
        Some("fn a() -> i32")
    );
}

#[test]
fn removal_cascades_through_edges() {
    let mut graph = CodeGraph::new();
    let a = graph.add_entity(entity("a", EntityKind::Function));
    let b = graph.add_entity(entity("b", EntityKind::Function));
    let c = graph.add_entity(entity("c", EntityKind::Function));
    graph.add_edge(call(a, b));
    graph.add_edge(call(b, c));
    graph.add_edge(call(c, a));

    graph.remove_entities(&[b]);

    assert_eq!(graph.entity_count(), 2);
    assert_eq!(graph.edge_count(), 1);
    // Reverse adjacency agrees with forward adjacency after the cascade.
    assert!(graph.edges_from(a).next().is_none());
    assert!(graph.edges_to(c).next().is_none());
    assert_eq!(graph.edges_to(a).count(), 1);
}

#[test]
fn edge_with_unknown_endpoint_is_dropped() {
    let mut graph = CodeGraph::new();
    let a = graph.add_entity(entity("a", EntityKind::Function));
    let ghost = EntityId(0xdead);
    assert!(!graph.add_edge(call(a, ghost)));
    assert_eq!(graph.edge_count(), 0);
}

#[test]
fn parallel_edges_are_distinct() {
    // Two call sites between the same two entities are two edges.
    let mut graph = CodeGraph::new();
    let a = graph.add_entity(entity("a", EntityKind::Function));
    let b = graph.add_entity(entity("b", EntityKind::Function));
    let mut first = call(a, b);
    first.site_line = Some(3);
    let mut second = call(a, b);
    second.site_line = Some(9);
    graph.add_edge(first);
    graph.add_edge(second);
    assert_eq!(graph.edge_count(), 2);
    assert_eq!(graph.edges_from(a).count(), 2);
}

#[test]
fn traversal_covers_direct_neighbors_both_ways() {
    let mut graph = CodeGraph::new();
    let a = graph.add_entity(entity("a", EntityKind::Function));
    let b = graph.add_entity(entity("b", EntityKind::Function));
    let c = graph.add_entity(entity("c", EntityKind::Function));
    graph.add_edge(call(a, b));
    graph.add_edge(call(a, c));

    let token = CancelToken::none();
    let deps = graph.dependencies(a, 1, &token);
    assert_eq!(deps.steps.len(), 2);
    assert!(deps.ids().contains(&b));
    assert!(deps.ids().contains(&c));
    assert!(!deps.incomplete);

    // Every direct dependency shows up as a dependent from the other side.
    for id in [b, c] {
        let back = graph.dependents(id, 1, &token);
        assert!(back.ids().contains(&a));
    }
}

#[test]
fn traversal_terminates_across_cycles() {
    let mut graph = CodeGraph::new();
    let a = graph.add_entity(entity("a", EntityKind::Function));
    let b = graph.add_entity(entity("b", EntityKind::Function));
    graph.add_edge(call(a, b));
    graph.add_edge(call(b, a));

    let deps = graph.dependencies(a, 10, &CancelToken::none());
    // a -> b -> a dedups on the revisit.
    assert_eq!(deps.steps.len(), 1);
    assert_eq!(deps.steps[0].id, b);
}

#[test]
fn traversal_respects_depth_bound() {
    let mut graph = CodeGraph::new();
    let a = graph.add_entity(entity("a", EntityKind::Function));
    let b = graph.add_entity(entity("b", EntityKind::Function));
    let c = graph.add_entity(entity("c", EntityKind::Function));
    graph.add_edge(call(a, b));
    graph.add_edge(call(b, c));

    let deps = graph.dependencies(a, 1, &CancelToken::none());
    assert_eq!(deps.ids(), vec![b]);

    let deeper = graph.dependencies(a, 2, &CancelToken::none());
    assert_eq!(deeper.steps.len(), 2);
    assert_eq!(deeper.steps[1].depth, 2);
}

#[test]
fn containment_edges_are_not_dependencies() {
    let mut graph = CodeGraph::new();
    let dir = graph.add_entity(entity("src", EntityKind::Directory));
    let file = graph.add_entity(entity("test.rs", EntityKind::File));
    graph.add_edge(Relationship::contains(dir, file));

    let deps = graph.dependencies(dir, 5, &CancelToken::none());
    assert!(deps.steps.is_empty());
}

#[test]
fn cycle_reported_once_per_component() {
    let mut graph = CodeGraph::new();
    let a = graph.add_entity(entity("a", EntityKind::Function));
    let b = graph.add_entity(entity("b", EntityKind::Function));
    let c = graph.add_entity(entity("c", EntityKind::Function));
    let d = graph.add_entity(entity("d", EntityKind::Function));
    graph.add_edge(call(a, b));
    graph.add_edge(call(b, c));
    graph.add_edge(call(c, a));
    graph.add_edge(call(c, d)); // d is outside the component

    let search = graph.find_cycles(&CancelToken::none());
    assert!(!search.incomplete);
    assert_eq!(search.cycles.len(), 1);

    let mut expected = vec![a, b, c];
    expected.sort();
    assert_eq!(search.cycles[0].members, expected);
}

#[test]
fn self_loop_counts_as_cycle() {
    let mut graph = CodeGraph::new();
    let a = graph.add_entity(entity("a", EntityKind::Function));
    graph.add_edge(call(a, a));

    let search = graph.find_cycles(&CancelToken::none());
    assert_eq!(search.cycles.len(), 1);
    assert_eq!(search.cycles[0].members, vec![a]);
}

#[test]
fn acyclic_graph_has_no_cycles() {
    let mut graph = CodeGraph::new();
    let a = graph.add_entity(entity("a", EntityKind::Function));
    let b = graph.add_entity(entity("b", EntityKind::Function));
    graph.add_edge(call(a, b));

    assert!(graph.find_cycles(&CancelToken::none()).cycles.is_empty());
}

#[test]
fn shortest_path_by_hops() {
    let mut graph = CodeGraph::new();
    let a = graph.add_entity(entity("a", EntityKind::Function));
    let b = graph.add_entity(entity("b", EntityKind::Function));
    let c = graph.add_entity(entity("c", EntityKind::Function));
    graph.add_edge(call(a, b));
    graph.add_edge(call(b, c));
    graph.add_edge(call(a, c));

    let search = graph.shortest_path(a, c, &CancelToken::none());
    assert_eq!(search.paths, vec![vec![a, c]]);
}

#[test]
fn simple_paths_enumerates_all_routes() {
    let mut graph = CodeGraph::new();
    let a = graph.add_entity(entity("a", EntityKind::Function));
    let b = graph.add_entity(entity("b", EntityKind::Function));
    let c = graph.add_entity(entity("c", EntityKind::Function));
    graph.add_edge(call(a, b));
    graph.add_edge(call(b, c));
    graph.add_edge(call(a, c));

    let search = graph.simple_paths(a, c, 8, 64, &CancelToken::none());
    assert!(!search.incomplete);
    assert_eq!(search.paths.len(), 2);
    assert!(search.paths.contains(&vec![a, c]));
    assert!(search.paths.contains(&vec![a, b, c]));
}

#[test]
fn simple_paths_flags_depth_bound() {
    let mut graph = CodeGraph::new();
    let a = graph.add_entity(entity("a", EntityKind::Function));
    let b = graph.add_entity(entity("b", EntityKind::Function));
    let c = graph.add_entity(entity("c", EntityKind::Function));
    let d = graph.add_entity(entity("d", EntityKind::Function));
    graph.add_edge(call(a, b));
    graph.add_edge(call(b, c));
    graph.add_edge(call(c, d));

    // Only the 3-hop route exists; a depth bound of 2 must say incomplete.
    let search = graph.simple_paths(a, d, 2, 64, &CancelToken::none());
    assert!(search.paths.is_empty());
    assert!(search.incomplete);
}

#[test]
fn cancelled_token_marks_traversal_incomplete() {
    let mut graph = CodeGraph::new();
    let a = graph.add_entity(entity("a", EntityKind::Function));
    let b = graph.add_entity(entity("b", EntityKind::Function));
    graph.add_edge(call(a, b));

    let token = CancelToken::none();
    token.cancel();
    let deps = graph.dependencies(a, 5, &token);
    assert!(deps.incomplete);

    let expired = CancelToken::with_deadline(Duration::ZERO);
    let search = graph.find_cycles(&expired);
    assert!(search.incomplete);
}

#[test]
fn parts_round_trip_is_isomorphic() {
    let mut graph = CodeGraph::new();
    let a = graph.add_entity(entity("a", EntityKind::Function));
    let b = graph.add_entity(entity("b", EntityKind::Struct));
    graph.add_edge(call(a, b));

    let (entities, edges) = graph.to_parts();
    let rebuilt = CodeGraph::from_parts(entities.clone(), edges.clone());

    assert_eq!(rebuilt.entity_count(), graph.entity_count());
    assert_eq!(rebuilt.edge_count(), graph.edge_count());
    let (mut before, _) = graph.to_parts();
    let (mut after, _) = rebuilt.to_parts();
    before.sort_by_key(|e| e.id);
    after.sort_by_key(|e| e.id);
    assert_eq!(before, after);
}

#[test]
fn prune_drops_orphaned_externals_and_dirs() {
    let mut graph = CodeGraph::new();
    let a = graph.add_entity(entity("a", EntityKind::Function));
    let ext = graph.add_entity(Entity::external("serde"));
    let mut edge = call(a, ext);
    edge.resolution = Resolution::External;
    graph.add_edge(edge);

    // Still referenced: survives the prune.
    assert_eq!(graph.prune_dangling_externals(), 0);

    graph.remove_entities(&[a]);
    assert_eq!(graph.prune_dangling_externals(), 1);
    assert!(!graph.contains_entity(ext));

    let dir = graph.add_entity(Entity::for_directory(Path::new("src")));
    assert_eq!(graph.prune_empty_directories(), 1);
    assert!(!graph.contains_entity(dir));
}

#[test]
fn language_detection_from_extension() {
    let cases = vec![
        ("main.rs", Language::Rust),
        ("app.ts", Language::TypeScript),
        ("view.tsx", Language::TypeScript),
        ("index.js", Language::JavaScript),
        ("lib.py", Language::Python),
        ("notes.txt", Language::Other),
        ("Makefile", Language::Other),
    ];
    for (filename, expected) in cases {
        assert_eq!(
            Language::from_path(Path::new(filename)),
            expected,
            "failed for {filename}"
        );
    }
}

#[test]
fn model_serde_round_trip() {
    let e = entity("roundtrip", EntityKind::Function);
    let json = serde_json::to_string(&e).unwrap();
    let back: Entity = serde_json::from_str(&json).unwrap();
    assert_eq!(e, back);

    let r = call(e.id, EntityId::external("serde"));
    let json = serde_json::to_string(&r).unwrap();
    let back: Relationship = serde_json::from_str(&json).unwrap();
    assert_eq!(r, back);
}
