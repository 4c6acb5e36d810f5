//! Graph store wrapping petgraph::StableDiGraph with stable entity ids
//!
//! The `CodeGraph` owns the entities and relationships for one repository
//! snapshot. Mutation goes through `&mut self` (a single merge step at a
//! time); read-only consumers hold `&CodeGraph` or an `Arc<CodeGraph>`
//! snapshot, so the type system enforces the query facade's no-mutation
//! contract.

use crate::model::*;
use petgraph::Direction;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use std::collections::HashMap;

/// The code graph — a directed multigraph with a stable `EntityId` index
/// kept consistent with petgraph's internal adjacency in both directions.
#[derive(Clone, Default)]
pub struct CodeGraph {
    pub(crate) inner: StableDiGraph<Entity, Relationship>,
    pub(crate) index: HashMap<EntityId, NodeIndex>,
}

impl std::fmt::Debug for CodeGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeGraph")
            .field("entity_count", &self.inner.node_count())
            .field("edge_count", &self.inner.edge_count())
            .finish()
    }
}

impl CodeGraph {
    pub fn new() -> Self {
        CodeGraph {
            inner: StableDiGraph::new(),
            index: HashMap::new(),
        }
    }

    /// Add one entity. An entity with the same identifier replaces the old
    /// value in place, keeping incident edges — this is the atomic
    /// replacement the updater relies on, and it preserves the no-collision
    /// invariant: one identifier, one entity.
    pub fn add_entity(&mut self, entity: Entity) -> EntityId {
        let id = entity.id;
        match self.index.get(&id) {
            Some(&idx) => {
                if let Some(existing) = self.inner.node_weight_mut(idx) {
                    *existing = entity;
                }
            }
            None => {
                let idx = self.inner.add_node(entity);
                self.index.insert(id, idx);
            }
        }
        id
    }

    pub fn add_entities(&mut self, entities: impl IntoIterator<Item = Entity>) {
        for entity in entities {
            self.add_entity(entity);
        }
    }

    /// Remove entities by identifier. Removal cascades: petgraph drops all
    /// incident edges (both directions) with the node, which keeps the
    /// reverse-adjacency invariant without a separate pass.
    pub fn remove_entities(&mut self, ids: &[EntityId]) -> usize {
        let mut removed = 0;
        for id in ids {
            if let Some(idx) = self.index.remove(id) {
                self.inner.remove_node(idx);
                removed += 1;
            }
        }
        removed
    }

    /// Add one edge. Both endpoints must already be present; the resolver
    /// materializes `External` placeholder entities before emitting edges
    /// that point outside the repository. A dangling endpoint is a caller
    /// bug — the edge is dropped with a warning, never a panic.
    pub fn add_edge(&mut self, edge: Relationship) -> bool {
        let (Some(&source), Some(&target)) =
            (self.index.get(&edge.source), self.index.get(&edge.target))
        else {
            tracing::warn!(
                source = edge.source.0,
                target = edge.target.0,
                kind = ?edge.kind,
                "dropping edge with unknown endpoint"
            );
            return false;
        };
        self.inner.add_edge(source, target, edge);
        true
    }

    pub fn add_edges(&mut self, edges: impl IntoIterator<Item = Relationship>) -> usize {
        let mut added = 0;
        for edge in edges {
            if self.add_edge(edge) {
                added += 1;
            }
        }
        added
    }

    /// Remove every outgoing edge of an entity. Returns how many went.
    pub fn remove_edges_for_source(&mut self, source: EntityId) -> usize {
        self.remove_outgoing(source, |_| true)
    }

    /// Remove outgoing dependency edges only, leaving `Contains` hierarchy
    /// intact. Used when a file's references are re-resolved without its
    /// declarations changing.
    pub fn remove_reference_edges(&mut self, source: EntityId) -> usize {
        self.remove_outgoing(source, |e| e.kind.is_dependency())
    }

    fn remove_outgoing(&mut self, source: EntityId, doom: impl Fn(&Relationship) -> bool) -> usize {
        let Some(&idx) = self.index.get(&source) else {
            return 0;
        };
        let doomed: Vec<_> = self
            .inner
            .edges_directed(idx, Direction::Outgoing)
            .filter(|e| doom(e.weight()))
            .map(|e| e.id())
            .collect();
        let count = doomed.len();
        for edge_idx in doomed {
            self.inner.remove_edge(edge_idx);
        }
        count
    }

    /// Get an entity by identifier.
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.index.get(&id).and_then(|&idx| self.inner.node_weight(idx))
    }

    pub fn contains_entity(&self, id: EntityId) -> bool {
        self.index.contains_key(&id)
    }

    /// Iterate over all entities.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.inner
            .node_indices()
            .filter_map(move |idx| self.inner.node_weight(idx))
    }

    /// Iterate over all edges.
    pub fn relationships(&self) -> impl Iterator<Item = &Relationship> {
        self.inner
            .edge_indices()
            .filter_map(move |idx| self.inner.edge_weight(idx))
    }

    /// All outgoing edges from an entity.
    pub fn edges_from(&self, source: EntityId) -> impl Iterator<Item = &Relationship> {
        self.index
            .get(&source)
            .into_iter()
            .flat_map(|&idx| self.inner.edges_directed(idx, Direction::Outgoing))
            .map(|e| e.weight())
    }

    /// All incoming edges to an entity.
    pub fn edges_to(&self, target: EntityId) -> impl Iterator<Item = &Relationship> {
        self.index
            .get(&target)
            .into_iter()
            .flat_map(|&idx| self.inner.edges_directed(idx, Direction::Incoming))
            .map(|e| e.weight())
    }

    pub fn entity_count(&self) -> usize {
        self.inner.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    /// Check whether an edge of a specific kind exists between two entities.
    pub fn has_edge(&self, source: EntityId, target: EntityId, kind: RelationKind) -> bool {
        self.edges_from(source)
            .any(|e| e.target == target && e.kind == kind)
    }

    /// Find an entity by fully qualified name (first match).
    pub fn find_by_qualified(&self, qualified_name: &str) -> Option<EntityId> {
        self.entities()
            .find(|e| e.qualified_name == qualified_name)
            .map(|e| e.id)
    }

    /// Find an entity by bare name (first match).
    pub fn find_by_name(&self, name: &str) -> Option<EntityId> {
        self.entities().find(|e| e.name == name).map(|e| e.id)
    }

    /// All entities of a given kind.
    pub fn entities_of_kind(&self, kind: EntityKind) -> impl Iterator<Item = &Entity> {
        self.entities().filter(move |e| e.kind == kind)
    }

    /// Drop `External` placeholder entities that no longer have any incident
    /// edge. Retraction of a file can orphan placeholders its references
    /// created; pruning keeps incremental results equal to a from-scratch
    /// analysis of the same file set.
    pub fn prune_dangling_externals(&mut self) -> usize {
        let doomed: Vec<EntityId> = self
            .entities()
            .filter(|e| e.kind == EntityKind::External)
            .filter(|e| {
                let idx = self.index[&e.id];
                self.inner.edges_directed(idx, Direction::Incoming).next().is_none()
                    && self.inner.edges_directed(idx, Direction::Outgoing).next().is_none()
            })
            .map(|e| e.id)
            .collect();
        self.remove_entities(&doomed)
    }

    /// Drop directory entities whose subtree emptied out, walking up until
    /// no empty directory remains.
    pub fn prune_empty_directories(&mut self) -> usize {
        let mut removed = 0;
        loop {
            let doomed: Vec<EntityId> = self
                .entities()
                .filter(|e| e.kind == EntityKind::Directory)
                .filter(|e| {
                    let idx = self.index[&e.id];
                    self.inner.edges_directed(idx, Direction::Outgoing).next().is_none()
                })
                .map(|e| e.id)
                .collect();
            if doomed.is_empty() {
                break;
            }
            removed += self.remove_entities(&doomed);
        }
        removed
    }

    /// Decompose into entity and edge lists for serialization. Adjacency
    /// ordering is not guaranteed; only the sets are.
    pub fn to_parts(&self) -> (Vec<Entity>, Vec<Relationship>) {
        (
            self.entities().cloned().collect(),
            self.relationships().cloned().collect(),
        )
    }

    /// Rebuild a graph from entity and edge lists (cache retrieval path).
    pub fn from_parts(
        entities: impl IntoIterator<Item = Entity>,
        edges: impl IntoIterator<Item = Relationship>,
    ) -> Self {
        let mut graph = CodeGraph::new();
        graph.add_entities(entities);
        graph.add_edges(edges);
        graph
    }
}
