//! Read-only query facade over a graph snapshot
//!
//! Every operation takes `&CodeGraph` and never mutates it. Long-running
//! traversals check a `CancelToken` at each visited entity and return
//! partial results flagged `incomplete` instead of erroring.

use crate::graph::CodeGraph;
use crate::model::{EntityId, RelationKind};
use petgraph::Direction;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex as DiNodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Cooperative cancellation for long traversals. Callers supply a deadline,
/// a flag they can flip from another thread, or both.
#[derive(Clone, Default)]
pub struct CancelToken {
    deadline: Option<Instant>,
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// A token that never fires.
    pub fn none() -> Self {
        CancelToken::default()
    }

    pub fn with_deadline(budget: Duration) -> Self {
        CancelToken {
            deadline: Some(Instant::now() + budget),
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
            || self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// One visited entity in a dependency/dependent traversal.
#[derive(Debug, Clone, PartialEq)]
pub struct TraversalStep {
    pub id: EntityId,
    /// Entity one hop closer to the root.
    pub parent: EntityId,
    pub depth: u32,
    /// Edge kind that led here.
    pub via: RelationKind,
}

/// Breadth-first traversal result, deduplicated by entity so it terminates
/// even across cycles.
#[derive(Debug, Clone, Default)]
pub struct Traversal {
    pub root: EntityId,
    pub steps: Vec<TraversalStep>,
    /// True when the cancellation budget cut the walk short.
    pub incomplete: bool,
}

impl Traversal {
    pub fn ids(&self) -> Vec<EntityId> {
        self.steps.iter().map(|s| s.id).collect()
    }
}

/// One strongly connected component with more than one member (or a
/// self-loop). Members are sorted by identifier for deterministic output
/// across runs on identical input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cycle {
    pub members: Vec<EntityId>,
}

/// Cycle listing; `incomplete` when cancelled mid-decomposition.
#[derive(Debug, Clone, Default)]
pub struct CycleSearch {
    pub cycles: Vec<Cycle>,
    pub incomplete: bool,
}

/// Path enumeration result. `incomplete` means the depth bound, the path
/// cap, or the cancellation budget was hit — never silent truncation.
#[derive(Debug, Clone, Default)]
pub struct PathSearch {
    pub paths: Vec<Vec<EntityId>>,
    pub incomplete: bool,
}

impl CodeGraph {
    /// Entities the given entity depends on, breadth-first to `max_depth`
    /// hops. Containment edges define hierarchy and are skipped.
    pub fn dependencies(&self, root: EntityId, max_depth: u32, token: &CancelToken) -> Traversal {
        self.walk(root, max_depth, Direction::Outgoing, token)
    }

    /// Entities that depend on the given entity, breadth-first to
    /// `max_depth` hops.
    pub fn dependents(&self, root: EntityId, max_depth: u32, token: &CancelToken) -> Traversal {
        self.walk(root, max_depth, Direction::Incoming, token)
    }

    fn walk(
        &self,
        root: EntityId,
        max_depth: u32,
        direction: Direction,
        token: &CancelToken,
    ) -> Traversal {
        let mut traversal = Traversal {
            root,
            ..Traversal::default()
        };
        let Some(&root_idx) = self.index.get(&root) else {
            return traversal;
        };

        let mut visited = HashSet::from([root]);
        let mut queue = VecDeque::from([(root_idx, 0u32)]);

        while let Some((idx, depth)) = queue.pop_front() {
            if token.is_cancelled() {
                traversal.incomplete = true;
                break;
            }
            if depth >= max_depth {
                continue;
            }
            let parent = self.inner[idx].id;
            for edge in self.inner.edges_directed(idx, direction) {
                if !edge.weight().kind.is_dependency() {
                    continue;
                }
                let next_idx = match direction {
                    Direction::Outgoing => edge.target(),
                    Direction::Incoming => edge.source(),
                };
                let next = self.inner[next_idx].id;
                if visited.insert(next) {
                    traversal.steps.push(TraversalStep {
                        id: next,
                        parent,
                        depth: depth + 1,
                        via: edge.weight().kind,
                    });
                    queue.push_back((next_idx, depth + 1));
                }
            }
        }
        traversal
    }

    /// Strongly-connected-component decomposition over dependency edges.
    /// Each cycle is reported once per component, not once per edge.
    pub fn find_cycles(&self, token: &CancelToken) -> CycleSearch {
        let mut search = CycleSearch::default();

        // Tarjan runs on a dependency-only projection; containment edges
        // define hierarchy, not dependency.
        let mut projection: DiGraph<EntityId, ()> = DiGraph::new();
        let mut to_projected: HashMap<EntityId, DiNodeIndex> = HashMap::new();
        for entity in self.entities() {
            if token.is_cancelled() {
                search.incomplete = true;
                return search;
            }
            to_projected.insert(entity.id, projection.add_node(entity.id));
        }
        let mut seen_self_loop: HashSet<EntityId> = HashSet::new();
        for edge in self.relationships() {
            if !edge.kind.is_dependency() {
                continue;
            }
            if edge.source == edge.target {
                seen_self_loop.insert(edge.source);
            }
            projection.add_edge(to_projected[&edge.source], to_projected[&edge.target], ());
        }

        for component in tarjan_scc(&projection) {
            if token.is_cancelled() {
                search.incomplete = true;
                break;
            }
            let is_cycle =
                component.len() > 1 || seen_self_loop.contains(&projection[component[0]]);
            if !is_cycle {
                continue;
            }
            let mut members: Vec<EntityId> =
                component.iter().map(|&idx| projection[idx]).collect();
            members.sort();
            search.cycles.push(Cycle { members });
        }
        search.cycles.sort_by(|a, b| a.members.cmp(&b.members));
        search
    }

    /// Shortest dependency path from `from` to `to`, by hop count.
    pub fn shortest_path(&self, from: EntityId, to: EntityId, token: &CancelToken) -> PathSearch {
        let mut search = PathSearch::default();
        let (Some(&start), Some(_)) = (self.index.get(&from), self.index.get(&to)) else {
            return search;
        };

        let mut predecessor: HashMap<EntityId, EntityId> = HashMap::new();
        let mut visited = HashSet::from([from]);
        let mut queue = VecDeque::from([start]);

        while let Some(idx) = queue.pop_front() {
            if token.is_cancelled() {
                search.incomplete = true;
                return search;
            }
            let current = self.inner[idx].id;
            if current == to {
                let mut path = vec![to];
                let mut cursor = to;
                while let Some(&prev) = predecessor.get(&cursor) {
                    path.push(prev);
                    cursor = prev;
                }
                path.reverse();
                search.paths.push(path);
                return search;
            }
            for edge in self.inner.edges_directed(idx, Direction::Outgoing) {
                if !edge.weight().kind.is_dependency() {
                    continue;
                }
                let next = self.inner[edge.target()].id;
                if visited.insert(next) {
                    predecessor.insert(next, current);
                    queue.push_back(edge.target());
                }
            }
        }
        search
    }

    /// All simple dependency paths from `from` to `to`, depth-bounded to
    /// prevent combinatorial blowup in densely connected graphs. When the
    /// bound, the path cap, or the cancellation budget is hit, the result
    /// is marked incomplete rather than silently truncated.
    pub fn simple_paths(
        &self,
        from: EntityId,
        to: EntityId,
        max_depth: u32,
        max_paths: usize,
        token: &CancelToken,
    ) -> PathSearch {
        let mut search = PathSearch::default();
        let (Some(&start), Some(_)) = (self.index.get(&from), self.index.get(&to)) else {
            return search;
        };

        let mut on_path = vec![from];
        let mut on_path_set = HashSet::from([from]);
        self.paths_from(
            start,
            to,
            max_depth,
            max_paths,
            token,
            &mut on_path,
            &mut on_path_set,
            &mut search,
        );
        search
    }

    #[allow(clippy::too_many_arguments)]
    fn paths_from(
        &self,
        idx: petgraph::stable_graph::NodeIndex,
        to: EntityId,
        max_depth: u32,
        max_paths: usize,
        token: &CancelToken,
        on_path: &mut Vec<EntityId>,
        on_path_set: &mut HashSet<EntityId>,
        search: &mut PathSearch,
    ) {
        if token.is_cancelled() {
            search.incomplete = true;
            return;
        }
        for edge in self.inner.edges_directed(idx, Direction::Outgoing) {
            if search.paths.len() >= max_paths {
                return;
            }
            if !edge.weight().kind.is_dependency() {
                continue;
            }
            let next_idx = edge.target();
            let next = self.inner[next_idx].id;
            if on_path_set.contains(&next) {
                continue;
            }
            if next == to {
                let mut path = on_path.clone();
                path.push(to);
                search.paths.push(path);
                if search.paths.len() >= max_paths {
                    search.incomplete = true;
                    return;
                }
                continue;
            }
            if on_path.len() as u32 >= max_depth {
                // An unexplored branch died to the depth bound.
                search.incomplete = true;
                continue;
            }
            on_path.push(next);
            on_path_set.insert(next);
            self.paths_from(
                next_idx, to, max_depth, max_paths, token, on_path, on_path_set, search,
            );
            on_path.pop();
            on_path_set.remove(&next);
        }
    }
}
