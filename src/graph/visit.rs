//! Breadth-first traversal over the graph storage.
//!
//! Vertex handles are not dense indices, so the traversal keeps an external
//! color map instead of a bitset. The visitor surface mirrors what the rest
//! of the crate needs: tree edges and first sightings of cycle-closing edges
//! (`gray_target`); the reverse directions of already-taken edges land on
//! finished vertices and are ignored, which is what guarantees that each
//! edge pair is reported at most once.

use std::collections::{HashMap, VecDeque};
use std::ops::ControlFlow;

use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::stable_graph::StableDiGraph;
use petgraph::visit::EdgeRef;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    /// Discovered, still queued.
    Gray,
    /// All out-edges examined.
    Black,
}

/// Callbacks invoked during a breadth-first search. All methods have empty
/// defaults; implement what you need.
pub trait BfsVisitor {
    /// Called when `vertex` is first discovered (including the root).
    /// Returning `ControlFlow::Break` aborts the search.
    fn discover_vertex(&mut self, vertex: NodeIndex) -> ControlFlow<()> {
        let _ = vertex;
        ControlFlow::Continue(())
    }

    /// Called for each edge that enters an undiscovered vertex, before that
    /// vertex's own `discover_vertex`.
    fn tree_edge(&mut self, edge: EdgeIndex, source: NodeIndex, target: NodeIndex) {
        let _ = (edge, source, target);
    }

    /// Called for each edge whose target is discovered but not yet finished.
    /// For a bidirectional edge pair that closes a cycle, exactly one of the
    /// two directions triggers this.
    fn gray_target(&mut self, edge: EdgeIndex, source: NodeIndex, target: NodeIndex) {
        let _ = (edge, source, target);
    }
}

pub(crate) fn breadth_first_search<F, E, V>(
    graph: &StableDiGraph<F, E>,
    root: NodeIndex,
    visitor: &mut V,
) where
    V: BfsVisitor,
{
    breadth_first_search_filtered(graph, root, |_| true, visitor)
}

/// Breadth-first search that only follows edges accepted by `edge_filter`.
/// The filter expresses "traverse as if these edges were absent" without
/// mutating the graph.
pub(crate) fn breadth_first_search_filtered<F, E, V, P>(
    graph: &StableDiGraph<F, E>,
    root: NodeIndex,
    edge_filter: P,
    visitor: &mut V,
) where
    V: BfsVisitor,
    P: Fn(EdgeIndex) -> bool,
{
    let mut colors: HashMap<NodeIndex, Color> = HashMap::new();
    let mut queue = VecDeque::new();

    colors.insert(root, Color::Gray);
    if visitor.discover_vertex(root).is_break() {
        return;
    }
    queue.push_back(root);

    while let Some(vertex) = queue.pop_front() {
        for edge in graph.edges(vertex) {
            if !edge_filter(edge.id()) {
                continue;
            }
            let target = edge.target();
            match colors.get(&target) {
                None => {
                    visitor.tree_edge(edge.id(), vertex, target);
                    colors.insert(target, Color::Gray);
                    if visitor.discover_vertex(target).is_break() {
                        return;
                    }
                    queue.push_back(target);
                }
                Some(Color::Gray) => visitor.gray_target(edge.id(), vertex, target),
                Some(Color::Black) => {}
            }
        }
        colors.insert(vertex, Color::Black);
    }
}

/// Searches for `target` and records predecessors so the path can be unwound
/// once the target is discovered.
pub(crate) struct PathFinder {
    target: NodeIndex,
    predecessors: HashMap<NodeIndex, NodeIndex>,
    found: bool,
}

impl PathFinder {
    pub(crate) fn new(target: NodeIndex) -> Self {
        PathFinder {
            target,
            predecessors: HashMap::new(),
            found: false,
        }
    }

    /// The discovered path from `origin` to the target, origin first.
    /// Empty when the target was never discovered.
    pub(crate) fn unwind(&self, origin: NodeIndex) -> Vec<NodeIndex> {
        if !self.found {
            return Vec::new();
        }
        let mut path = vec![self.target];
        let mut current = self.target;
        while current != origin {
            match self.predecessors.get(&current) {
                Some(&predecessor) => {
                    path.push(predecessor);
                    current = predecessor;
                }
                None => return Vec::new(),
            }
        }
        path.reverse();
        path
    }
}

impl BfsVisitor for PathFinder {
    fn discover_vertex(&mut self, vertex: NodeIndex) -> ControlFlow<()> {
        if vertex == self.target {
            self.found = true;
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }

    fn tree_edge(&mut self, _edge: EdgeIndex, source: NodeIndex, target: NodeIndex) {
        self.predecessors.insert(target, source);
    }
}
