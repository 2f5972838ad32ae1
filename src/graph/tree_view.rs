//! A rooted spanning-tree snapshot of the graph.

use multimap::MultiMap;
use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::graph::{EdgeIndex, NodeIndex};

use crate::error::GraphError;

/// An edge that would close a cycle in the tree. Each cycle-closing edge pair
/// of the graph is recorded exactly once, in the direction first seen while
/// building the tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CrossEdge {
    pub origin: NodeIndex,
    pub target: NodeIndex,
    pub edge: EdgeIndex,
}

#[derive(Default, Debug, Clone)]
struct VertexRelation {
    parent: Option<NodeIndex>,
    children: HashSet<NodeIndex>,
}

/// A tree-shaped view over the vertices reachable from a chosen root.
///
/// Views come in two flavors: detached one-shot snapshots, and subscribed
/// views that the owning graph keeps in sync as edges are added and removed.
/// A subscribed view lives behind `Rc<RefCell<..>>`; dropping the last
/// strong reference ends the subscription.
///
/// The callbacks registered through [`Self::on_edge_added`],
/// [`Self::on_cross_edge_added`] and [`Self::on_edge_removed`] only ever fire
/// for subscribed views, since detached views are never updated.
#[derive(Default)]
pub struct TreeView {
    root: Option<NodeIndex>,
    tree: HashMap<NodeIndex, VertexRelation>,
    cross_edges: Vec<CrossEdge>,
    edge_added_callbacks: Vec<Box<dyn FnMut(NodeIndex, NodeIndex)>>,
    cross_edge_added_callbacks: Vec<Box<dyn FnMut(&CrossEdge)>>,
    edge_removed_callbacks: Vec<Box<dyn FnMut(NodeIndex, NodeIndex)>>,
}

impl TreeView {
    pub fn new() -> Self {
        TreeView::default()
    }

    pub fn root(&self) -> Option<NodeIndex> {
        self.root
    }

    pub fn is_root(&self, vertex: NodeIndex) -> bool {
        self.root == Some(vertex)
    }

    pub fn vertex_exists(&self, vertex: NodeIndex) -> bool {
        self.tree.contains_key(&vertex)
    }

    /// True if a tree edge (in either orientation) connects `a` and `b`.
    /// Cross edges do not count.
    pub fn edge_exists(&self, a: NodeIndex, b: NodeIndex) -> bool {
        let (Some(a_relation), Some(b_relation)) = (self.tree.get(&a), self.tree.get(&b)) else {
            return false;
        };
        a_relation.parent == Some(b) || b_relation.parent == Some(a)
    }

    pub fn is_parent(&self, parent: NodeIndex, child: NodeIndex) -> bool {
        self.tree
            .get(&child)
            .map_or(false, |relation| relation.parent == Some(parent))
    }

    /// The parent of `vertex`, `None` for the root.
    ///
    /// Fails with [`GraphError::NullVertex`] when `vertex` is not part of
    /// this tree.
    pub fn parent(&self, vertex: NodeIndex) -> Result<Option<NodeIndex>, GraphError> {
        self.tree
            .get(&vertex)
            .map(|relation| relation.parent)
            .ok_or(GraphError::NullVertex)
    }

    pub fn children(&self, vertex: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.tree
            .get(&vertex)
            .into_iter()
            .flat_map(|relation| relation.children.iter().copied())
    }

    pub fn vertices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.tree.keys().copied()
    }

    pub fn num_vertices(&self) -> usize {
        self.tree.len()
    }

    pub fn cross_edges(&self) -> &[CrossEdge] {
        &self.cross_edges
    }

    /// Removes all content from this view.
    pub fn clear(&mut self) {
        self.tree.clear();
        self.cross_edges.clear();
        self.root = None;
    }

    /// Visits `vertex` and its descendants depth first, parents before
    /// children. The callback receives each vertex and its parent.
    pub fn visit_dfs(&self, vertex: NodeIndex, visitor: &mut impl FnMut(NodeIndex, Option<NodeIndex>)) {
        let Some(relation) = self.tree.get(&vertex) else {
            return;
        };
        visitor(vertex, relation.parent);
        let children: Vec<NodeIndex> = relation.children.iter().copied().collect();
        for child in children {
            self.visit_dfs(child, visitor);
        }
    }

    /// Visits `vertex` and its descendants breadth first.
    pub fn visit_bfs(&self, vertex: NodeIndex, visitor: &mut impl FnMut(NodeIndex, Option<NodeIndex>)) {
        let mut queue = VecDeque::from([vertex]);
        while let Some(current) = queue.pop_front() {
            let Some(relation) = self.tree.get(&current) else {
                continue;
            };
            visitor(current, relation.parent);
            queue.extend(relation.children.iter().copied());
        }
    }

    pub fn on_edge_added(&mut self, callback: impl FnMut(NodeIndex, NodeIndex) + 'static) {
        self.edge_added_callbacks.push(Box::new(callback));
    }

    pub fn on_cross_edge_added(&mut self, callback: impl FnMut(&CrossEdge) + 'static) {
        self.cross_edge_added_callbacks.push(Box::new(callback));
    }

    /// When the callback fires, the child endpoint has already left the tree
    /// while the parent endpoint is still present.
    pub fn on_edge_removed(&mut self, callback: impl FnMut(NodeIndex, NodeIndex) + 'static) {
        self.edge_removed_callbacks.push(Box::new(callback));
    }

    pub(crate) fn add_root(&mut self, root: NodeIndex) {
        self.tree.entry(root).or_default().parent = None;
        self.root = Some(root);
    }

    pub(crate) fn add_edge(&mut self, origin: NodeIndex, target: NodeIndex) {
        self.tree.entry(origin).or_default().children.insert(target);
        self.tree.entry(target).or_default().parent = Some(origin);
        for callback in &mut self.edge_added_callbacks {
            callback(origin, target);
        }
    }

    pub(crate) fn add_cross_edge(
        &mut self,
        origin: NodeIndex,
        target: NodeIndex,
        edge: EdgeIndex,
    ) {
        let cross_edge = CrossEdge {
            origin,
            target,
            edge,
        };
        self.cross_edges.push(cross_edge);
        for callback in &mut self.cross_edge_added_callbacks {
            callback(&cross_edge);
        }
    }

    /// Removes a tree edge together with the sub-tree hanging below it.
    ///
    /// Vertices are removed bottom-up so that when the edge-removed callback
    /// fires for an edge, the parent endpoint is still part of the tree.
    /// Cross edges internal to the removed sub-tree are dropped. If any
    /// cross edge connects the sub-tree to the remaining tree, the sub-tree
    /// could be re-attached through it; that recovery is not implemented and
    /// the call fails with [`GraphError::UnsupportedOperation`] after the
    /// removal has taken place.
    pub(crate) fn remove_edge(
        &mut self,
        origin: NodeIndex,
        target: NodeIndex,
    ) -> Result<(), GraphError> {
        let mut vertex_to_cross_edge: MultiMap<NodeIndex, usize> = MultiMap::new();
        for (index, cross_edge) in self.cross_edges.iter().enumerate() {
            vertex_to_cross_edge.insert(cross_edge.origin, index);
            vertex_to_cross_edge.insert(cross_edge.target, index);
        }

        // Figure out which endpoint is the child in the tree.
        let real_target = if self.is_parent(origin, target) {
            target
        } else if self.is_parent(target, origin) {
            origin
        } else {
            debug_assert!(false, "removeEdge called for a non-tree edge");
            return Ok(());
        };

        // Walk the sub-tree. A cross edge seen through exactly one of its
        // endpoints leaves the sub-tree; one seen through both is internal.
        let mut leaving: HashSet<usize> = HashSet::new();
        let mut internal: HashSet<usize> = HashSet::new();
        let mut vertices = Vec::new();
        self.visit_bfs(real_target, &mut |vertex, _| {
            vertices.push(vertex);
            if let Some(indices) = vertex_to_cross_edge.get_vec(&vertex) {
                for &index in indices {
                    if leaving.remove(&index) {
                        internal.insert(index);
                    } else {
                        leaving.insert(index);
                    }
                }
            }
        });

        let mut internal: Vec<usize> = internal.into_iter().collect();
        internal.sort_unstable_by(|a, b| b.cmp(a));
        for index in internal {
            self.cross_edges.remove(index);
        }

        // Remove in reverse visit order so parents outlive their children.
        while let Some(vertex) = vertices.pop() {
            let parent = self.tree.get(&vertex).and_then(|relation| relation.parent);
            if let Some(parent) = parent {
                if let Some(relation) = self.tree.get_mut(&parent) {
                    relation.children.remove(&vertex);
                }
            }
            self.tree.remove(&vertex);
            if let Some(parent) = parent {
                for callback in &mut self.edge_removed_callbacks {
                    callback(parent, vertex);
                }
            }
        }

        if !leaving.is_empty() {
            return Err(GraphError::UnsupportedOperation(
                "re-attaching a sub-tree through tree-leaving cross edges",
            ));
        }
        Ok(())
    }
}
