//! The labeled, double-connected graph core.
//!
//! Every vertex carries a frame property identified by a unique [`FrameId`];
//! every edge is accompanied by its inverse edge. All mutations go through
//! [`Graph`]; it keeps the label index in lockstep with the storage, updates
//! subscribed tree views and publishes one event per logical change.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use petgraph::stable_graph::StableDiGraph;
use petgraph::visit::EdgeRef;
use petgraph::Direction;

pub use petgraph::graph::{EdgeIndex, NodeIndex};

use crate::error::GraphError;
use crate::events::{GraphEvent, GraphEventPublisher, SubscriberRef};
use crate::frame::{Environment, FrameId};

pub mod environment_graph;
pub mod path;
pub mod tree_view;
pub mod visit;

mod dot;
mod transform_ops;

use path::Path;
use tree_view::TreeView;
use visit::{breadth_first_search, breadth_first_search_filtered, BfsVisitor, PathFinder};

/// What a vertex property must provide: a stored [`FrameId`] and a string
/// rendering for graph drawings.
pub trait FrameProperty: fmt::Display {
    fn new(id: FrameId) -> Self;
    fn id(&self) -> &FrameId;
    fn set_id(&mut self, id: FrameId);
}

/// What an edge property must provide: an inverse (the payload of the paired
/// reverse edge) and a string rendering for graph drawings.
pub trait EdgeProperty: Clone + fmt::Display {
    fn inverse(&self) -> Self;
}

/// A double-connected labeled graph.
///
/// Vertex and edge handles remain valid across unrelated additions and
/// removals; the storage never renumbers. The label index maps each
/// [`FrameId`] to its vertex handle and agrees with the id stored in the
/// vertex property at all times.
///
/// The graph is not internally thread-safe; concurrent mutation must be
/// serialized externally.
pub struct Graph<F, E> {
    graph: StableDiGraph<F, E>,
    label_map: IndexMap<FrameId, NodeIndex>,
    environment: Environment,
    publisher: GraphEventPublisher,
    subscribed_tree_views: Vec<Weak<RefCell<TreeView>>>,
}

struct TreeBuilder<'a> {
    view: &'a mut TreeView,
}

impl BfsVisitor for TreeBuilder<'_> {
    fn tree_edge(&mut self, _edge: EdgeIndex, source: NodeIndex, target: NodeIndex) {
        self.view.add_edge(source, target);
    }

    fn gray_target(&mut self, edge: EdgeIndex, source: NodeIndex, target: NodeIndex) {
        self.view.add_cross_edge(source, target, edge);
    }
}

impl<F: FrameProperty, E: EdgeProperty> Graph<F, E> {
    pub fn new() -> Self {
        Self::with_environment(Environment::default())
    }

    pub fn with_environment(environment: Environment) -> Self {
        Graph {
            graph: StableDiGraph::default(),
            label_map: IndexMap::new(),
            environment,
            publisher: GraphEventPublisher::new(),
            subscribed_tree_views: Vec::new(),
        }
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn set_environment(&mut self, environment: Environment) {
        self.environment = environment;
    }

    /// The vertex labeled `frame`, if any.
    pub fn vertex(&self, frame: &str) -> Option<NodeIndex> {
        self.label_map.get(frame).copied()
    }

    /// Like [`Self::vertex`] but failing with `UnknownFrame`.
    pub fn get_vertex(&self, frame: &str) -> Result<NodeIndex, GraphError> {
        self.vertex(frame)
            .ok_or_else(|| GraphError::UnknownFrame(frame.into()))
    }

    /// The id of the frame stored at `vertex`.
    pub fn frame_id(&self, vertex: NodeIndex) -> Result<&FrameId, GraphError> {
        self.graph
            .node_weight(vertex)
            .map(FrameProperty::id)
            .ok_or(GraphError::NullVertex)
    }

    pub fn contains_frame(&self, frame: &str) -> bool {
        self.label_map.contains_key(frame)
    }

    /// Inserts an isolated vertex with a default-constructed frame property.
    /// Emits `FrameAdded`.
    pub fn add_frame(&mut self, frame: &str) -> Result<NodeIndex, GraphError> {
        if self.contains_frame(frame) {
            return Err(GraphError::FrameAlreadyExists(frame.into()));
        }
        Ok(self.add_vertex(FrameId::from(frame), F::new(frame.into())))
    }

    /// Like [`Self::add_frame`] but storing the given property; its id is
    /// overwritten with `frame`.
    pub fn emplace_frame(&mut self, frame: &str, mut property: F) -> Result<NodeIndex, GraphError> {
        if self.contains_frame(frame) {
            return Err(GraphError::FrameAlreadyExists(frame.into()));
        }
        property.set_id(frame.into());
        Ok(self.add_vertex(FrameId::from(frame), property))
    }

    fn add_vertex(&mut self, id: FrameId, property: F) -> NodeIndex {
        let vertex = self.graph.add_node(property);
        self.label_map.insert(id.clone(), vertex);
        self.publisher.notify(&GraphEvent::FrameAdded(id));
        vertex
    }

    /// Total degree of `vertex`: outgoing plus incoming edges.
    pub fn degree(&self, vertex: NodeIndex) -> usize {
        self.graph.edges(vertex).count()
            + self.graph.edges_directed(vertex, Direction::Incoming).count()
    }

    /// Removes an isolated frame. Fails with `FrameStillConnected` while any
    /// edge touches it. Emits `FrameRemoved`.
    pub fn remove_frame(&mut self, frame: &str) -> Result<(), GraphError> {
        let vertex = self.get_vertex(frame)?;
        if self.degree(vertex) > 0 {
            return Err(GraphError::FrameStillConnected(frame.into()));
        }
        self.graph.remove_node(vertex);
        self.label_map.shift_remove(frame);
        self.publisher
            .notify(&GraphEvent::FrameRemoved(frame.into()));
        Ok(())
    }

    /// Removes every edge touching `frame`, emitting one `EdgeRemoved` per
    /// removed outgoing edge. The frame itself remains.
    pub fn disconnect_frame(&mut self, frame: &str) -> Result<(), GraphError> {
        let vertex = self.get_vertex(frame)?;
        let targets: Vec<NodeIndex> = self.graph.edges(vertex).map(|edge| edge.target()).collect();
        for target in targets {
            self.remove_edge_between(vertex, target)?;
        }
        Ok(())
    }

    pub fn frame_property(&self, frame: &str) -> Result<&F, GraphError> {
        let vertex = self.get_vertex(frame)?;
        self.graph.node_weight(vertex).ok_or(GraphError::NullVertex)
    }

    pub fn frame_property_at(&self, vertex: NodeIndex) -> Option<&F> {
        self.graph.node_weight(vertex)
    }

    pub(crate) fn frame_property_mut(&mut self, vertex: NodeIndex) -> Option<&mut F> {
        self.graph.node_weight_mut(vertex)
    }

    /// True if a direct edge `origin -> target` exists. Fails with
    /// `UnknownFrame` if either frame is not part of the graph.
    pub fn contains_edge(&self, origin: &str, target: &str) -> Result<bool, GraphError> {
        let origin = self.get_vertex(origin)?;
        let target = self.get_vertex(target)?;
        Ok(self.contains_edge_between(origin, target))
    }

    pub fn contains_edge_between(&self, origin: NodeIndex, target: NodeIndex) -> bool {
        self.graph.find_edge(origin, target).is_some()
    }

    pub fn get_edge(&self, origin: &str, target: &str) -> Result<EdgeIndex, GraphError> {
        let origin_vertex = self.get_vertex(origin)?;
        let target_vertex = self.get_vertex(target)?;
        self.get_edge_between(origin_vertex, target_vertex)
    }

    pub fn get_edge_between(
        &self,
        origin: NodeIndex,
        target: NodeIndex,
    ) -> Result<EdgeIndex, GraphError> {
        self.graph
            .find_edge(origin, target)
            .ok_or_else(|| GraphError::UnknownEdge {
                origin: self.frame_id(origin).cloned().unwrap_or_default(),
                target: self.frame_id(target).cloned().unwrap_or_default(),
            })
    }

    pub fn edge_property(&self, origin: &str, target: &str) -> Result<&E, GraphError> {
        let edge = self.get_edge(origin, target)?;
        self.graph.edge_weight(edge).ok_or(GraphError::NullVertex)
    }

    pub fn edge_property_at(&self, edge: EdgeIndex) -> Option<&E> {
        self.graph.edge_weight(edge)
    }

    pub fn edge_endpoints(&self, edge: EdgeIndex) -> Option<(NodeIndex, NodeIndex)> {
        self.graph.edge_endpoints(edge)
    }

    pub fn source_vertex(&self, edge: EdgeIndex) -> Option<NodeIndex> {
        self.graph.edge_endpoints(edge).map(|(source, _)| source)
    }

    pub fn target_vertex(&self, edge: EdgeIndex) -> Option<NodeIndex> {
        self.graph.edge_endpoints(edge).map(|(_, target)| target)
    }

    /// Adds the edge `origin -> target` carrying `property`, and the reverse
    /// edge carrying its inverse. Unknown endpoints are created, each
    /// emitting a `FrameAdded` before the single `EdgeAdded` for the forward
    /// direction. Subscribed tree views are updated.
    pub fn add_edge(
        &mut self,
        origin: &str,
        target: &str,
        property: E,
    ) -> Result<EdgeIndex, GraphError> {
        let origin_vertex = self.vertex(origin);
        let target_vertex = self.vertex(target);
        // If origin->target exists, target->origin exists as well, so one
        // direction needs checking. Checking before creating any endpoint
        // keeps failed calls free of side effects.
        if let (Some(origin_vertex), Some(target_vertex)) = (origin_vertex, target_vertex) {
            if self.contains_edge_between(origin_vertex, target_vertex) {
                return Err(GraphError::EdgeAlreadyExists {
                    origin: origin.into(),
                    target: target.into(),
                });
            }
        }
        let origin_vertex = match origin_vertex {
            Some(vertex) => vertex,
            None => self.add_vertex(FrameId::from(origin), F::new(origin.into())),
        };
        let target_vertex = match target_vertex {
            Some(vertex) => vertex,
            None => self.add_vertex(FrameId::from(target), F::new(target.into())),
        };
        self.insert_edge_pair(origin_vertex, target_vertex, origin.into(), target.into(), property)
    }

    /// Vertex-handle variant of [`Self::add_edge`]; both vertices must be
    /// part of the graph.
    pub fn add_edge_between(
        &mut self,
        origin: NodeIndex,
        target: NodeIndex,
        property: E,
    ) -> Result<EdgeIndex, GraphError> {
        let origin_id = self.frame_id(origin)?.clone();
        let target_id = self.frame_id(target)?.clone();
        if self.contains_edge_between(origin, target) {
            return Err(GraphError::EdgeAlreadyExists {
                origin: origin_id,
                target: target_id,
            });
        }
        self.insert_edge_pair(origin, target, origin_id, target_id, property)
    }

    fn insert_edge_pair(
        &mut self,
        origin: NodeIndex,
        target: NodeIndex,
        origin_id: FrameId,
        target_id: FrameId,
        property: E,
    ) -> Result<EdgeIndex, GraphError> {
        let inverse = property.inverse();
        let edge = self.graph.add_edge(origin, target, property);
        self.graph.add_edge(target, origin, inverse);
        // Only the forward direction goes into the trees; adding both would
        // land one of them in the cross-edge list and make edge updates
        // recurse endlessly.
        self.add_edge_to_tree_views(edge);
        self.publisher.notify(&GraphEvent::EdgeAdded {
            origin: origin_id,
            target: target_id,
            edge,
        });
        Ok(edge)
    }

    /// Removes the edge pair between `origin` and `target`, emitting a
    /// single `EdgeRemoved` for the forward direction. Subscribed tree views
    /// are updated; if a view would need the unimplemented cross-edge
    /// recovery the call reports `UnsupportedOperation` after the edges are
    /// already gone.
    pub fn remove_edge(&mut self, origin: &str, target: &str) -> Result<(), GraphError> {
        let origin_vertex = self.get_vertex(origin)?;
        let target_vertex = self.get_vertex(target)?;
        self.remove_edge_between(origin_vertex, target_vertex)
    }

    pub fn remove_edge_between(
        &mut self,
        origin: NodeIndex,
        target: NodeIndex,
    ) -> Result<(), GraphError> {
        let origin_id = self.frame_id(origin)?.clone();
        let target_id = self.frame_id(target)?.clone();
        let (Some(forward), Some(backward)) = (
            self.graph.find_edge(origin, target),
            self.graph.find_edge(target, origin),
        ) else {
            return Err(GraphError::UnknownEdge {
                origin: origin_id,
                target: target_id,
            });
        };
        self.graph.remove_edge(forward);
        self.graph.remove_edge(backward);
        self.publisher.notify(&GraphEvent::EdgeRemoved {
            origin: origin_id,
            target: target_id,
        });
        self.remove_edge_from_tree_views(origin, target)
    }

    /// Atomically updates `origin -> target` to `property` and the reverse
    /// edge to its inverse. Emits one `EdgeModified` carrying both edge
    /// handles.
    pub fn set_edge_property(
        &mut self,
        origin: &str,
        target: &str,
        property: E,
    ) -> Result<(), GraphError> {
        let origin_vertex = self.get_vertex(origin)?;
        let target_vertex = self.get_vertex(target)?;
        self.set_edge_property_between(origin_vertex, target_vertex, property)
    }

    pub fn set_edge_property_between(
        &mut self,
        origin: NodeIndex,
        target: NodeIndex,
        property: E,
    ) -> Result<(), GraphError> {
        let origin_id = self.frame_id(origin)?.clone();
        let target_id = self.frame_id(target)?.clone();
        let (Some(forward), Some(backward)) = (
            self.graph.find_edge(origin, target),
            self.graph.find_edge(target, origin),
        ) else {
            return Err(GraphError::UnknownEdge {
                origin: origin_id,
                target: target_id,
            });
        };
        let inverse = property.inverse();
        if let Some(weight) = self.graph.edge_weight_mut(forward) {
            *weight = property;
        }
        if let Some(weight) = self.graph.edge_weight_mut(backward) {
            *weight = inverse;
        }
        self.publisher.notify(&GraphEvent::EdgeModified {
            origin: origin_id,
            target: target_id,
            edge: forward,
            inverse_edge: backward,
        });
        Ok(())
    }

    pub fn num_vertices(&self) -> usize {
        self.graph.node_count()
    }

    pub fn num_edges(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn vertices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.node_indices()
    }

    pub fn edges(&self) -> impl Iterator<Item = EdgeIndex> + '_ {
        self.graph.edge_indices()
    }

    pub fn frame_ids(&self) -> impl Iterator<Item = &FrameId> + '_ {
        self.label_map.keys()
    }

    /// Visits all vertices reachable from `root` in breadth-first order.
    pub fn breadth_first_search(&self, root: NodeIndex, visitor: &mut impl BfsVisitor) {
        breadth_first_search(&self.graph, root, visitor);
    }

    /// All frames on the breadth-first path from `origin` to `target`,
    /// origin first. Empty when no route exists.
    pub fn frames_between(&self, origin: &str, target: &str) -> Result<Vec<FrameId>, GraphError> {
        let origin_vertex = self.get_vertex(origin)?;
        let target_vertex = self.get_vertex(target)?;
        let vertices = self.find_path(origin_vertex, target_vertex);
        if vertices.len() < 2 {
            return Ok(Vec::new());
        }
        vertices
            .into_iter()
            .map(|vertex| self.frame_id(vertex).cloned())
            .collect()
    }

    pub(crate) fn find_path(&self, origin: NodeIndex, target: NodeIndex) -> Vec<NodeIndex> {
        let mut finder = PathFinder::new(target);
        breadth_first_search(&self.graph, origin, &mut finder);
        finder.unwind(origin)
    }

    /// The breadth-first path from `origin` to `target` as a [`Path`].
    /// An auto-updating path is subscribed to this graph and notices removed
    /// edges; see [`Path`].
    pub fn get_path(
        &mut self,
        origin: &str,
        target: &str,
        auto_updating: bool,
    ) -> Result<Rc<RefCell<Path>>, GraphError> {
        let frames = self.frames_between(origin, target)?;
        if auto_updating {
            let path = Rc::new(RefCell::new(Path::new_subscribed(frames)));
            let subscriber: SubscriberRef = path.clone();
            self.publisher.subscribe(&subscriber);
            Ok(path)
        } else {
            Ok(Rc::new(RefCell::new(Path::new(frames))))
        }
    }

    /// A detached spanning-tree snapshot rooted at `root`. The view is not
    /// updated when the graph changes.
    pub fn tree(&self, root: &str) -> Result<TreeView, GraphError> {
        let root = self.get_vertex(root)?;
        Ok(self.tree_at(root))
    }

    pub fn tree_at(&self, root: NodeIndex) -> TreeView {
        let mut view = TreeView::new();
        self.populate_tree(root, &mut view);
        view
    }

    pub(crate) fn populate_tree(&self, root: NodeIndex, view: &mut TreeView) {
        view.add_root(root);
        let mut builder = TreeBuilder { view };
        breadth_first_search(&self.graph, root, &mut builder);
    }

    /// A spanning tree kept in sync with this graph. The subscription ends
    /// when the returned handle is dropped.
    pub fn tree_subscribed(&mut self, root: &str) -> Result<Rc<RefCell<TreeView>>, GraphError> {
        let root = self.get_vertex(root)?;
        let view = Rc::new(RefCell::new(self.tree_at(root)));
        self.subscribed_tree_views.push(Rc::downgrade(&view));
        Ok(view)
    }

    /// Subscribes an externally built view. The view must not be out of sync
    /// with the graph when subscribing.
    pub fn subscribe_tree_view(&mut self, view: &Rc<RefCell<TreeView>>) {
        self.subscribed_tree_views.push(Rc::downgrade(view));
    }

    pub fn unsubscribe_tree_view(&mut self, view: &Rc<RefCell<TreeView>>) {
        let target = Rc::downgrade(view);
        self.subscribed_tree_views
            .retain(|weak| !weak.ptr_eq(&target) && weak.strong_count() > 0);
    }

    /// Rebuilds every subscribed view from scratch.
    pub fn rebuild_tree_views(&mut self) {
        for view in self.live_tree_views() {
            let mut view = view.borrow_mut();
            if let Some(root) = view.root() {
                view.clear();
                self.populate_tree(root, &mut view);
            }
        }
    }

    pub fn subscribe(&mut self, subscriber: &SubscriberRef) {
        self.publisher.subscribe(subscriber);
    }

    /// Subscribes and replays the current graph state to the new subscriber
    /// first, so it can bootstrap.
    pub fn subscribe_with_current_state(&mut self, subscriber: &SubscriberRef) {
        self.publish_current_state(subscriber);
        self.publisher.subscribe(subscriber);
    }

    pub fn unsubscribe(&mut self, subscriber: &SubscriberRef) {
        self.publisher.unsubscribe(subscriber);
    }

    /// Synthesizes the event sequence describing the current state: one
    /// `FrameAdded` per frame, then one `EdgeAdded` per edge pair (the
    /// reverse direction is suppressed).
    pub fn publish_current_state(&self, subscriber: &SubscriberRef) {
        for id in self.label_map.keys() {
            GraphEventPublisher::notify_subscriber(
                subscriber,
                &GraphEvent::FrameAdded(id.clone()),
            );
        }
        self.for_each_edge_pair(|origin, target, edge| {
            GraphEventPublisher::notify_subscriber(
                subscriber,
                &GraphEvent::EdgeAdded {
                    origin,
                    target,
                    edge,
                },
            );
        });
    }

    /// The inverse of [`Self::publish_current_state`]: one `EdgeRemoved` per
    /// edge pair, then one `FrameRemoved` per frame.
    pub fn unpublish_current_state(&self, subscriber: &SubscriberRef) {
        self.for_each_edge_pair(|origin, target, _| {
            GraphEventPublisher::notify_subscriber(
                subscriber,
                &GraphEvent::EdgeRemoved { origin, target },
            );
        });
        for id in self.label_map.keys() {
            GraphEventPublisher::notify_subscriber(
                subscriber,
                &GraphEvent::FrameRemoved(id.clone()),
            );
        }
    }

    /// Calls `f` once per edge pair with the forward direction's data.
    fn for_each_edge_pair(&self, mut f: impl FnMut(FrameId, FrameId, EdgeIndex)) {
        let mut suppressed: HashSet<EdgeIndex> = HashSet::new();
        for edge in self.graph.edge_indices() {
            if suppressed.contains(&edge) {
                continue;
            }
            let Some((source, target)) = self.graph.edge_endpoints(edge) else {
                continue;
            };
            let (Ok(origin_id), Ok(target_id)) = (self.frame_id(source), self.frame_id(target))
            else {
                continue;
            };
            if let Some(inverse) = self.graph.find_edge(target, source) {
                suppressed.insert(inverse);
            }
            f(origin_id.clone(), target_id.clone(), edge);
        }
    }

    pub(crate) fn notify(&mut self, event: &GraphEvent) {
        self.publisher.notify(event);
    }

    pub(crate) fn storage(&self) -> &StableDiGraph<F, E> {
        &self.graph
    }

    pub(crate) fn label_entries(&self) -> impl Iterator<Item = (&FrameId, NodeIndex)> + '_ {
        self.label_map.iter().map(|(id, &vertex)| (id, vertex))
    }

    /// Inserts a single directed edge without creating the inverse, updating
    /// views or publishing events. Only deserialization uses this; the
    /// archive stores both directions explicitly.
    pub(crate) fn insert_raw_edge(&mut self, origin: NodeIndex, target: NodeIndex, property: E) {
        self.graph.add_edge(origin, target, property);
    }

    fn live_tree_views(&mut self) -> Vec<Rc<RefCell<TreeView>>> {
        self.subscribed_tree_views
            .retain(|weak| weak.strong_count() > 0);
        self.subscribed_tree_views
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }

    fn add_edge_to_tree_views(&mut self, new_edge: EdgeIndex) {
        for view in self.live_tree_views() {
            self.add_edge_to_tree_view(&mut view.borrow_mut(), new_edge);
        }
    }

    fn add_edge_to_tree_view(&self, view: &mut TreeView, new_edge: EdgeIndex) {
        let Some((source, target)) = self.graph.edge_endpoints(new_edge) else {
            return;
        };
        let source_in_view = view.vertex_exists(source);
        let target_in_view = view.vertex_exists(target);

        if source_in_view && target_in_view {
            // Without a tree edge between them this closes a cycle; with one
            // it is the back direction of an existing tree edge.
            if !view.edge_exists(source, target) {
                view.add_cross_edge(source, target, new_edge);
            }
            return;
        }
        let (in_view, not_in_view) = if source_in_view && !target_in_view {
            (source, target)
        } else if target_in_view && !source_in_view {
            (target, source)
        } else {
            // Both endpoints belong to a component this view cannot see.
            return;
        };

        view.add_edge(in_view, not_in_view);

        // The new vertex has exactly two incident edges if it hangs off
        // `in_view` alone. More than that means a previously disconnected
        // sub-graph was joined: traverse it with the new edge pair hidden
        // and append everything discovered.
        if self.degree(not_in_view) > 2 {
            let forward = self.graph.find_edge(in_view, not_in_view);
            let backward = self.graph.find_edge(not_in_view, in_view);
            let mut builder = TreeBuilder { view };
            breadth_first_search_filtered(
                &self.graph,
                not_in_view,
                |edge| Some(edge) != forward && Some(edge) != backward,
                &mut builder,
            );
        }
    }

    fn remove_edge_from_tree_views(
        &mut self,
        origin: NodeIndex,
        target: NodeIndex,
    ) -> Result<(), GraphError> {
        for view in self.live_tree_views() {
            let mut view = view.borrow_mut();
            if view.edge_exists(origin, target) {
                view.remove_edge(origin, target)?;
            }
        }
        Ok(())
    }
}

impl<F: FrameProperty, E: EdgeProperty> Default for Graph<F, E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Deep copy of the graph data. Event subscribers and subscribed tree views
/// are not carried over.
impl<F: FrameProperty + Clone, E: EdgeProperty> Clone for Graph<F, E> {
    fn clone(&self) -> Self {
        Graph {
            graph: self.graph.clone(),
            label_map: self.label_map.clone(),
            environment: self.environment.clone(),
            publisher: GraphEventPublisher::new(),
            subscribed_tree_views: Vec::new(),
        }
    }
}
