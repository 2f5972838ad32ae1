//! Transform queries and transform-vocabulary wrappers for graphs whose
//! edges carry a [`Transform`].

use std::cell::RefCell;
use std::rc::Rc;

use itertools::Itertools;

use crate::error::GraphError;
use crate::graph::path::Path;
use crate::graph::{EdgeIndex, FrameProperty, Graph, NodeIndex};
use crate::transform::Transform;

impl<F: FrameProperty> Graph<F, Transform> {
    /// Adds the transform `origin -> target`; the inverse direction is added
    /// automatically. See [`Graph::add_edge`].
    pub fn add_transform(
        &mut self,
        origin: &str,
        target: &str,
        transform: Transform,
    ) -> Result<EdgeIndex, GraphError> {
        self.add_edge(origin, target, transform)
    }

    /// Updates both directions of an existing transform atomically. See
    /// [`Graph::set_edge_property`].
    pub fn update_transform(
        &mut self,
        origin: &str,
        target: &str,
        transform: Transform,
    ) -> Result<(), GraphError> {
        self.set_edge_property(origin, target, transform)
    }

    /// Removes the transform pair between `origin` and `target`. See
    /// [`Graph::remove_edge`].
    pub fn remove_transform(&mut self, origin: &str, target: &str) -> Result<(), GraphError> {
        self.remove_edge(origin, target)
    }

    /// The transform from `origin` to `target`, computed transitively when
    /// no direct edge exists.
    ///
    /// Fails with `UnknownTransform` when either frame is unknown, when no
    /// path connects the two frames, or when the composed pose is invalid.
    pub fn get_transform(&self, origin: &str, target: &str) -> Result<Transform, GraphError> {
        let unknown = || GraphError::UnknownTransform {
            origin: origin.into(),
            target: target.into(),
        };
        let origin_vertex = self.vertex(origin).ok_or_else(unknown)?;
        let target_vertex = self.vertex(target).ok_or_else(unknown)?;
        self.get_transform_between(origin_vertex, target_vertex)
    }

    /// Vertex-handle variant of [`Self::get_transform`].
    pub fn get_transform_between(
        &self,
        origin: NodeIndex,
        target: NodeIndex,
    ) -> Result<Transform, GraphError> {
        let unknown = |graph: &Self| GraphError::UnknownTransform {
            origin: graph.frame_id(origin).cloned().unwrap_or_default(),
            target: graph.frame_id(target).cloned().unwrap_or_default(),
        };

        // Fast path: a direct edge holds the answer.
        if let Some(edge) = self.storage().find_edge(origin, target) {
            if let Some(transform) = self.edge_property_at(edge) {
                return Ok(transform.clone());
            }
        }

        let vertices = self.find_path(origin, target);
        if vertices.is_empty() {
            return Err(unknown(self));
        }
        let mut result = Transform::identity();
        for (a, b) in vertices.iter().tuple_windows() {
            let edge = self
                .storage()
                .find_edge(*a, *b)
                .and_then(|edge| self.edge_property_at(edge))
                .ok_or_else(|| unknown(self))?;
            result = result.compose(edge);
        }
        if !result.transform.is_valid() {
            return Err(unknown(self));
        }
        Ok(result)
    }

    /// The composed transform along `path`, origin to target.
    ///
    /// A dirty auto-updating path is refreshed first by re-running the
    /// search between its endpoints; if no route exists anymore the call
    /// fails with `InvalidPath`. A detached path that no longer matches the
    /// graph fails the same way.
    pub fn transform_along(&self, path: &Rc<RefCell<Path>>) -> Result<Transform, GraphError> {
        let mut path = path.borrow_mut();
        if path.is_dirty() {
            let origin = path.origin()?.clone();
            let target = path.target()?.clone();
            let frames = self.frames_between(origin.as_str(), target.as_str())?;
            if frames.is_empty() {
                return Err(GraphError::InvalidPath);
            }
            path.set_frames(frames);
            path.set_dirty(false);
        }
        if path.is_empty() {
            return Err(GraphError::EmptyPath);
        }
        let mut result = Transform::identity();
        for (a, b) in path.frames().iter().tuple_windows() {
            let transform = self
                .edge_property(a.as_str(), b.as_str())
                .map_err(|_| GraphError::InvalidPath)?;
            result = result.compose(transform);
        }
        Ok(result)
    }
}
