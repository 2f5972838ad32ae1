//! An ordered frame sequence between two endpoints.

use itertools::Itertools;
use std::collections::HashSet;
use std::ops::Index;

use crate::error::GraphError;
use crate::events::GraphEventDispatcher;
use crate::frame::FrameId;

/// A path inside a graph: the frames from origin to target, in order. An
/// empty path means no route exists.
///
/// Paths are created by the graph. An auto-updating path is subscribed to
/// the graph's events and marks itself dirty when an edge it runs over is
/// removed (in either direction); the path is then refreshed the next time
/// it is used for a transform query. A detached path ignores events and
/// stays valid as a snapshot.
pub struct Path {
    frames: Vec<FrameId>,
    /// All directed frame pairs along the path, both orientations, for O(1)
    /// membership checks during edge-removal events. Empty when detached.
    edges: HashSet<(FrameId, FrameId)>,
    dirty: bool,
    auto_updating: bool,
}

impl Path {
    /// A detached snapshot path.
    pub(crate) fn new(frames: Vec<FrameId>) -> Self {
        Path {
            frames,
            edges: HashSet::new(),
            dirty: false,
            auto_updating: false,
        }
    }

    /// An auto-updating path; the caller subscribes it to the graph.
    pub(crate) fn new_subscribed(frames: Vec<FrameId>) -> Self {
        let edges = Self::build_edges(&frames);
        Path {
            frames,
            edges,
            dirty: false,
            auto_updating: true,
        }
    }

    fn build_edges(frames: &[FrameId]) -> HashSet<(FrameId, FrameId)> {
        frames
            .iter()
            .tuple_windows()
            .flat_map(|(a, b)| {
                [
                    (a.clone(), b.clone()),
                    (b.clone(), a.clone()),
                ]
            })
            .collect()
    }

    /// The first frame of the path.
    pub fn origin(&self) -> Result<&FrameId, GraphError> {
        self.frames.first().ok_or(GraphError::EmptyPath)
    }

    /// The last frame of the path.
    pub fn target(&self) -> Result<&FrameId, GraphError> {
        self.frames.last().ok_or(GraphError::EmptyPath)
    }

    /// All frames from origin to target. If the path is dirty this is an
    /// outdated snapshot.
    pub fn frames(&self) -> &[FrameId] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&FrameId> {
        self.frames.get(index)
    }

    /// True when an edge on the path has been removed since the last
    /// refresh.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_auto_updating(&self) -> bool {
        self.auto_updating
    }

    /// Detaches from the graph: clears the edge set and the dirty flag and
    /// stops reacting to events. The frame snapshot is kept.
    pub fn unsubscribe(&mut self) {
        self.edges.clear();
        self.dirty = false;
        self.auto_updating = false;
    }

    pub(crate) fn set_frames(&mut self, frames: Vec<FrameId>) {
        self.edges = if self.auto_updating {
            Self::build_edges(&frames)
        } else {
            HashSet::new()
        };
        self.frames = frames;
    }

    pub(crate) fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }
}

impl Index<usize> for Path {
    type Output = FrameId;

    fn index(&self, index: usize) -> &FrameId {
        &self.frames[index]
    }
}

impl GraphEventDispatcher for Path {
    fn edge_removed(&mut self, origin: &FrameId, target: &FrameId) {
        if !self.auto_updating || self.dirty {
            return;
        }
        if self.edges.contains(&(origin.clone(), target.clone())) {
            self.dirty = true;
        }
    }
}
