//! A labeled, double-connected graph for robotics environment
//! representation.
//!
//! Frames (named coordinate systems) are the vertices; every edge carries a
//! timestamped rigid-body transform and is paired with its automatically
//! maintained inverse edge. Each frame additionally stores a type-indexed
//! bag of reference-counted items. The graph is the authoritative source of
//! spatial relationships: subsystems subscribe to its mutation events and
//! keep derived views (spanning trees, frame paths) consistent.
//!
//! The main entry point is [`EnvironmentGraph`]; the generic [`Graph`] core
//! underneath works with any frame and edge property types satisfying
//! [`FrameProperty`] and [`EdgeProperty`].
//!
//! ```
//! use transform_graph::{EnvironmentGraph, Transform};
//!
//! let mut graph = EnvironmentGraph::new();
//! graph.add_transform("body", "camera", Transform::translation(0.1, 0.0, 0.3))?;
//! graph.add_transform("camera", "lidar", Transform::translation(0.0, 0.2, 0.0))?;
//! let tf = graph.get_transform("body", "lidar")?;
//! assert!((tf.transform.translation().y - 0.2).abs() < 1e-9);
//! # Ok::<(), transform_graph::GraphError>(())
//! ```
//!
//! The graph is not internally thread-safe; one logical owner thread drives
//! all mutations, and event handlers run synchronously on its stack.

pub mod error;
pub mod events;
pub mod frame;
pub mod graph;
pub mod item;
pub mod serialization;
pub mod transform;

pub use crate::error::GraphError;
pub use crate::events::{
    GraphEvent, GraphEventDispatcher, GraphEventKind, GraphEventPublisher, GraphEventQueue,
    GraphEventSubscriber, ItemEventFilter, ItemEventSubscriber, SubscriberRef,
};
pub use crate::frame::{Environment, Frame, FrameId};
pub use crate::graph::environment_graph::EnvironmentGraph;
pub use crate::graph::path::Path;
pub use crate::graph::tree_view::{CrossEdge, TreeView};
pub use crate::graph::visit::BfsVisitor;
pub use crate::graph::{EdgeIndex, EdgeProperty, FrameProperty, Graph, NodeIndex};
pub use crate::item::{
    register_item_type, CallbackId, Item, ItemBase, ItemCodec, ItemMetadata, ItemRef, TypeTag,
};
pub use crate::transform::{Transform, TransformWithCovariance};
