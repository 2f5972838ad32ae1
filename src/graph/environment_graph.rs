//! The item-bearing transform graph.
//!
//! [`EnvironmentGraph`] composes the generic [`Graph`] core with the
//! frame-with-items vertex property and adds the item operations, the
//! item-aware frame removal and the whole-graph persistence entry points.
//! The generic surface stays reachable through `Deref`.

use std::collections::HashSet;
use std::ops::{Deref, DerefMut};
use std::path::Path as FilePath;
use std::rc::Rc;

use crate::error::GraphError;
use crate::events::{GraphEvent, GraphEventPublisher, SubscriberRef};
use crate::frame::{Environment, Frame, FrameId};
use crate::graph::Graph;
use crate::item::{metadata, Item, ItemRef, TypeTag};
use crate::serialization;
use crate::transform::Transform;

/// A graph of frames connected by transforms, where each frame stores a
/// type-indexed bag of items.
#[derive(Default)]
pub struct EnvironmentGraph {
    graph: Graph<Frame, Transform>,
}

impl EnvironmentGraph {
    pub fn new() -> Self {
        EnvironmentGraph {
            graph: Graph::new(),
        }
    }

    pub fn with_environment(environment: Environment) -> Self {
        EnvironmentGraph {
            graph: Graph::with_environment(environment),
        }
    }

    /// Appends `item` to the item list of `frame` and records the ownership
    /// on the item. Emits `ItemAdded`.
    ///
    /// An item can only live in one graph at a time, since adding it
    /// overwrites its frame name.
    pub fn add_item_to_frame(&mut self, frame: &str, item: ItemRef) -> Result<(), GraphError> {
        let vertex = self.graph.get_vertex(frame)?;
        let tag = item.type_tag();
        if let Some(property) = self.graph.frame_property_mut(vertex) {
            property
                .items
                .entry(tag)
                .or_insert_with(Vec::new)
                .push(Rc::clone(&item));
        }
        item.set_frame(frame.into());
        self.graph.notify(&GraphEvent::ItemAdded {
            frame: frame.into(),
            item,
        });
        Ok(())
    }

    /// Adds `item` to the frame it already names as its owner.
    pub fn add_item(&mut self, item: ItemRef) -> Result<(), GraphError> {
        let frame = item.frame();
        self.add_item_to_frame(frame.as_str(), item)
    }

    /// Removes `item` from its owning frame, located by identity. The item's
    /// frame name is cleared before the `ItemRemoved` event fires.
    pub fn remove_item_from_frame(&mut self, item: &ItemRef) -> Result<(), GraphError> {
        let frame = item.frame();
        let vertex = self.graph.get_vertex(frame.as_str())?;
        let tag = item.type_tag();
        let unknown_item = || GraphError::UnknownItem {
            frame: frame.clone(),
            uuid: item.uuid(),
        };
        let property = self
            .graph
            .frame_property_mut(vertex)
            .ok_or(GraphError::NullVertex)?;
        let list = property.items.get_mut(&tag).ok_or_else(unknown_item)?;
        let position = list
            .iter()
            .position(|candidate| Rc::ptr_eq(candidate, item))
            .ok_or_else(unknown_item)?;
        let removed = list.remove(position);
        if list.is_empty() {
            property.items.shift_remove(&tag);
        }
        removed.set_frame(FrameId::default());
        self.graph.notify(&GraphEvent::ItemRemoved {
            frame,
            item: removed,
        });
        Ok(())
    }

    /// Removes the item at `index` in the list for `tag` and returns the
    /// index of its successor, which equals `index`. Any indices previously
    /// obtained for that list are invalidated.
    ///
    /// # Panics
    /// Panics when `index` is out of range, like an indexing operation.
    pub fn remove_item_at(
        &mut self,
        frame: &str,
        tag: TypeTag,
        index: usize,
    ) -> Result<usize, GraphError> {
        let vertex = self.graph.get_vertex(frame)?;
        let property = self
            .graph
            .frame_property_mut(vertex)
            .ok_or(GraphError::NullVertex)?;
        let list = property
            .items
            .get_mut(&tag)
            .ok_or_else(|| GraphError::NoItemsOfTypeInFrame {
                frame: frame.into(),
                type_name: type_name_of(tag),
            })?;
        let removed = list.remove(index);
        if list.is_empty() {
            property.items.shift_remove(&tag);
        }
        removed.set_frame(FrameId::default());
        self.graph.notify(&GraphEvent::ItemRemoved {
            frame: frame.into(),
            item: removed,
        });
        Ok(index)
    }

    /// Removes every item from `frame`, emitting one `ItemRemoved` per item.
    /// The items still carry their frame name when the events fire.
    pub fn clear_frame(&mut self, frame: &str) -> Result<(), GraphError> {
        let vertex = self.graph.get_vertex(frame)?;
        let drained = match self.graph.frame_property_mut(vertex) {
            Some(property) => std::mem::take(&mut property.items),
            None => return Err(GraphError::NullVertex),
        };
        for (_, list) in drained {
            for item in list {
                self.graph.notify(&GraphEvent::ItemRemoved {
                    frame: frame.into(),
                    item,
                });
            }
        }
        Ok(())
    }

    /// All items of concrete type `Item<T>` in `frame`, in insertion order.
    /// The sequence is empty when the frame holds no such items.
    pub fn get_items<T: Clone + 'static>(
        &self,
        frame: &str,
    ) -> Result<impl Iterator<Item = Rc<Item<T>>> + '_, GraphError> {
        let property = self.graph.frame_property(frame)?;
        let tag = TypeTag::of::<Item<T>>();
        Ok(property
            .items
            .get(&tag)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .filter_map(|item| Rc::clone(item).as_any_rc().downcast::<Item<T>>().ok()))
    }

    /// The `index`-th item of type `Item<T>` in `frame`.
    ///
    /// # Panics
    /// Panics when `index` is out of range for a non-empty list.
    pub fn get_item<T: Clone + 'static>(
        &self,
        frame: &str,
        index: usize,
    ) -> Result<Rc<Item<T>>, GraphError> {
        let list = self.items_of(frame, TypeTag::of::<Item<T>>())?;
        Rc::clone(&list[index])
            .as_any_rc()
            .downcast::<Item<T>>()
            .map_err(|_| GraphError::NoItemsOfTypeInFrame {
                frame: frame.into(),
                type_name: type_name_of(TypeTag::of::<Item<T>>()),
            })
    }

    /// The raw item list for `tag` in `frame`. Fails with
    /// `NoItemsOfTypeInFrame` when the tag has no entry.
    pub fn items_of(&self, frame: &str, tag: TypeTag) -> Result<&[ItemRef], GraphError> {
        let property = self.graph.frame_property(frame)?;
        property
            .items
            .get(&tag)
            .map(Vec::as_slice)
            .ok_or_else(|| GraphError::NoItemsOfTypeInFrame {
                frame: frame.into(),
                type_name: type_name_of(tag),
            })
    }

    pub fn item_count<T: Clone + 'static>(&self, frame: &str) -> Result<usize, GraphError> {
        self.item_count_of(frame, TypeTag::of::<Item<T>>())
    }

    pub fn item_count_of(&self, frame: &str, tag: TypeTag) -> Result<usize, GraphError> {
        let property = self.graph.frame_property(frame)?;
        Ok(property.items.get(&tag).map_or(0, Vec::len))
    }

    /// Number of items in `frame` across all types.
    pub fn total_item_count(&self, frame: &str) -> Result<usize, GraphError> {
        Ok(self.graph.frame_property(frame)?.total_item_count())
    }

    pub fn contains_items<T: Clone + 'static>(&self, frame: &str) -> Result<bool, GraphError> {
        self.contains_items_of(frame, TypeTag::of::<Item<T>>())
    }

    pub fn contains_items_of(&self, frame: &str, tag: TypeTag) -> Result<bool, GraphError> {
        Ok(self.graph.frame_property(frame)?.contains_items_of(tag))
    }

    /// The type tags of all item groups in `frame`.
    pub fn item_types(&self, frame: &str) -> Result<Vec<TypeTag>, GraphError> {
        Ok(self.graph.frame_property(frame)?.item_types())
    }

    /// Visits every item in `frame`, ignoring the type grouping.
    pub fn visit_items(
        &self,
        frame: &str,
        visitor: impl FnMut(&ItemRef),
    ) -> Result<(), GraphError> {
        self.graph.frame_property(frame)?.visit_items(visitor);
        Ok(())
    }

    /// Removes an isolated frame together with its items: one `ItemRemoved`
    /// per item, then `FrameRemoved`. Fails with `FrameStillConnected`
    /// (without touching the items) while any edge remains.
    pub fn remove_frame(&mut self, frame: &str) -> Result<(), GraphError> {
        let vertex = self.graph.get_vertex(frame)?;
        if self.graph.degree(vertex) > 0 {
            return Err(GraphError::FrameStillConnected(frame.into()));
        }
        self.clear_frame(frame)?;
        self.graph.remove_frame(frame)
    }

    /// Replays the current state: frames and edges as in
    /// [`Graph::publish_current_state`], then one `ItemAdded` per item.
    pub fn publish_current_state(&self, subscriber: &SubscriberRef) {
        self.graph.publish_current_state(subscriber);
        self.for_each_item(|frame, item| {
            GraphEventPublisher::notify_subscriber(
                subscriber,
                &GraphEvent::ItemAdded {
                    frame: frame.clone(),
                    item: Rc::clone(item),
                },
            );
        });
    }

    /// The inverse replay: one `ItemRemoved` per item first, then edges and
    /// frames as in [`Graph::unpublish_current_state`].
    pub fn unpublish_current_state(&self, subscriber: &SubscriberRef) {
        self.for_each_item(|frame, item| {
            GraphEventPublisher::notify_subscriber(
                subscriber,
                &GraphEvent::ItemRemoved {
                    frame: frame.clone(),
                    item: Rc::clone(item),
                },
            );
        });
        self.graph.unpublish_current_state(subscriber);
    }

    /// Subscribes and replays the full current state (including items) to
    /// the new subscriber first.
    pub fn subscribe_with_current_state(&mut self, subscriber: &SubscriberRef) {
        self.publish_current_state(subscriber);
        self.graph.subscribe(subscriber);
    }

    fn for_each_item(&self, mut f: impl FnMut(&FrameId, &ItemRef)) {
        for vertex in self.graph.vertices() {
            let Some(property) = self.graph.frame_property_at(vertex) else {
                continue;
            };
            for list in property.items.values() {
                for item in list {
                    f(property.id(), item);
                }
            }
        }
    }

    /// Copies frames and edges into a fresh graph, excluding all items.
    pub fn structural_copy(&self) -> EnvironmentGraph {
        let mut copy = EnvironmentGraph::with_environment(self.graph.environment().clone());
        for id in self.graph.frame_ids() {
            // Cannot fail on a fresh graph with unique source labels.
            let _ = copy.add_frame(id.as_str());
        }
        self.copy_edges_into(&mut copy);
        copy
    }

    /// Deep copy where item groups are white-listed (`inclusive`) or
    /// black-listed by `tags`. Items themselves stay shared.
    pub fn filtered_copy(&self, tags: &HashSet<TypeTag>, inclusive: bool) -> EnvironmentGraph {
        let mut copy = EnvironmentGraph::with_environment(self.graph.environment().clone());
        for id in self.graph.frame_ids() {
            let _ = copy.add_frame(id.as_str());
        }
        self.copy_edges_into(&mut copy);
        for vertex in self.graph.vertices() {
            let Some(property) = self.graph.frame_property_at(vertex) else {
                continue;
            };
            let frame = property.id().clone();
            for (tag, list) in &property.items {
                if tags.contains(tag) != inclusive {
                    continue;
                }
                for item in list {
                    let _ = copy.add_item_to_frame(frame.as_str(), Rc::clone(item));
                }
            }
        }
        copy
    }

    fn copy_edges_into(&self, destination: &mut EnvironmentGraph) {
        let mut seen: HashSet<(FrameId, FrameId)> = HashSet::new();
        for edge in self.graph.edges() {
            let Some((source, target)) = self.graph.edge_endpoints(edge) else {
                continue;
            };
            let (Ok(source_id), Ok(target_id)) =
                (self.graph.frame_id(source), self.graph.frame_id(target))
            else {
                continue;
            };
            if seen.contains(&(target_id.clone(), source_id.clone())) {
                continue;
            }
            seen.insert((source_id.clone(), target_id.clone()));
            if let Some(transform) = self.graph.edge_property_at(edge) {
                let _ = destination.add_transform(
                    source_id.as_str(),
                    target_id.as_str(),
                    transform.clone(),
                );
            }
        }
    }

    /// Serializes the whole graph (structure, frame properties, items of
    /// registered-codec types) into `writer`'s file. See the serialization
    /// module for the format.
    pub fn save_to_file(&self, path: impl AsRef<FilePath>) -> Result<(), GraphError> {
        serialization::save_to_file(self, path.as_ref())
    }

    pub fn load_from_file(path: impl AsRef<FilePath>) -> Result<EnvironmentGraph, GraphError> {
        serialization::load_from_file(path.as_ref())
    }

    pub fn save_to_bytes(&self) -> Result<Vec<u8>, GraphError> {
        serialization::save_to_bytes(self)
    }

    pub fn load_from_bytes(bytes: &[u8]) -> Result<EnvironmentGraph, GraphError> {
        serialization::load_from_bytes(bytes)
    }
}

impl Deref for EnvironmentGraph {
    type Target = Graph<Frame, Transform>;

    fn deref(&self) -> &Self::Target {
        &self.graph
    }
}

impl DerefMut for EnvironmentGraph {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.graph
    }
}

impl Clone for EnvironmentGraph {
    fn clone(&self) -> Self {
        EnvironmentGraph {
            graph: self.graph.clone(),
        }
    }
}

fn type_name_of(tag: TypeTag) -> String {
    metadata::get(tag)
        .map(|meta| meta.class_name)
        .unwrap_or_else(|| format!("{tag:?}"))
}
