use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use uuid::Uuid;

use crate::item::{ItemRef, TypeTag};

/// The unique label of a frame (a named coordinate system).
#[derive(
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::From,
    derive_more::Into,
)]
pub struct FrameId(String);

impl FrameId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FrameId {
    fn from(id: &str) -> Self {
        FrameId(id.to_owned())
    }
}

impl Borrow<str> for FrameId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for FrameId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for FrameId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Header information attached to a whole graph.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Environment {
    pub uuid: Uuid,
    pub name: String,
}

impl Environment {
    pub fn new(name: impl Into<String>) -> Self {
        Environment {
            uuid: Uuid::new_v4(),
            name: name.into(),
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment::new("noname")
    }
}

/// The property attached to each vertex: the frame id plus a heterogeneous
/// item store, grouped by runtime type tag with insertion order preserved
/// within each group.
///
/// A `Frame` is a plain container. It is created, mutated and destroyed only
/// by the graph; all item bookkeeping that emits events lives there.
#[derive(Clone, Default)]
pub struct Frame {
    id: FrameId,
    pub(crate) items: IndexMap<TypeTag, Vec<ItemRef>>,
}

impl Frame {
    pub fn new(id: FrameId) -> Self {
        Frame {
            id,
            items: IndexMap::new(),
        }
    }

    pub fn id(&self) -> &FrameId {
        &self.id
    }

    /// Number of items across all type groups.
    pub fn total_item_count(&self) -> usize {
        self.items.values().map(Vec::len).sum()
    }

    /// The type tags of all item groups currently present.
    pub fn item_types(&self) -> Vec<TypeTag> {
        self.items.keys().copied().collect()
    }

    pub fn contains_items_of(&self, tag: TypeTag) -> bool {
        self.items.contains_key(&tag)
    }

    /// Visits every item in this frame, ignoring the type grouping.
    pub fn visit_items(&self, mut visitor: impl FnMut(&ItemRef)) {
        for list in self.items.values() {
            for item in list {
                visitor(item);
            }
        }
    }
}

impl crate::graph::FrameProperty for Frame {
    fn new(id: FrameId) -> Self {
        Frame::new(id)
    }

    fn id(&self) -> &FrameId {
        &self.id
    }

    fn set_id(&mut self, id: FrameId) {
        self.id = id;
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("id", &self.id)
            .field("items", &self.total_item_count())
            .finish()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} | {}", self.id, self.total_item_count())
    }
}

impl Default for FrameId {
    fn default() -> Self {
        FrameId(String::new())
    }
}
