//! Type-erased items stored inside frames.
//!
//! Every payload attached to a frame (sensor data, map tiles, joints, ...) is
//! an [`Item<T>`] shared as an [`ItemRef`]. Items are reference counted
//! because subscribers may retain them after removal; the mutable parts
//! (timestamp, owning frame, the embedded data) use interior mutability so
//! they stay writable through the shared handle. The UUID is assigned at
//! construction and never changes.

use std::any::{Any, TypeId};
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::rc::Rc;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::frame::FrameId;

pub mod codec;
pub mod metadata;

pub use codec::{register_item_type, ItemCodec};
pub use metadata::ItemMetadata;

/// Runtime type tag used to group items inside a frame and to filter typed
/// event subscriptions.
///
/// The tag is only meaningful within one process; the persisted format
/// identifies item types by their registered class-name strings instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeTag(TypeId);

impl TypeTag {
    pub fn of<T: 'static>() -> Self {
        TypeTag(TypeId::of::<T>())
    }
}

/// Shared handle to a type-erased item.
pub type ItemRef = Rc<dyn ItemBase>;

/// Token returned when connecting a contents-changed callback; disconnecting
/// uses the token because closures have no comparable identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CallbackId(u64);

/// The capability set common to all items, independent of the embedded data
/// type. [`Item<T>`] is the one implementation.
pub trait ItemBase {
    fn time(&self) -> OffsetDateTime;
    fn set_time(&self, time: OffsetDateTime);

    /// The immutable identity of this item.
    fn uuid(&self) -> Uuid;

    /// Name of the frame currently owning this item; empty when the item is
    /// not part of any graph.
    fn frame(&self) -> FrameId;
    fn set_frame(&self, frame: FrameId);

    /// Tag of the concrete item type (`Item<T>`). Items are grouped by this
    /// tag inside their frame.
    fn type_tag(&self) -> TypeTag;

    /// Tag of the embedded data type (`T`).
    fn embedded_tag(&self) -> TypeTag;

    /// The registered class name, if this item's type was registered with the
    /// metadata registry. Unregistered items cannot be serialized.
    fn class_name(&self) -> Option<String>;

    /// Deep copy keeping uuid, timestamp and frame name. Change callbacks are
    /// not carried over.
    fn clone_item(&self) -> ItemRef;

    /// Invokes every connected contents-changed callback with this item.
    /// The signal is never emitted automatically; mutating code calls this
    /// after changing the embedded data.
    fn contents_changed(&self);

    fn connect_contents_changed(&self, callback: Box<dyn Fn(&dyn ItemBase)>) -> CallbackId;
    fn disconnect_contents_changed(&self, id: CallbackId);

    /// Downcast support. The tag-checked downcast replaces both language RTTI
    /// and raw data-pointer access.
    fn as_any(&self) -> &dyn Any;
    fn as_any_rc(self: Rc<Self>) -> Rc<dyn Any>;
}

/// An item embedding a value of type `T`.
pub struct Item<T: 'static> {
    time: Cell<OffsetDateTime>,
    uuid: Uuid,
    frame: RefCell<FrameId>,
    data: RefCell<T>,
    callbacks: RefCell<Vec<(CallbackId, Box<dyn Fn(&dyn ItemBase)>)>>,
    next_callback: Cell<u64>,
}

impl<T: Clone + 'static> Item<T> {
    pub fn new(data: T) -> Self {
        Item {
            time: Cell::new(OffsetDateTime::now_utc()),
            uuid: Uuid::new_v4(),
            frame: RefCell::new(FrameId::default()),
            data: RefCell::new(data),
            callbacks: RefCell::new(Vec::new()),
            next_callback: Cell::new(0),
        }
    }

    /// Reconstructs an item from persisted parts. Intended for codec
    /// implementations; regular code uses [`Item::new`].
    pub fn from_parts(time: OffsetDateTime, uuid: Uuid, frame: FrameId, data: T) -> Self {
        Item {
            time: Cell::new(time),
            uuid,
            frame: RefCell::new(frame),
            data: RefCell::new(data),
            callbacks: RefCell::new(Vec::new()),
            next_callback: Cell::new(0),
        }
    }

    pub fn data(&self) -> Ref<'_, T> {
        self.data.borrow()
    }

    pub fn data_mut(&self) -> RefMut<'_, T> {
        self.data.borrow_mut()
    }

    pub fn set_data(&self, data: T) {
        *self.data.borrow_mut() = data;
    }
}

impl<T: Clone + 'static> ItemBase for Item<T> {
    fn time(&self) -> OffsetDateTime {
        self.time.get()
    }

    fn set_time(&self, time: OffsetDateTime) {
        self.time.set(time);
    }

    fn uuid(&self) -> Uuid {
        self.uuid
    }

    fn frame(&self) -> FrameId {
        self.frame.borrow().clone()
    }

    fn set_frame(&self, frame: FrameId) {
        *self.frame.borrow_mut() = frame;
    }

    fn type_tag(&self) -> TypeTag {
        TypeTag::of::<Item<T>>()
    }

    fn embedded_tag(&self) -> TypeTag {
        TypeTag::of::<T>()
    }

    fn class_name(&self) -> Option<String> {
        metadata::get(self.type_tag()).map(|meta| meta.class_name)
    }

    fn clone_item(&self) -> ItemRef {
        Rc::new(Item {
            time: Cell::new(self.time.get()),
            uuid: self.uuid,
            frame: RefCell::new(self.frame.borrow().clone()),
            data: RefCell::new(self.data.borrow().clone()),
            callbacks: RefCell::new(Vec::new()),
            next_callback: Cell::new(0),
        })
    }

    fn contents_changed(&self) {
        let callbacks = self.callbacks.borrow();
        for (_, callback) in callbacks.iter() {
            callback(self);
        }
    }

    fn connect_contents_changed(&self, callback: Box<dyn Fn(&dyn ItemBase)>) -> CallbackId {
        let id = CallbackId(self.next_callback.get());
        self.next_callback.set(id.0 + 1);
        self.callbacks.borrow_mut().push((id, callback));
        id
    }

    fn disconnect_contents_changed(&self, id: CallbackId) {
        self.callbacks
            .borrow_mut()
            .retain(|(callback_id, _)| *callback_id != id);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_rc(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}
