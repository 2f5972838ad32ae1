use std::marker::PhantomData;
use std::rc::Rc;

use crate::events::{GraphEvent, GraphEventSubscriber};
use crate::frame::FrameId;
use crate::item::{Item, TypeTag};

/// Typed interest in item events: implement this for one embedded data type
/// and wrap the implementation in an [`ItemEventFilter`].
pub trait ItemEventSubscriber<T: 'static> {
    fn item_added(&mut self, _frame: &FrameId, _item: &Rc<Item<T>>) {}
    fn item_removed(&mut self, _frame: &FrameId, _item: &Rc<Item<T>>) {}
}

/// Filters the event stream down to `ItemAdded`/`ItemRemoved` events whose
/// item is an `Item<T>` (optionally restricted to a single frame) and
/// delivers them downcast to the wrapped [`ItemEventSubscriber`].
pub struct ItemEventFilter<T: 'static, S> {
    inner: S,
    frame: Option<FrameId>,
    enabled: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T: 'static, S> ItemEventFilter<T, S> {
    pub fn new(inner: S) -> Self {
        ItemEventFilter {
            inner,
            frame: None,
            enabled: true,
            _marker: PhantomData,
        }
    }

    /// Restricts delivery to items of one frame.
    pub fn for_frame(inner: S, frame: FrameId) -> Self {
        ItemEventFilter {
            inner,
            frame: Some(frame),
            enabled: true,
            _marker: PhantomData,
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<T, S> ItemEventFilter<T, S>
where
    T: Clone + 'static,
    S: ItemEventSubscriber<T>,
{
    fn matches(&self, frame: &FrameId, tag: TypeTag) -> bool {
        tag == TypeTag::of::<Item<T>>()
            && self
                .frame
                .as_ref()
                .map_or(true, |wanted| wanted == frame)
    }
}

impl<T, S> GraphEventSubscriber for ItemEventFilter<T, S>
where
    T: Clone + 'static,
    S: ItemEventSubscriber<T>,
{
    fn notify(&mut self, event: &GraphEvent) {
        match event {
            GraphEvent::ItemAdded { frame, item } if self.matches(frame, item.type_tag()) => {
                if let Ok(typed) = Rc::clone(item).as_any_rc().downcast::<Item<T>>() {
                    self.inner.item_added(frame, &typed);
                }
            }
            GraphEvent::ItemRemoved { frame, item } if self.matches(frame, item.type_tag()) => {
                if let Ok(typed) = Rc::clone(item).as_any_rc().downcast::<Item<T>>() {
                    self.inner.item_removed(frame, &typed);
                }
            }
            _ => {}
        }
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}
