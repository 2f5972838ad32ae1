//! Event publication: every mutation of a graph synchronously notifies the
//! subscribed handlers, in subscription order, before the mutating call
//! returns.
//!
//! Subscribers are held as weak handles; dropping the last strong reference
//! to a subscriber ends its subscription, and dead handles are pruned on the
//! next publish.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use petgraph::graph::EdgeIndex;
use strum_macros::EnumDiscriminants;

use crate::frame::FrameId;
use crate::item::ItemRef;

mod item_dispatcher;
mod queue;

pub use item_dispatcher::{ItemEventFilter, ItemEventSubscriber};
pub use queue::GraphEventQueue;

/// One graph mutation, as seen by subscribers. Edge events carry the handle
/// of the affected edge; item events carry the shared item itself, which may
/// outlive its removal if a handler retains it.
#[derive(Clone, EnumDiscriminants)]
#[strum_discriminants(name(GraphEventKind), derive(Hash, strum_macros::Display))]
pub enum GraphEvent {
    FrameAdded(FrameId),
    FrameRemoved(FrameId),
    EdgeAdded {
        origin: FrameId,
        target: FrameId,
        edge: EdgeIndex,
    },
    EdgeRemoved {
        origin: FrameId,
        target: FrameId,
    },
    EdgeModified {
        origin: FrameId,
        target: FrameId,
        edge: EdgeIndex,
        inverse_edge: EdgeIndex,
    },
    ItemAdded {
        frame: FrameId,
        item: ItemRef,
    },
    ItemRemoved {
        frame: FrameId,
        item: ItemRef,
    },
}

impl GraphEvent {
    pub fn kind(&self) -> GraphEventKind {
        GraphEventKind::from(self)
    }

    /// True when `other` supersedes this event so that both can be dropped
    /// from a batch: a `FrameAdded` followed later by the matching
    /// `FrameRemoved` cancels out. Normal dispatch never merges; only the
    /// replay/batching queue uses this.
    pub fn mergeable(&self, other: &GraphEvent) -> bool {
        matches!(
            (self, other),
            (GraphEvent::FrameAdded(added), GraphEvent::FrameRemoved(removed)) if added == removed
        )
    }
}

impl fmt::Debug for GraphEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphEvent::FrameAdded(frame) => write!(f, "FrameAdded({frame})"),
            GraphEvent::FrameRemoved(frame) => write!(f, "FrameRemoved({frame})"),
            GraphEvent::EdgeAdded { origin, target, .. } => {
                write!(f, "EdgeAdded({origin} -> {target})")
            }
            GraphEvent::EdgeRemoved { origin, target } => {
                write!(f, "EdgeRemoved({origin} -> {target})")
            }
            GraphEvent::EdgeModified { origin, target, .. } => {
                write!(f, "EdgeModified({origin} -> {target})")
            }
            GraphEvent::ItemAdded { frame, item } => {
                write!(f, "ItemAdded({frame}, {})", item.uuid())
            }
            GraphEvent::ItemRemoved { frame, item } => {
                write!(f, "ItemRemoved({frame}, {})", item.uuid())
            }
        }
    }
}

/// A handler for raw graph events. Most subscribers implement
/// [`GraphEventDispatcher`] instead and get this for free.
pub trait GraphEventSubscriber {
    fn notify(&mut self, event: &GraphEvent);

    /// A disabled subscriber silently drops events.
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Shared handle under which subscribers are registered.
pub type SubscriberRef = Rc<RefCell<dyn GraphEventSubscriber>>;

/// Parses events and calls one method per event kind. Override the methods
/// you are interested in.
pub trait GraphEventDispatcher {
    fn frame_added(&mut self, _frame: &FrameId) {}
    fn frame_removed(&mut self, _frame: &FrameId) {}
    fn edge_added(&mut self, _origin: &FrameId, _target: &FrameId, _edge: EdgeIndex) {}
    fn edge_removed(&mut self, _origin: &FrameId, _target: &FrameId) {}
    fn edge_modified(
        &mut self,
        _origin: &FrameId,
        _target: &FrameId,
        _edge: EdgeIndex,
        _inverse_edge: EdgeIndex,
    ) {
    }
    fn item_added(&mut self, _frame: &FrameId, _item: &ItemRef) {}
    fn item_removed(&mut self, _frame: &FrameId, _item: &ItemRef) {}

    fn enabled(&self) -> bool {
        true
    }
}

impl<T: GraphEventDispatcher> GraphEventSubscriber for T {
    fn notify(&mut self, event: &GraphEvent) {
        match event {
            GraphEvent::FrameAdded(frame) => self.frame_added(frame),
            GraphEvent::FrameRemoved(frame) => self.frame_removed(frame),
            GraphEvent::EdgeAdded {
                origin,
                target,
                edge,
            } => self.edge_added(origin, target, *edge),
            GraphEvent::EdgeRemoved { origin, target } => self.edge_removed(origin, target),
            GraphEvent::EdgeModified {
                origin,
                target,
                edge,
                inverse_edge,
            } => self.edge_modified(origin, target, *edge, *inverse_edge),
            GraphEvent::ItemAdded { frame, item } => self.item_added(frame, item),
            GraphEvent::ItemRemoved { frame, item } => self.item_removed(frame, item),
        }
    }

    fn is_enabled(&self) -> bool {
        self.enabled()
    }
}

/// Subscription list and synchronous fan-out. Owned by the graph; external
/// code talks to it through the graph's subscribe/unsubscribe surface.
#[derive(Default)]
pub struct GraphEventPublisher {
    subscribers: Vec<Weak<RefCell<dyn GraphEventSubscriber>>>,
}

impl GraphEventPublisher {
    pub fn new() -> Self {
        GraphEventPublisher::default()
    }

    pub fn subscribe(&mut self, subscriber: &SubscriberRef) {
        self.subscribers.push(Rc::downgrade(subscriber));
    }

    /// Removes `subscriber` by pointer identity. Dropped subscribers are
    /// cleaned up automatically; this is only needed for explicit detach.
    pub fn unsubscribe(&mut self, subscriber: &SubscriberRef) {
        let target = Rc::downgrade(subscriber);
        self.subscribers
            .retain(|weak| !weak.ptr_eq(&target) && weak.strong_count() > 0);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Delivers `event` to every live, enabled subscriber in subscription
    /// order. Each handler runs to completion on the caller's stack.
    pub fn notify(&mut self, event: &GraphEvent) {
        self.subscribers.retain(|weak| weak.strong_count() > 0);
        let subscribers = self.subscribers.clone();
        for weak in subscribers {
            if let Some(subscriber) = weak.upgrade() {
                Self::notify_subscriber(&subscriber, event);
            }
        }
    }

    /// Delivers one event to one subscriber, honoring its enable flag.
    pub fn notify_subscriber(subscriber: &SubscriberRef, event: &GraphEvent) {
        let mut handler = subscriber.borrow_mut();
        if handler.is_enabled() {
            handler.notify(event);
        }
    }
}
