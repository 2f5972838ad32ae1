#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;

use transform_graph::{
    register_item_type, GraphEvent, GraphEventKind, GraphEventSubscriber, SubscriberRef,
};

/// Subscriber that records every event it sees.
#[derive(Default)]
pub struct Recorder {
    pub events: Vec<GraphEvent>,
}

impl GraphEventSubscriber for Recorder {
    fn notify(&mut self, event: &GraphEvent) {
        self.events.push(event.clone());
    }
}

/// A recorder wired up for subscription; keep the `Rc` alive for as long as
/// the subscription should last.
pub fn recorder() -> (Rc<RefCell<Recorder>>, SubscriberRef) {
    let recorder = Rc::new(RefCell::new(Recorder::default()));
    let subscriber: SubscriberRef = recorder.clone();
    (recorder, subscriber)
}

pub fn kinds(events: &[GraphEvent]) -> Vec<GraphEventKind> {
    events.iter().map(GraphEvent::kind).collect()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Vec3 { x, y, z }
    }
}

/// Registers the item types shared by the integration tests. Registration is
/// process-wide and idempotent, so every test may call this.
pub fn register_test_items() {
    register_item_type::<Vec3>("Item<Vec3>");
    register_item_type::<String>("Item<String>");
    register_item_type::<i32>("Item<i32>");
    register_item_type::<f32>("Item<f32>");
}
