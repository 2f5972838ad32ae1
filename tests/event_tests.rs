use std::cell::RefCell;
use std::rc::Rc;

use pretty_assertions::assert_eq;

use crate::common::{kinds, recorder, register_test_items};
use transform_graph::{
    EnvironmentGraph, FrameId, GraphEvent, GraphEventDispatcher, GraphEventKind, GraphEventQueue,
    GraphEventSubscriber, Item, ItemEventFilter, ItemEventSubscriber, ItemRef, SubscriberRef,
    Transform,
};

#[derive(Default)]
struct CountingDispatcher {
    frames_added: Vec<FrameId>,
    edges_added: usize,
    edges_removed: usize,
    edges_modified: usize,
    enabled: bool,
}

impl GraphEventDispatcher for CountingDispatcher {
    fn frame_added(&mut self, frame: &FrameId) {
        self.frames_added.push(frame.clone());
    }

    fn edge_added(&mut self, _origin: &FrameId, _target: &FrameId, _edge: transform_graph::EdgeIndex) {
        self.edges_added += 1;
    }

    fn edge_removed(&mut self, _origin: &FrameId, _target: &FrameId) {
        self.edges_removed += 1;
    }

    fn edge_modified(
        &mut self,
        _origin: &FrameId,
        _target: &FrameId,
        _edge: transform_graph::EdgeIndex,
        _inverse_edge: transform_graph::EdgeIndex,
    ) {
        self.edges_modified += 1;
    }

    fn enabled(&self) -> bool {
        self.enabled
    }
}

#[test]
fn dispatcher_routes_events_to_per_kind_methods() {
    let mut graph = EnvironmentGraph::new();
    let dispatcher = Rc::new(RefCell::new(CountingDispatcher {
        enabled: true,
        ..CountingDispatcher::default()
    }));
    let subscriber: SubscriberRef = dispatcher.clone();
    graph.subscribe(&subscriber);

    graph
        .add_transform("a", "b", Transform::translation(1.0, 0.0, 0.0))
        .unwrap();
    graph
        .update_transform("a", "b", Transform::translation(2.0, 0.0, 0.0))
        .unwrap();
    graph.remove_edge("a", "b").unwrap();

    let dispatcher = dispatcher.borrow();
    assert_eq!(
        dispatcher.frames_added,
        vec![FrameId::from("a"), FrameId::from("b")]
    );
    assert_eq!(dispatcher.edges_added, 1);
    assert_eq!(dispatcher.edges_modified, 1);
    assert_eq!(dispatcher.edges_removed, 1);
}

#[test]
fn disabled_subscribers_drop_events_silently() {
    let mut graph = EnvironmentGraph::new();
    let dispatcher = Rc::new(RefCell::new(CountingDispatcher::default()));
    let subscriber: SubscriberRef = dispatcher.clone();
    graph.subscribe(&subscriber);

    graph.add_frame("a").unwrap();
    dispatcher.borrow_mut().enabled = true;
    graph.add_frame("b").unwrap();

    assert_eq!(dispatcher.borrow().frames_added, vec![FrameId::from("b")]);
}

#[test]
fn subscribers_are_notified_in_subscription_order() {
    let order: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));

    struct Tagged(&'static str, Rc<RefCell<Vec<&'static str>>>);
    impl GraphEventSubscriber for Tagged {
        fn notify(&mut self, _event: &GraphEvent) {
            self.1.borrow_mut().push(self.0);
        }
    }

    let mut graph = EnvironmentGraph::new();
    let first: SubscriberRef = Rc::new(RefCell::new(Tagged("first", Rc::clone(&order))));
    let second: SubscriberRef = Rc::new(RefCell::new(Tagged("second", Rc::clone(&order))));
    graph.subscribe(&first);
    graph.subscribe(&second);

    graph.add_frame("a").unwrap();

    assert_eq!(*order.borrow(), vec!["first", "second"]);
}

#[test]
fn unsubscribed_and_dropped_subscribers_receive_nothing() {
    let mut graph = EnvironmentGraph::new();
    let (first, first_ref) = recorder();
    let (second, second_ref) = recorder();
    graph.subscribe(&first_ref);
    graph.subscribe(&second_ref);

    graph.unsubscribe(&first_ref);
    drop(second_ref);
    drop(second);

    graph.add_frame("a").unwrap();
    assert!(first.borrow().events.is_empty());
}

#[derive(Default)]
struct TypedLog {
    added: Vec<(FrameId, f32)>,
    removed: Vec<(FrameId, f32)>,
}

impl ItemEventSubscriber<f32> for TypedLog {
    fn item_added(&mut self, frame: &FrameId, item: &Rc<Item<f32>>) {
        self.added.push((frame.clone(), *item.data()));
    }

    fn item_removed(&mut self, frame: &FrameId, item: &Rc<Item<f32>>) {
        self.removed.push((frame.clone(), *item.data()));
    }
}

#[test]
fn typed_dispatcher_filters_by_item_type() {
    register_test_items();
    let mut graph = EnvironmentGraph::new();
    graph.add_frame("f").unwrap();

    let filter = Rc::new(RefCell::new(ItemEventFilter::<f32, TypedLog>::new(
        TypedLog::default(),
    )));
    let subscriber: SubscriberRef = filter.clone();
    graph.subscribe(&subscriber);

    let float_item: ItemRef = Rc::new(Item::new(1.5_f32));
    let int_item: ItemRef = Rc::new(Item::new(7_i32));
    graph.add_item_to_frame("f", float_item.clone()).unwrap();
    graph.add_item_to_frame("f", int_item).unwrap();
    graph.remove_item_from_frame(&float_item).unwrap();

    let filter = filter.borrow();
    assert_eq!(filter.inner().added, vec![(FrameId::from("f"), 1.5)]);
    assert_eq!(filter.inner().removed, vec![(FrameId::from("f"), 1.5)]);
}

#[test]
fn typed_dispatcher_filters_by_frame() {
    register_test_items();
    let mut graph = EnvironmentGraph::new();
    graph.add_frame("watched").unwrap();
    graph.add_frame("other").unwrap();

    let filter = Rc::new(RefCell::new(ItemEventFilter::<f32, TypedLog>::for_frame(
        TypedLog::default(),
        "watched".into(),
    )));
    let subscriber: SubscriberRef = filter.clone();
    graph.subscribe(&subscriber);

    graph
        .add_item_to_frame("watched", Rc::new(Item::new(1.0_f32)))
        .unwrap();
    graph
        .add_item_to_frame("other", Rc::new(Item::new(2.0_f32)))
        .unwrap();

    assert_eq!(
        filter.borrow().inner().added,
        vec![(FrameId::from("watched"), 1.0)]
    );
}

#[test]
fn replay_publishes_frames_edges_then_items() {
    register_test_items();
    let mut graph = EnvironmentGraph::new();
    graph
        .add_transform("a", "b", Transform::translation(1.0, 0.0, 0.0))
        .unwrap();
    graph
        .add_item_to_frame("a", Rc::new(Item::new(String::from("payload"))))
        .unwrap();

    let (late, late_ref) = recorder();
    graph.publish_current_state(&late_ref);

    assert_eq!(
        kinds(&late.borrow().events),
        vec![
            GraphEventKind::FrameAdded,
            GraphEventKind::FrameAdded,
            GraphEventKind::EdgeAdded,
            GraphEventKind::ItemAdded,
        ],
        "one FrameAdded per frame, one EdgeAdded per edge pair, one ItemAdded per item"
    );
}

#[test]
fn unpublish_emits_the_inverse_sequence() {
    register_test_items();
    let mut graph = EnvironmentGraph::new();
    graph
        .add_transform("a", "b", Transform::translation(1.0, 0.0, 0.0))
        .unwrap();
    graph
        .add_item_to_frame("a", Rc::new(Item::new(String::from("payload"))))
        .unwrap();

    let (late, late_ref) = recorder();
    graph.unpublish_current_state(&late_ref);

    assert_eq!(
        kinds(&late.borrow().events),
        vec![
            GraphEventKind::ItemRemoved,
            GraphEventKind::EdgeRemoved,
            GraphEventKind::FrameRemoved,
            GraphEventKind::FrameRemoved,
        ]
    );
}

#[test]
fn subscribe_with_current_state_bootstraps_then_streams() {
    let mut graph = EnvironmentGraph::new();
    graph.add_frame("a").unwrap();

    let (recorder, subscriber) = recorder();
    graph.subscribe_with_current_state(&subscriber);
    graph.add_frame("b").unwrap();

    let events = recorder.borrow();
    assert_eq!(events.events.len(), 2);
    assert!(matches!(&events.events[0], GraphEvent::FrameAdded(id) if *id == "a"));
    assert!(matches!(&events.events[1], GraphEvent::FrameAdded(id) if *id == "b"));
}

#[test]
fn replay_suppresses_reverse_edges() {
    let mut graph = EnvironmentGraph::new();
    graph
        .add_transform("a", "b", Transform::translation(1.0, 0.0, 0.0))
        .unwrap();
    graph
        .add_transform("b", "c", Transform::translation(1.0, 0.0, 0.0))
        .unwrap();

    let (late, late_ref) = recorder();
    graph.publish_current_state(&late_ref);

    let edge_events = late
        .borrow()
        .events
        .iter()
        .filter(|event| event.kind() == GraphEventKind::EdgeAdded)
        .count();
    assert_eq!(edge_events, 2, "two pairs, one event each");
}

#[test]
fn frame_added_then_removed_merges_away_in_a_queue() {
    let mut graph = EnvironmentGraph::new();
    let queue = Rc::new(RefCell::new(GraphEventQueue::new()));
    let subscriber: SubscriberRef = queue.clone();
    graph.subscribe(&subscriber);

    graph.add_frame("keep").unwrap();
    graph.add_frame("transient").unwrap();
    graph.remove_frame("transient").unwrap();

    let mut sink = crate::common::Recorder::default();
    queue.borrow_mut().flush(&mut sink);

    assert_eq!(kinds(&sink.events), vec![GraphEventKind::FrameAdded]);
    assert!(matches!(&sink.events[0], GraphEvent::FrameAdded(id) if *id == "keep"));
    assert!(queue.borrow().is_empty());
}

#[test]
fn mergeable_is_limited_to_matching_frame_pairs() {
    let added = GraphEvent::FrameAdded("x".into());
    let removed_same = GraphEvent::FrameRemoved("x".into());
    let removed_other = GraphEvent::FrameRemoved("y".into());
    assert!(added.mergeable(&removed_same));
    assert!(!added.mergeable(&removed_other));
    assert!(!removed_same.mergeable(&added));
}
