use pretty_assertions::assert_eq;

use crate::common::{kinds, recorder};
use transform_graph::{EnvironmentGraph, GraphError, GraphEvent, GraphEventKind, Transform};

#[test]
fn add_frame_creates_an_isolated_vertex() {
    let mut graph = EnvironmentGraph::new();
    let vertex = graph.add_frame("a").unwrap();
    assert_eq!(graph.num_vertices(), 1);
    assert_eq!(graph.num_edges(), 0);
    assert!(graph.contains_frame("a"));
    assert_eq!(graph.frame_id(vertex).unwrap().as_str(), "a");
}

#[test]
fn adding_a_known_frame_fails() {
    let mut graph = EnvironmentGraph::new();
    graph.add_frame("a").unwrap();
    assert!(matches!(
        graph.add_frame("a"),
        Err(GraphError::FrameAlreadyExists(id)) if id == "a"
    ));
    assert_eq!(graph.num_vertices(), 1);
}

#[test]
fn add_then_remove_frame_returns_to_the_initial_state() {
    let mut graph = EnvironmentGraph::new();
    let (recorder, subscriber) = recorder();
    graph.subscribe(&subscriber);

    graph.add_frame("x").unwrap();
    graph.remove_frame("x").unwrap();

    assert_eq!(graph.num_vertices(), 0);
    assert!(!graph.contains_frame("x"));
    assert_eq!(
        kinds(&recorder.borrow().events),
        vec![GraphEventKind::FrameAdded, GraphEventKind::FrameRemoved]
    );
}

#[test]
fn remove_frame_requires_an_isolated_frame() {
    let mut graph = EnvironmentGraph::new();
    graph
        .add_transform("a", "b", Transform::translation(1.0, 0.0, 0.0))
        .unwrap();
    assert!(matches!(
        graph.remove_frame("a"),
        Err(GraphError::FrameStillConnected(id)) if id == "a"
    ));
    assert!(graph.contains_frame("a"));
}

#[test]
fn add_edge_creates_unknown_endpoints_first() {
    let mut graph = EnvironmentGraph::new();
    let (recorder, subscriber) = recorder();
    graph.subscribe(&subscriber);

    graph
        .add_transform("a", "b", Transform::translation(1.0, 0.0, 0.0))
        .unwrap();

    assert_eq!(graph.num_vertices(), 2);
    assert_eq!(
        kinds(&recorder.borrow().events),
        vec![
            GraphEventKind::FrameAdded,
            GraphEventKind::FrameAdded,
            GraphEventKind::EdgeAdded,
        ]
    );
}

#[test]
fn edges_are_created_in_pairs() {
    let mut graph = EnvironmentGraph::new();
    graph
        .add_transform("a", "b", Transform::translation(1.0, 2.0, 3.0))
        .unwrap();
    assert_eq!(graph.num_edges(), 2);
    assert!(graph.contains_edge("a", "b").unwrap());
    assert!(graph.contains_edge("b", "a").unwrap());

    let forward = graph.get_transform("a", "b").unwrap();
    let backward = graph.get_transform("b", "a").unwrap();
    let round = forward.compose(&backward);
    assert!(round.transform.translation().norm() < 1e-9);
    assert!(round.transform.orientation().angle() < 1e-9);
}

#[test]
fn duplicate_edge_is_rejected_and_leaves_one_pair() {
    let mut graph = EnvironmentGraph::new();
    let tf = Transform::translation(1.0, 0.0, 0.0);
    graph.add_transform("a", "b", tf.clone()).unwrap();
    assert!(matches!(
        graph.add_transform("a", "b", tf),
        Err(GraphError::EdgeAlreadyExists { origin, target })
            if origin == "a" && target == "b"
    ));
    assert_eq!(graph.num_edges(), 2);
}

#[test]
fn remove_edge_removes_both_directions_and_publishes_once() {
    let mut graph = EnvironmentGraph::new();
    graph
        .add_transform("a", "b", Transform::translation(1.0, 0.0, 0.0))
        .unwrap();
    let (recorder, subscriber) = recorder();
    graph.subscribe(&subscriber);

    graph.remove_edge("a", "b").unwrap();

    assert_eq!(graph.num_edges(), 0);
    let events = &recorder.borrow().events;
    assert_eq!(events.len(), 1);
    assert!(matches!(
        &events[0],
        GraphEvent::EdgeRemoved { origin, target } if *origin == "a" && *target == "b"
    ));
}

#[test]
fn remove_missing_edge_fails() {
    let mut graph = EnvironmentGraph::new();
    graph.add_frame("a").unwrap();
    graph.add_frame("b").unwrap();
    assert!(matches!(
        graph.remove_edge("a", "b"),
        Err(GraphError::UnknownEdge { .. })
    ));
}

#[test]
fn disconnect_frame_removes_every_touching_edge() {
    let mut graph = EnvironmentGraph::new();
    graph
        .add_transform("hub", "b", Transform::translation(1.0, 0.0, 0.0))
        .unwrap();
    graph
        .add_transform("hub", "c", Transform::translation(0.0, 1.0, 0.0))
        .unwrap();
    graph
        .add_transform("d", "hub", Transform::translation(0.0, 0.0, 1.0))
        .unwrap();
    let (recorder, subscriber) = recorder();
    graph.subscribe(&subscriber);

    graph.disconnect_frame("hub").unwrap();

    assert_eq!(graph.num_edges(), 0);
    assert_eq!(graph.num_vertices(), 4);
    assert!(graph.contains_frame("hub"));
    let events = &recorder.borrow().events;
    assert_eq!(
        kinds(events),
        vec![GraphEventKind::EdgeRemoved; 3],
        "one EdgeRemoved per removed pair"
    );
    for event in events {
        let GraphEvent::EdgeRemoved { origin, .. } = event else {
            panic!("expected EdgeRemoved");
        };
        assert_eq!(origin.as_str(), "hub");
    }
}

#[test]
fn set_edge_property_updates_both_directions_atomically() {
    let mut graph = EnvironmentGraph::new();
    graph
        .add_transform("a", "b", Transform::translation(1.0, 0.0, 0.0))
        .unwrap();
    let (recorder, subscriber) = recorder();
    graph.subscribe(&subscriber);

    graph
        .update_transform("a", "b", Transform::translation(0.0, 5.0, 0.0))
        .unwrap();

    let forward = graph.get_transform("a", "b").unwrap();
    let backward = graph.get_transform("b", "a").unwrap();
    assert_eq!(forward.transform.translation().y, 5.0);
    assert_eq!(backward.transform.translation().y, -5.0);

    let events = &recorder.borrow().events;
    assert_eq!(events.len(), 1);
    assert!(matches!(
        &events[0],
        GraphEvent::EdgeModified { edge, inverse_edge, .. } if edge != inverse_edge
    ));
}

#[test]
fn label_index_matches_stored_frame_ids() {
    let mut graph = EnvironmentGraph::new();
    for id in ["a", "b", "c"] {
        graph.add_frame(id).unwrap();
    }
    graph.remove_frame("b").unwrap();

    assert_eq!(graph.num_vertices(), 2);
    assert_eq!(graph.frame_ids().count(), 2);
    for id in ["a", "c"] {
        let vertex = graph.vertex(id).expect("frame is indexed");
        assert_eq!(graph.frame_id(vertex).unwrap().as_str(), id);
        assert_eq!(graph.frame_property(id).unwrap().id().as_str(), id);
    }
}

#[test]
fn vertex_handles_stay_valid_across_removals() {
    let mut graph = EnvironmentGraph::new();
    let a = graph.add_frame("a").unwrap();
    graph.add_frame("b").unwrap();
    let c = graph.add_frame("c").unwrap();
    graph.remove_frame("b").unwrap();

    assert_eq!(graph.frame_id(a).unwrap().as_str(), "a");
    assert_eq!(graph.frame_id(c).unwrap().as_str(), "c");
}

#[test]
fn contains_edge_requires_known_frames() {
    let graph = EnvironmentGraph::new();
    assert!(matches!(
        graph.contains_edge("a", "b"),
        Err(GraphError::UnknownFrame(id)) if id == "a"
    ));
}

#[test]
fn frame_count_tracks_add_and_remove_events() {
    let mut graph = EnvironmentGraph::new();
    let (recorder, subscriber) = recorder();
    graph.subscribe(&subscriber);

    graph.add_frame("a").unwrap();
    graph
        .add_transform("b", "c", Transform::translation(1.0, 0.0, 0.0))
        .unwrap();
    graph.remove_frame("a").unwrap();

    let events = recorder.borrow();
    let added = kinds(&events.events)
        .iter()
        .filter(|kind| **kind == GraphEventKind::FrameAdded)
        .count();
    let removed = kinds(&events.events)
        .iter()
        .filter(|kind| **kind == GraphEventKind::FrameRemoved)
        .count();
    assert_eq!(graph.num_vertices(), added - removed);
}

#[test]
fn clone_copies_data_but_not_subscribers() {
    let mut graph = EnvironmentGraph::new();
    graph
        .add_transform("a", "b", Transform::translation(1.0, 0.0, 0.0))
        .unwrap();
    let (recorder, subscriber) = recorder();
    graph.subscribe(&subscriber);

    let mut copy = graph.clone();
    copy.add_frame("c").unwrap();

    assert_eq!(copy.num_vertices(), 3);
    assert_eq!(graph.num_vertices(), 2);
    assert!(
        recorder.borrow().events.is_empty(),
        "mutating the copy must not notify the original's subscribers"
    );
}

#[test]
fn structural_copy_excludes_items() {
    crate::common::register_test_items();
    let mut graph = EnvironmentGraph::new();
    graph
        .add_transform("a", "b", Transform::translation(1.0, 0.0, 0.0))
        .unwrap();
    let item: transform_graph::ItemRef =
        std::rc::Rc::new(transform_graph::Item::new(String::from("payload")));
    graph.add_item_to_frame("a", item).unwrap();

    let copy = graph.structural_copy();

    assert_eq!(copy.num_vertices(), 2);
    assert_eq!(copy.num_edges(), 2);
    assert_eq!(copy.total_item_count("a").unwrap(), 0);
}

#[test]
fn dot_output_lists_frames_and_transforms() {
    let mut graph = EnvironmentGraph::new();
    graph
        .add_transform("base", "arm", Transform::translation(1.0, 0.0, 0.0))
        .unwrap();
    let dot = graph.to_dot();
    assert!(dot.starts_with("digraph"));
    assert!(dot.contains("base | 0"));
    assert!(dot.contains("arm | 0"));
    assert!(dot.contains("t: (1.00 0.00 0.00)"));
}

#[test]
fn emplace_frame_stores_the_given_property() {
    let mut graph = EnvironmentGraph::new();
    graph
        .emplace_frame("lidar", transform_graph::Frame::new("ignored".into()))
        .unwrap();
    assert_eq!(graph.frame_property("lidar").unwrap().id().as_str(), "lidar");
}
