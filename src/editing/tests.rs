use super::*;
use crate::error::TransportError;
use crate::render::{ConnectPreview, RenderOptions};
use crate::testing::{connection, node, Harness, RenderEvent};
use crate::types::{EntityKind, Permissions};
use egui::{Pos2, Rect};
use serde_json::json;

const EPSILON: f32 = 1e-3;

fn close(a: Pos2, b: Pos2) -> bool {
    a.distance(b) < EPSILON
}

fn square(id: &str, kind: EntityKind, x: f32, y: f32) -> crate::types::NodeEntity {
    node(id, kind, Rect::from_min_size(egui::pos2(x, y), egui::vec2(100.0, 100.0)))
}

/// A and B side by side with nothing between them.
fn pair() -> Harness {
    let (a, b) = Harness::pair();
    Harness::new(vec![a, b], Vec::new())
}

/// A, B and C with connection `ab`, optionally bent.
fn connected(bends: Vec<Pos2>, label_index: usize) -> Harness {
    let (a, b) = Harness::pair();
    let mut ab = connection("ab", "A", "B");
    ab.bends = bends;
    ab.label_index = label_index;
    Harness::new(vec![a, b, square("C", EntityKind::Processor, 300.0, 300.0)], vec![ab])
}

// ----------------------------------------------------------------------
// Connecting
// ----------------------------------------------------------------------

#[tokio::test]
async fn test_connect_side_by_side_nodes() {
    let h = pair();
    h.configurator.will_create(Ok(connection("c", "A", "B")));

    h.canvas.begin_connect("A", egui::pos2(50.0, 50.0)).unwrap();
    assert_eq!(h.canvas.active_gesture(), GestureKind::Connecting);

    let preview = h.canvas.connect_drag(egui::pos2(350.0, 50.0)).unwrap();
    match preview {
        ConnectPreview::Snapped { from, to, destination_id } => {
            assert!(close(from, egui::pos2(50.0, 50.0)));
            assert!(close(to, egui::pos2(300.0, 50.0)));
            assert_eq!(destination_id, "B");
        }
        other => panic!("expected a snapped preview, got {other:?}"),
    }

    let outcome = h.canvas.end_connect(egui::pos2(350.0, 50.0)).await.unwrap();
    assert_eq!(outcome, ConnectOutcome::Created("c".into()));
    assert_eq!(h.configurator.create_calls(), vec![("A".to_string(), "B".to_string())]);
    assert_eq!(h.canvas.active_gesture(), GestureKind::Idle);
    assert_eq!(h.renderer.last_preview(), Some(None));

    let path = h.renderer.last_path("c").unwrap();
    assert!(close(path.start, egui::pos2(100.0, 50.0)));
    assert!(close(path.end, egui::pos2(300.0, 50.0)));
    assert_eq!(h.canvas.selected_ids(), vec!["c"]);
    assert_eq!(h.transport.gets(), vec!["/nodes/A", "/nodes/B"]);
}

#[test]
fn test_connect_ignores_targets_inside_dead_zone() {
    let h = pair();
    h.canvas.begin_connect("A", egui::pos2(50.0, 50.0)).unwrap();

    let preview = h.canvas.connect_drag(egui::pos2(60.0, 45.0)).unwrap();
    assert_eq!(
        preview,
        ConnectPreview::Line {
            from: egui::pos2(50.0, 50.0),
            to: egui::pos2(60.0, 45.0),
        }
    );
}

#[test]
fn test_connect_back_onto_source_previews_self_loop() {
    let h = pair();
    h.canvas.begin_connect("A", egui::pos2(50.0, 50.0)).unwrap();

    let preview = h.canvas.connect_drag(egui::pos2(70.0, 50.0)).unwrap();
    assert_eq!(
        preview,
        ConnectPreview::SelfLoop {
            points: [
                egui::pos2(50.0, 50.0),
                egui::pos2(217.0, 25.0),
                egui::pos2(217.0, 75.0),
            ],
        }
    );
    assert_eq!(h.renderer.last_preview(), Some(Some(preview)));
}

#[tokio::test]
async fn test_release_over_source_resets() {
    let h = pair();
    h.canvas.begin_connect("A", egui::pos2(50.0, 50.0)).unwrap();
    h.canvas.connect_drag(egui::pos2(55.0, 55.0)).unwrap();

    let outcome = h.canvas.end_connect(egui::pos2(55.0, 55.0)).await.unwrap();
    assert_eq!(outcome, ConnectOutcome::Reset);
    assert!(h.configurator.create_calls().is_empty());
    assert!(h.transport.requests().is_empty());
}

#[tokio::test]
async fn test_release_over_empty_space_discards() {
    let h = pair();
    h.canvas.begin_connect("A", egui::pos2(50.0, 50.0)).unwrap();
    h.canvas.connect_drag(egui::pos2(200.0, 50.0)).unwrap();

    let outcome = h.canvas.end_connect(egui::pos2(200.0, 50.0)).await.unwrap();
    assert_eq!(outcome, ConnectOutcome::Discarded);
    assert!(h.configurator.create_calls().is_empty());
    assert_eq!(h.renderer.last_preview(), Some(None));
}

#[tokio::test]
async fn test_dismissed_configuration_creates_nothing() {
    let h = pair();
    h.canvas.begin_connect("A", egui::pos2(50.0, 50.0)).unwrap();
    h.canvas.connect_drag(egui::pos2(350.0, 50.0)).unwrap();

    let outcome = h.canvas.end_connect(egui::pos2(350.0, 50.0)).await.unwrap();
    assert_eq!(outcome, ConnectOutcome::Cancelled);
    assert!(h.canvas.graph().connections.is_empty());
    assert!(h.notifier.notices().is_empty());
}

#[test]
fn test_output_port_cannot_start_connection() {
    let h = Harness::new(vec![square("out", EntityKind::OutputPort, 0.0, 0.0)], Vec::new());
    let err = h.canvas.begin_connect("out", egui::pos2(10.0, 10.0)).unwrap_err();
    assert!(matches!(err, CanvasError::NotAuthorized { .. }));
    assert_eq!(h.canvas.active_gesture(), GestureKind::Idle);

    let err = h.canvas.begin_connect("ghost", egui::pos2(10.0, 10.0)).unwrap_err();
    assert!(matches!(err, CanvasError::UnknownComponent(_)));
}

#[tokio::test]
async fn test_ending_without_gesture_fails() {
    let h = pair();
    h.canvas.begin_connect("A", egui::pos2(50.0, 50.0)).unwrap();

    let err = h.canvas.end_bend_drag().await.unwrap_err();
    assert!(matches!(err, CanvasError::NoGesture("bend")));
    assert_eq!(h.canvas.active_gesture(), GestureKind::Connecting);
}

// ----------------------------------------------------------------------
// Bends
// ----------------------------------------------------------------------

#[tokio::test]
async fn test_self_loop_keeps_two_bends() {
    let (a, _) = Harness::pair();
    let mut aa = connection("aa", "A", "A");
    aa.bends = vec![egui::pos2(217.0, 25.0), egui::pos2(217.0, 75.0)];
    let h = Harness::new(vec![a], vec![aa]);

    let err = h.canvas.remove_bend("aa", 0).await.unwrap_err();
    assert!(matches!(err, CanvasError::SelfLoopBendMinimum));
    assert!(h.transport.requests().is_empty());
    assert_eq!(
        h.notifier.notices(),
        vec![(
            "Connection".to_string(),
            "Looping connections must have at least two bend points.".to_string()
        )]
    );
    assert_eq!(h.canvas.graph().connections.get("aa").unwrap().bends.len(), 2);
}

#[tokio::test]
async fn test_add_first_bend() {
    let h = connected(Vec::new(), 0);
    let updated = h.canvas.add_bend("ab", egui::pos2(200.0, 80.0)).await.unwrap();

    assert_eq!(updated.bends, vec![egui::pos2(200.0, 80.0)]);
    let put = &h.transport.puts()[0];
    assert_eq!(put.url, "/connections/ab");
    assert_eq!(
        put.body.as_ref().unwrap()["component"],
        json!({"id": "ab", "bends": [{"x": 200.0, "y": 80.0}], "labelIndex": 0})
    );
    assert_eq!(h.canvas.graph().connections.get("ab").unwrap().bends.len(), 1);
}

#[tokio::test]
async fn test_add_bend_before_label_shifts_label() {
    let h = connected(vec![egui::pos2(200.0, 200.0), egui::pos2(250.0, 200.0)], 1);
    h.canvas.add_bend("ab", egui::pos2(100.0, 150.0)).await.unwrap();

    let graph = h.canvas.graph();
    let ab = graph.connections.get("ab").unwrap();
    assert_eq!(ab.bends[0], egui::pos2(100.0, 150.0));
    assert_eq!(ab.bends.len(), 3);
    assert_eq!(ab.label_index, 2);
}

#[tokio::test]
async fn test_remove_bend_updates_label() {
    let h = connected(
        vec![egui::pos2(150.0, 200.0), egui::pos2(200.0, 200.0), egui::pos2(250.0, 200.0)],
        2,
    );
    let updated = h.canvas.remove_bend("ab", 0).await.unwrap();
    assert_eq!(updated.bends, vec![egui::pos2(200.0, 200.0), egui::pos2(250.0, 200.0)]);
    assert_eq!(updated.label_index, 1);

    let err = h.canvas.remove_bend("ab", 5).await.unwrap_err();
    assert!(matches!(err, CanvasError::NoSuchBend { index: 5, .. }));
}

#[tokio::test]
async fn test_bend_drag_snaps_and_saves() {
    let h = connected(vec![egui::pos2(200.0, 96.0)], 0);
    h.canvas.begin_bend_drag("ab", 0).unwrap();

    let placed = h.canvas.bend_drag(egui::pos2(203.0, 205.0), false).unwrap();
    assert_eq!(placed, egui::pos2(200.0, 208.0));
    let (path, options) = h.renderer.paths("ab").pop().unwrap();
    assert_eq!(path.bends, vec![egui::pos2(200.0, 208.0)]);
    assert_eq!(options, RenderOptions::PATH_ONLY);
    assert!(h.transport.requests().is_empty());

    assert!(h.canvas.end_bend_drag().await.unwrap());
    assert_eq!(h.transport.puts().len(), 1);
    assert_eq!(
        h.canvas.graph().connections.get("ab").unwrap().bends,
        vec![egui::pos2(200.0, 208.0)]
    );
}

#[tokio::test]
async fn test_free_bend_drag_skips_snapping() {
    let h = connected(vec![egui::pos2(200.0, 96.0)], 0);
    h.canvas.begin_bend_drag("ab", 0).unwrap();
    let placed = h.canvas.bend_drag(egui::pos2(203.5, 205.5), true).unwrap();
    assert_eq!(placed, egui::pos2(203.5, 205.5));
}

#[tokio::test]
async fn test_unchanged_bend_drag_sends_nothing() {
    let h = connected(vec![egui::pos2(200.0, 96.0)], 0);
    h.canvas.begin_bend_drag("ab", 0).unwrap();
    h.canvas.bend_drag(egui::pos2(201.0, 97.0), false).unwrap();

    assert!(!h.canvas.end_bend_drag().await.unwrap());
    assert!(h.transport.requests().is_empty());
    let (_, options) = h.renderer.paths("ab").pop().unwrap();
    assert_eq!(options, RenderOptions::FULL);
}

#[tokio::test]
async fn test_failed_bend_drag_restores_saved_bends() {
    let h = connected(vec![egui::pos2(200.0, 96.0)], 0);
    h.transport.fail("/connections/ab", TransportError::new(409, "revision <3> is stale"));
    h.canvas.begin_bend_drag("ab", 0).unwrap();
    h.canvas.bend_drag(egui::pos2(400.0, 400.0), false).unwrap();

    let err = h.canvas.end_bend_drag().await.unwrap_err();
    assert_eq!(err.transport().map(|t| t.status), Some(409));
    assert_eq!(
        h.notifier.notices(),
        vec![(
            "Configuration Error".to_string(),
            "revision &lt;3&gt; is stale".to_string()
        )]
    );
    let path = h.renderer.last_path("ab").unwrap();
    assert_eq!(path.bends, vec![egui::pos2(200.0, 96.0)]);
    assert_eq!(
        h.canvas.graph().connections.get("ab").unwrap().bends,
        vec![egui::pos2(200.0, 96.0)]
    );
}

#[test]
fn test_read_only_connection_cannot_be_edited() {
    let (a, b) = Harness::pair();
    let mut ab = connection("ab", "A", "B");
    ab.bends = vec![egui::pos2(200.0, 96.0)];
    ab.permissions = Permissions::READ_ONLY;
    let h = Harness::new(vec![a, b], vec![ab]);

    let err = h.canvas.begin_bend_drag("ab", 0).unwrap_err();
    assert!(matches!(err, CanvasError::NotAuthorized { .. }));
    assert_eq!(h.canvas.active_gesture(), GestureKind::Idle);
}

// ----------------------------------------------------------------------
// Endpoints
// ----------------------------------------------------------------------

#[tokio::test]
async fn test_reattach_to_another_processor() {
    let h = connected(Vec::new(), 0);
    h.canvas.begin_endpoint_drag("ab").unwrap();

    let hovered = h.canvas.endpoint_drag(egui::pos2(350.0, 350.0)).unwrap();
    assert_eq!(hovered.as_deref(), Some("C"));
    let (path, options) = h.renderer.paths("ab").pop().unwrap();
    assert_eq!(options, RenderOptions::PATH_ONLY);
    assert!(h.canvas.graph().node_bounds("C").unwrap().expand(EPSILON).contains(path.end));

    let outcome = h.canvas.end_endpoint_drag().await.unwrap();
    assert_eq!(outcome, ReattachOutcome::Reattached);
    let put = &h.transport.puts()[0];
    assert_eq!(
        put.body.as_ref().unwrap()["component"]["destination"],
        json!({"id": "C", "groupId": "pg", "type": "PROCESSOR"})
    );
    assert_eq!(h.canvas.graph().connections.get("ab").unwrap().destination_id, "C");
    assert_eq!(h.transport.gets(), vec!["/nodes/B", "/nodes/A", "/nodes/C"]);
}

#[tokio::test]
async fn test_reattach_to_source_seeds_loop_bends() {
    let h = connected(Vec::new(), 0);
    h.canvas.begin_endpoint_drag("ab").unwrap();
    h.canvas.endpoint_drag(egui::pos2(50.0, 50.0)).unwrap();

    assert_eq!(h.canvas.end_endpoint_drag().await.unwrap(), ReattachOutcome::Reattached);
    let put = &h.transport.puts()[0];
    assert_eq!(
        put.body.as_ref().unwrap()["component"]["bends"],
        json!([{"x": 217.0, "y": 25.0}, {"x": 217.0, "y": 75.0}])
    );
    let graph = h.canvas.graph();
    let ab = graph.connections.get("ab").unwrap();
    assert!(ab.is_self_loop("pg"));
    assert_eq!(ab.bends.len(), 2);
}

#[tokio::test]
async fn test_release_over_nothing_reverts() {
    let h = connected(Vec::new(), 0);
    h.canvas.begin_endpoint_drag("ab").unwrap();
    assert_eq!(h.canvas.endpoint_drag(egui::pos2(200.0, 250.0)).unwrap(), None);

    assert_eq!(h.canvas.end_endpoint_drag().await.unwrap(), ReattachOutcome::Reverted);
    assert!(h.transport.requests().is_empty());
    let path = h.renderer.last_path("ab").unwrap();
    assert!(close(path.end, egui::pos2(300.0, 50.0)));
}

#[tokio::test]
async fn test_reattach_to_group_chooses_port() {
    let (a, b) = Harness::pair();
    let h = Harness::new(
        vec![a, b, square("G", EntityKind::ProcessGroup, 300.0, 300.0)],
        vec![connection("ab", "A", "B")],
    );
    let mut chosen = connection("ab", "A", "input");
    chosen.destination_group_id = "G".into();
    chosen.revision = crate::types::Revision::at(2);
    h.configurator.will_choose(Ok(chosen));

    h.canvas.begin_endpoint_drag("ab").unwrap();
    h.canvas.endpoint_drag(egui::pos2(350.0, 350.0)).unwrap();
    assert_eq!(h.canvas.end_endpoint_drag().await.unwrap(), ReattachOutcome::Reattached);

    assert_eq!(h.configurator.port_calls(), vec![("ab".to_string(), "G".to_string())]);
    assert!(h.transport.puts().is_empty());
    assert_eq!(
        h.canvas.graph().connections.get("ab").unwrap().effective_destination_id("pg"),
        "G"
    );
    assert_eq!(h.transport.gets(), vec!["/nodes/B"]);
}

#[tokio::test]
async fn test_dismissed_port_choice_reverts() {
    let (a, b) = Harness::pair();
    let h = Harness::new(
        vec![a, b, square("G", EntityKind::ProcessGroup, 300.0, 300.0)],
        vec![connection("ab", "A", "B")],
    );

    h.canvas.begin_endpoint_drag("ab").unwrap();
    h.canvas.endpoint_drag(egui::pos2(350.0, 350.0)).unwrap();
    assert_eq!(h.canvas.end_endpoint_drag().await.unwrap(), ReattachOutcome::Reverted);

    let (path, options) = h.renderer.paths("ab").pop().unwrap();
    assert_eq!(options, RenderOptions::PATH_ONLY);
    assert!(close(path.end, egui::pos2(300.0, 50.0)));
    assert!(h.notifier.notices().is_empty());
}

#[tokio::test]
async fn test_rejected_reattach_shows_server_text() {
    let h = connected(Vec::new(), 0);
    h.transport.fail("/connections/ab", TransportError::new(409, "Destination is busy"));
    h.canvas.begin_endpoint_drag("ab").unwrap();
    h.canvas.endpoint_drag(egui::pos2(350.0, 350.0)).unwrap();

    assert!(h.canvas.end_endpoint_drag().await.is_err());
    assert_eq!(
        h.notifier.notices(),
        vec![("Connection".to_string(), "Destination is busy".to_string())]
    );
    assert_eq!(h.canvas.graph().connections.get("ab").unwrap().destination_id, "B");
    let path = h.renderer.last_path("ab").unwrap();
    assert!(close(path.end, egui::pos2(300.0, 50.0)));
}

#[tokio::test]
async fn test_failed_reattach_uses_generic_handler() {
    let h = connected(Vec::new(), 0);
    h.transport.fail("/connections/ab", TransportError::new(500, "boom"));
    h.canvas.begin_endpoint_drag("ab").unwrap();
    h.canvas.endpoint_drag(egui::pos2(350.0, 350.0)).unwrap();

    assert!(h.canvas.end_endpoint_drag().await.is_err());
    assert!(h.notifier.notices().is_empty());
    assert_eq!(h.notifier.transport_errors(), vec![TransportError::new(500, "boom")]);
    assert_eq!(h.canvas.graph().connections.get("ab").unwrap().destination_id, "B");
}

// ----------------------------------------------------------------------
// Labels
// ----------------------------------------------------------------------

#[tokio::test]
async fn test_label_moves_to_nearest_bend() {
    let h = connected(vec![egui::pos2(150.0, 200.0), egui::pos2(250.0, 200.0)], 0);
    assert!(h.canvas.begin_label_drag("ab", 20.0).unwrap());
    assert_eq!(h.canvas.active_gesture(), GestureKind::LabelDragging);

    assert_eq!(h.canvas.label_drag(egui::vec2(100.0, 0.0)).unwrap(), 1);
    let path = h.renderer.last_path("ab").unwrap();
    assert_eq!(path.label_anchor, egui::pos2(250.0, 200.0));
    assert!(h.transport.requests().is_empty());

    assert!(h.canvas.end_label_drag().await.unwrap());
    assert_eq!(
        h.transport.puts()[0].body.as_ref().unwrap()["component"],
        json!({"id": "ab", "labelIndex": 1})
    );
    assert_eq!(h.canvas.graph().connections.get("ab").unwrap().label_index, 1);
    assert_eq!(
        h.renderer.events().iter().filter(|e| **e == RenderEvent::LabelOutline(None)).count(),
        1
    );
}

#[tokio::test]
async fn test_label_left_in_place_sends_nothing() {
    let h = connected(vec![egui::pos2(150.0, 200.0), egui::pos2(250.0, 200.0)], 0);
    h.canvas.begin_label_drag("ab", 20.0).unwrap();
    assert_eq!(h.canvas.label_drag(egui::vec2(20.0, 5.0)).unwrap(), 0);

    assert!(!h.canvas.end_label_drag().await.unwrap());
    assert!(h.transport.requests().is_empty());
}

#[test]
fn test_label_needs_two_bends() {
    let h = connected(vec![egui::pos2(200.0, 200.0)], 0);
    assert!(!h.canvas.begin_label_drag("ab", 20.0).unwrap());
    assert_eq!(h.canvas.active_gesture(), GestureKind::Idle);
}

#[tokio::test]
async fn test_failed_label_save_reverts_index() {
    let h = connected(vec![egui::pos2(150.0, 200.0), egui::pos2(250.0, 200.0)], 0);
    h.transport.fail("/connections/ab", TransportError::new(400, "bad label"));
    h.canvas.begin_label_drag("ab", 20.0).unwrap();
    h.canvas.label_drag(egui::vec2(100.0, 0.0)).unwrap();

    assert!(h.canvas.end_label_drag().await.is_err());
    assert_eq!(
        h.notifier.notices(),
        vec![("Configuration Error".to_string(), "bad label".to_string())]
    );
    let path = h.renderer.last_path("ab").unwrap();
    assert_eq!(path.label_anchor, egui::pos2(150.0, 200.0));
    assert_eq!(h.canvas.graph().connections.get("ab").unwrap().label_index, 0);
}

// ----------------------------------------------------------------------
// Gesture lifecycle
// ----------------------------------------------------------------------

#[test]
fn test_new_gesture_supersedes_active_one() {
    let h = connected(vec![egui::pos2(200.0, 96.0)], 0);
    h.canvas.begin_bend_drag("ab", 0).unwrap();
    h.canvas.bend_drag(egui::pos2(400.0, 400.0), false).unwrap();

    h.canvas.begin_connect("A", egui::pos2(50.0, 50.0)).unwrap();
    assert_eq!(h.canvas.active_gesture(), GestureKind::Connecting);
    assert_eq!(h.renderer.last_path("ab").unwrap().bends, vec![egui::pos2(200.0, 96.0)]);
}

#[test]
fn test_cancel_clears_preview() {
    let h = pair();
    h.canvas.begin_connect("A", egui::pos2(50.0, 50.0)).unwrap();
    h.canvas.connect_drag(egui::pos2(350.0, 50.0)).unwrap();

    h.canvas.cancel_gesture();
    assert_eq!(h.canvas.active_gesture(), GestureKind::Idle);
    assert_eq!(h.renderer.last_preview(), Some(None));
}
