//! Integration tests for holograms
//!
//! These tests drive holograms against real sessions and check:
//! - Line and entity bookkeeping staying in step
//! - Per-viewer visibility overrides and the default
//! - The exact packets each viewer receives

mod common;

use pretty_assertions::assert_eq;

use common::{custom_name, destroyed_ids, entity_id, kinds, Harness};
use phantom_server::error::{GameError, PhantomError};
use phantom_server::game::hologram::Hologram;
use phantom_server::game::transform::Position;
use phantom_server::protocol::{PacketKind, ProtocolVersion};

fn anchor() -> Position {
    Position::new(0.0, 10.0, 0.0)
}

/// Test that lines, entities and ids stay the same length through every edit
#[test]
fn test_lines_and_entities_stay_aligned() {
    let harness = Harness::new(ProtocolVersion::V1_16_5);
    let _viewer = harness.connect();
    let hologram = harness.hologram(anchor());

    hologram.add_lines(["a", "b", "c"]).unwrap();
    assert_eq!(hologram.size(), 3);
    assert_eq!(hologram.entity_ids().len(), 3);

    hologram.set_lines(["x"]).unwrap();
    assert_eq!(hologram.lines(), vec!["x".to_string()]);
    assert_eq!(hologram.entity_ids().len(), 1);

    hologram.set_lines(["x", "y", "z", "w"]).unwrap();
    assert_eq!(hologram.size(), 4);
    assert_eq!(hologram.entity_ids().len(), 4);

    let removed = hologram.remove_line(1).unwrap();
    assert_eq!(removed, "y");
    assert_eq!(
        hologram.lines(),
        vec!["x".to_string(), "z".to_string(), "w".to_string()]
    );
    assert_eq!(hologram.entity_ids().len(), 3);

    hologram.destroy();
    assert_eq!(hologram.size(), 0);
    assert!(hologram.entity_ids().is_empty());
}

/// Labels a newly joined viewer sees, paired with the entity carrying each
fn rendered_labels(harness: &Harness, hologram: &Hologram) -> Vec<(i32, Option<String>)> {
    let mut fresh = harness.connect();
    hologram.on_viewer_join(fresh.id);
    fresh
        .drain()
        .iter()
        .filter(|p| p.kind == PacketKind::Metadata)
        .map(|p| (entity_id(p), custom_name(p)))
        .collect()
}

fn expected_labels(hologram: &Hologram) -> Vec<(i32, Option<String>)> {
    hologram
        .entity_ids()
        .into_iter()
        .zip(hologram.lines().into_iter().map(Some))
        .collect()
}

/// Test that entity i always renders line i through grow, shrink and removal
#[test]
fn test_each_entity_renders_its_line() {
    let harness = Harness::new(ProtocolVersion::V1_16_5);
    let hologram = harness.hologram(anchor());

    hologram.add_lines(["a", "b", "c"]).unwrap();
    assert_eq!(rendered_labels(&harness, &hologram), expected_labels(&hologram));

    hologram.set_lines(["x", "b"]).unwrap();
    assert_eq!(rendered_labels(&harness, &hologram), expected_labels(&hologram));

    hologram.set_lines(["x", "y", "z", "w"]).unwrap();
    assert_eq!(rendered_labels(&harness, &hologram), expected_labels(&hologram));

    hologram.remove_line(1).unwrap();
    let labels = rendered_labels(&harness, &hologram);
    assert_eq!(labels, expected_labels(&hologram));
    assert_eq!(
        labels.iter().map(|(_, l)| l.clone()).collect::<Vec<_>>(),
        vec![
            Some("x".to_string()),
            Some("z".to_string()),
            Some("w".to_string())
        ]
    );
}

/// Test that removing a line relabels the lines below it for existing viewers
#[test]
fn test_remove_line_relabels_in_place() {
    let harness = Harness::new(ProtocolVersion::V1_17_1);
    let mut viewer = harness.connect();
    let hologram = harness.hologram(anchor());
    hologram.add_lines(["a", "b", "c"]).unwrap();
    let ids = hologram.entity_ids();
    viewer.drain();

    hologram.remove_line(0).unwrap();

    let packets = viewer.drain();
    let relabels: Vec<(i32, Option<String>)> = packets
        .iter()
        .filter(|p| p.kind == PacketKind::Metadata)
        .map(|p| (entity_id(p), custom_name(p)))
        .collect();
    assert_eq!(
        relabels,
        vec![
            (ids[0], Some("b".to_string())),
            (ids[1], Some("c".to_string()))
        ]
    );
    let last = packets.last().unwrap();
    assert_eq!(destroyed_ids(last), vec![ids[2]]);
}

/// Test that a full queue does not leave a line the viewer can never lose
#[test]
fn test_full_queue_still_tears_down() {
    let harness = Harness::new(ProtocolVersion::V1_16_5);
    let mut viewer = harness.connect_with_capacity(2);
    let hologram = harness.hologram(anchor());

    hologram.add_lines(["A"]).unwrap();
    // Queue now holds the creation and metadata; this update is lost
    hologram.set_line(0, "A2").unwrap();
    assert!(hologram.is_spawned_for(viewer.id));
    assert_eq!(
        kinds(&viewer.drain()),
        vec![PacketKind::SpawnLiving, PacketKind::Metadata]
    );

    hologram.hide_to(viewer.id);

    let packets = viewer.drain();
    assert_eq!(kinds(&packets), vec![PacketKind::Destroy]);
    assert_eq!(destroyed_ids(&packets[0]), hologram.entity_ids());
}

/// Test that an override wins over the default and clearing it restores the default
#[test]
fn test_override_resolution() {
    let harness = Harness::new(ProtocolVersion::V1_12_2);
    let a = harness.connect();
    let b = harness.connect();
    let hologram = harness.hologram(anchor());

    assert!(hologram.is_visible_to(a.id));

    hologram.hide_to(a.id);
    assert!(!hologram.is_visible_to(a.id));
    assert!(hologram.is_visible_to(b.id));

    hologram.set_visible_by_default(false);
    assert!(!hologram.is_visible_to(b.id));

    hologram.show_to(a.id);
    assert!(hologram.is_visible_to(a.id));

    hologram.clear_override(a.id);
    assert!(!hologram.is_visible_to(a.id));
}

/// Test that a two-line hologram sends one spawn sequence per line, top line first
#[test]
fn test_two_lines_spawn_two_sequences() {
    let harness = Harness::new(ProtocolVersion::V1_16_5);
    let mut viewer = harness.connect();
    let hologram = harness.hologram(anchor());

    hologram.add_lines(["A", "B"]).unwrap();

    let packets = viewer.drain();
    assert_eq!(
        kinds(&packets),
        vec![
            PacketKind::SpawnLiving,
            PacketKind::Metadata,
            PacketKind::SpawnLiving,
            PacketKind::Metadata,
        ]
    );

    let ids = hologram.entity_ids();
    assert_eq!(entity_id(&packets[0]), ids[0]);
    assert_eq!(entity_id(&packets[2]), ids[1]);

    // Creation payload: id, uuid, type, then x/y/z as doubles
    let mut spawn = packets[2].reader();
    spawn.read_varint();
    spawn.read_uuid();
    spawn.read_varint();
    assert_eq!(spawn.read_double(), 0.0);
    assert_eq!(spawn.read_double(), 9.75);
    assert_eq!(spawn.read_double(), 0.0);

    assert!(hologram.is_spawned_for(viewer.id));
}

/// Test that changing one line sends a single metadata packet to each viewer
#[test]
fn test_set_line_sends_one_metadata_per_viewer() {
    let harness = Harness::new(ProtocolVersion::V1_16_5);
    let mut a = harness.connect();
    let mut b = harness.connect();
    let hologram = harness.hologram(anchor());
    hologram.add_lines(["A", "B"]).unwrap();
    a.drain();
    b.drain();

    hologram.set_line(1, "B2").unwrap();

    let line = hologram.entity_ids()[1];
    for viewer in [&mut a, &mut b] {
        let packets = viewer.drain();
        assert_eq!(kinds(&packets), vec![PacketKind::Metadata]);
        assert_eq!(entity_id(&packets[0]), line);
    }

    // Same text again sends nothing
    hologram.set_line(1, "B2").unwrap();
    assert!(a.drain().is_empty());
}

/// Test that set_line past the end is rejected without sending anything
#[test]
fn test_set_line_out_of_range() {
    let harness = Harness::new(ProtocolVersion::V1_8);
    let mut viewer = harness.connect();
    let hologram = harness.hologram(anchor());
    hologram.add_lines(["only"]).unwrap();
    viewer.drain();

    let result = hologram.set_line(3, "nope");

    assert!(matches!(
        result,
        Err(PhantomError::Game(GameError::LineOutOfRange { index: 3, size: 1 }))
    ));
    assert!(viewer.drain().is_empty());
}

/// Test that hiding a hologram tears lines down in order and creates nothing
#[test]
fn test_hide_to_tears_down_in_index_order() {
    let harness = Harness::new(ProtocolVersion::V1_17_1);
    let mut viewer = harness.connect();
    let hologram = harness.hologram(anchor());
    hologram.add_lines(["one", "two", "three"]).unwrap();
    viewer.drain();

    hologram.hide_to(viewer.id);

    let packets = viewer.drain();
    assert!(packets.iter().all(|p| p.kind == PacketKind::Destroy));
    let torn_down: Vec<i32> = packets.iter().flat_map(destroyed_ids).collect();
    assert_eq!(torn_down, hologram.entity_ids());
    assert!(!hologram.is_spawned_for(viewer.id));

    // Hiding again is a no-op
    hologram.hide_to(viewer.id);
    assert!(viewer.drain().is_empty());
}

/// Test that flipping the default off and back on restores every viewer
#[test]
fn test_toggling_default_restores_membership() {
    let harness = Harness::new(ProtocolVersion::V1_12_2);
    let mut a = harness.connect();
    let mut b = harness.connect();
    let hologram = harness.hologram(anchor());
    hologram.add_lines(["x", "y"]).unwrap();

    hologram.set_visible_by_default(false);
    assert!(!hologram.is_spawned_for(a.id));
    assert!(!hologram.is_spawned_for(b.id));

    hologram.set_visible_by_default(true);
    assert!(hologram.is_spawned_for(a.id));
    assert!(hologram.is_spawned_for(b.id));

    let spawns = a
        .drain()
        .into_iter()
        .filter(|p| p.kind == PacketKind::SpawnLiving)
        .count();
    assert_eq!(spawns, 4);
    b.drain();
}

/// Test that an override survives a default change
#[test]
fn test_override_ignores_default_change() {
    let harness = Harness::new(ProtocolVersion::V1_16_5);
    let mut shown = harness.connect();
    let hologram = harness.hologram(anchor());
    hologram.add_lines(["pinned"]).unwrap();
    hologram.show_to(shown.id);
    shown.drain();

    hologram.set_visible_by_default(false);

    assert!(hologram.is_spawned_for(shown.id));
    assert!(shown.drain().is_empty());
}

/// Test that leaving forgets the viewer silently and drops its override
#[test]
fn test_viewer_leave_is_silent() {
    let harness = Harness::new(ProtocolVersion::V1_16_5);
    let mut viewer = harness.connect();
    let hologram = harness.hologram(anchor());
    hologram.add_lines(["bye"]).unwrap();
    hologram.hide_to(viewer.id);
    hologram.show_to(viewer.id);
    viewer.drain();

    hologram.on_viewer_leave(viewer.id);

    assert!(viewer.drain().is_empty());
    assert!(!hologram.is_spawned_for(viewer.id));
    // Override is gone; the default applies again
    hologram.set_visible_by_default(false);
    assert!(!hologram.is_visible_to(viewer.id));
}

/// Test that a late joiner gets every line only when visible to them
#[test]
fn test_join_spawns_visible_lines() {
    let harness = Harness::new(ProtocolVersion::V1_8);
    let hologram = harness.hologram(anchor());
    hologram.add_lines(["a", "b"]).unwrap();

    let mut late = harness.connect();
    hologram.on_viewer_join(late.id);
    assert_eq!(
        kinds(&late.drain()),
        vec![
            PacketKind::SpawnLiving,
            PacketKind::Metadata,
            PacketKind::SpawnLiving,
            PacketKind::Metadata,
        ]
    );

    let mut hidden = harness.connect();
    hologram.hide_to(hidden.id);
    hologram.on_viewer_join(hidden.id);
    assert!(hidden.drain().is_empty());
}

/// Test that moving the anchor teleports every line with its offset
#[test]
fn test_teleport_moves_all_lines() {
    let harness = Harness::new(ProtocolVersion::V1_16_5);
    let mut viewer = harness.connect();
    let hologram = harness.hologram(anchor());
    hologram.add_lines(["a", "b"]).unwrap();
    viewer.drain();

    hologram.teleport(Position::new(5.0, 20.0, 5.0));

    let packets = viewer.drain();
    assert_eq!(
        kinds(&packets),
        vec![PacketKind::Teleport, PacketKind::Teleport]
    );
    let mut second = packets[1].reader();
    assert_eq!(second.read_varint(), hologram.entity_ids()[1]);
    assert_eq!(second.read_double(), 5.0);
    assert_eq!(second.read_double(), 19.75);
    assert_eq!(hologram.anchor(), Position::new(5.0, 20.0, 5.0));
}
