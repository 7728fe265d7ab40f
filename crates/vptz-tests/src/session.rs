//! Mixer session behaviour across one or two instances.

use std::time::Duration;

use vptz_core::{CameraId, FramingId, VptzConfig};
use vptz_mixer::{Instance, LinkState, SessionEvent, TransportEvent};
use vptz_store::MemoryBackend;

use crate::harness::{names, rig_with, roster_xml, Rig};

// ── Helpers ────────────────────────────────────────────────────

fn dual() -> Rig {
    rig_with(VptzConfig::default(), true, Box::new(MemoryBackend::new()))
}

fn xml(r: &Rig, instance: Instance, inputs: &[(u32, &str)], active: u32, preview: u32) {
    r.session()
        .handle_event(instance, TransportEvent::Xml(roster_xml(inputs, active, preview)));
}

// ── Roster ─────────────────────────────────────────────────────

#[tokio::test]
async fn roster_snapshot_replaces_only_its_instance() {
    let r = dual();
    xml(&r, Instance::Primary, &[(1, "VPTZ - CAM1-C-C"), (2, "VPTZ - CAM1-W-C")], 1, 2);
    xml(&r, Instance::Secondary, &[(1, "VPTZ - CAM2-C-C")], 1, 1);
    assert_eq!(r.session().roster(Instance::Primary).len(), 2);

    xml(&r, Instance::Primary, &[(4, "VPTZ - CAM3-F-L")], 4, 4);
    let primary = r.session().roster(Instance::Primary);
    assert_eq!(primary.len(), 1);
    assert_eq!(primary[0].title, "VPTZ - CAM3-F-L");
    assert_eq!(r.session().roster(Instance::Secondary).len(), 1);
}

#[tokio::test]
async fn secondary_pointers_win_when_set() {
    let r = dual();
    xml(&r, Instance::Primary, &[(1, "VPTZ - CAM1-C-C"), (2, "VPTZ - CAM1-W-C")], 1, 2);
    assert_eq!(r.session().effective_program(), "VPTZ - CAM1-C-C");

    xml(&r, Instance::Secondary, &[(9, "VPTZ - CAM4-F-R")], 9, 0);
    assert_eq!(r.session().effective_program(), "VPTZ - CAM4-F-R");
    // B reports no preview, so A's stands
    assert_eq!(r.session().effective_preview(), "VPTZ - CAM1-W-C");

    let snapshot = r.surface.snapshot(false);
    let (cam, vptz) = snapshot.program().unwrap();
    assert_eq!((cam, vptz), (&CameraId::new("4"), &FramingId::new("F-R")));
}

#[tokio::test]
async fn malformed_document_is_dropped_without_blocking_the_other_instance() {
    let r = dual();
    xml(&r, Instance::Primary, &[(1, "VPTZ - CAM1-C-C")], 1, 1);
    r.session()
        .handle_event(Instance::Primary, TransportEvent::Xml("<vmix><inputs>".into()));
    assert_eq!(r.session().roster(Instance::Primary).len(), 1);

    xml(&r, Instance::Secondary, &[(3, "VPTZ - CAM2-C-C")], 3, 3);
    assert_eq!(r.session().roster(Instance::Secondary).len(), 1);
}

// ── Tally ──────────────────────────────────────────────────────

#[tokio::test]
async fn tally_push_refreshes_every_connected_instance() {
    let r = dual();
    r.session()
        .handle_event(Instance::Primary, TransportEvent::Tally("0120".into()));

    assert_eq!(names(&r.primary), ["XML"]);
    assert_eq!(names(r.secondary_link()), ["XML"]);
    let (program, preview) = r.session().tally_summary();
    assert_eq!(program, ["A:2"]);
    assert_eq!(preview, ["A:3"]);
}

#[tokio::test]
async fn bad_tally_is_ignored() {
    let r = dual();
    r.session()
        .handle_event(Instance::Secondary, TransportEvent::Tally("01x".into()));
    assert!(r.primary.commands().is_empty());
    assert_eq!(r.session().tally_summary(), (vec![], vec![]));
}

// ── Connection lifecycle ───────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn all_connected_fires_once_both_links_are_up() {
    let r = dual();
    let mut events = r.session().subscribe();

    r.session().handle_event(Instance::Primary, TransportEvent::Connected);
    tokio::time::sleep(Duration::from_millis(200)).await;
    r.session().handle_event(Instance::Secondary, TransportEvent::Connected);
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(names(&r.primary), ["XML", "SUBSCRIBE TALLY"]);
    assert_eq!(names(r.secondary_link()), ["XML", "SUBSCRIBE TALLY"]);
    assert_eq!(r.session().link_state(Instance::Secondary), LinkState::Connected);

    let mut all_connected = 0;
    while let Ok(event) = events.try_recv() {
        if event == SessionEvent::AllConnected {
            all_connected += 1;
        }
    }
    assert_eq!(all_connected, 1);
}
