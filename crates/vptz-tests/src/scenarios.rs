//! End-to-end control scenarios over in-process mixer links.

use std::time::Duration;

use vptz_control::ControlError;
use vptz_core::{CameraId, CameraScope, FramingId, PresetId, VptzConfig, VptzError, Xyz};
use vptz_mixer::{Instance, MixerCommand, TransportEvent};
use vptz_store::MemoryBackend;

use crate::harness::{capture_warnings, names, rig, rig_with, roster_xml};

// ── Presets ────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn select_preset_sends_recall_pair_and_all_geometry() {
    let r = rig();
    r.surface.select_preset("2", "B").await.unwrap();

    let batches = r.primary.batches();
    assert_eq!(batches.len(), 2);

    let recall: Vec<_> = batches[0].iter().map(|c| c.name()).collect();
    assert_eq!(recall, ["PTZMoveToVirtualInputPosition", "PTZUpdateVirtualInput"]);

    let geometry = &batches[1];
    assert_eq!(geometry.len(), 3 * 7);
    for chunk in geometry.clone().into_vec().chunks(3) {
        let fns: Vec<_> = chunk.iter().map(MixerCommand::name).collect();
        assert_eq!(fns, ["SetPanX", "SetPanY", "SetZoom"]);
        assert_eq!(chunk[0].input_name(), chunk[2].input_name());
    }

    let cam = CameraId::new("2");
    assert_eq!(r.surface.store().get_preset(&cam), PresetId::new("B"));
    assert_eq!(r.surface.current_preset(&cam), PresetId::new("B"));
}

#[tokio::test(start_paused = true)]
async fn invalid_camera_sends_nothing() {
    let r = rig();
    let err = r
        .surface
        .change_physical_preset("9", "pan", "up", "fast")
        .await
        .unwrap_err();
    assert!(matches!(err, ControlError::Invalid(VptzError::InvalidCamera(_))));
    assert!(err.is_validation());

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(r.primary.commands().is_empty());
}

// ── Drive ──────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn drive_across_cameras_degrades_to_single_cut() {
    let r = rig();
    r.session().handle_event(
        Instance::Primary,
        TransportEvent::Xml(roster_xml(
            &[(1, "VPTZ - CAM1-C-C"), (2, "VPTZ - CAM2-C-C")],
            1,
            2,
        )),
    );
    let before = r.surface.store().document();

    r.surface.drive("fast").await.unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(r.primary_names(), ["Cut"]);
    assert!(!r.surface.animating(&CameraId::new("2"), &FramingId::new("C-C")));
    assert_eq!(r.surface.store().document(), before);
}

#[tokio::test(start_paused = true)]
async fn drive_on_one_camera_lands_on_saved_preview() {
    let r = rig_with(VptzConfig::default(), true, Box::new(MemoryBackend::new()));
    let (cam, ptz) = (CameraId::new("5"), PresetId::new("A"));
    let (fl, fr) = (FramingId::new("F-L"), FramingId::new("F-R"));
    let store = r.surface.store();
    store.set_geometry(&cam, &ptz, &fl, Xyz::new(1.0, -0.45, 2.0)).await.unwrap();
    store.set_geometry(&cam, &ptz, &fr, Xyz::new(-1.0, -0.45, 2.0)).await.unwrap();

    // program on A, preview on B: B wins for the effective pointers
    r.session().handle_event(
        Instance::Primary,
        TransportEvent::Xml(roster_xml(&[(1, "VPTZ - CAM1-W-C")], 1, 1)),
    );
    r.session().handle_event(
        Instance::Secondary,
        TransportEvent::Xml(roster_xml(
            &[(7, "VPTZ - CAM5-F-L"), (8, "VPTZ - CAM5-F-R")],
            7,
            8,
        )),
    );

    r.surface.drive("med").await.unwrap();

    assert_eq!(names(r.secondary_link()), ["Cut"]);

    // borrowed program geometry first, then one batch per path sample
    let batches = r.primary.batches();
    assert!(batches.len() > 30, "batches: {}", batches.len());
    let first_x: f64 = batches[0].iter().next().unwrap().value_str().unwrap().parse().unwrap();
    assert_eq!(first_x, 2.0);
    let last_x: f64 = batches
        .last()
        .unwrap()
        .iter()
        .next()
        .unwrap()
        .value_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!((last_x + 2.0).abs() < 1e-6);

    let landed = store.get_geometry(&cam, &ptz, &fr);
    assert!(landed.approx_eq(&Xyz::new(-1.0, -0.45, 2.0)));
}

// ── Animations ─────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn overlapping_nudges_persist_serialized_result() {
    let r = rig();
    let (cam, ptz, vptz) = (CameraId::new("1"), PresetId::new("A"), FramingId::new("C-C"));
    r.surface
        .set_framing_geometry("1", "C-C", 0.0, 0.0, 3.0)
        .await
        .unwrap();
    r.primary.take();

    let first = r.surface.change_virtual_framing("1", "C-C", "pan", "up", "slow");
    let second = async {
        tokio::time::sleep(Duration::from_millis(110)).await;
        r.surface
            .change_virtual_framing("1", "C-C", "pan", "up", "slow")
            .await
    };
    let (a, b) = tokio::join!(first, second);
    a.unwrap();
    b.unwrap();

    let ticks = r.primary.commands().len();
    assert!(ticks > 15 && ticks < 30, "ticks: {ticks}");
    let expected = -(ticks as f64) * (0.05 / 15.0);

    let stored = r.surface.store().get_geometry(&cam, &ptz, &vptz);
    assert!((stored.y - expected).abs() < 1e-9, "{stored} vs {expected}");
    assert_eq!(stored, r.surface.cached_geometry(&cam, &vptz));

    // the last wire value is the persisted one
    let last = r.primary.commands().last().cloned().unwrap();
    let wire: f64 = last.value_str().unwrap().parse().unwrap();
    assert!((wire - expected * 2.0).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn nudges_on_different_framings_run_side_by_side() {
    let r = rig();
    let cam = CameraId::new("4");
    r.surface.set_framing_geometry("4", "F-L", 0.0, 0.0, 2.0).await.unwrap();
    r.surface.set_framing_geometry("4", "F-R", 0.0, 0.0, 2.0).await.unwrap();

    let start = tokio::time::Instant::now();
    let (a, b) = tokio::join!(
        r.surface.change_virtual_framing("4", "F-L", "pan", "left", "med"),
        r.surface.change_virtual_framing("4", "F-R", "pan", "right", "med"),
    );
    a.unwrap();
    b.unwrap();
    assert!(start.elapsed() < Duration::from_millis(700));

    let left = r.surface.cached_geometry(&cam, &FramingId::new("F-L"));
    let right = r.surface.cached_geometry(&cam, &FramingId::new("F-R"));
    assert!((left.x - 0.15).abs() < 1e-9);
    assert!((right.x + 0.15).abs() < 1e-9);
}

// ── Notification & transport ───────────────────────────────────

#[tokio::test(start_paused = true)]
async fn burst_of_changes_yields_one_notification() {
    let r = rig();
    for cam in ["1", "2", "3"] {
        r.surface.set_framing_geometry(cam, "W-C", 0.0, 0.0, 1.5).await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(200)).await;

    let got = r.sink.take();
    assert_eq!(got.len(), 1);
    let note = &got[0];
    assert!(!note.cached);
    for cam in ["1", "2", "3"] {
        assert!(note.cameras.contains(&CameraId::new(cam)));
    }
    assert!(!note.cameras.contains(&CameraId::new("4")));
    assert_ne!(note.cameras, CameraScope::All);
    let w = note
        .snapshot
        .framing(&CameraId::new("3"), &FramingId::new("W-C"))
        .unwrap();
    assert_eq!(w.zoom, 1.5);
}

#[tokio::test(start_paused = true)]
async fn disconnected_mixer_warns_once_per_send() {
    let r = rig();
    r.primary.set_connected(false);

    let lines = capture_warnings(|| r.surface.cut());
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("mixer-a:8099"));
    assert!(r.primary.commands().is_empty());

    // operations still succeed; the state is kept for the next connect
    r.surface.select_preset("1", "C").await.unwrap();
    assert_eq!(r.surface.store().get_preset(&CameraId::new("1")).as_str(), "C");
}
