//! Framing state survives a restart through the JSON file backend.

use std::time::Duration;

use vptz_core::{CameraId, FramingId, PresetId, VptzConfig, Xyz};
use vptz_store::{FramingStore, JsonFileBackend};

use crate::harness::rig_with;

#[tokio::test(start_paused = true)]
async fn preset_and_framings_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let (cam, vptz) = (CameraId::new("3"), FramingId::new("C-R"));

    {
        let r = rig_with(
            VptzConfig::default(),
            false,
            Box::new(JsonFileBackend::in_dir(dir.path())),
        );
        r.surface.select_preset("3", "D").await.unwrap();
        r.surface
            .set_framing_geometry("3", "C-R", 0.0, 0.0, 2.0)
            .await
            .unwrap();
        r.surface
            .change_virtual_framing("3", "C-R", "pan", "down-right", "fast")
            .await
            .unwrap();
        r.surface.shutdown();
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    let r = rig_with(
        VptzConfig::default(),
        false,
        Box::new(JsonFileBackend::in_dir(dir.path())),
    );
    assert_eq!(r.surface.current_preset(&cam), PresetId::new("D"));
    let restored = r.surface.cached_geometry(&cam, &vptz);
    assert!(restored.approx_eq(&Xyz::new(-0.3, 0.3, 2.0)), "{restored}");

    // other presets of the camera were never touched
    let store = r.surface.store();
    assert_eq!(store.get_geometry(&cam, &PresetId::new("A"), &vptz), Xyz::NEUTRAL);
}

#[tokio::test]
async fn reopening_store_keeps_document() {
    let dir = tempfile::tempdir().unwrap();
    let config = std::sync::Arc::new(VptzConfig::default());
    let cam = CameraId::new("1");

    let store = FramingStore::open(config.clone(), Box::new(JsonFileBackend::in_dir(dir.path()))).unwrap();
    store.set_preset(&cam, &PresetId::new("H")).await.unwrap();
    let before = store.document();
    drop(store);

    let store = FramingStore::open(config, Box::new(JsonFileBackend::in_dir(dir.path()))).unwrap();
    assert_eq!(store.document(), before);
    assert_eq!(store.get_preset(&cam), PresetId::new("H"));
}
