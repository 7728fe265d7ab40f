//! In-memory mirror of the current preset per camera and the geometry of
//! each (camera, framing) under that preset.

use std::collections::BTreeMap;

use vptz_core::{CameraId, FramingId, PresetId, Xyz};

/// Optimistic view used while animations run ahead of the store.
#[derive(Debug, Clone, Default)]
pub struct FramingCache {
    presets: BTreeMap<CameraId, PresetId>,
    geometry: BTreeMap<(CameraId, FramingId), Xyz>,
}

impl FramingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn preset(&self, cam: &CameraId) -> Option<&PresetId> {
        self.presets.get(cam)
    }

    pub fn set_preset(&mut self, cam: &CameraId, ptz: &PresetId) {
        self.presets.insert(cam.clone(), ptz.clone());
    }

    /// Cached geometry, neutral when nothing was cached yet.
    pub fn geometry(&self, cam: &CameraId, vptz: &FramingId) -> Xyz {
        self.geometry
            .get(&(cam.clone(), vptz.clone()))
            .copied()
            .unwrap_or(Xyz::NEUTRAL)
    }

    pub fn set_geometry(&mut self, cam: &CameraId, vptz: &FramingId, xyz: Xyz) {
        self.geometry.insert((cam.clone(), vptz.clone()), xyz);
    }

    /// Replace a camera's preset and all its framings at once.
    pub fn load_camera(
        &mut self,
        cam: &CameraId,
        ptz: &PresetId,
        framings: &BTreeMap<FramingId, Xyz>,
    ) {
        self.set_preset(cam, ptz);
        for (vptz, xyz) in framings {
            self.set_geometry(cam, vptz, *xyz);
        }
    }
}
