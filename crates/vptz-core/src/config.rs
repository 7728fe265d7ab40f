//! Runtime configuration.
//!
//! Every field has a default, so a JSON config file only needs to carry the
//! values it overrides.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::{Result, VptzError};
use crate::geometry::{PanScale, Xyz};
use crate::ids::{CameraId, FramingId, PresetId, Speed};
use crate::path::PathOptions;

/// Top-level configuration shared by every vPTZ crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VptzConfig {
    pub cameras: Vec<CameraId>,
    pub presets: Vec<PresetId>,
    pub framings: Vec<FramingId>,
    pub naming: InputNaming,
    pub geometry: GeometryConfig,
    pub timing: TimingConfig,
    pub mixer: MixerConfig,
    /// Calibrated geometry per framing used by preset reset.
    pub reset: BTreeMap<FramingId, Xyz>,
    /// Push every cached geometry to the mixer once all links are up.
    pub restore_on_connect: bool,
}

impl Default for VptzConfig {
    fn default() -> Self {
        let reset = [
            ("C-L", Xyz::new(2.0, -1.2, 3.0)),
            ("C-C", Xyz::new(0.0, -1.2, 3.0)),
            ("C-R", Xyz::new(-2.0, -1.2, 3.0)),
            ("F-L", Xyz::new(1.0, -0.45, 2.0)),
            ("F-C", Xyz::new(0.0, -0.45, 2.0)),
            ("F-R", Xyz::new(-1.0, -0.45, 2.0)),
            ("W-C", Xyz::NEUTRAL),
        ]
        .into_iter()
        .map(|(id, xyz)| (FramingId::new(id), xyz))
        .collect();

        Self {
            cameras: ["1", "2", "3", "4", "5"].into_iter().map(CameraId::new).collect(),
            presets: ["A", "B", "C", "D", "E", "F", "G", "H"]
                .into_iter()
                .map(PresetId::new)
                .collect(),
            framings: ["C-L", "C-C", "C-R", "F-L", "F-C", "F-R", "W-C"]
                .into_iter()
                .map(FramingId::new)
                .collect(),
            naming: InputNaming::default(),
            geometry: GeometryConfig::default(),
            timing: TimingConfig::default(),
            mixer: MixerConfig::default(),
            reset,
            restore_on_connect: false,
        }
    }
}

impl VptzConfig {
    /// Parse a JSON document, filling unset fields with defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| VptzError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values the rest of the system cannot work with.
    pub fn validate(&self) -> Result<()> {
        fn unique<T: Ord>(items: &[T]) -> bool {
            let mut seen = std::collections::BTreeSet::new();
            items.iter().all(|item| seen.insert(item))
        }

        if self.cameras.is_empty() || self.presets.is_empty() || self.framings.is_empty() {
            return Err(VptzError::Config(
                "camera, preset and framing sets must not be empty".into(),
            ));
        }
        if !unique(&self.cameras) || !unique(&self.presets) || !unique(&self.framings) {
            return Err(VptzError::Config("duplicate identifier".into()));
        }
        let g = &self.geometry;
        if !(g.min_zoom >= 1.0 && g.max_zoom >= g.min_zoom) {
            return Err(VptzError::Config(format!(
                "zoom range [{}, {}] is invalid",
                g.min_zoom, g.max_zoom
            )));
        }
        if g.pan_scale.0 == 0.0 || !g.pan_scale.0.is_finite() {
            return Err(VptzError::Config("pan_scale must be finite and non-zero".into()));
        }
        if self.timing.nudge_fps == 0 || self.timing.drive_fps == 0 {
            return Err(VptzError::Config("frame rates must be positive".into()));
        }
        Ok(())
    }

    /// Validate a camera id.
    pub fn camera(&self, id: &str) -> Result<CameraId> {
        self.cameras
            .iter()
            .find(|c| c.as_str() == id)
            .cloned()
            .ok_or_else(|| VptzError::InvalidCamera(id.to_string()))
    }

    /// Validate a physical preset id.
    pub fn preset(&self, id: &str) -> Result<PresetId> {
        self.presets
            .iter()
            .find(|p| p.as_str() == id)
            .cloned()
            .ok_or_else(|| VptzError::InvalidPreset(id.to_string()))
    }

    /// Validate a virtual framing id.
    pub fn framing(&self, id: &str) -> Result<FramingId> {
        self.framings
            .iter()
            .find(|f| f.as_str() == id)
            .cloned()
            .ok_or_else(|| VptzError::InvalidFraming(id.to_string()))
    }

    /// The preset a camera falls back to when none has been stored.
    pub fn first_preset(&self) -> Option<&PresetId> {
        self.presets.first()
    }

    /// Calibrated reset geometry for a framing (neutral when not listed).
    pub fn reset_geometry(&self, framing: &FramingId) -> Xyz {
        self.reset.get(framing).copied().unwrap_or(Xyz::NEUTRAL)
    }

    /// Input name of a physical camera.
    pub fn camera_input(&self, cam: &CameraId) -> String {
        self.naming.render(&self.naming.camera, cam.as_str(), "", "")
    }

    /// Input name of a physical preset on a camera.
    pub fn preset_input(&self, cam: &CameraId, ptz: &PresetId) -> String {
        self.naming.render(&self.naming.preset, cam.as_str(), ptz.as_str(), "")
    }

    /// Input name of a virtual framing on a camera.
    pub fn framing_input(&self, cam: &CameraId, vptz: &FramingId) -> String {
        self.naming.render(&self.naming.framing, cam.as_str(), "", vptz.as_str())
    }

    /// Reverse lookup: which (camera, framing) does a mixer input name denote.
    pub fn framing_of_input(&self, name: &str) -> Option<(CameraId, FramingId)> {
        if name.is_empty() {
            return None;
        }
        self.cameras.iter().find_map(|cam| {
            self.framings
                .iter()
                .find(|vptz| self.framing_input(cam, vptz) == name)
                .map(|vptz| (cam.clone(), vptz.clone()))
        })
    }

    /// Path tunables derived from the geometry settings.
    pub fn path_options(&self) -> PathOptions {
        PathOptions {
            canvas_width: self.geometry.canvas_width,
            canvas_height: self.geometry.canvas_height,
            ..PathOptions::default()
        }
    }
}

/// Templates for mixer input titles. `{cam}`, `{ptz}` and `{vptz}` are
/// substituted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputNaming {
    pub camera: String,
    pub preset: String,
    pub framing: String,
}

impl Default for InputNaming {
    fn default() -> Self {
        Self {
            camera: "PTZ - CAM{cam}-W-V".into(),
            preset: "PTZ - CAM{cam}-W-V-{ptz}".into(),
            framing: "VPTZ - CAM{cam}-{vptz}".into(),
        }
    }
}

impl InputNaming {
    fn render(&self, template: &str, cam: &str, ptz: &str, vptz: &str) -> String {
        template
            .replace("{cam}", cam)
            .replace("{ptz}", ptz)
            .replace("{vptz}", vptz)
    }
}

/// Three values selected by [`Speed`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedTable<T> {
    pub fast: T,
    pub med: T,
    pub slow: T,
}

impl<T: Copy> SpeedTable<T> {
    pub const fn new(fast: T, med: T, slow: T) -> Self {
        Self { fast, med, slow }
    }

    pub fn get(&self, speed: Speed) -> T {
        speed.select(self.fast, self.med, self.slow)
    }
}

/// Geometry limits and magnitudes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub pan_scale: PanScale,
    pub canvas_width: f64,
    pub canvas_height: f64,
    /// Total pan distance of one virtual nudge.
    pub nudge_pan: SpeedTable<f64>,
    /// Total zoom change of one virtual nudge.
    pub nudge_zoom: SpeedTable<f64>,
    /// Physical camera move speed.
    pub physical_move: SpeedTable<f64>,
    /// Physical camera zoom speed.
    pub physical_zoom: SpeedTable<f64>,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            min_zoom: 1.0,
            max_zoom: 5.0,
            pan_scale: PanScale::DEFAULT,
            canvas_width: 3840.0,
            canvas_height: 2160.0,
            nudge_pan: SpeedTable::new(0.30, 0.15, 0.05),
            nudge_zoom: SpeedTable::new(0.30, 0.15, 0.05),
            physical_move: SpeedTable::new(0.5, 0.25, 0.10),
            physical_zoom: SpeedTable::new(1.0, 0.5, 0.15),
        }
    }
}

/// Timing of animations, settle delays and debounce windows (milliseconds).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub nudge_duration_ms: u64,
    pub nudge_fps: u32,
    pub drive_fps: u32,
    pub drive_duration_ms: SpeedTable<u64>,
    pub notify_window_ms: u64,
    pub connect_settle_ms: u64,
    pub drive_settle_ms: u64,
    pub drive_post_cut_ms: u64,
    pub physical_pulse_ms: u64,
    pub physical_zoom_reset_ms: u64,
    pub physical_persist_debounce_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            nudge_duration_ms: 500,
            nudge_fps: 30,
            drive_fps: 30,
            drive_duration_ms: SpeedTable::new(1000, 2000, 4000),
            notify_window_ms: 50,
            connect_settle_ms: 100,
            drive_settle_ms: 100,
            drive_post_cut_ms: 50,
            physical_pulse_ms: 100,
            physical_zoom_reset_ms: 2000,
            physical_persist_debounce_ms: 500,
        }
    }
}

impl TimingConfig {
    /// Number of ticks in a virtual nudge.
    pub fn nudge_steps(&self) -> usize {
        crate::path::step_count(self.nudge_fps as f64, self.nudge_duration_ms as f64)
    }

    /// Interval between animation ticks at `fps`.
    pub fn tick_interval(fps: u32) -> Duration {
        Duration::from_secs_f64(1.0 / fps.max(1) as f64)
    }

    pub fn drive_duration(&self, speed: Speed) -> Duration {
        Duration::from_millis(self.drive_duration_ms.get(speed))
    }

    pub fn notify_window(&self) -> Duration {
        Duration::from_millis(self.notify_window_ms)
    }
}

/// Mixer endpoints and transport timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerConfig {
    /// Primary instance `host:port`.
    pub primary: String,
    /// Optional secondary instance, used for preview and cut.
    pub secondary: Option<String>,
    pub reconnect_delay_ms: u64,
    pub connect_timeout_ms: u64,
    /// Largest inbound frame accepted before the connection is dropped.
    pub max_frame_bytes: usize,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            primary: "127.0.0.1:8099".into(),
            secondary: None,
            reconnect_delay_ms: 2000,
            connect_timeout_ms: 5000,
            max_frame_bytes: 4 * 1024 * 1024,
        }
    }
}

impl MixerConfig {
    /// The secondary endpoint, unless it is unset, empty or the primary again.
    pub fn effective_secondary(&self) -> Option<&str> {
        self.secondary
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty() && *s != self.primary.trim())
    }
}

// ── Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sets() {
        let cfg = VptzConfig::default();
        assert_eq!(cfg.cameras.len(), 5);
        assert_eq!(cfg.presets.len(), 8);
        assert_eq!(cfg.framings.len(), 7);
        assert_eq!(cfg.first_preset(), Some(&PresetId::new("A")));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_id_validation() {
        let cfg = VptzConfig::default();
        assert_eq!(cfg.camera("2").unwrap(), CameraId::new("2"));
        assert_eq!(cfg.camera("9"), Err(VptzError::InvalidCamera("9".into())));
        assert!(matches!(cfg.preset("Z"), Err(VptzError::InvalidPreset(_))));
        assert!(matches!(cfg.framing("X-X"), Err(VptzError::InvalidFraming(_))));
    }

    #[test]
    fn test_input_names() {
        let cfg = VptzConfig::default();
        let cam = CameraId::new("2");
        assert_eq!(cfg.camera_input(&cam), "PTZ - CAM2-W-V");
        assert_eq!(cfg.preset_input(&cam, &PresetId::new("B")), "PTZ - CAM2-W-V-B");
        assert_eq!(cfg.framing_input(&cam, &FramingId::new("C-L")), "VPTZ - CAM2-C-L");
    }

    #[test]
    fn test_framing_of_input() {
        let cfg = VptzConfig::default();
        assert_eq!(
            cfg.framing_of_input("VPTZ - CAM3-F-R"),
            Some((CameraId::new("3"), FramingId::new("F-R")))
        );
        assert_eq!(cfg.framing_of_input("PTZ - CAM3-W-V"), None);
        assert_eq!(cfg.framing_of_input(""), None);
    }

    #[test]
    fn test_reset_table() {
        let cfg = VptzConfig::default();
        assert_eq!(cfg.reset_geometry(&FramingId::new("C-L")), Xyz::new(2.0, -1.2, 3.0));
        assert_eq!(cfg.reset_geometry(&FramingId::new("unknown")), Xyz::NEUTRAL);
        for xyz in cfg.reset.values() {
            assert!(xyz.is_contained());
        }
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let cfg = VptzConfig::from_json(
            r#"{ "cameras": ["1", "2"], "timing": { "notify_window_ms": 33 } }"#,
        )
        .unwrap();
        assert_eq!(cfg.cameras.len(), 2);
        assert_eq!(cfg.timing.notify_window_ms, 33);
        assert_eq!(cfg.timing.nudge_duration_ms, 500);
        assert_eq!(cfg.presets.len(), 8);
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(matches!(
            VptzConfig::from_json(r#"{ "cameras": [] }"#),
            Err(VptzError::Config(_))
        ));
        assert!(matches!(
            VptzConfig::from_json(r#"{ "geometry": { "min_zoom": 0.5 } }"#),
            Err(VptzError::Config(_))
        ));
        assert!(matches!(VptzConfig::from_json("{"), Err(VptzError::Config(_))));
    }

    #[test]
    fn test_timing_helpers() {
        let t = TimingConfig::default();
        assert_eq!(t.nudge_steps(), 15);
        assert_eq!(t.drive_duration(Speed::Med), Duration::from_millis(2000));
    }

    #[test]
    fn test_secondary_equal_to_primary_is_absent() {
        let mut m = MixerConfig::default();
        assert_eq!(m.effective_secondary(), None);
        m.secondary = Some("127.0.0.1:8099".into());
        assert_eq!(m.effective_secondary(), None);
        m.secondary = Some("10.0.0.2:8099".into());
        assert_eq!(m.effective_secondary(), Some("10.0.0.2:8099"));
    }
}
