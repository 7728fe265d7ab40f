//! The persisted document: current preset per camera and geometry per
//! (camera, preset, framing).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use vptz_core::{CameraId, FramingId, PresetId, VptzConfig, Xyz};

use crate::error::{StoreError, StoreResult};

/// Current on-disk format version.
pub const DOCUMENT_VERSION: u32 = 1;

/// Key of a geometry record.
pub type FramingKey = (CameraId, PresetId, FramingId);

/// Working copy of the store contents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub presets: BTreeMap<CameraId, PresetId>,
    pub framings: BTreeMap<FramingKey, Xyz>,
}

impl Document {
    /// Every camera on the first preset, every framing neutral.
    pub fn seeded(config: &VptzConfig) -> StoreResult<Self> {
        let first = config
            .first_preset()
            .ok_or_else(|| StoreError::Config("no presets configured".into()))?;
        let mut doc = Self::default();
        for cam in &config.cameras {
            doc.presets.insert(cam.clone(), first.clone());
            for ptz in &config.presets {
                for vptz in &config.framings {
                    doc.framings
                        .insert((cam.clone(), ptz.clone(), vptz.clone()), Xyz::NEUTRAL);
                }
            }
        }
        Ok(doc)
    }

    pub fn to_json(&self) -> StoreResult<String> {
        Ok(serde_json::to_string_pretty(&PersistedDocument::from(self))?)
    }

    pub fn from_json(json: &str) -> StoreResult<Self> {
        let persisted: PersistedDocument = serde_json::from_str(json)?;
        if persisted.version > DOCUMENT_VERSION {
            return Err(StoreError::Version {
                found: persisted.version,
                supported: DOCUMENT_VERSION,
            });
        }
        Ok(persisted.into())
    }
}

/// One geometry record as written to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FramingRecord {
    pub camera: CameraId,
    pub preset: PresetId,
    pub framing: FramingId,
    pub x: f64,
    pub y: f64,
    pub zoom: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedDocument {
    version: u32,
    #[serde(default)]
    presets: BTreeMap<CameraId, PresetId>,
    #[serde(default)]
    framings: Vec<FramingRecord>,
}

impl From<&Document> for PersistedDocument {
    fn from(doc: &Document) -> Self {
        Self {
            version: DOCUMENT_VERSION,
            presets: doc.presets.clone(),
            framings: doc
                .framings
                .iter()
                .map(|((camera, preset, framing), xyz)| FramingRecord {
                    camera: camera.clone(),
                    preset: preset.clone(),
                    framing: framing.clone(),
                    x: xyz.x,
                    y: xyz.y,
                    zoom: xyz.zoom,
                })
                .collect(),
        }
    }
}

impl From<PersistedDocument> for Document {
    fn from(p: PersistedDocument) -> Self {
        Self {
            presets: p.presets,
            framings: p
                .framings
                .into_iter()
                .map(|r| ((r.camera, r.preset, r.framing), Xyz::new(r.x, r.y, r.zoom)))
                .collect(),
        }
    }
}
