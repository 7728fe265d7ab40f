//! The state snapshot handed to notification subscribers and the read endpoint.

use serde::{Deserialize, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};

use crate::geometry::Xyz;
use crate::ids::{CameraId, FramingId, PresetId};

/// Tally and geometry of one virtual framing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FramingState {
    pub program: bool,
    pub preview: bool,
    pub x: f64,
    pub y: f64,
    pub zoom: f64,
}

impl FramingState {
    pub fn new(xyz: Xyz, program: bool, preview: bool) -> Self {
        Self {
            program,
            preview,
            x: xyz.x,
            y: xyz.y,
            zoom: xyz.zoom,
        }
    }

    pub fn xyz(&self) -> Xyz {
        Xyz::new(self.x, self.y, self.zoom)
    }
}

/// Current preset and every framing of one camera.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraState {
    pub preset: PresetId,
    pub framings: BTreeMap<FramingId, FramingState>,
}

/// Snapshot of every camera, keyed by camera id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateSnapshot(pub BTreeMap<CameraId, CameraState>);

impl StateSnapshot {
    pub fn camera(&self, cam: &CameraId) -> Option<&CameraState> {
        self.0.get(cam)
    }

    pub fn framing(&self, cam: &CameraId, vptz: &FramingId) -> Option<&FramingState> {
        self.0.get(cam).and_then(|c| c.framings.get(vptz))
    }

    /// The framing currently on program, if any.
    pub fn program(&self) -> Option<(&CameraId, &FramingId)> {
        self.find(|f| f.program)
    }

    /// The framing currently on preview, if any.
    pub fn preview(&self) -> Option<(&CameraId, &FramingId)> {
        self.find(|f| f.preview)
    }

    fn find(&self, pred: impl Fn(&FramingState) -> bool) -> Option<(&CameraId, &FramingId)> {
        self.0.iter().find_map(|(cam, state)| {
            state
                .framings
                .iter()
                .find(|(_, f)| pred(f))
                .map(|(vptz, _)| (cam, vptz))
        })
    }
}

/// Which cameras a notification concerns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraScope {
    All,
    Cameras(BTreeSet<CameraId>),
}

impl CameraScope {
    pub fn single(cam: CameraId) -> Self {
        Self::Cameras(BTreeSet::from([cam]))
    }

    pub fn contains(&self, cam: &CameraId) -> bool {
        match self {
            Self::All => true,
            Self::Cameras(set) => set.contains(cam),
        }
    }

    /// Union of two scopes. `All` absorbs everything.
    pub fn union(self, other: Self) -> Self {
        match (self, other) {
            (Self::All, _) | (_, Self::All) => Self::All,
            (Self::Cameras(mut a), Self::Cameras(b)) => {
                a.extend(b);
                Self::Cameras(a)
            }
        }
    }
}

impl Serialize for CameraScope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::All => serializer.serialize_str("all"),
            Self::Cameras(set) => set.serialize(serializer),
        }
    }
}
