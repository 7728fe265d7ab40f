//! The framing store: current preset per camera and saved geometry per
//! (camera, preset, framing), committed through retried transactions.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use vptz_core::{CameraId, FramingId, PresetId, VptzConfig, Xyz};

use crate::backend::StoreBackend;
use crate::document::Document;
use crate::error::{StoreError, StoreResult};
use crate::retry::RetryPolicy;

/// Durable framing state shared by every control operation.
///
/// Readers only ever take the document lock for a copy or a lookup. Writers
/// are serialized by a separate commit lock and swap the document in after
/// the backend commit, so a slow commit never blocks readers.
pub struct FramingStore {
    config: Arc<VptzConfig>,
    backend: Box<dyn StoreBackend>,
    doc: Mutex<Document>,
    commit: Mutex<()>,
    default_preset: PresetId,
    policy: RetryPolicy,
}

impl std::fmt::Debug for FramingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramingStore")
            .field("backend", &self.backend.describe())
            .field("policy", &self.policy)
            .finish()
    }
}

impl FramingStore {
    /// Open the store, seeding every missing slot. The first open of an
    /// empty backend commits the fully seeded document.
    pub fn open(config: Arc<VptzConfig>, backend: Box<dyn StoreBackend>) -> StoreResult<Self> {
        let seed = Document::seeded(&config)?;
        let default_preset = config
            .first_preset()
            .cloned()
            .ok_or_else(|| StoreError::Config("no presets configured".into()))?;

        let (doc, dirty) = match backend.load()? {
            None => (seed, true),
            Some(mut doc) => {
                let before = (doc.presets.len(), doc.framings.len());
                for (cam, ptz) in seed.presets {
                    doc.presets.entry(cam).or_insert(ptz);
                }
                for (key, xyz) in seed.framings {
                    doc.framings.entry(key).or_insert(xyz);
                }
                let dirty = before != (doc.presets.len(), doc.framings.len());
                (doc, dirty)
            }
        };
        if dirty {
            backend.commit(&doc)?;
        }
        info!(
            backend = %backend.describe(),
            cameras = doc.presets.len(),
            framings = doc.framings.len(),
            seeded = dirty,
            "framing store opened"
        );

        Ok(Self {
            config,
            backend,
            doc: Mutex::new(doc),
            commit: Mutex::new(()),
            default_preset,
            policy: RetryPolicy::default(),
        })
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn config(&self) -> &Arc<VptzConfig> {
        &self.config
    }

    /// Current preset of a camera, the first configured preset when unset.
    pub fn get_preset(&self, cam: &CameraId) -> PresetId {
        self.doc
            .lock()
            .presets
            .get(cam)
            .cloned()
            .unwrap_or_else(|| self.default_preset.clone())
    }

    /// Saved geometry, neutral when unset.
    pub fn get_geometry(&self, cam: &CameraId, ptz: &PresetId, vptz: &FramingId) -> Xyz {
        self.doc
            .lock()
            .framings
            .get(&(cam.clone(), ptz.clone(), vptz.clone()))
            .copied()
            .unwrap_or(Xyz::NEUTRAL)
    }

    /// Saved geometry of every configured framing for one (camera, preset).
    pub fn geometries(&self, cam: &CameraId, ptz: &PresetId) -> BTreeMap<FramingId, Xyz> {
        let doc = self.doc.lock();
        geometries_in(&doc, &self.config, cam, ptz)
    }

    /// Copy of the whole document.
    pub fn document(&self) -> Document {
        self.doc.lock().clone()
    }

    /// Run `f` against a private copy of the document and commit the
    /// result atomically. Busy attempts are retried with backoff; `f` may
    /// run more than once and must not have side effects outside `Tx`.
    pub async fn transaction<T, F>(&self, mut f: F) -> StoreResult<T>
    where
        F: FnMut(&mut Tx<'_>) -> StoreResult<T> + Send,
        T: Send,
    {
        let mut retry = 0u32;
        loop {
            match self.attempt(&mut f) {
                Err(e) if e.is_transient() => {
                    if retry >= self.policy.max_retries {
                        warn!(attempts = retry + 1, "store transaction gave up");
                        return Err(StoreError::Exhausted { attempts: retry + 1 });
                    }
                    let delay = self.policy.delay(retry);
                    warn!(
                        retry = retry + 1,
                        delay_ms = delay.as_millis() as u64,
                        "store busy, retrying transaction"
                    );
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
                other => return other,
            }
        }
    }

    fn attempt<T, F>(&self, f: &mut F) -> StoreResult<T>
    where
        F: FnMut(&mut Tx<'_>) -> StoreResult<T>,
    {
        let _writer = self.commit.try_lock().ok_or(StoreError::Busy)?;
        // only holders of the commit lock replace the document
        let current = self.doc.lock().clone();
        let mut working = current.clone();
        let value = f(&mut Tx {
            config: &self.config,
            doc: &mut working,
            default_preset: &self.default_preset,
        })?;
        if working != current {
            self.backend.commit(&working)?;
            *self.doc.lock() = working;
            debug!("store transaction committed");
        }
        Ok(value)
    }

    pub async fn set_preset(&self, cam: &CameraId, ptz: &PresetId) -> StoreResult<()> {
        self.transaction(|tx| {
            tx.set_preset(cam, ptz);
            Ok(())
        })
        .await
    }

    pub async fn remove_preset(&self, cam: &CameraId) -> StoreResult<()> {
        self.transaction(|tx| {
            tx.remove_preset(cam);
            Ok(())
        })
        .await
    }

    pub async fn set_geometry(
        &self,
        cam: &CameraId,
        ptz: &PresetId,
        vptz: &FramingId,
        xyz: Xyz,
    ) -> StoreResult<()> {
        self.transaction(|tx| {
            tx.set_geometry(cam, ptz, vptz, xyz);
            Ok(())
        })
        .await
    }

    pub async fn remove_geometry(
        &self,
        cam: &CameraId,
        ptz: &PresetId,
        vptz: &FramingId,
    ) -> StoreResult<()> {
        self.transaction(|tx| {
            tx.remove_geometry(cam, ptz, vptz);
            Ok(())
        })
        .await
    }
}

fn geometries_in(
    doc: &Document,
    config: &VptzConfig,
    cam: &CameraId,
    ptz: &PresetId,
) -> BTreeMap<FramingId, Xyz> {
    config
        .framings
        .iter()
        .map(|vptz| {
            let xyz = doc
                .framings
                .get(&(cam.clone(), ptz.clone(), vptz.clone()))
                .copied()
                .unwrap_or(Xyz::NEUTRAL);
            (vptz.clone(), xyz)
        })
        .collect()
}

/// View of the document inside a transaction.
pub struct Tx<'a> {
    config: &'a VptzConfig,
    doc: &'a mut Document,
    default_preset: &'a PresetId,
}

impl Tx<'_> {
    pub fn get_preset(&self, cam: &CameraId) -> PresetId {
        self.doc
            .presets
            .get(cam)
            .cloned()
            .unwrap_or_else(|| self.default_preset.clone())
    }

    pub fn set_preset(&mut self, cam: &CameraId, ptz: &PresetId) {
        self.doc.presets.insert(cam.clone(), ptz.clone());
    }

    pub fn remove_preset(&mut self, cam: &CameraId) {
        self.doc.presets.remove(cam);
    }

    pub fn get_geometry(&self, cam: &CameraId, ptz: &PresetId, vptz: &FramingId) -> Xyz {
        self.doc
            .framings
            .get(&(cam.clone(), ptz.clone(), vptz.clone()))
            .copied()
            .unwrap_or(Xyz::NEUTRAL)
    }

    pub fn set_geometry(&mut self, cam: &CameraId, ptz: &PresetId, vptz: &FramingId, xyz: Xyz) {
        self.doc
            .framings
            .insert((cam.clone(), ptz.clone(), vptz.clone()), xyz);
    }

    pub fn remove_geometry(&mut self, cam: &CameraId, ptz: &PresetId, vptz: &FramingId) {
        self.doc
            .framings
            .remove(&(cam.clone(), ptz.clone(), vptz.clone()));
    }

    pub fn geometries(&self, cam: &CameraId, ptz: &PresetId) -> BTreeMap<FramingId, Xyz> {
        geometries_in(self.doc, self.config, cam, ptz)
    }
}

// ── Tests ───────────────────────────────────────────────────────
