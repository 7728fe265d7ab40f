//! The control surface: validated operations that mutate the framing cache
//! and the store, emit mixer commands and schedule change notifications.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use vptz_core::{
    compute_path_with, CameraId, CameraScope, CameraState, FramingId, FramingState, PanScale,
    PresetId, Speed, StateSnapshot, VptzConfig, VptzError, Xyz,
};
use vptz_mixer::{geometry_commands, CommandBatch, MixerCommand, SessionManager};
use vptz_store::FramingStore;

use crate::cache::FramingCache;
use crate::error::{ControlError, ControlResult};
use crate::notify::{NotificationSink, Notifier};
use crate::ops::{Adjustment, PanMove, Touched, ZoomMove};
use crate::scheduler::{AnimationRegistry, Debouncer, TickLoop};

type Target = (CameraId, FramingId);

/// Public operations of the virtual PTZ controller.
#[derive(Clone)]
pub struct ControlSurface {
    inner: Arc<Inner>,
}

struct Inner {
    config: Arc<VptzConfig>,
    session: SessionManager,
    store: Arc<FramingStore>,
    cache: RwLock<FramingCache>,
    notifier: Notifier,
    animations: AnimationRegistry<Target>,
    physical_persist: Debouncer<CameraId>,
}

impl ControlSurface {
    pub fn new(
        session: SessionManager,
        store: Arc<FramingStore>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let config = store.config().clone();
        let notifier = Notifier::new(sink, config.timing.notify_window());
        let debounce = Duration::from_millis(config.timing.physical_persist_debounce_ms);
        Self {
            inner: Arc::new(Inner {
                config,
                session,
                store,
                cache: RwLock::new(FramingCache::new()),
                notifier,
                animations: AnimationRegistry::new(),
                physical_persist: Debouncer::new(debounce),
            }),
        }
    }

    /// Seed the cache from the store: every camera's current preset and the
    /// geometry of each framing under it.
    pub fn init(&self) {
        let config = &self.inner.config;
        let mut cache = self.inner.cache.write();
        for cam in &config.cameras {
            let ptz = self.inner.store.get_preset(cam);
            let framings = self.inner.store.geometries(cam, &ptz);
            cache.load_camera(cam, &ptz, &framings);
        }
        info!(cameras = config.cameras.len(), "framing cache seeded");
    }

    pub fn config(&self) -> &Arc<VptzConfig> {
        &self.inner.config
    }

    pub fn session(&self) -> &SessionManager {
        &self.inner.session
    }

    pub fn store(&self) -> &Arc<FramingStore> {
        &self.inner.store
    }

    /// The camera's current physical preset.
    pub fn current_preset(&self, cam: &CameraId) -> PresetId {
        let cached = self.inner.cache.read().preset(cam).cloned();
        cached.unwrap_or_else(|| self.inner.store.get_preset(cam))
    }

    /// Optimistic geometry of a framing.
    pub fn cached_geometry(&self, cam: &CameraId, vptz: &FramingId) -> Xyz {
        self.inner.cache.read().geometry(cam, vptz)
    }

    /// Whether a nudge or drive is running on the framing.
    pub fn animating(&self, cam: &CameraId, vptz: &FramingId) -> bool {
        self.inner
            .animations
            .in_flight(&(cam.clone(), vptz.clone()))
    }

    // ── State snapshot & notification ───────────────────────────

    /// Build the state snapshot. `cached` reads the optimistic cache,
    /// otherwise the store under each camera's current preset.
    pub fn snapshot(&self, cached: bool) -> StateSnapshot {
        let config = &self.inner.config;
        let store = &self.inner.store;
        let program = config.framing_of_input(&self.inner.session.effective_program());
        let preview = config.framing_of_input(&self.inner.session.effective_preview());
        let is_on = |slot: &Option<Target>, cam: &CameraId, vptz: &FramingId| {
            slot.as_ref().is_some_and(|(c, v)| c == cam && v == vptz)
        };

        let cache = self.inner.cache.read();
        let cameras = config
            .cameras
            .iter()
            .map(|cam| {
                let preset = match cache.preset(cam) {
                    Some(ptz) if cached => ptz.clone(),
                    _ => store.get_preset(cam),
                };
                let framings = config
                    .framings
                    .iter()
                    .map(|vptz| {
                        let xyz = if cached {
                            cache.geometry(cam, vptz)
                        } else {
                            store.get_geometry(cam, &preset, vptz)
                        };
                        let state = FramingState::new(
                            xyz,
                            is_on(&program, cam, vptz),
                            is_on(&preview, cam, vptz),
                        );
                        (vptz.clone(), state)
                    })
                    .collect();
                (cam.clone(), CameraState { preset, framings })
            })
            .collect();
        StateSnapshot(cameras)
    }

    /// Queue a change notification for the given cameras.
    pub fn notify(&self, cached: bool, cameras: CameraScope) {
        self.inner
            .notifier
            .notify(self.snapshot(cached), cached, cameras);
    }

    fn geometry_batch(&self, cam: &CameraId, framings: &BTreeMap<FramingId, Xyz>) -> CommandBatch {
        let config = &self.inner.config;
        let scale = config.geometry.pan_scale;
        framings
            .iter()
            .flat_map(|(vptz, xyz)| geometry_commands(&config.framing_input(cam, vptz), *xyz, scale))
            .collect()
    }

    // ── Presets ─────────────────────────────────────────────────

    /// Recall a physical preset and push every framing saved under it.
    pub async fn select_preset(&self, cam: &str, ptz: &str) -> ControlResult<()> {
        let cam = self.inner.config.camera(cam)?;
        let ptz = self.inner.config.preset(ptz)?;
        self.apply_preset(&cam, &ptz).await
    }

    /// [`select_preset`](Self::select_preset) for every camera. One camera
    /// failing does not stop the others; the first error is returned.
    pub async fn select_preset_all(&self, ptz: &str) -> ControlResult<()> {
        let ptz = self.inner.config.preset(ptz)?;
        let mut results = Vec::new();
        for cam in &self.inner.config.cameras {
            results.push(self.apply_preset(cam, &ptz).await);
        }
        first_error("select preset", results)
    }

    async fn apply_preset(&self, cam: &CameraId, ptz: &PresetId) -> ControlResult<()> {
        let config = &self.inner.config;
        let store = &self.inner.store;
        info!(camera = %cam, preset = %ptz, "selecting physical preset");

        store.set_preset(cam, ptz).await?;
        self.inner.cache.write().set_preset(cam, ptz);

        self.inner.session.send_primary(vec![
            MixerCommand::function("PTZMoveToVirtualInputPosition")
                .input(config.preset_input(cam, ptz)),
            MixerCommand::function("PTZUpdateVirtualInput").input(config.camera_input(cam)),
        ]);

        let framings = store
            .transaction(|tx| Ok(tx.geometries(cam, ptz)))
            .await?;
        self.inner.cache.write().load_camera(cam, ptz, &framings);
        self.inner
            .session
            .send_primary(self.geometry_batch(cam, &framings));

        self.notify(false, CameraScope::single(cam.clone()));
        Ok(())
    }

    /// Save the geometry the mixer currently reports into a preset.
    pub async fn store_preset(&self, cam: &str, ptz: &str) -> ControlResult<()> {
        let cam = self.inner.config.camera(cam)?;
        let ptz = self.inner.config.preset(ptz)?;
        self.capture_preset(&cam, &ptz).await
    }

    pub async fn store_preset_all(&self, ptz: &str) -> ControlResult<()> {
        let ptz = self.inner.config.preset(ptz)?;
        let mut results = Vec::new();
        for cam in &self.inner.config.cameras {
            results.push(self.capture_preset(cam, &ptz).await);
        }
        first_error("store preset", results)
    }

    async fn capture_preset(&self, cam: &CameraId, ptz: &PresetId) -> ControlResult<()> {
        let config = &self.inner.config;
        let session = &self.inner.session;
        info!(camera = %cam, preset = %ptz, "storing preset from mixer state");

        session.send_primary(
            MixerCommand::function("PTZUpdateVirtualInput").input(config.preset_input(cam, ptz)),
        );

        let reported: BTreeMap<FramingId, Xyz> = config
            .framings
            .iter()
            .filter_map(|vptz| {
                session
                    .reported_geometry(&config.framing_input(cam, vptz))
                    .filter(Xyz::is_finite)
                    .map(|xyz| (vptz.clone(), xyz.contained()))
            })
            .collect();
        if reported.is_empty() {
            warn!(camera = %cam, "mixer reported no framing geometry to store");
        }

        self.inner
            .store
            .transaction(|tx| {
                for (vptz, xyz) in &reported {
                    tx.set_geometry(cam, ptz, vptz, *xyz);
                }
                Ok(())
            })
            .await?;
        if self.current_preset(cam) == *ptz {
            self.inner.cache.write().load_camera(cam, ptz, &reported);
        }

        self.notify(false, CameraScope::single(cam.clone()));
        Ok(())
    }

    /// Write the calibrated default geometry to every framing of a preset.
    pub async fn reset_preset(&self, cam: &str, ptz: &str) -> ControlResult<()> {
        let cam = self.inner.config.camera(cam)?;
        let ptz = self.inner.config.preset(ptz)?;
        self.write_preset(&cam, &ptz, self.reset_table()).await
    }

    pub async fn reset_preset_all(&self, ptz: &str) -> ControlResult<()> {
        let ptz = self.inner.config.preset(ptz)?;
        let table = self.reset_table();
        let mut results = Vec::new();
        for cam in &self.inner.config.cameras {
            results.push(self.write_preset(cam, &ptz, table.clone()).await);
        }
        first_error("reset preset", results)
    }

    /// Write the neutral geometry to every framing of a preset.
    pub async fn clear_preset(&self, cam: &str, ptz: &str) -> ControlResult<()> {
        let cam = self.inner.config.camera(cam)?;
        let ptz = self.inner.config.preset(ptz)?;
        self.write_preset(&cam, &ptz, self.neutral_table()).await
    }

    pub async fn clear_preset_all(&self, ptz: &str) -> ControlResult<()> {
        let ptz = self.inner.config.preset(ptz)?;
        let table = self.neutral_table();
        let mut results = Vec::new();
        for cam in &self.inner.config.cameras {
            results.push(self.write_preset(cam, &ptz, table.clone()).await);
        }
        first_error("clear preset", results)
    }

    fn reset_table(&self) -> BTreeMap<FramingId, Xyz> {
        let config = &self.inner.config;
        config
            .framings
            .iter()
            .map(|vptz| (vptz.clone(), config.reset_geometry(vptz)))
            .collect()
    }

    fn neutral_table(&self) -> BTreeMap<FramingId, Xyz> {
        self.inner
            .config
            .framings
            .iter()
            .map(|vptz| (vptz.clone(), Xyz::NEUTRAL))
            .collect()
    }

    /// Persist a whole preset; the cache and the mixer only follow when the
    /// preset is the camera's current one.
    async fn write_preset(
        &self,
        cam: &CameraId,
        ptz: &PresetId,
        table: BTreeMap<FramingId, Xyz>,
    ) -> ControlResult<()> {
        debug!(camera = %cam, preset = %ptz, framings = table.len(), "writing preset geometry");
        self.inner
            .store
            .transaction(|tx| {
                for (vptz, xyz) in &table {
                    tx.set_geometry(cam, ptz, vptz, *xyz);
                }
                Ok(())
            })
            .await?;

        if self.current_preset(cam) == *ptz {
            self.inner.cache.write().load_camera(cam, ptz, &table);
            self.inner
                .session
                .send_primary(self.geometry_batch(cam, &table));
        }
        self.notify(false, CameraScope::single(cam.clone()));
        Ok(())
    }

    /// Push every camera's stored geometry back onto the mixer.
    pub async fn restore_to_device(&self) -> ControlResult<()> {
        info!("restoring framing geometry to the mixer");
        for cam in &self.inner.config.cameras {
            let (ptz, framings) = self
                .inner
                .store
                .transaction(|tx| {
                    let ptz = tx.get_preset(cam);
                    let framings = tx.geometries(cam, &ptz);
                    Ok((ptz, framings))
                })
                .await?;
            self.inner.cache.write().load_camera(cam, &ptz, &framings);
            self.inner
                .session
                .send_primary(self.geometry_batch(cam, &framings));
        }
        self.notify(false, CameraScope::All);
        Ok(())
    }

    // ── Physical camera ─────────────────────────────────────────

    /// Move or zoom the physical camera, then (debounced) ask the mixer to
    /// store the new position in the current preset's input.
    pub async fn change_physical_preset(
        &self,
        cam: &str,
        op: &str,
        arg: &str,
        speed: &str,
    ) -> ControlResult<()> {
        let config = &self.inner.config;
        let cam = config.camera(cam)?;
        let adjustment = Adjustment::parse(op, arg)?;
        let speed: Speed = speed.parse()?;

        let geometry = &config.geometry;
        let timing = &config.timing;
        let (start, stop, hold_ms) = match adjustment {
            Adjustment::Pan(PanMove::Reset) => (MixerCommand::function("PTZHome"), None, 0),
            Adjustment::Pan(PanMove::Toward(dir)) => (
                MixerCommand::function(dir.ptz_move()).value(geometry.physical_move.get(speed)),
                Some("PTZMoveStop"),
                timing.physical_pulse_ms,
            ),
            Adjustment::Zoom(ZoomMove::Reset) => (
                MixerCommand::function("PTZZoomOut").value("1.0"),
                Some("PTZZoomStop"),
                timing.physical_zoom_reset_ms,
            ),
            Adjustment::Zoom(ZoomMove::Decrease) => (
                MixerCommand::function("PTZZoomOut").value(geometry.physical_zoom.get(speed)),
                Some("PTZZoomStop"),
                timing.physical_pulse_ms,
            ),
            Adjustment::Zoom(ZoomMove::Increase) => (
                MixerCommand::function("PTZZoomIn").value(geometry.physical_zoom.get(speed)),
                Some("PTZZoomStop"),
                timing.physical_pulse_ms,
            ),
        };

        let ptz = self.current_preset(&cam);
        let input = config.preset_input(&cam, &ptz);
        info!(camera = %cam, preset = %ptz, op, arg, %speed, "moving physical camera");

        let session = &self.inner.session;
        session.send_primary(start.input(input.clone()));
        if hold_ms > 0 {
            tokio::time::sleep(Duration::from_millis(hold_ms)).await;
        }
        if let Some(stop) = stop {
            session.send_primary(MixerCommand::function(stop).input(input.clone()));
        }

        let session = session.clone();
        self.inner.physical_persist.schedule(cam, async move {
            session.send_primary(MixerCommand::function("PTZUpdateVirtualInput").input(input));
        });
        Ok(())
    }

    // ── Virtual framings ────────────────────────────────────────

    /// Timed nudge of a virtual framing. Resolves once the nudge has
    /// finished (or was superseded) and its final state is persisted.
    pub async fn change_virtual_framing(
        &self,
        cam: &str,
        vptz: &str,
        op: &str,
        arg: &str,
        speed: &str,
    ) -> ControlResult<()> {
        let config = self.inner.config.clone();
        let cam = config.camera(cam)?;
        let vptz = config.framing(vptz)?;
        let adjustment = Adjustment::parse(op, arg)?;
        let speed: Speed = speed.parse()?;

        let steps = config.timing.nudge_steps();
        if steps == 0 {
            return Err(VptzError::EmptyPath(steps).into());
        }
        let pan_delta = config.geometry.nudge_pan.get(speed) / steps as f64;
        let zoom_delta = config.geometry.nudge_zoom.get(speed) / steps as f64;
        let (min_zoom, max_zoom) = (config.geometry.min_zoom, config.geometry.max_zoom);
        let scale = config.geometry.pan_scale;
        let input = config.framing_input(&cam, &vptz);
        let touched = adjustment.touches();
        info!(camera = %cam, framing = %vptz, op, arg, %speed, steps, "nudging framing");

        let surface = self.clone();
        let target = (cam.clone(), vptz.clone());
        let on_tick = move |_tick: usize| {
            let (cam, vptz) = &target;
            let (before, after) = {
                let mut cache = surface.inner.cache.write();
                let before = cache.geometry(cam, vptz);
                let after = adjustment.step(before, pan_delta, zoom_delta, min_zoom, max_zoom);
                cache.set_geometry(cam, vptz, after);
                (before, after)
            };
            surface
                .inner
                .session
                .send_primary(nudge_commands(&input, before, after, touched, scale));
            surface.notify(true, CameraScope::single(cam.clone()));
        };

        let (result_tx, result_rx) = oneshot::channel();
        let surface = self.clone();
        let (finish_cam, finish_vptz) = (cam.clone(), vptz.clone());
        let on_finish = move |finish| async move {
            debug!(camera = %finish_cam, framing = %finish_vptz, ?finish, "nudge finished");
            let result = surface.persist_cached(&finish_cam, &finish_vptz).await;
            surface.notify(false, CameraScope::single(finish_cam));
            let _ = result_tx.send(result);
        };

        self.inner.animations.start(
            (cam, vptz),
            TickLoop::new(config.timing.nudge_fps, steps),
            on_tick,
            on_finish,
        );
        result_rx.await.map_err(|_| ControlError::Interrupted)?
    }

    async fn persist_cached(&self, cam: &CameraId, vptz: &FramingId) -> ControlResult<()> {
        let ptz = self.current_preset(cam);
        let xyz = self.cached_geometry(cam, vptz);
        self.inner.store.set_geometry(cam, &ptz, vptz, xyz).await?;
        debug!(camera = %cam, preset = %ptz, framing = %vptz, %xyz, "framing persisted");
        Ok(())
    }

    /// Set a framing's geometry absolutely, without animation.
    pub async fn set_framing_geometry(
        &self,
        cam: &str,
        vptz: &str,
        x: f64,
        y: f64,
        zoom: f64,
    ) -> ControlResult<()> {
        let config = &self.inner.config;
        let cam = config.camera(cam)?;
        let vptz = config.framing(vptz)?;
        let xyz = Xyz::new(x, y, zoom);
        xyz.validate()?;

        let target = (cam.clone(), vptz.clone());
        self.inner.animations.settle(&target).await;

        let ptz = self.current_preset(&cam);
        info!(camera = %cam, preset = %ptz, framing = %vptz, %xyz, "setting framing geometry");
        self.inner.cache.write().set_geometry(&cam, &vptz, xyz);
        self.inner.store.set_geometry(&cam, &ptz, &vptz, xyz).await?;
        self.inner.session.send_primary(geometry_commands(
            &config.framing_input(&cam, &vptz),
            xyz,
            config.geometry.pan_scale,
        ));
        self.notify(false, CameraScope::single(cam));
        Ok(())
    }

    // ── Switching ───────────────────────────────────────────────

    /// Load a framing into preview on the preview-control instance.
    pub fn select_for_preview(&self, cam: &str, vptz: &str) -> ControlResult<()> {
        let config = &self.inner.config;
        let cam = config.camera(cam)?;
        let vptz = config.framing(vptz)?;
        info!(camera = %cam, framing = %vptz, "selecting framing for preview");
        self.inner
            .session
            .send_preview_control(MixerCommand::function("PreviewInput").input(config.framing_input(&cam, &vptz)));
        Ok(())
    }

    /// Switch preview to program immediately.
    pub fn cut(&self) {
        info!("cut");
        self.inner
            .session
            .send_preview_control(MixerCommand::function("Cut"));
    }

    /// Cut to the preview framing while it borrows the program framing's
    /// geometry, then animate it into its own saved geometry.
    ///
    /// Falls back to a plain [`cut`](Self::cut) unless program and preview
    /// are framings of the same camera.
    pub async fn drive(&self, speed: &str) -> ControlResult<()> {
        let speed: Speed = speed.parse()?;
        let config = self.inner.config.clone();
        let session = self.inner.session.clone();

        let program = config.framing_of_input(&session.effective_program());
        let preview = config.framing_of_input(&session.effective_preview());
        let (cam, program_vptz, preview_vptz) = match (program, preview) {
            (Some((pc, pv)), Some((vc, vv))) if pc == vc => (pc, pv, vv),
            (program, preview) => {
                info!(?program, ?preview, "program and preview are not framings of one camera, cutting instead");
                self.cut();
                return Ok(());
            }
        };

        let target = (cam.clone(), preview_vptz.clone());
        self.inner.animations.settle(&target).await;

        let ptz = self.current_preset(&cam);
        let (applied, saved) = self
            .inner
            .store
            .transaction(|tx| {
                Ok((
                    tx.get_geometry(&cam, &ptz, &program_vptz),
                    tx.get_geometry(&cam, &ptz, &preview_vptz),
                ))
            })
            .await?;

        // only contained geometry reaches the mixer
        let applied = applied.contained();
        let duration = config.timing.drive_duration(speed);
        let path = compute_path_with(
            applied,
            saved,
            config.timing.drive_fps as f64,
            duration.as_millis() as f64,
            &config.path_options(),
        );
        if path.is_empty() {
            return Err(VptzError::EmptyPath(0).into());
        }
        info!(
            camera = %cam,
            preset = %ptz,
            program = %program_vptz,
            preview = %preview_vptz,
            %speed,
            steps = path.len(),
            "driving preview into program"
        );

        let input = config.framing_input(&cam, &preview_vptz);
        let scale = config.geometry.pan_scale;

        // borrow the program geometry, cut, then animate; all of it runs as
        // the target's animation so nothing else can touch it meanwhile
        let surface = self.clone();
        let (lead_cam, lead_vptz, lead_input) = (cam.clone(), preview_vptz.clone(), input.clone());
        let settle = Duration::from_millis(config.timing.drive_settle_ms);
        let post_cut = Duration::from_millis(config.timing.drive_post_cut_ms);
        let lead_in = async move {
            surface
                .inner
                .cache
                .write()
                .set_geometry(&lead_cam, &lead_vptz, applied);
            surface
                .inner
                .session
                .send_primary(geometry_commands(&lead_input, applied, scale));
            tokio::time::sleep(settle).await;
            surface.cut();
            tokio::time::sleep(post_cut).await;
        };

        let ticks = path.len();
        let surface = self.clone();
        let (tick_cam, tick_vptz) = target.clone();
        let on_tick = move |i: usize| {
            let Some(xyz) = path.get(i).copied() else {
                return;
            };
            surface
                .inner
                .cache
                .write()
                .set_geometry(&tick_cam, &tick_vptz, xyz);
            surface
                .inner
                .session
                .send_primary(geometry_commands(&input, xyz, scale));
            surface.notify(true, CameraScope::single(tick_cam.clone()));
        };

        let (result_tx, result_rx) = oneshot::channel();
        let surface = self.clone();
        let on_finish = move |finish| async move {
            // the cache holds the last sample that reached the mixer
            let xyz = surface.cached_geometry(&cam, &preview_vptz);
            debug!(camera = %cam, framing = %preview_vptz, ?finish, %xyz, "drive finished");
            let result = surface
                .inner
                .store
                .set_geometry(&cam, &ptz, &preview_vptz, xyz)
                .await
                .map_err(ControlError::from);
            surface.notify(false, CameraScope::single(cam));
            let _ = result_tx.send(result);
        };

        self.inner.animations.start_after(
            target,
            TickLoop::new(config.timing.drive_fps, ticks),
            lead_in,
            on_tick,
            on_finish,
        );
        result_rx.await.map_err(|_| ControlError::Interrupted)?
    }

    /// Stop animations, flush pending notifications and close the mixer links.
    pub fn shutdown(&self) {
        info!("control surface shutting down");
        self.inner.animations.cancel_all();
        self.inner.notifier.flush();
        self.inner.session.shutdown();
    }
}

/// Absolute-value commands for one nudge tick: every component the
/// adjustment drives plus any the clamp moved.
fn nudge_commands(input: &str, before: Xyz, after: Xyz, touched: Touched, scale: PanScale) -> CommandBatch {
    let mut batch = CommandBatch::new();
    if touched.y || before.y != after.y {
        batch.push(
            MixerCommand::function("SetPanY")
                .input(input)
                .value(scale.to_wire(after.y)),
        );
    }
    if touched.x || before.x != after.x {
        batch.push(
            MixerCommand::function("SetPanX")
                .input(input)
                .value(scale.to_wire(after.x)),
        );
    }
    if touched.zoom || before.zoom != after.zoom {
        batch.push(MixerCommand::function("SetZoom").input(input).value(after.zoom));
    }
    batch
}

fn first_error(what: &str, results: Vec<ControlResult<()>>) -> ControlResult<()> {
    let mut first = None;
    for result in results {
        if let Err(e) = result {
            error!(operation = what, error = %e, "camera failed");
            first.get_or_insert(e);
        }
    }
    first.map_or(Ok(()), Err)
}

// ── Tests ───────────────────────────────────────────────────────
