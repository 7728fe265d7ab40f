//! Session manager: one or two mixer links and the state derived from them.
//!
//! Per instance the session walks `Disconnected → Connecting → Connected`
//! as reported by the transport; reconnecting is the transport's job. On
//! connect it requests a roster snapshot and subscribes to tally pushes.
//! Tally pushes trigger a roster refresh on every connected instance; roster
//! snapshots replace that instance's roster wholesale.

use parking_lot::{Mutex, RwLock};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use vptz_core::{VptzConfig, Xyz};

use crate::channel;
use crate::command::{CommandBatch, MixerCommand};
use crate::connection::{MixerLink, TransportEvent};
use crate::error::MixerResult;
use crate::instance::Instance;
use crate::state::{LinkState, MixerState};
use crate::tally::Tally;
use crate::xml::{RosterInput, RosterSnapshot};

/// Changes published to session subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LinkChanged(Instance, LinkState),
    TallyChanged,
    RosterChanged(Instance),
    /// Every configured instance has connected since the last cycle.
    AllConnected,
}

/// Receivers of transport events, one per configured instance.
pub type EventReceivers = (
    mpsc::UnboundedReceiver<TransportEvent>,
    Option<mpsc::UnboundedReceiver<TransportEvent>>,
);

/// Owns the mixer links and the roster/tally/active-input caches.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

struct Inner {
    config: Arc<VptzConfig>,
    primary: Arc<dyn MixerLink>,
    secondary: Option<Arc<dyn MixerLink>>,
    state: RwLock<MixerState>,
    connect_cycle: Mutex<BTreeSet<Instance>>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionManager {
    pub fn new(
        config: Arc<VptzConfig>,
        primary: Arc<dyn MixerLink>,
        secondary: Option<Arc<dyn MixerLink>>,
    ) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(Inner {
                config,
                primary,
                secondary,
                state: RwLock::new(MixerState::default()),
                connect_cycle: Mutex::new(BTreeSet::new()),
                events,
            }),
        }
    }

    pub fn config(&self) -> &VptzConfig {
        &self.inner.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    pub fn has_secondary(&self) -> bool {
        self.inner.secondary.is_some()
    }

    /// Instances this session is configured with.
    pub fn instances(&self) -> Vec<Instance> {
        if self.has_secondary() {
            Instance::ALL.to_vec()
        } else {
            vec![Instance::Primary]
        }
    }

    pub fn link(&self, instance: Instance) -> Option<&dyn MixerLink> {
        match instance {
            Instance::Primary => Some(self.inner.primary.as_ref()),
            Instance::Secondary => self.inner.secondary.as_deref(),
        }
    }

    /// Link for geometry and physical camera commands.
    pub fn primary(&self) -> &dyn MixerLink {
        self.inner.primary.as_ref()
    }

    /// Link for preview selection and cuts: the secondary when configured.
    pub fn preview_control(&self) -> &dyn MixerLink {
        self.inner
            .secondary
            .as_deref()
            .unwrap_or(self.inner.primary.as_ref())
    }

    /// Send a batch to the primary instance.
    pub fn send_primary(&self, commands: impl Into<CommandBatch>) -> bool {
        channel::send(Some(self.primary()), commands)
    }

    /// Send a batch to the preview-control instance.
    pub fn send_preview_control(&self, commands: impl Into<CommandBatch>) -> bool {
        channel::send(Some(self.preview_control()), commands)
    }

    // ── Read accessors ──────────────────────────────────────────

    pub fn link_state(&self, instance: Instance) -> LinkState {
        self.inner.state.read().link(instance)
    }

    pub fn roster(&self, instance: Instance) -> Vec<RosterInput> {
        self.inner.state.read().roster(instance)
    }

    pub fn tally(&self, instance: Instance) -> Tally {
        self.inner.state.read().tally(instance).clone()
    }

    /// Instance-tagged `(program, preview)` tally lists.
    pub fn tally_summary(&self) -> (Vec<String>, Vec<String>) {
        let state = self.inner.state.read();
        (state.program_tally(), state.preview_tally())
    }

    pub fn effective_program(&self) -> String {
        self.inner.state.read().effective_program().to_string()
    }

    pub fn effective_preview(&self) -> String {
        self.inner.state.read().effective_preview().to_string()
    }

    /// Geometry the mixer last reported for a virtual-set input.
    pub fn reported_geometry(&self, input: &str) -> Option<Xyz> {
        self.inner.state.read().geometry_of(input)
    }

    // ── Event processing ────────────────────────────────────────

    /// Spawn the event loop over the transports' receivers.
    pub fn spawn(&self, receivers: EventReceivers) -> JoinHandle<()> {
        let session = self.clone();
        tokio::spawn(async move { session.run(receivers).await })
    }

    /// Process transport events until every receiver has closed.
    ///
    /// Events of one instance are handled in arrival order.
    pub async fn run(&self, receivers: EventReceivers) {
        let (mut primary, mut secondary) = receivers;
        let mut primary_open = true;
        let mut secondary_open = secondary.is_some();

        loop {
            tokio::select! {
                event = primary.recv(), if primary_open => match event {
                    Some(event) => self.handle_event(Instance::Primary, event),
                    None => primary_open = false,
                },
                event = recv_optional(&mut secondary), if secondary_open => match event {
                    Some(event) => self.handle_event(Instance::Secondary, event),
                    None => secondary_open = false,
                },
                else => break,
            }
        }
        debug!("mixer session event loop finished");
    }

    /// Handle one transport event. Failures are logged, never propagated.
    pub fn handle_event(&self, instance: Instance, event: TransportEvent) {
        match event {
            TransportEvent::Connecting => {
                debug!(instance = %instance, "connecting");
                self.set_link(instance, LinkState::Connecting);
            }
            TransportEvent::Connected => self.on_connected(instance),
            TransportEvent::Closed => {
                info!(instance = %instance, "connection closed");
                self.set_link(instance, LinkState::Disconnected);
            }
            TransportEvent::Error(message) => {
                warn!(instance = %instance, error = %message, "connection error");
            }
            TransportEvent::Tally(payload) => {
                trace!(instance = %instance, "received tally status");
                if let Err(e) = self.on_tally(instance, &payload) {
                    error!(instance = %instance, error = %e, "ignoring tally status");
                }
            }
            TransportEvent::Xml(doc) => {
                trace!(instance = %instance, bytes = doc.len(), "received XML status");
                if let Err(e) = self.on_xml(instance, &doc) {
                    error!(instance = %instance, error = %e, "ignoring XML status");
                }
            }
        }
    }

    fn set_link(&self, instance: Instance, state: LinkState) {
        self.inner.state.write().set_link(instance, state);
        self.publish(SessionEvent::LinkChanged(instance, state));
    }

    fn on_connected(&self, instance: Instance) {
        info!(instance = %instance, "connection established");
        self.set_link(instance, LinkState::Connected);

        let session = self.clone();
        let settle = Duration::from_millis(self.inner.config.timing.connect_settle_ms);
        tokio::spawn(async move {
            tokio::time::sleep(settle).await;
            channel::send(session.link(instance), MixerCommand::xml());
            channel::send(session.link(instance), MixerCommand::subscribe_tally());
            session.register_connect(instance);
        });
    }

    fn register_connect(&self, instance: Instance) {
        let complete = {
            let mut cycle = self.inner.connect_cycle.lock();
            cycle.insert(instance);
            let all = self.instances().iter().all(|i| cycle.contains(i));
            if all {
                cycle.clear();
            }
            all
        };
        if complete {
            info!("all mixer instances connected");
            self.publish(SessionEvent::AllConnected);
        }
    }

    fn on_tally(&self, instance: Instance, payload: &str) -> MixerResult<()> {
        let tally = Tally::parse(payload)?;
        self.inner.state.write().set_tally(instance, tally);
        self.publish(SessionEvent::TallyChanged);

        for i in self.instances() {
            if let Some(link) = self.link(i).filter(|l| l.is_connected()) {
                channel::send(Some(link), MixerCommand::xml());
            }
        }
        Ok(())
    }

    fn on_xml(&self, instance: Instance, doc: &str) -> MixerResult<()> {
        let snapshot = RosterSnapshot::parse(doc, self.inner.config.geometry.pan_scale)?;
        {
            let mut state = self.inner.state.write();
            state.replace_roster(instance, &snapshot);
            debug!(
                instance = %instance,
                inputs = snapshot.inputs.len(),
                program = %state.effective_program(),
                preview = %state.effective_preview(),
                "roster refreshed"
            );
        }
        self.publish(SessionEvent::RosterChanged(instance));
        Ok(())
    }

    fn publish(&self, event: SessionEvent) {
        // no subscribers is fine
        let _ = self.inner.events.send(event);
    }

    /// Close every link.
    pub fn shutdown(&self) {
        for instance in self.instances() {
            if let Some(link) = self.link(instance) {
                info!(instance = %instance, endpoint = %link.endpoint(), "shutting down mixer link");
                link.close();
            }
        }
    }
}

async fn recv_optional<T>(rx: &mut Option<mpsc::UnboundedReceiver<T>>) -> Option<T> {
    match rx {
        Some(rx) => rx.recv().await,
        None => None,
    }
}
