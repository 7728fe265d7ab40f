//! Forwards session events to the control surface.

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use vptz_core::CameraScope;
use vptz_mixer::SessionEvent;

use crate::surface::ControlSurface;

/// Spawn the bridge: roster refreshes become confirmed notifications for
/// all cameras, and a completed connect cycle restores the stored geometry
/// onto the mixer when `restore_on_connect` is set.
pub fn spawn_bridge(
    surface: ControlSurface,
    events: broadcast::Receiver<SessionEvent>,
) -> JoinHandle<()> {
    tokio::spawn(run_bridge(surface, events))
}

pub async fn run_bridge(surface: ControlSurface, mut events: broadcast::Receiver<SessionEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => handle(&surface, event).await,
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "session bridge lagged, sending full refresh");
                surface.notify(false, CameraScope::All);
            }
            Err(RecvError::Closed) => break,
        }
    }
    debug!("session bridge finished");
}

async fn handle(surface: &ControlSurface, event: SessionEvent) {
    match event {
        SessionEvent::RosterChanged(_) => surface.notify(false, CameraScope::All),
        SessionEvent::AllConnected if surface.config().restore_on_connect => {
            info!("all mixers connected, restoring framings");
            if let Err(e) = surface.restore_to_device().await {
                error!(error = %e, "restoring framings failed");
            }
        }
        SessionEvent::AllConnected | SessionEvent::LinkChanged(..) | SessionEvent::TallyChanged => {}
    }
}
