//! Shared wiring for the integration tests.

use std::io::Write;
use std::sync::{Arc, Mutex};

use vptz_control::{CollectingSink, ControlSurface};
use vptz_core::VptzConfig;
use vptz_mixer::{MemoryLink, MixerLink, SessionManager};
use vptz_store::{FramingStore, MemoryBackend, StoreBackend};

pub struct Rig {
    pub surface: ControlSurface,
    pub primary: Arc<MemoryLink>,
    pub secondary: Option<Arc<MemoryLink>>,
    pub sink: Arc<CollectingSink>,
}

impl Rig {
    pub fn session(&self) -> &SessionManager {
        self.surface.session()
    }

    /// Names of every command sent to the primary instance.
    pub fn primary_names(&self) -> Vec<String> {
        names(&self.primary)
    }

    pub fn secondary_link(&self) -> &MemoryLink {
        self.secondary.as_deref().expect("rig has no secondary")
    }
}

pub fn names(link: &MemoryLink) -> Vec<String> {
    link.commands().iter().map(|c| c.name().to_string()).collect()
}

/// Primary only, default configuration, in-memory store.
pub fn rig() -> Rig {
    rig_with(VptzConfig::default(), false, Box::new(MemoryBackend::new()))
}

pub fn rig_with(config: VptzConfig, with_secondary: bool, backend: Box<dyn StoreBackend>) -> Rig {
    let config = Arc::new(config);
    let primary = Arc::new(MemoryLink::new("mixer-a:8099"));
    let secondary = with_secondary.then(|| Arc::new(MemoryLink::new("mixer-b:8099")));
    let session = SessionManager::new(
        config.clone(),
        primary.clone(),
        secondary.clone().map(|l| l as Arc<dyn MixerLink>),
    );
    let store = Arc::new(FramingStore::open(config, backend).expect("open store"));
    let sink = Arc::new(CollectingSink::new());
    let surface = ControlSurface::new(session, store, sink.clone());
    surface.init();
    Rig {
        surface,
        primary,
        secondary,
        sink,
    }
}

/// A roster document with the given `(number, title)` virtual-set inputs.
pub fn roster_xml(inputs: &[(u32, &str)], active: u32, preview: u32) -> String {
    let mut xml = String::from("<vmix><inputs>");
    for (number, title) in inputs {
        xml.push_str(&format!(
            r#"<input number="{number}" type="VirtualSet" title="{title}"/>"#
        ));
    }
    xml.push_str(&format!(
        "</inputs><active>{active}</active><preview>{preview}</preview></vmix>"
    ));
    xml
}

#[derive(Clone, Default)]
struct Capture(Arc<Mutex<Vec<u8>>>);

impl Write for Capture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Run `f` and return the warning-level log lines it produced.
pub fn capture_warnings(f: impl FnOnce()) -> Vec<String> {
    let capture = Capture::default();
    let writer = capture.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    tracing::subscriber::with_default(subscriber, f);
    let bytes = capture.0.lock().unwrap().clone();
    String::from_utf8(bytes)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}
