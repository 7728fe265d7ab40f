//! Fire-and-forget command dispatch.

use tracing::{trace, warn};

use crate::command::CommandBatch;
use crate::connection::MixerLink;

/// Send commands through `link` in order, as one batch.
///
/// A missing or disconnected link makes this a logged no-op: exactly one
/// warning naming the unreachable endpoint, never an error. Returns whether
/// the batch was handed to the transport.
pub fn send(link: Option<&dyn MixerLink>, commands: impl Into<CommandBatch>) -> bool {
    let batch = commands.into();
    let link = match link {
        Some(link) if link.is_connected() => link,
        other => {
            let endpoint = other.map(|l| l.endpoint()).unwrap_or("unknown");
            warn!(
                endpoint = %endpoint,
                commands = batch.len(),
                "failed to send command(s): mixer not connected"
            );
            return false;
        }
    };
    if batch.is_empty() {
        return true;
    }
    trace!(endpoint = %link.endpoint(), commands = batch.len(), "queueing mixer batch");
    match link.transmit(batch) {
        Ok(()) => true,
        Err(e) => {
            warn!(endpoint = %link.endpoint(), error = %e, "failed to send command(s)");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::MixerCommand;
    use crate::connection::MemoryLink;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

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

    fn capture_warnings(f: impl FnOnce()) -> String {
        let capture = Capture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let bytes = capture.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_send_preserves_order() {
        let link = MemoryLink::new("a:1");
        let sent = send(
            Some(&link),
            vec![MixerCommand::function("PreviewInput"), MixerCommand::function("Cut")],
        );
        assert!(sent);
        let names: Vec<_> = link.commands().iter().map(|c| c.name().to_string()).collect();
        assert_eq!(names, ["PreviewInput", "Cut"]);
        assert_eq!(link.batches().len(), 1);
    }

    #[test]
    fn test_disconnected_send_warns_once() {
        let link = MemoryLink::new("10.0.0.9:8099");
        link.set_connected(false);
        let out = capture_warnings(|| {
            assert!(!send(Some(&link), MixerCommand::function("Cut")));
        });
        assert_eq!(out.lines().filter(|l| l.contains("WARN")).count(), 1);
        assert!(out.contains("10.0.0.9:8099"));
        assert!(link.batches().is_empty());
    }

    #[test]
    fn test_missing_link_warns_once() {
        let out = capture_warnings(|| {
            assert!(!send(None, vec![MixerCommand::xml(), MixerCommand::xml()]));
        });
        assert_eq!(out.lines().filter(|l| l.contains("WARN")).count(), 1);
        assert!(out.contains("unknown"));
    }
}
