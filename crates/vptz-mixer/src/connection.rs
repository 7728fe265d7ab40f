//! Transport links to mixer instances.
//!
//! A [`MixerLink`] accepts command batches; the TCP implementation owns a
//! background task that connects, reconnects after a delay, decodes inbound
//! frames and reports everything as [`TransportEvent`]s on a channel.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use vptz_core::MixerConfig;

use crate::command::CommandBatch;
use crate::error::{MixerError, MixerResult};
use crate::wire::{Frame, FrameDecoder};

/// Events reported by a transport, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connecting,
    Connected,
    Closed,
    Error(String),
    /// Raw tally digit string.
    Tally(String),
    /// Raw XML state document.
    Xml(String),
}

/// A connection handle commands can be sent through.
pub trait MixerLink: Send + Sync {
    /// `host:port` (or another label) of the remote end.
    fn endpoint(&self) -> &str;

    fn is_connected(&self) -> bool;

    /// Queue a batch for transmission, preserving its order.
    fn transmit(&self, batch: CommandBatch) -> MixerResult<()>;

    /// Stop the link. Further transmits fail.
    fn close(&self);
}

/// Reconnect and timeout settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportOptions {
    pub reconnect_delay: Duration,
    pub connect_timeout: Duration,
    pub max_frame_bytes: usize,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self::from(&MixerConfig::default())
    }
}

impl From<&MixerConfig> for TransportOptions {
    fn from(config: &MixerConfig) -> Self {
        Self {
            reconnect_delay: Duration::from_millis(config.reconnect_delay_ms),
            connect_timeout: Duration::from_millis(config.connect_timeout_ms),
            max_frame_bytes: config.max_frame_bytes,
        }
    }
}

// ── TCP transport ───────────────────────────────────────────────

/// Persistent TCP connection to one mixer instance.
pub struct TcpMixerConnection {
    endpoint: String,
    connected: Arc<AtomicBool>,
    outbound: mpsc::UnboundedSender<CommandBatch>,
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TcpMixerConnection {
    /// Start the connection task. Events arrive on the returned receiver.
    pub fn spawn(
        endpoint: impl Into<String>,
        options: TransportOptions,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<TransportEvent>) {
        let endpoint = endpoint.into();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let connected = Arc::new(AtomicBool::new(false));

        let worker = Worker {
            endpoint: endpoint.clone(),
            options,
            connected: connected.clone(),
            events: event_tx,
            outbound: outbound_rx,
            shutdown: shutdown_rx,
        };
        let task = tokio::spawn(worker.run());

        let conn = Arc::new(Self {
            endpoint,
            connected,
            outbound: outbound_tx,
            shutdown: shutdown_tx,
            task: Mutex::new(Some(task)),
        });
        (conn, event_rx)
    }

    /// Close the link and wait for the connection task to finish.
    pub async fn shutdown(&self) {
        self.close();
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!(endpoint = %self.endpoint, error = %e, "mixer transport task failed");
            }
        }
    }
}

impl MixerLink for TcpMixerConnection {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn transmit(&self, batch: CommandBatch) -> MixerResult<()> {
        self.outbound.send(batch).map_err(|_| MixerError::Closed {
            endpoint: self.endpoint.clone(),
        })
    }

    fn close(&self) {
        info!(endpoint = %self.endpoint, "closing mixer connection");
        self.shutdown.send_replace(true);
    }
}

struct Worker {
    endpoint: String,
    options: TransportOptions,
    connected: Arc<AtomicBool>,
    events: mpsc::UnboundedSender<TransportEvent>,
    outbound: mpsc::UnboundedReceiver<CommandBatch>,
    shutdown: watch::Receiver<bool>,
}

impl Worker {
    fn emit(&self, event: TransportEvent) {
        // receiver gone means the session is shutting down
        let _ = self.events.send(event);
    }

    fn stopping(&self) -> bool {
        *self.shutdown.borrow()
    }

    async fn run(mut self) {
        while !self.stopping() {
            self.emit(TransportEvent::Connecting);
            debug!(endpoint = %self.endpoint, "connecting to mixer");

            let attempt = tokio::time::timeout(
                self.options.connect_timeout,
                TcpStream::connect(self.endpoint.as_str()),
            );
            let stream = tokio::select! {
                res = attempt => res,
                _ = self.shutdown.changed() => break,
            };

            match stream {
                Ok(Ok(stream)) => {
                    if let Err(e) = self.serve(stream).await {
                        warn!(endpoint = %self.endpoint, error = %e, "mixer connection failed");
                        self.emit(TransportEvent::Error(e.to_string()));
                    }
                    self.connected.store(false, Ordering::Release);
                    self.emit(TransportEvent::Closed);
                }
                Ok(Err(e)) => {
                    self.emit(TransportEvent::Error(e.to_string()));
                }
                Err(_) => {
                    let e = MixerError::ConnectTimeout {
                        endpoint: self.endpoint.clone(),
                    };
                    self.emit(TransportEvent::Error(e.to_string()));
                }
            }

            if self.stopping() {
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep(self.options.reconnect_delay) => {}
                _ = self.shutdown.changed() => break,
            }
        }
        self.connected.store(false, Ordering::Release);
        debug!(endpoint = %self.endpoint, "mixer transport stopped");
    }

    /// Drive one established connection until it closes.
    async fn serve(&mut self, stream: TcpStream) -> MixerResult<()> {
        // batches queued while disconnected are stale by now
        while self.outbound.try_recv().is_ok() {}

        let (mut reader, mut writer) = stream.into_split();
        let mut decoder = FrameDecoder::with_limit(self.options.max_frame_bytes);
        let mut buf = vec![0u8; 16 * 1024];

        self.connected.store(true, Ordering::Release);
        self.emit(TransportEvent::Connected);

        loop {
            tokio::select! {
                read = reader.read(&mut buf) => {
                    let n = read?;
                    if n == 0 {
                        return Ok(());
                    }
                    decoder.extend(&buf[..n]);
                    self.drain_frames(&mut decoder)?;
                }
                batch = self.outbound.recv() => {
                    let Some(batch) = batch else {
                        return Ok(());
                    };
                    trace!(endpoint = %self.endpoint, commands = batch.len(), "sending batch");
                    writer.write_all(batch.encode().as_bytes()).await?;
                }
                _ = self.shutdown.changed() => {
                    let _ = writer.shutdown().await;
                    return Ok(());
                }
            }
        }
    }

    /// Emit every buffered frame. An oversized frame is fatal for the
    /// connection; other malformed frames are skipped.
    fn drain_frames(&self, decoder: &mut FrameDecoder) -> MixerResult<()> {
        loop {
            match decoder.next_frame() {
                Ok(Some(Frame::Xml(doc))) => self.emit(TransportEvent::Xml(doc)),
                Ok(Some(Frame::Tally(payload))) => self.emit(TransportEvent::Tally(payload)),
                Ok(Some(Frame::Response(line))) => {
                    trace!(endpoint = %self.endpoint, response = %line, "mixer response");
                }
                Ok(None) => return Ok(()),
                Err(e @ MixerError::FrameTooLarge { .. }) => return Err(e),
                Err(e) => {
                    error!(endpoint = %self.endpoint, error = %e, "dropping malformed frame");
                }
            }
        }
    }
}

// ── In-process link ─────────────────────────────────────────────

/// A link that records every transmitted batch instead of sending it.
///
/// Used for tests and for running without a mixer attached.
#[derive(Debug)]
pub struct MemoryLink {
    endpoint: String,
    connected: AtomicBool,
    sent: Mutex<Vec<CommandBatch>>,
}

impl MemoryLink {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            connected: AtomicBool::new(true),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
    }

    /// Batches transmitted so far.
    pub fn batches(&self) -> Vec<CommandBatch> {
        self.sent.lock().clone()
    }

    /// Every transmitted command, flattened.
    pub fn commands(&self) -> Vec<crate::command::MixerCommand> {
        self.sent
            .lock()
            .iter()
            .flat_map(|b| b.iter().cloned())
            .collect()
    }

    /// Take and clear the recorded batches.
    pub fn take(&self) -> Vec<CommandBatch> {
        std::mem::take(&mut *self.sent.lock())
    }
}

impl MixerLink for MemoryLink {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn transmit(&self, batch: CommandBatch) -> MixerResult<()> {
        if !self.is_connected() {
            return Err(MixerError::Closed {
                endpoint: self.endpoint.clone(),
            });
        }
        self.sent.lock().push(batch);
        Ok(())
    }

    fn close(&self) {
        self.set_connected(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::MixerCommand;
    use tokio::io::AsyncBufReadExt;
    use tokio::net::TcpListener;

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<TransportEvent>) -> TransportEvent {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("event timeout")
            .expect("channel closed")
    }

    #[tokio::test]
    async fn test_tcp_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let (conn, mut events) = TcpMixerConnection::spawn(addr, TransportOptions::default());

        let (socket, _) = listener.accept().await.unwrap();
        let (read_half, mut write_half) = socket.into_split();
        let mut lines = tokio::io::BufReader::new(read_half).lines();

        assert_eq!(next_event(&mut events).await, TransportEvent::Connecting);
        assert_eq!(next_event(&mut events).await, TransportEvent::Connected);
        assert!(conn.is_connected());

        conn.transmit(CommandBatch::from(vec![
            MixerCommand::xml(),
            MixerCommand::function("Cut"),
        ]))
        .unwrap();
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "XML");
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "FUNCTION Cut");

        let doc = "<vmix></vmix>";
        write_half
            .write_all(format!("TALLY OK 012\r\nXML {}\r\n{}", doc.len(), doc).as_bytes())
            .await
            .unwrap();
        assert_eq!(next_event(&mut events).await, TransportEvent::Tally("012".into()));
        assert_eq!(next_event(&mut events).await, TransportEvent::Xml(doc.into()));

        conn.shutdown().await;
        assert!(!conn.is_connected());
    }

    #[tokio::test]
    async fn test_connect_failure_reports_error() {
        // bind then drop to get a port nobody listens on
        let addr = {
            let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
            l.local_addr().unwrap().to_string()
        };
        let options = TransportOptions {
            reconnect_delay: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(1),
            ..TransportOptions::default()
        };
        let (conn, mut events) = TcpMixerConnection::spawn(addr, options);
        assert_eq!(next_event(&mut events).await, TransportEvent::Connecting);
        assert!(matches!(next_event(&mut events).await, TransportEvent::Error(_)));
        assert!(!conn.is_connected());
        conn.shutdown().await;
    }

    #[tokio::test]
    async fn test_oversized_xml_drops_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let options = TransportOptions {
            reconnect_delay: Duration::from_secs(60),
            max_frame_bytes: 1024,
            ..TransportOptions::default()
        };
        let (conn, mut events) = TcpMixerConnection::spawn(addr, options);
        let (mut socket, _) = listener.accept().await.unwrap();
        assert_eq!(next_event(&mut events).await, TransportEvent::Connecting);
        assert_eq!(next_event(&mut events).await, TransportEvent::Connected);

        socket.write_all(b"XML 999999999\r\n<vmix>").await.unwrap();
        match next_event(&mut events).await {
            TransportEvent::Error(message) => assert!(message.contains("exceeds"), "{message}"),
            other => panic!("expected error, got {other:?}"),
        }
        assert_eq!(next_event(&mut events).await, TransportEvent::Closed);
        assert!(!conn.is_connected());
        conn.shutdown().await;
    }

    #[test]
    fn test_memory_link_records_batches() {
        let link = MemoryLink::new("memory");
        link.transmit(MixerCommand::function("Cut").into()).unwrap();
        assert_eq!(link.commands().len(), 1);
        link.set_connected(false);
        assert!(link.transmit(MixerCommand::xml().into()).is_err());
        assert_eq!(link.take().len(), 1);
        assert!(link.batches().is_empty());
    }
}
