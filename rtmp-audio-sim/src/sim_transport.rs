//! Simulated handshake-then-publish transport.
//!
//! Mimics an RTMP client: `connect` starts the handshake on a background
//! thread and reports `NetConnection.Connect.Success` when done, `publish`
//! answers with `NetStream.Publish.Start` or `NetStream.Publish.BadName`.
//! Units are counted instead of being written to a socket.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rtmp_audio_core::models::destination::Destination;
use rtmp_audio_core::models::error::StreamError;
use rtmp_audio_core::models::frame::EncodedUnit;
use rtmp_audio_core::traits::transport::{TransportEvent, TransportEventCallback, TransportSession};

/// Behavior knobs for [`SimTransport`].
#[derive(Debug, Clone, Default)]
pub struct SimTransportOptions {
    /// Time the simulated handshake takes.
    pub connect_delay: Duration,

    /// Stream key the simulated server refuses to publish.
    pub reject_key: Option<String>,
}

/// Delivery counters, readable while the transport is in use.
#[derive(Debug, Default)]
pub struct TransportStats {
    pub units_sent: AtomicU64,
    pub bytes_sent: AtomicU64,
    /// Units handed over before publishing started.
    pub units_dropped: AtomicU64,
}

pub struct SimTransport {
    options: SimTransportOptions,
    events: Option<TransportEventCallback>,
    connected: Arc<AtomicBool>,
    cancel: Arc<AtomicBool>,
    handshake: Option<thread::JoinHandle<()>>,
    published: bool,
    closed: bool,
    stats: Arc<TransportStats>,
}

impl SimTransport {
    pub fn new(options: SimTransportOptions) -> Self {
        Self {
            options,
            events: None,
            connected: Arc::new(AtomicBool::new(false)),
            cancel: Arc::new(AtomicBool::new(false)),
            handshake: None,
            published: false,
            closed: false,
            stats: Arc::new(TransportStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<TransportStats> {
        Arc::clone(&self.stats)
    }

    fn emit_status(&self, code: &str) {
        let (Some(events), Some(event)) = (&self.events, TransportEvent::from_status_code(code)) else {
            return;
        };
        events(event);
    }

    fn stop_handshake(&mut self) {
        self.cancel.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handshake.take() {
            let _ = handle.join();
        }
    }
}

impl TransportSession for SimTransport {
    fn connect(
        &mut self,
        destination: &Destination,
        events: TransportEventCallback,
    ) -> Result<(), StreamError> {
        if self.events.is_some() {
            return Err(StreamError::transport("already connecting"));
        }
        log::info!("sim transport: connecting to {}", destination.tc_url());

        events(TransportEvent::ConnectionStarted);
        self.events = Some(Arc::clone(&events));

        let connected = Arc::clone(&self.connected);
        let cancel = Arc::clone(&self.cancel);
        let delay = self.options.connect_delay;

        let handle = thread::Builder::new()
            .name("sim-rtmp-handshake".into())
            .spawn(move || {
                let deadline = Instant::now() + delay;
                while Instant::now() < deadline {
                    if cancel.load(Ordering::SeqCst) {
                        return;
                    }
                    thread::sleep(Duration::from_millis(5).min(delay));
                }
                if cancel.load(Ordering::SeqCst) {
                    return;
                }
                connected.store(true, Ordering::SeqCst);
                if let Some(event) = TransportEvent::from_status_code("NetConnection.Connect.Success") {
                    events(event);
                }
            })
            .map_err(|e| StreamError::transport(format!("failed to spawn handshake thread: {e}")))?;

        self.handshake = Some(handle);
        Ok(())
    }

    fn publish(&mut self, stream_key: &str) -> Result<(), StreamError> {
        if self.closed || !self.connected.load(Ordering::SeqCst) {
            return Err(StreamError::transport("publish before connect"));
        }

        if self.options.reject_key.as_deref() == Some(stream_key) {
            log::warn!("sim transport: rejecting stream key {stream_key}");
            self.emit_status("NetStream.Publish.BadName");
            return Ok(());
        }

        log::info!("sim transport: publishing {stream_key}");
        self.published = true;
        self.emit_status("NetStream.Publish.Start");
        Ok(())
    }

    fn send(&mut self, unit: EncodedUnit) -> Result<(), StreamError> {
        if self.closed {
            return Err(StreamError::transport("send after close"));
        }
        if !self.published {
            self.stats.units_dropped.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        }
        self.stats.units_sent.fetch_add(1, Ordering::Relaxed);
        self.stats.bytes_sent.fetch_add(unit.len() as u64, Ordering::Relaxed);
        Ok(())
    }

    fn close(&mut self) -> Result<(), StreamError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.stop_handshake();

        if self.published {
            self.emit_status("NetStream.Unpublish.Success");
        }
        if self.connected.load(Ordering::SeqCst) {
            self.emit_status("NetConnection.Connect.Closed");
        }
        log::info!(
            "sim transport: closed after {} units ({} bytes)",
            self.stats.units_sent.load(Ordering::Relaxed),
            self.stats.bytes_sent.load(Ordering::Relaxed)
        );
        Ok(())
    }
}

impl Drop for SimTransport {
    fn drop(&mut self) {
        self.stop_handshake();
    }
}
