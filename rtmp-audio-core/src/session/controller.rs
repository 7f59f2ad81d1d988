use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use chrono::{DateTime, Utc};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::models::config::{ControllerOptions, SessionConfig};
use crate::models::destination::Destination;
use crate::models::error::StreamError;
use crate::models::session_info::{SessionInfo, SessionStats};
use crate::models::state::{StateEvent, StreamState};
use crate::session::notifier::Notifier;
use crate::session::pump::Pump;
use crate::traits::capture_source::{CaptureFactory, CaptureSource};
use crate::traits::encoder::{AudioEncoder, EncoderFactory};
use crate::traits::observer::StateObserver;
use crate::traits::permission::{PermissionProvider, PermissionStatus};
use crate::traits::transport::{
    EventDisposition, TransportEvent, TransportEventCallback, TransportFactory, TransportSession,
};

/// Collaborators injected into a [`StreamController`].
#[derive(Clone)]
pub struct Backends {
    pub capture: Arc<dyn CaptureFactory>,
    pub encoder: Arc<dyn EncoderFactory>,
    pub transport: Arc<dyn TransportFactory>,
    pub permission: Arc<dyn PermissionProvider>,
}

/// Work posted to the control thread by asynchronous sources.
pub(crate) enum ControlEvent {
    Transport { session: Uuid, event: TransportEvent },
    PumpFailed { session: Uuid, error: StreamError },
    Permission { ticket: u64, granted: bool },
    Shutdown,
}

/// Why a session is being torn down.
enum Ending {
    Stopped,
    Closed,
    Failed(StreamError),
}

/// Handles of the live session, acquired in this order: transport,
/// encoder, capture. The pump thread owns capture and encoder.
struct ActiveSession {
    id: Uuid,
    config: SessionConfig,
    transport: Arc<Mutex<Box<dyn TransportSession>>>,
    running: Arc<AtomicBool>,
    pump: Option<thread::JoinHandle<()>>,
}

struct SessionRecord {
    id: Uuid,
    destination: Destination,
    started_at: DateTime<Utc>,
    stats: Arc<Mutex<SessionStats>>,
}

struct PendingStart {
    ticket: u64,
    config: SessionConfig,
}

/// Everything behind the control lock.
struct Core {
    state: StreamState,
    observer: Option<Arc<dyn StateObserver>>,
    pending: Option<PendingStart>,
    next_ticket: u64,
    session: Option<ActiveSession>,
    last_session: Option<SessionRecord>,
}

struct Shared {
    backends: Backends,
    options: ControllerOptions,
    core: Mutex<Core>,
    control_tx: Sender<ControlEvent>,
    notifier: Notifier,
}

/// Streaming session controller.
///
/// Owns the `disconnected → connecting → streaming` state machine, wires
/// capture, encoder and transport together for each session, and tears
/// them down exactly once.
///
/// ```text
/// caller ──start/stop──┐
/// transport events ──┐ │
/// permission result ─┼─┼─→ [control lock] ─→ state ─→ [stream-notify] ─→ observer
/// pump failures ─────┘ │         │
///   (stream-control) ──┘         └─→ [stream-pump]: capture → encoder → transport
/// ```
///
/// Asynchronous sources never touch the state directly; they post to the
/// `stream-control` thread, which applies their effect under the lock.
pub struct StreamController {
    shared: Arc<Shared>,
    control_handle: Option<thread::JoinHandle<()>>,
    notify_handle: Option<thread::JoinHandle<()>>,
}

impl StreamController {
    pub fn new(backends: Backends, options: ControllerOptions) -> Result<Self, StreamError> {
        let (notifier, notify_handle) = Notifier::spawn()?;
        let (control_tx, control_rx) = unbounded();

        let shared = Arc::new(Shared {
            backends,
            options,
            core: Mutex::new(Core {
                state: StreamState::Disconnected,
                observer: None,
                pending: None,
                next_ticket: 0,
                session: None,
                last_session: None,
            }),
            control_tx,
            notifier: notifier.clone(),
        });

        let worker = Arc::clone(&shared);
        let control_handle = match thread::Builder::new()
            .name("stream-control".into())
            .spawn(move || worker.control_loop(control_rx))
        {
            Ok(handle) => handle,
            Err(e) => {
                notifier.shutdown();
                let _ = notify_handle.join();
                return Err(StreamError::Unknown(format!(
                    "failed to spawn control thread: {e}"
                )));
            }
        };

        Ok(Self {
            shared,
            control_handle: Some(control_handle),
            notify_handle: Some(notify_handle),
        })
    }

    /// Request a session.
    ///
    /// Returns once the request is accepted; the transition to `streaming`
    /// is reported through the observer. `Ok(false)` means the request was
    /// refused (a `failed` notification is emitted).
    pub fn start(
        &self,
        destination: &str,
        sample_rate: u32,
        channel_count: u16,
        bitrate: u32,
    ) -> Result<bool, StreamError> {
        let config = SessionConfig::parse(destination, sample_rate, channel_count, bitrate)?;
        self.start_with(config)
    }

    pub fn start_with(&self, config: SessionConfig) -> Result<bool, StreamError> {
        config.validate()?;
        let shared = &self.shared;

        let ticket = {
            let mut core = shared.core.lock();
            if core.state.is_active() || core.pending.is_some() {
                log::debug!("start ignored, session already {}", core.state);
                return Ok(true);
            }

            match shared.backends.permission.status() {
                PermissionStatus::Granted => return Ok(shared.bring_up(&mut core, config)),
                PermissionStatus::Denied => {
                    log::warn!("start refused: {}", StreamError::PermissionDenied);
                    shared.fail_without_session(&mut core);
                    return Ok(false);
                }
                PermissionStatus::Undetermined => {
                    core.next_ticket += 1;
                    let ticket = core.next_ticket;
                    core.pending = Some(PendingStart { ticket, config });
                    ticket
                }
            }
        };

        log::info!("microphone permission undetermined, requesting");
        let tx = shared.control_tx.clone();
        shared.backends.permission.request(Box::new(move |granted| {
            let _ = tx.send(ControlEvent::Permission { ticket, granted });
        }));
        Ok(true)
    }

    /// Tear down the current session, or cancel a start still waiting on
    /// permission. Returns after every handle has been released.
    pub fn stop(&self) -> bool {
        let mut core = self.shared.core.lock();
        if core.pending.take().is_some() {
            log::info!("pending start cancelled");
        }
        if core.session.is_some() {
            self.shared.teardown(&mut core, Ending::Stopped);
        } else {
            log::debug!("stop ignored, no active session");
        }
        true
    }

    pub fn check_permission(&self) -> bool {
        self.shared.backends.permission.status() == PermissionStatus::Granted
    }

    /// Ask the OS for microphone access. The outcome is only visible
    /// through a later [`check_permission`](Self::check_permission).
    pub fn request_permission(&self) {
        self.shared.backends.permission.request(Box::new(|granted| {
            log::info!("microphone permission {}", if granted { "granted" } else { "denied" });
        }));
    }

    pub fn state(&self) -> StreamState {
        self.shared.core.lock().state
    }

    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    /// The active session, or the most recent one.
    pub fn session_info(&self) -> Option<SessionInfo> {
        let core = self.shared.core.lock();
        core.last_session.as_ref().map(|record| SessionInfo {
            id: record.id,
            destination: record.destination.clone(),
            started_at: record.started_at,
            stats: *record.stats.lock(),
        })
    }

    /// Replace the observer. Only transitions after this call reach it.
    pub fn set_observer(&self, observer: Arc<dyn StateObserver>) {
        self.shared.core.lock().observer = Some(observer);
    }

    pub fn clear_observer(&self) {
        self.shared.core.lock().observer = None;
    }
}

impl Drop for StreamController {
    fn drop(&mut self) {
        self.stop();

        let _ = self.shared.control_tx.send(ControlEvent::Shutdown);
        if let Some(handle) = self.control_handle.take() {
            join_unless_current(handle, "control");
        }

        self.shared.notifier.shutdown();
        if let Some(handle) = self.notify_handle.take() {
            join_unless_current(handle, "notifier");
        }
    }
}

/// The last handle may be dropped from an observer callback.
fn join_unless_current(handle: thread::JoinHandle<()>, name: &str) {
    if handle.thread().id() == thread::current().id() {
        log::debug!("{name} thread dropping its own controller, not joining");
        return;
    }
    if handle.join().is_err() {
        log::error!("{name} thread panicked");
    }
}

impl Shared {
    fn control_loop(&self, rx: Receiver<ControlEvent>) {
        for event in rx {
            match event {
                ControlEvent::Transport { session, event } => self.on_transport_event(session, event),
                ControlEvent::PumpFailed { session, error } => {
                    let mut core = self.core.lock();
                    if is_current(&core, session) {
                        self.teardown(&mut core, Ending::Failed(error));
                    }
                }
                ControlEvent::Permission { ticket, granted } => self.on_permission(ticket, granted),
                ControlEvent::Shutdown => break,
            }
        }
        log::debug!("stream control exited");
    }

    fn on_transport_event(&self, session: Uuid, event: TransportEvent) {
        let mut core = self.core.lock();
        if !is_current(&core, session) {
            log::debug!("ignoring {event:?} from stale session {session}");
            return;
        }

        match event.disposition() {
            EventDisposition::Ignore => log::debug!("transport: {event:?}"),
            EventDisposition::Publish => {
                let Some(active) = core.session.as_ref() else {
                    return;
                };
                let stream_key = active.config.destination.stream_key.clone();
                log::info!("connected, publishing {stream_key}");
                let published = active.transport.lock().publish(&stream_key);
                if let Err(e) = published {
                    self.teardown(&mut core, Ending::Failed(e));
                }
            }
            EventDisposition::Streaming => {
                if core.state == StreamState::Connecting {
                    self.transition(&mut core, StreamState::Streaming);
                }
            }
            EventDisposition::Close => {
                log::info!("transport closed: {event:?}");
                self.teardown(&mut core, Ending::Closed);
            }
            EventDisposition::Fail(error) => self.teardown(&mut core, Ending::Failed(error)),
        }
    }

    fn on_permission(&self, ticket: u64, granted: bool) {
        let mut core = self.core.lock();
        let config = match core.pending.take() {
            Some(pending) if pending.ticket == ticket => pending.config,
            other => {
                core.pending = other;
                log::debug!("ignoring stale permission result {ticket}");
                return;
            }
        };

        if granted {
            self.bring_up(&mut core, config);
        } else {
            log::warn!("start refused: {}", StreamError::PermissionDenied);
            self.fail_without_session(&mut core);
        }
    }

    /// `Disconnected → Connecting`, then acquire every handle. On failure
    /// whatever was acquired is released and the session ends as `failed`.
    fn bring_up(&self, core: &mut Core, config: SessionConfig) -> bool {
        let id = Uuid::new_v4();
        log::info!("starting session {id} to {}", config.destination);
        self.transition(core, StreamState::Connecting);

        match self.acquire(id, &config) {
            Ok((session, stats)) => {
                core.last_session = Some(SessionRecord {
                    id,
                    destination: config.destination.clone(),
                    started_at: Utc::now(),
                    stats,
                });
                core.session = Some(session);
                true
            }
            Err(e) => {
                log::error!("session {id} failed to start: {e}");
                self.transition(core, StreamState::Failed);
                self.transition(core, StreamState::Disconnected);
                false
            }
        }
    }

    fn acquire(
        &self,
        id: Uuid,
        config: &SessionConfig,
    ) -> Result<(ActiveSession, Arc<Mutex<SessionStats>>), StreamError> {
        let backends = &self.backends;

        let mut transport = backends.transport.open(config)?;
        let tx = self.control_tx.clone();
        let events: TransportEventCallback = Arc::new(move |event| {
            let _ = tx.send(ControlEvent::Transport { session: id, event });
        });
        if let Err(e) = transport.connect(&config.destination, events) {
            close_transport(transport.as_mut());
            return Err(e);
        }

        let mut encoder = match backends.encoder.open(config, &self.options) {
            Ok(encoder) => encoder,
            Err(e) => {
                close_transport(transport.as_mut());
                return Err(e);
            }
        };

        let mut capture = match backends.capture.open(config) {
            Ok(capture) => capture,
            Err(e) => {
                stop_encoder(encoder.as_mut());
                close_transport(transport.as_mut());
                return Err(e);
            }
        };
        if let Err(e) = capture.start() {
            stop_capture(capture.as_mut());
            stop_encoder(encoder.as_mut());
            close_transport(transport.as_mut());
            return Err(e);
        }

        let transport = Arc::new(Mutex::new(transport));
        let running = Arc::new(AtomicBool::new(true));
        let stats = Arc::new(Mutex::new(SessionStats::default()));

        // A failed spawn drops the pump along with capture and encoder.
        let pump = Pump {
            session: id,
            capture,
            encoder,
            transport: Arc::clone(&transport),
            running: Arc::clone(&running),
            stats: Arc::clone(&stats),
            events: self.control_tx.clone(),
            capture_timeout: self.options.capture_timeout,
        }
        .spawn();
        let pump = match pump {
            Ok(handle) => handle,
            Err(e) => {
                close_transport(transport.lock().as_mut());
                return Err(e);
            }
        };

        let session = ActiveSession {
            id,
            config: config.clone(),
            transport,
            running,
            pump: Some(pump),
        };
        Ok((session, stats))
    }

    /// Release the session's handles, then report the outcome. Runs at most
    /// once per session: whoever takes `core.session` owns the teardown.
    fn teardown(&self, core: &mut Core, ending: Ending) {
        let Some(mut session) = core.session.take() else {
            return;
        };
        log::info!("tearing down session {}", session.id);

        session.running.store(false, Ordering::Release);
        if let Some(pump) = session.pump.take() {
            if pump.join().is_err() {
                log::error!("pump thread for session {} panicked", session.id);
            }
        }
        close_transport(session.transport.lock().as_mut());

        match ending {
            Ending::Stopped | Ending::Closed => {
                self.transition(core, StreamState::Disconnected);
            }
            Ending::Failed(error) => {
                log::error!("session {} failed: {error}", session.id);
                self.transition(core, StreamState::Failed);
                self.transition(core, StreamState::Disconnected);
            }
        }
    }

    fn fail_without_session(&self, core: &mut Core) {
        self.transition(core, StreamState::Failed);
        self.transition(core, StreamState::Disconnected);
    }

    /// The only place state changes and notifications originate.
    fn transition(&self, core: &mut Core, next: StreamState) {
        if core.state == next {
            return;
        }
        log::info!("stream state {} → {}", core.state, next);
        core.state = next;
        self.notifier.post(core.observer.clone(), StateEvent::new(next));
    }
}

fn is_current(core: &Core, session: Uuid) -> bool {
    core.session.as_ref().is_some_and(|s| s.id == session)
}

fn close_transport(transport: &mut dyn TransportSession) {
    if let Err(e) = transport.close() {
        log::warn!("failed to close transport: {e}");
    }
}

fn stop_encoder(encoder: &mut dyn AudioEncoder) {
    if let Err(e) = encoder.stop() {
        log::warn!("failed to stop encoder: {e}");
    }
}

fn stop_capture(capture: &mut dyn CaptureSource) {
    if let Err(e) = capture.stop() {
        log::warn!("failed to stop capture: {e}");
    }
}
