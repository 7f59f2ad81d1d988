use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::models::error::StreamError;
use crate::models::frame::EncodedUnit;
use crate::models::session_info::SessionStats;
use crate::session::controller::ControlEvent;
use crate::traits::capture_source::CaptureSource;
use crate::traits::encoder::AudioEncoder;
use crate::traits::transport::TransportSession;

/// The capture → encode → transmit loop of one session.
///
/// Owns the capture source and the encoder outright and releases both
/// before its thread exits. The transport is shared with the controller,
/// which closes it after joining this thread.
///
/// ```text
/// [CaptureSource] → read(timeout) → [AudioEncoder] → dequeue* → [TransportSession]
///                                    (drop if full)   (payload only)
/// ```
pub(crate) struct Pump {
    pub(crate) session: Uuid,
    pub(crate) capture: Box<dyn CaptureSource>,
    pub(crate) encoder: Box<dyn AudioEncoder>,
    pub(crate) transport: Arc<Mutex<Box<dyn TransportSession>>>,
    pub(crate) running: Arc<AtomicBool>,
    pub(crate) stats: Arc<Mutex<SessionStats>>,
    pub(crate) events: Sender<ControlEvent>,
    pub(crate) capture_timeout: Duration,
}

impl Pump {
    pub(crate) fn spawn(self) -> Result<thread::JoinHandle<()>, StreamError> {
        thread::Builder::new()
            .name("stream-pump".into())
            .spawn(move || self.run())
            .map_err(|e| StreamError::Unknown(format!("failed to spawn pump thread: {e}")))
    }

    fn run(mut self) {
        let session = self.session;
        let events = self.events.clone();

        let result = panic::catch_unwind(AssertUnwindSafe(|| self.pump()))
            .unwrap_or_else(|_| Err(StreamError::Unknown("pump loop panicked".into())));

        // Runs on every exit, panics included.
        self.release(result.is_ok());

        let error = match result {
            Ok(()) => {
                log::debug!("pump for session {session} finished");
                return;
            }
            Err(e) => e,
        };

        log::error!("pump for session {session} failed: {error}");
        if events.send(ControlEvent::PumpFailed { session, error }).is_err() {
            log::debug!("controller gone, pump failure not reported");
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn pump(&mut self) -> Result<(), StreamError> {
        while self.is_running() {
            let read = self.capture.read(self.capture_timeout);

            // A stop() racing the read releases the device under us.
            if !self.is_running() {
                break;
            }

            let frame = match read {
                Ok(Some(frame)) if !frame.is_empty() => frame,
                Ok(Some(_)) => return Err(StreamError::capture("capture returned an empty buffer")),
                Ok(None) => {
                    return Err(StreamError::capture(format!(
                        "no audio within {:?}",
                        self.capture_timeout
                    )))
                }
                Err(e) => return Err(e),
            };

            self.stats.lock().frames_captured += 1;

            if !self.encoder.try_queue(frame)? {
                self.stats.lock().frames_dropped += 1;
                log::trace!("encoder input full, frame dropped");
            }

            while let Some(unit) = self.encoder.dequeue()? {
                self.transmit(unit)?;
            }
        }
        Ok(())
    }

    fn transmit(&mut self, unit: EncodedUnit) -> Result<(), StreamError> {
        if !unit.is_payload() {
            self.stats.lock().units_discarded += 1;
            log::trace!("discarding non-payload unit ({} bytes, pts {})", unit.len(), unit.pts_us);
            return Ok(());
        }

        let bytes = unit.len() as u64;
        self.transport.lock().send(unit)?;

        let mut stats = self.stats.lock();
        stats.units_sent += 1;
        stats.bytes_sent += bytes;
        Ok(())
    }

    /// Release capture, then the encoder. On a clean exit whatever the
    /// encoder still buffers is sent first. Each step is isolated so a
    /// panicking collaborator cannot skip the ones after it.
    fn release(&mut self, clean: bool) {
        guarded("capture stop", || {
            if let Err(e) = self.capture.stop() {
                log::warn!("failed to stop capture: {e}");
            }
        });

        if clean {
            guarded("encoder flush", || match self.encoder.flush() {
                Ok(units) => {
                    for unit in units {
                        if let Err(e) = self.transmit(unit) {
                            log::debug!("dropping flushed units: {e}");
                            break;
                        }
                    }
                }
                Err(e) => log::warn!("failed to flush encoder: {e}"),
            });
        }

        guarded("encoder stop", || {
            if let Err(e) = self.encoder.stop() {
                log::warn!("failed to stop encoder: {e}");
            }
        });
    }
}

fn guarded(step: &str, f: impl FnOnce()) {
    if panic::catch_unwind(AssertUnwindSafe(f)).is_err() {
        log::error!("{step} panicked during release");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    use crossbeam_channel::unbounded;

    use super::*;
    use crate::models::destination::Destination;
    use crate::models::frame::AudioFrame;
    use crate::traits::transport::TransportEventCallback;

    /// What goes wrong, and on which capture read.
    #[derive(Clone, Copy)]
    enum Fault {
        CaptureError(usize),
        EmptyFrame(usize),
        NoAudio(usize),
        EncoderPanic,
    }

    struct Capture {
        reads: usize,
        fault: Option<Fault>,
        stopped: Arc<AtomicUsize>,
    }

    impl CaptureSource for Capture {
        fn start(&mut self) -> Result<(), StreamError> {
            Ok(())
        }

        fn read(&mut self, _timeout: Duration) -> Result<Option<AudioFrame>, StreamError> {
            self.reads += 1;
            match self.fault {
                Some(Fault::CaptureError(n)) if n == self.reads => {
                    return Err(StreamError::capture("device unplugged"));
                }
                Some(Fault::EmptyFrame(n)) if n == self.reads => {
                    return Ok(Some(AudioFrame::new(Vec::new(), self.reads as u64 * 1_000)));
                }
                Some(Fault::NoAudio(n)) if n == self.reads => return Ok(None),
                _ => {}
            }
            thread::sleep(Duration::from_millis(1));
            Ok(Some(AudioFrame::new(vec![1; 64], self.reads as u64 * 1_000)))
        }

        fn stop(&mut self) -> Result<(), StreamError> {
            self.stopped.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Accepts every other frame; each accepted frame yields a config unit
    /// followed by two payload units.
    struct Encoder {
        queued: Vec<i64>,
        pending: Vec<EncodedUnit>,
        calls: usize,
        panic_on_queue: bool,
        stopped: Arc<AtomicUsize>,
    }

    impl AudioEncoder for Encoder {
        fn try_queue(&mut self, frame: AudioFrame) -> Result<bool, StreamError> {
            self.calls += 1;
            if self.panic_on_queue {
                panic!("codec crashed");
            }
            if self.calls % 2 == 0 {
                return Ok(false);
            }
            self.queued.push(frame.timestamp_us as i64);
            Ok(true)
        }

        fn dequeue(&mut self) -> Result<Option<EncodedUnit>, StreamError> {
            if self.pending.is_empty() {
                if let Some(pts) = self.queued.pop() {
                    self.pending.push(EncodedUnit::new(vec![9; 4], pts + 1));
                    self.pending.push(EncodedUnit::new(vec![9; 4], pts));
                    self.pending.push(EncodedUnit::new(vec![0; 2], 0));
                }
            }
            Ok(self.pending.pop())
        }

        fn flush(&mut self) -> Result<Vec<EncodedUnit>, StreamError> {
            Ok(vec![EncodedUnit::new(vec![7; 8], i64::MAX)])
        }

        fn stop(&mut self) -> Result<(), StreamError> {
            self.stopped.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct Transport {
        sent: Arc<Mutex<Vec<EncodedUnit>>>,
    }

    impl TransportSession for Transport {
        fn connect(&mut self, _: &Destination, _: TransportEventCallback) -> Result<(), StreamError> {
            Ok(())
        }

        fn publish(&mut self, _: &str) -> Result<(), StreamError> {
            Ok(())
        }

        fn send(&mut self, unit: EncodedUnit) -> Result<(), StreamError> {
            self.sent.lock().push(unit);
            Ok(())
        }

        fn close(&mut self) -> Result<(), StreamError> {
            Ok(())
        }
    }

    struct Harness {
        pump: Option<Pump>,
        session: Uuid,
        running: Arc<AtomicBool>,
        stats: Arc<Mutex<SessionStats>>,
        sent: Arc<Mutex<Vec<EncodedUnit>>>,
        capture_stops: Arc<AtomicUsize>,
        encoder_stops: Arc<AtomicUsize>,
        events: crossbeam_channel::Receiver<ControlEvent>,
    }

    fn harness(fault: Option<Fault>) -> Harness {
        let running = Arc::new(AtomicBool::new(true));
        let stats = Arc::new(Mutex::new(SessionStats::default()));
        let transport = Transport::default();
        let sent = Arc::clone(&transport.sent);
        let capture_stops = Arc::new(AtomicUsize::new(0));
        let encoder_stops = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = unbounded();

        let session = Uuid::new_v4();
        let pump = Pump {
            session,
            capture: Box::new(Capture {
                reads: 0,
                fault,
                stopped: Arc::clone(&capture_stops),
            }),
            encoder: Box::new(Encoder {
                queued: Vec::new(),
                pending: Vec::new(),
                calls: 0,
                panic_on_queue: matches!(fault, Some(Fault::EncoderPanic)),
                stopped: Arc::clone(&encoder_stops),
            }),
            transport: Arc::new(Mutex::new(Box::new(transport))),
            running: Arc::clone(&running),
            stats: Arc::clone(&stats),
            events: tx,
            capture_timeout: Duration::from_millis(50),
        };

        Harness {
            pump: Some(pump),
            session,
            running,
            stats,
            sent,
            capture_stops,
            encoder_stops,
            events: rx,
        }
    }

    impl Harness {
        fn spawn(&mut self) -> thread::JoinHandle<()> {
            self.pump.take().unwrap().spawn().unwrap()
        }

        /// Run the pump until it exits on its own.
        fn run(&mut self) {
            self.spawn().join().unwrap();
        }
    }

    fn expect_failure(h: &Harness) -> StreamError {
        let error = match h.events.recv_timeout(Duration::from_secs(1)).unwrap() {
            ControlEvent::PumpFailed { session, error } => {
                assert_eq!(session, h.session);
                error
            }
            _ => panic!("expected a pump failure"),
        };
        assert!(h.events.try_recv().is_err());
        assert_eq!(h.capture_stops.load(Ordering::SeqCst), 1);
        assert_eq!(h.encoder_stops.load(Ordering::SeqCst), 1);
        error
    }

    #[test]
    fn full_encoder_input_drops_frame_and_keeps_capturing() {
        let mut h = harness(None);
        let handle = h.spawn();

        let deadline = Instant::now() + Duration::from_secs(2);
        while h.stats.lock().frames_captured < 20 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        h.running.store(false, Ordering::Release);
        handle.join().unwrap();

        let stats = *h.stats.lock();
        assert!(stats.frames_captured >= 20);
        assert_eq!(stats.frames_dropped, stats.frames_captured / 2);
        // Two payload units and one config unit per accepted frame, plus the flush.
        let accepted = stats.frames_captured - stats.frames_dropped;
        assert_eq!(stats.units_sent, accepted * 2 + 1);
        assert_eq!(stats.units_discarded, accepted);
        assert_eq!(stats.bytes_sent, accepted * 8 + 8);

        assert!(h.sent.lock().iter().all(EncodedUnit::is_payload));
        assert_eq!(h.capture_stops.load(Ordering::SeqCst), 1);
        assert_eq!(h.encoder_stops.load(Ordering::SeqCst), 1);
        assert!(h.events.try_recv().is_err());
    }

    #[test]
    fn capture_failure_is_reported_once_and_releases_handles() {
        let mut h = harness(Some(Fault::CaptureError(5)));
        h.run();

        assert!(matches!(expect_failure(&h), StreamError::CaptureFailure(_)));
        // No flush on a failed exit.
        assert!(h.sent.lock().iter().all(|u| u.pts_us != i64::MAX));
        assert_eq!(h.stats.lock().frames_captured, 4);
    }

    #[test]
    fn stopped_before_first_read_touches_nothing() {
        let mut h = harness(None);
        h.running.store(false, Ordering::Release);
        h.run();

        assert_eq!(h.stats.lock().frames_captured, 0);
        assert_eq!(h.capture_stops.load(Ordering::SeqCst), 1);
        assert_eq!(h.encoder_stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn empty_capture_buffer_is_fatal() {
        let mut h = harness(Some(Fault::EmptyFrame(3)));
        h.run();

        assert!(matches!(expect_failure(&h), StreamError::CaptureFailure(_)));
        assert_eq!(h.stats.lock().frames_captured, 2);
    }

    #[test]
    fn capture_timeout_is_fatal() {
        let mut h = harness(Some(Fault::NoAudio(1)));
        h.run();

        assert!(matches!(expect_failure(&h), StreamError::CaptureFailure(_)));
        assert_eq!(h.stats.lock().frames_captured, 0);
        assert!(h.sent.lock().is_empty());
    }

    #[test]
    fn panicking_encoder_still_releases_handles() {
        let mut h = harness(Some(Fault::EncoderPanic));
        h.run();

        assert!(matches!(expect_failure(&h), StreamError::Unknown(_)));
        assert_eq!(h.stats.lock().frames_captured, 1);
        assert!(h.sent.lock().is_empty());
    }
}
