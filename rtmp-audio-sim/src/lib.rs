//! # rtmp-audio-sim
//!
//! Simulated backends for rtmp-audio-core.
//!
//! Provides:
//! - `ToneCapture` — real-time paced sine generator standing in for a microphone
//! - `PcmPacketizer` — encoder with a bounded input queue and 1024-sample access units
//! - `SimTransport` — handshake-then-publish transport that counts what it is sent
//! - `StaticPermission` — fixed-answer microphone permission
//!
//! ## Usage
//! ```no_run
//! use rtmp_audio_core::{ControllerOptions, StreamController};
//! use rtmp_audio_sim::{sim_backends, SimOptions};
//!
//! let controller = StreamController::new(sim_backends(SimOptions::default()), ControllerOptions::default())?;
//! controller.start("rtmp://localhost/live/test", 44_100, 1, 128_000)?;
//! # Ok::<(), rtmp_audio_core::StreamError>(())
//! ```

pub mod packetizer;
pub mod permissions;
pub mod sim_transport;
pub mod tone_capture;

use std::sync::Arc;

use rtmp_audio_core::models::config::{ControllerOptions, SessionConfig};
use rtmp_audio_core::models::error::StreamError;
use rtmp_audio_core::session::controller::Backends;
use rtmp_audio_core::traits::capture_source::CaptureSource;
use rtmp_audio_core::traits::encoder::AudioEncoder;
use rtmp_audio_core::traits::transport::TransportSession;

pub use packetizer::PcmPacketizer;
pub use permissions::StaticPermission;
pub use sim_transport::{SimTransport, SimTransportOptions, TransportStats};
pub use tone_capture::ToneCapture;

/// Knobs for the whole simulated stack.
#[derive(Debug, Clone, Default)]
pub struct SimOptions {
    pub transport: SimTransportOptions,
    /// Capture reports a device failure after this many frames.
    pub fail_after_frames: Option<u64>,
    pub deny_permission: bool,
}

/// Controller backends wired to the simulated collaborators.
pub fn sim_backends(options: SimOptions) -> Backends {
    let permission = if options.deny_permission {
        StaticPermission::denied()
    } else {
        StaticPermission::granted()
    };
    let transport_options = options.transport;
    let fail_after = options.fail_after_frames;

    Backends {
        capture: Arc::new(move |config: &SessionConfig| {
            let capture = ToneCapture::new(config);
            let capture = match fail_after {
                Some(frames) => capture.fail_after(frames),
                None => capture,
            };
            Ok::<_, StreamError>(Box::new(capture) as Box<dyn CaptureSource>)
        }),
        encoder: Arc::new(|config: &SessionConfig, options: &ControllerOptions| {
            Ok::<_, StreamError>(Box::new(PcmPacketizer::new(config, options)?) as Box<dyn AudioEncoder>)
        }),
        transport: Arc::new(move |_: &SessionConfig| {
            Ok::<_, StreamError>(
                Box::new(SimTransport::new(transport_options.clone())) as Box<dyn TransportSession>
            )
        }),
        permission: Arc::new(permission),
    }
}
