//! # rtmp-audio-core
//!
//! Platform-agnostic live audio streaming core.
//!
//! Owns the streaming session state machine, the capture → encode →
//! transmit pump loop, and the reaction to asynchronous transport events.
//! Platform backends (microphone capture, codec, RTMP client, OS permission
//! prompt) implement the collaborator traits and are injected into a
//! `StreamController`.
//!
//! ## Architecture
//!
//! ```text
//! rtmp-audio-core (this crate)
//! ├── traits/       ← CaptureSource, AudioEncoder, TransportSession, PermissionProvider, StateObserver
//! ├── models/       ← StreamError, StreamState, SessionConfig, Destination, AudioFrame, etc.
//! ├── processing/   ← SampleFifo
//! └── session/      ← StreamController, pump loop, notifier
//! ```

pub mod models;
pub mod processing;
pub mod session;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use models::config::{ControllerOptions, SessionConfig, SUPPORTED_SAMPLE_RATES};
pub use models::destination::{Destination, Scheme, DEFAULT_APPLICATION, DEFAULT_STREAM_KEY};
pub use models::error::StreamError;
pub use models::frame::{AudioFrame, EncodedUnit};
pub use models::session_info::{SessionInfo, SessionStats};
pub use models::state::{StateEvent, StreamState};
pub use processing::sample_fifo::SampleFifo;
pub use session::controller::{Backends, StreamController};
pub use traits::capture_source::{CaptureFactory, CaptureSource};
pub use traits::encoder::{AudioEncoder, EncoderFactory};
pub use traits::observer::{ChannelObserver, StateObserver};
pub use traits::permission::{PermissionCallback, PermissionProvider, PermissionStatus};
pub use traits::transport::{
    EventDisposition, TransportEvent, TransportEventCallback, TransportFactory, TransportSession,
};
