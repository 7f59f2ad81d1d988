use std::time::Duration;

use crate::models::config::SessionConfig;
use crate::models::error::StreamError;
use crate::models::frame::AudioFrame;

/// A live microphone capture handle.
///
/// Owned exclusively by one session's pump loop. Releasing the handle
/// (`stop` followed by drop) is the only cancellation signal it receives.
pub trait CaptureSource: Send {
    /// Begin producing frames.
    fn start(&mut self) -> Result<(), StreamError>;

    /// Pull the next frame, waiting at most `timeout`.
    ///
    /// `Ok(None)` means nothing arrived within the wait. The pump treats
    /// that, an empty frame, or an error as a broken capture path.
    fn read(&mut self, timeout: Duration) -> Result<Option<AudioFrame>, StreamError>;

    /// Stop capturing and release the device.
    fn stop(&mut self) -> Result<(), StreamError>;
}

/// Allocates a fresh [`CaptureSource`] for each session.
pub trait CaptureFactory: Send + Sync {
    fn open(&self, config: &SessionConfig) -> Result<Box<dyn CaptureSource>, StreamError>;
}

impl<F> CaptureFactory for F
where
    F: Fn(&SessionConfig) -> Result<Box<dyn CaptureSource>, StreamError> + Send + Sync,
{
    fn open(&self, config: &SessionConfig) -> Result<Box<dyn CaptureSource>, StreamError> {
        self(config)
    }
}
