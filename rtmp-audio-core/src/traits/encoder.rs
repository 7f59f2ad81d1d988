use crate::models::config::{ControllerOptions, SessionConfig};
use crate::models::error::StreamError;
use crate::models::frame::{AudioFrame, EncodedUnit};

/// A stateful audio encoder with bounded input and output queues.
///
/// Implementations may buffer or reorder internally, so one queued frame
/// can yield zero, one or several units.
pub trait AudioEncoder: Send {
    /// Queue a frame without blocking.
    ///
    /// Returns `Ok(false)` when no input slot is free; the frame is dropped.
    fn try_queue(&mut self, frame: AudioFrame) -> Result<bool, StreamError>;

    /// Take the next ready unit, if any, without blocking.
    fn dequeue(&mut self) -> Result<Option<EncodedUnit>, StreamError>;

    /// Queue a frame and drain every unit that is ready afterwards.
    fn feed(&mut self, frame: AudioFrame) -> Result<Vec<EncodedUnit>, StreamError> {
        self.try_queue(frame)?;
        self.drain()
    }

    /// Drain every currently ready unit.
    fn drain(&mut self) -> Result<Vec<EncodedUnit>, StreamError> {
        let mut units = Vec::new();
        while let Some(unit) = self.dequeue()? {
            units.push(unit);
        }
        Ok(units)
    }

    /// Encode whatever is still buffered and return the resulting units.
    fn flush(&mut self) -> Result<Vec<EncodedUnit>, StreamError> {
        self.drain()
    }

    /// Stop the codec and release its resources.
    fn stop(&mut self) -> Result<(), StreamError>;
}

/// Allocates a fresh, configured [`AudioEncoder`] for each session.
pub trait EncoderFactory: Send + Sync {
    fn open(
        &self,
        config: &SessionConfig,
        options: &ControllerOptions,
    ) -> Result<Box<dyn AudioEncoder>, StreamError>;
}

impl<F> EncoderFactory for F
where
    F: Fn(&SessionConfig, &ControllerOptions) -> Result<Box<dyn AudioEncoder>, StreamError>
        + Send
        + Sync,
{
    fn open(
        &self,
        config: &SessionConfig,
        options: &ControllerOptions,
    ) -> Result<Box<dyn AudioEncoder>, StreamError> {
        self(config, options)
    }
}
