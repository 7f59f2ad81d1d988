use std::sync::Arc;

use crate::models::config::SessionConfig;
use crate::models::destination::Destination;
use crate::models::error::StreamError;
use crate::models::frame::EncodedUnit;

/// Asynchronous status notification from a transport session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    ConnectionStarted,
    /// Handshake and connect completed; publishing has not started.
    Connected,
    AuthSucceeded,
    /// The server accepted the publish request.
    PublishStarted,
    BitrateChanged(u64),
    ConnectionClosed,
    UnpublishSucceeded,
    ConnectionFailed(String),
    /// The server refused the stream name.
    PublishRejected(String),
    AuthFailed,
    IoError(String),
}

/// What the controller does in response to a [`TransportEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventDisposition {
    /// No state change and no teardown.
    Ignore,
    /// Connected: request publishing of the stream key.
    Publish,
    /// Publishing started: enter `Streaming`.
    Streaming,
    /// Graceful close: tear down into `Disconnected`.
    Close,
    /// Tear down through `Failed`.
    Fail(StreamError),
}

/// Invoked by a transport for every status notification.
///
/// May be called from any thread, including from inside `connect`,
/// `publish` or `close`.
pub type TransportEventCallback = Arc<dyn Fn(TransportEvent) + Send + Sync + 'static>;

impl TransportEvent {
    /// Map an RTMP `NetStatus` code to an event.
    pub fn from_status_code(code: &str) -> Option<Self> {
        let event = match code {
            "NetConnection.Connect.Success" => Self::Connected,
            "NetStream.Publish.Start" => Self::PublishStarted,
            "NetConnection.Connect.Closed" => Self::ConnectionClosed,
            "NetStream.Unpublish.Success" => Self::UnpublishSucceeded,
            "NetConnection.Connect.Failed" => Self::ConnectionFailed(code.to_string()),
            "NetConnection.Connect.Rejected" => Self::AuthFailed,
            "NetStream.Publish.BadName" => Self::PublishRejected(code.to_string()),
            _ => return None,
        };
        Some(event)
    }

    pub fn disposition(&self) -> EventDisposition {
        match self {
            Self::ConnectionStarted | Self::AuthSucceeded | Self::BitrateChanged(_) => {
                EventDisposition::Ignore
            }
            Self::Connected => EventDisposition::Publish,
            Self::PublishStarted => EventDisposition::Streaming,
            Self::ConnectionClosed | Self::UnpublishSucceeded => EventDisposition::Close,
            Self::ConnectionFailed(reason) => EventDisposition::Fail(StreamError::transport(
                format!("connection failed: {reason}"),
            )),
            Self::PublishRejected(reason) => EventDisposition::Fail(StreamError::transport(
                format!("publish rejected: {reason}"),
            )),
            Self::AuthFailed => {
                EventDisposition::Fail(StreamError::transport("authentication failed"))
            }
            Self::IoError(reason) => {
                EventDisposition::Fail(StreamError::transport(format!("i/o error: {reason}")))
            }
        }
    }
}

/// A handshake-then-publish streaming protocol session.
///
/// `connect` and `publish` initiate their protocol exchange and return;
/// outcomes arrive through the event callback.
pub trait TransportSession: Send {
    fn connect(
        &mut self,
        destination: &Destination,
        events: TransportEventCallback,
    ) -> Result<(), StreamError>;

    fn publish(&mut self, stream_key: &str) -> Result<(), StreamError>;

    /// Hand a unit over for asynchronous delivery.
    fn send(&mut self, unit: EncodedUnit) -> Result<(), StreamError>;

    /// Close the session. Must tolerate being called after the remote end
    /// already closed.
    fn close(&mut self) -> Result<(), StreamError>;
}

/// Allocates a fresh [`TransportSession`] for each session.
pub trait TransportFactory: Send + Sync {
    fn open(&self, config: &SessionConfig) -> Result<Box<dyn TransportSession>, StreamError>;
}

impl<F> TransportFactory for F
where
    F: Fn(&SessionConfig) -> Result<Box<dyn TransportSession>, StreamError> + Send + Sync,
{
    fn open(&self, config: &SessionConfig) -> Result<Box<dyn TransportSession>, StreamError> {
        self(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(
            TransportEvent::from_status_code("NetConnection.Connect.Success"),
            Some(TransportEvent::Connected)
        );
        assert_eq!(
            TransportEvent::from_status_code("NetStream.Publish.Start"),
            Some(TransportEvent::PublishStarted)
        );
        assert!(matches!(
            TransportEvent::from_status_code("NetStream.Publish.BadName"),
            Some(TransportEvent::PublishRejected(_))
        ));
        assert_eq!(TransportEvent::from_status_code("NetStream.Buffer.Empty"), None);
    }

    #[test]
    fn connected_does_not_mean_streaming() {
        assert_eq!(TransportEvent::Connected.disposition(), EventDisposition::Publish);
        assert_eq!(
            TransportEvent::PublishStarted.disposition(),
            EventDisposition::Streaming
        );
    }

    #[test]
    fn graceful_and_fatal_events() {
        assert_eq!(TransportEvent::ConnectionClosed.disposition(), EventDisposition::Close);
        assert_eq!(TransportEvent::UnpublishSucceeded.disposition(), EventDisposition::Close);

        for event in [
            TransportEvent::ConnectionFailed("refused".into()),
            TransportEvent::PublishRejected("bad name".into()),
            TransportEvent::AuthFailed,
            TransportEvent::IoError("reset".into()),
        ] {
            assert!(matches!(
                event.disposition(),
                EventDisposition::Fail(StreamError::TransportFailure(_))
            ));
        }
    }

    #[test]
    fn transient_events_are_ignored() {
        for event in [
            TransportEvent::ConnectionStarted,
            TransportEvent::AuthSucceeded,
            TransportEvent::BitrateChanged(96_000),
        ] {
            assert_eq!(event.disposition(), EventDisposition::Ignore);
        }
    }
}
