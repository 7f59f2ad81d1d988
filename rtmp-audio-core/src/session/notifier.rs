use std::sync::Arc;
use std::thread;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::models::error::StreamError;
use crate::models::state::StateEvent;
use crate::traits::observer::StateObserver;

enum Notification {
    Deliver(Arc<dyn StateObserver>, StateEvent),
    Shutdown,
}

/// Delivers state events to observers on one dedicated thread.
///
/// Each event is bound to the observer that was registered when the
/// transition happened, so a later registration never sees history and
/// an observer is never called concurrently with itself.
#[derive(Clone)]
pub(crate) struct Notifier {
    tx: Sender<Notification>,
}

impl Notifier {
    pub(crate) fn spawn() -> Result<(Self, thread::JoinHandle<()>), StreamError> {
        let (tx, rx) = unbounded();
        let handle = thread::Builder::new()
            .name("stream-notify".into())
            .spawn(move || deliver_loop(rx))
            .map_err(|e| StreamError::Unknown(format!("failed to spawn notifier thread: {e}")))?;
        Ok((Self { tx }, handle))
    }

    pub(crate) fn post(&self, observer: Option<Arc<dyn StateObserver>>, event: StateEvent) {
        let Some(observer) = observer else {
            log::trace!("no observer registered for {}", event.state);
            return;
        };
        if self.tx.send(Notification::Deliver(observer, event)).is_err() {
            log::warn!("notifier stopped, dropping {}", event.state);
        }
    }

    /// Ask the thread to exit after delivering everything already queued.
    pub(crate) fn shutdown(&self) {
        let _ = self.tx.send(Notification::Shutdown);
    }
}

fn deliver_loop(rx: Receiver<Notification>) {
    for notification in rx {
        match notification {
            Notification::Deliver(observer, event) => observer.on_state_changed(&event),
            Notification::Shutdown => break,
        }
    }
    log::debug!("state notifier exited");
}
