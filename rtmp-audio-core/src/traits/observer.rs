use crossbeam_channel::Sender;

use crate::models::state::StateEvent;

/// Receives state notifications from a [`StreamController`](crate::StreamController).
///
/// Called from the controller's notification thread, one event at a time
/// and in transition order. Implementations should marshal to a UI thread
/// if needed.
pub trait StateObserver: Send + Sync {
    fn on_state_changed(&self, event: &StateEvent);
}

/// Observer that forwards every event into a channel.
pub struct ChannelObserver {
    tx: Sender<StateEvent>,
}

impl ChannelObserver {
    pub fn new(tx: Sender<StateEvent>) -> Self {
        Self { tx }
    }
}

impl StateObserver for ChannelObserver {
    fn on_state_changed(&self, event: &StateEvent) {
        if self.tx.send(*event).is_err() {
            log::debug!("state observer channel closed, dropping {}", event.state);
        }
    }
}
