//! Event queue between the platform and the orchestrator task
//!
//! Every producer (radio callbacks, messaging client, provisioning intake)
//! holds a clone of the sender; the orchestrator task is the only receiver,
//! so events are handled strictly in arrival order.

use tether_core::{Event, TetherError};
use tokio::sync::mpsc;

pub type EventSender = mpsc::Sender<Event>;
pub type EventReceiver = mpsc::Receiver<Event>;

/// Default queue depth
pub const DEFAULT_EVENT_CAPACITY: usize = 32;

/// Create the orchestrator's event queue
pub fn create_event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    mpsc::channel(capacity.max(1))
}

/// Send an event, mapping a closed queue to a channel error
pub async fn send_event(sender: &EventSender, event: Event) -> Result<(), TetherError> {
    sender
        .send(event)
        .await
        .map_err(|e| TetherError::channel_error(format!("Event queue closed, dropped {}", e.0.name())))
}

/// Queue an event without waiting for room
///
/// Callers outside the orchestrator task use this where blocking could wait
/// on the task itself, such as a request handler the task is draining.
pub fn try_send_event(sender: &EventSender, event: Event) -> Result<(), TetherError> {
    sender.try_send(event).map_err(|e| match e {
        mpsc::error::TrySendError::Full(event) => {
            TetherError::channel_error(format!("Event queue full, dropped {}", event.name()))
        }
        mpsc::error::TrySendError::Closed(event) => {
            TetherError::channel_error(format!("Event queue closed, dropped {}", event.name()))
        }
    })
}
