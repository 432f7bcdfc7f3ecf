use quiz_core::model::AttemptStatus;
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 256;

/// Notifications published while an attempt runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptEvent {
    Tick { remaining: u32 },
    Warning { threshold: u32 },
    Autosaved { answered: usize },
    AutosaveFailed { reason: String },
    StatusChanged { status: AttemptStatus },
    Submitted { result_ref: String, auto: bool },
}

/// Fan-out of attempt events. Publishing never waits on subscribers.
#[derive(Debug, Clone)]
pub(crate) struct EventBus {
    sender: broadcast::Sender<AttemptEvent>,
}

impl EventBus {
    pub(crate) fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    pub(crate) fn publish(&self, event: AttemptEvent) {
        // No receivers is fine.
        let _ = self.sender.send(event);
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<AttemptEvent> {
        self.sender.subscribe()
    }
}
