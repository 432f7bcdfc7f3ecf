//! Attempt engine: countdown, autosave and submission around one session.

mod autosave;
mod coordinator;
mod countdown;
mod events;
mod handle;
mod workflow;

use std::sync::{Mutex, MutexGuard, PoisonError};

use quiz_core::model::AttemptSession;

pub use coordinator::SubmitOutcome;
pub use events::AttemptEvent;
pub use handle::AttemptHandle;
pub use workflow::AttemptLoopService;

pub(crate) type SharedSession = std::sync::Arc<Mutex<AttemptSession>>;

/// Locks the session. A panic while holding the lock cannot leave the session
/// half-mutated, so poisoning is ignored.
pub(crate) fn lock(session: &Mutex<AttemptSession>) -> MutexGuard<'_, AttemptSession> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}
