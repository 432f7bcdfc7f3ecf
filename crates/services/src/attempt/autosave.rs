use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use quiz_core::model::AttemptId;
use storage::repository::AttemptStore;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::events::{AttemptEvent, EventBus};
use super::{SharedSession, lock};

/// Periodic best-effort persistence of the current snapshot.
pub(crate) struct Autosave {
    token: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Autosave {
    pub(crate) fn spawn(
        attempt_id: AttemptId,
        session: SharedSession,
        store: Arc<dyn AttemptStore>,
        events: EventBus,
        period: Duration,
    ) -> Self {
        let token = CancellationToken::new();
        let task = tokio::spawn(run(
            attempt_id,
            session,
            store,
            events,
            period,
            token.clone(),
        ));
        Self {
            token,
            task: Mutex::new(Some(task)),
        }
    }

    /// Cancels the task and waits for an in-flight save to finish.
    /// Later calls return immediately.
    pub(crate) async fn stop(&self) {
        self.token.cancel();
        let task = self.take_task();
        if let Some(task) = task {
            if let Err(e) = task.await {
                if e.is_panic() {
                    warn!(error = %e, "autosave task panicked");
                }
            }
        }
    }

    /// Synchronous variant for teardown on drop: cancels and aborts.
    pub(crate) fn abort(&self) {
        self.token.cancel();
        if let Some(task) = self.take_task() {
            task.abort();
        }
    }

    fn take_task(&self) -> Option<JoinHandle<()>> {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

async fn run(
    attempt_id: AttemptId,
    session: SharedSession,
    store: Arc<dyn AttemptStore>,
    events: EventBus,
    period: Duration,
    token: CancellationToken,
) {
    let mut interval = time::interval_at(Instant::now() + period, period);
    loop {
        tokio::select! {
            biased;
            () = token.cancelled() => break,
            _ = interval.tick() => {}
        }
        if !save_once(attempt_id, &session, store.as_ref(), &events).await {
            break;
        }
    }
    debug!(%attempt_id, "autosave stopped");
}

/// Returns `false` once the session stops accepting edits.
async fn save_once(
    attempt_id: AttemptId,
    session: &SharedSession,
    store: &dyn AttemptStore,
    events: &EventBus,
) -> bool {
    let (snapshot, answered) = {
        let session = lock(session);
        if !session.is_editable() {
            return false;
        }
        (session.snapshot(), session.summary().answered)
    };

    match store.save_progress(attempt_id, &snapshot).await {
        Ok(()) => {
            debug!(%attempt_id, answered, "autosaved");
            events.publish(AttemptEvent::Autosaved { answered });
        }
        Err(e) => {
            warn!(%attempt_id, error = %e, "autosave failed");
            events.publish(AttemptEvent::AutosaveFailed {
                reason: e.to_string(),
            });
        }
    }
    true
}
