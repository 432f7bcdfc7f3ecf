use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use quiz_core::model::{AnswerSnapshot, AttemptId, AttemptStatus, FinalizeKind};
use storage::repository::AttemptStore;
use tracing::{debug, info, warn};

use super::autosave::Autosave;
use super::countdown::Countdown;
use super::events::{AttemptEvent, EventBus};
use super::{SharedSession, lock};
use crate::error::AttemptEngineError;

/// Result of a submit call that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The store accepted the attempt.
    Submitted {
        status: AttemptStatus,
        result_ref: String,
    },
    /// Another caller already owns finalization; nothing was sent.
    AlreadyFinalizing,
}

#[derive(Debug, Clone)]
struct FrozenSubmission {
    kind: FinalizeKind,
    answers: Vec<AnswerSnapshot>,
}

/// Clears an in-flight flag when dropped, including on cancellation.
struct InFlight(Arc<AtomicBool>);

impl InFlight {
    fn claim(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(Arc::clone(flag)))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Funnels user submit, auto-submit and abandonment through one
/// at-most-once finalization.
///
/// Once claimed, sealing and delivery run on a task the coordinator spawns.
/// A caller that stops polling (a timeout, a dropped select branch) only stops
/// waiting; the attempt still reaches a submitted or retryable status.
pub(crate) struct SubmissionCoordinator {
    attempt_id: AttemptId,
    session: SharedSession,
    store: Arc<dyn AttemptStore>,
    events: EventBus,
    countdown: Countdown,
    autosave: Autosave,
    finalizing: AtomicBool,
    retrying: Arc<AtomicBool>,
    frozen: Mutex<Option<FrozenSubmission>>,
    result_ref: Mutex<Option<String>>,
}

impl SubmissionCoordinator {
    pub(crate) fn new(
        attempt_id: AttemptId,
        session: SharedSession,
        store: Arc<dyn AttemptStore>,
        events: EventBus,
        countdown: Countdown,
        autosave: Autosave,
    ) -> Self {
        Self {
            attempt_id,
            session,
            store,
            events,
            countdown,
            autosave,
            finalizing: AtomicBool::new(false),
            retrying: Arc::new(AtomicBool::new(false)),
            frozen: Mutex::new(None),
            result_ref: Mutex::new(None),
        }
    }

    pub(crate) fn attempt_id(&self) -> AttemptId {
        self.attempt_id
    }

    pub(crate) fn session(&self) -> &SharedSession {
        &self.session
    }

    pub(crate) fn events(&self) -> &EventBus {
        &self.events
    }

    pub(crate) fn result_ref(&self) -> Option<String> {
        self.result_ref
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) async fn submit(self: &Arc<Self>) -> Result<SubmitOutcome, AttemptEngineError> {
        self.finalize(FinalizeKind::User).await
    }

    pub(crate) async fn auto_submit(self: &Arc<Self>) -> Result<SubmitOutcome, AttemptEngineError> {
        self.finalize(FinalizeKind::Auto).await
    }

    async fn finalize(
        self: &Arc<Self>,
        kind: FinalizeKind,
    ) -> Result<SubmitOutcome, AttemptEngineError> {
        if !self.claim_finalization() {
            let status = lock(&self.session).status();
            if status == AttemptStatus::Expired {
                return Err(AttemptEngineError::ExpiredSession(status));
            }
            debug!(attempt_id = %self.attempt_id, ?kind, %status, "finalization already claimed");
            return Ok(SubmitOutcome::AlreadyFinalizing);
        }

        let this = Arc::clone(self);
        tokio::spawn(async move { this.seal_and_deliver(kind).await }).await?
    }

    async fn seal_and_deliver(
        &self,
        kind: FinalizeKind,
    ) -> Result<SubmitOutcome, AttemptEngineError> {
        let attempt_id = self.attempt_id;
        self.countdown.stop();
        self.autosave.stop().await;

        let frozen = {
            let mut session = lock(&self.session);
            let answers = session.seal()?;
            let summary = session.summary();
            info!(
                %attempt_id,
                ?kind,
                answered = summary.answered,
                unanswered = summary.unanswered,
                flagged = summary.flagged,
                "attempt sealed"
            );
            FrozenSubmission { kind, answers }
        };
        *self.frozen.lock().unwrap_or_else(PoisonError::into_inner) = Some(frozen.clone());

        self.deliver(&frozen).await
    }

    /// Resends the frozen snapshot after a failed submission.
    pub(crate) async fn retry_submission(
        self: &Arc<Self>,
    ) -> Result<SubmitOutcome, AttemptEngineError> {
        self.ensure_pending_retry()?;
        let Some(in_flight) = InFlight::claim(&self.retrying) else {
            return Err(AttemptEngineError::DuplicateSubmission);
        };
        // A retry that finished between the check and the claim already moved on.
        self.ensure_pending_retry()?;

        let frozen = self
            .frozen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(AttemptEngineError::NotPendingRetry(
                AttemptStatus::SubmissionPendingRetry,
            ))?;
        info!(attempt_id = %self.attempt_id, "retrying submission");
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let _in_flight = in_flight;
            this.deliver(&frozen).await
        })
        .await?
    }

    async fn deliver(&self, frozen: &FrozenSubmission) -> Result<SubmitOutcome, AttemptEngineError> {
        let attempt_id = self.attempt_id;
        let is_auto = frozen.kind.is_auto();
        let result = self
            .store
            .submit(attempt_id, &frozen.answers, is_auto)
            .await;

        match result {
            Ok(receipt) => {
                let status = lock(&self.session).complete(frozen.kind)?;
                *self.result_ref.lock().unwrap_or_else(PoisonError::into_inner) =
                    Some(receipt.result_ref.clone());
                info!(%attempt_id, %status, result_ref = %receipt.result_ref, "attempt submitted");
                self.events.publish(AttemptEvent::StatusChanged { status });
                self.events.publish(AttemptEvent::Submitted {
                    result_ref: receipt.result_ref.clone(),
                    auto: is_auto,
                });
                Ok(SubmitOutcome::Submitted {
                    status,
                    result_ref: receipt.result_ref,
                })
            }
            Err(e) => {
                lock(&self.session).mark_pending_retry()?;
                warn!(%attempt_id, error = %e, "submission failed, awaiting retry");
                self.events.publish(AttemptEvent::StatusChanged {
                    status: AttemptStatus::SubmissionPendingRetry,
                });
                Err(AttemptEngineError::Network(e))
            }
        }
    }

    /// Stops both tasks and expires a session nobody submitted.
    pub(crate) async fn abandon(&self) -> AttemptStatus {
        let claimed = self.claim_finalization();
        self.countdown.stop();
        self.autosave.stop().await;
        self.expire_if(claimed)
    }

    /// Same as [`Self::abandon`] for contexts that cannot await.
    pub(crate) fn teardown_now(&self) -> AttemptStatus {
        let claimed = self.claim_finalization();
        self.countdown.stop();
        self.autosave.abort();
        self.expire_if(claimed)
    }

    fn expire_if(&self, claimed: bool) -> AttemptStatus {
        let mut session = lock(&self.session);
        if claimed && session.expire().is_ok() {
            info!(attempt_id = %self.attempt_id, "attempt abandoned");
            self.events.publish(AttemptEvent::StatusChanged {
                status: AttemptStatus::Expired,
            });
        }
        session.status()
    }

    fn claim_finalization(&self) -> bool {
        self.finalizing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn ensure_pending_retry(&self) -> Result<(), AttemptEngineError> {
        let status = lock(&self.session).status();
        if status == AttemptStatus::SubmissionPendingRetry {
            Ok(())
        } else {
            Err(AttemptEngineError::NotPendingRetry(status))
        }
    }
}
