use std::sync::Arc;
use std::time::Duration;

use quiz_core::model::WarningLatches;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::coordinator::{SubmissionCoordinator, SubmitOutcome};
use super::events::AttemptEvent;
use super::lock;

/// Stop switch for the countdown task.
///
/// Stopping is cooperative: the auto-submit path runs on the countdown task
/// itself and stops its own timer through this token.
#[derive(Debug, Clone)]
pub(crate) struct Countdown {
    token: CancellationToken,
}

impl Countdown {
    pub(crate) fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    pub(crate) fn stop(&self) {
        self.token.cancel();
    }

    /// Starts ticking once per `period`. The first tick lands one period from now.
    pub(crate) fn spawn(
        &self,
        coordinator: Arc<SubmissionCoordinator>,
        period: Duration,
        latches: WarningLatches,
    ) {
        tokio::spawn(run(coordinator, period, latches, self.token.clone()));
    }
}

async fn run(
    coordinator: Arc<SubmissionCoordinator>,
    period: Duration,
    mut latches: WarningLatches,
    token: CancellationToken,
) {
    let attempt_id = coordinator.attempt_id();

    // A resumed attempt may already be out of time.
    if lock(coordinator.session()).time_remaining() == Some(0) {
        expire(&coordinator).await;
        return;
    }

    let mut interval = time::interval_at(Instant::now() + period, period);
    loop {
        tokio::select! {
            biased;
            () = token.cancelled() => break,
            _ = interval.tick() => {}
        }
        if token.is_cancelled() {
            break;
        }

        let Some(remaining) = lock(coordinator.session()).tick() else {
            break;
        };
        debug!(%attempt_id, remaining, "tick");
        coordinator.events().publish(AttemptEvent::Tick { remaining });

        for warning in latches.observe(remaining) {
            info!(%attempt_id, threshold = warning.threshold_secs, remaining, "time warning");
            coordinator.events().publish(AttemptEvent::Warning {
                threshold: warning.threshold_secs,
            });
        }

        if remaining == 0 {
            expire(&coordinator).await;
            break;
        }
    }
    debug!(%attempt_id, "countdown stopped");
}

async fn expire(coordinator: &Arc<SubmissionCoordinator>) {
    let attempt_id = coordinator.attempt_id();
    info!(%attempt_id, "time is up, auto-submitting");
    match coordinator.auto_submit().await {
        Ok(SubmitOutcome::Submitted { status, .. }) => {
            debug!(%attempt_id, %status, "auto-submit finished");
        }
        Ok(SubmitOutcome::AlreadyFinalizing) => {
            debug!(%attempt_id, "auto-submit skipped, already finalizing");
        }
        Err(e) => warn!(%attempt_id, error = %e, "auto-submit failed"),
    }
}
