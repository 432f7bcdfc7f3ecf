use serde::{Deserialize, Serialize};

/// A threshold warning emitted once per attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWarning {
    pub threshold_secs: u32,
    pub remaining_secs: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Latch {
    threshold_secs: u32,
    fired: bool,
}

/// One-shot latches keyed to remaining-time thresholds.
///
/// Latches compare with `<=`, so a coalesced tick that jumps past a threshold
/// still fires it. Latches are kept in descending order, which is also the
/// order they fire in when several are crossed at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarningLatches {
    latches: Vec<Latch>,
}

impl WarningLatches {
    #[must_use]
    pub fn new(thresholds_secs: &[u32]) -> Self {
        let mut thresholds = thresholds_secs.to_vec();
        thresholds.sort_unstable_by(|a, b| b.cmp(a));
        thresholds.dedup();
        Self {
            latches: thresholds
                .into_iter()
                .map(|threshold_secs| Latch {
                    threshold_secs,
                    fired: false,
                })
                .collect(),
        }
    }

    /// Fires every unfired latch whose threshold has been reached.
    pub fn observe(&mut self, remaining_secs: u32) -> Vec<TimeWarning> {
        let mut fired = Vec::new();
        for latch in &mut self.latches {
            if !latch.fired && remaining_secs <= latch.threshold_secs {
                latch.fired = true;
                fired.push(TimeWarning {
                    threshold_secs: latch.threshold_secs,
                    remaining_secs,
                });
            }
        }
        fired
    }

    #[must_use]
    pub fn has_fired(&self, threshold_secs: u32) -> bool {
        self.latches
            .iter()
            .any(|l| l.threshold_secs == threshold_secs && l.fired)
    }

    /// Thresholds that have not fired yet, highest first.
    #[must_use]
    pub fn pending(&self) -> Vec<u32> {
        self.latches
            .iter()
            .filter(|l| !l.fired)
            .map(|l| l.threshold_secs)
            .collect()
    }
}
