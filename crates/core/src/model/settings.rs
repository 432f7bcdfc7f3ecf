use std::time::Duration;
use thiserror::Error;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("tick interval must be > 0")]
    InvalidTickInterval,

    #[error("autosave period must be > 0")]
    InvalidAutosavePeriod,

    #[error("autosave period must not be shorter than the tick interval")]
    AutosaveFasterThanTick,

    #[error("warning thresholds must be > 0 seconds")]
    InvalidWarningThreshold,

    #[error("warning threshold {0}s is listed more than once")]
    DuplicateWarningThreshold(u32),
}

//
// ─── SETTINGS ──────────────────────────────────────────────────────────────────
//

/// Timing knobs for a running attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    tick_interval: Duration,
    autosave_period: Duration,
    warning_thresholds_secs: Vec<u32>,
}

impl EngineSettings {
    /// Production defaults:
    /// - 1 second countdown tick
    /// - 30 second autosave cadence
    /// - warnings at 5 minutes and 1 minute remaining
    #[must_use]
    pub fn standard() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            autosave_period: Duration::from_secs(30),
            warning_thresholds_secs: vec![300, 60],
        }
    }

    /// Creates custom settings; thresholds are stored highest first.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` for zero durations, an autosave period shorter
    /// than a tick, or zero/duplicate warning thresholds.
    pub fn new(
        tick_interval: Duration,
        autosave_period: Duration,
        warning_thresholds_secs: Vec<u32>,
    ) -> Result<Self, SettingsError> {
        if tick_interval.is_zero() {
            return Err(SettingsError::InvalidTickInterval);
        }
        if autosave_period.is_zero() {
            return Err(SettingsError::InvalidAutosavePeriod);
        }
        if autosave_period < tick_interval {
            return Err(SettingsError::AutosaveFasterThanTick);
        }

        let mut thresholds = warning_thresholds_secs;
        if thresholds.contains(&0) {
            return Err(SettingsError::InvalidWarningThreshold);
        }
        thresholds.sort_unstable_by(|a, b| b.cmp(a));
        if let Some(pair) = thresholds.windows(2).find(|w| w[0] == w[1]) {
            return Err(SettingsError::DuplicateWarningThreshold(pair[0]));
        }

        Ok(Self {
            tick_interval,
            autosave_period,
            warning_thresholds_secs: thresholds,
        })
    }

    /// Wall time per countdown tick. Every tick consumes one second of
    /// attempt time, so a shorter interval runs the clock faster.
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    #[must_use]
    pub fn autosave_period(&self) -> Duration {
        self.autosave_period
    }

    #[must_use]
    pub fn warning_thresholds_secs(&self) -> &[u32] {
        &self.warning_thresholds_secs
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::standard()
    }
}
