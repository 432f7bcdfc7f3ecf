#![forbid(unsafe_code)]

pub mod attempt;
pub mod error;

pub use quiz_core::Clock;

pub use attempt::{AttemptEvent, AttemptHandle, AttemptLoopService, SubmitOutcome};
pub use error::AttemptEngineError;
