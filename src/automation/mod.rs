//! The autonomous work loop.
//!
//! [`cycle::AutomationLoop`] drives one task at a time through a fixed
//! sequence of steps (implement, test, fix, review, commit), with all
//! side-effecting work behind the [`steps::CycleSteps`] trait so tests
//! can script each step.

pub mod cycle;
pub mod status;
pub mod steps;

pub use cycle::{AutomationLoop, CycleOutcome, RetryPolicy};
pub use status::AutomationStatus;
pub use steps::{
    CycleSteps, LiveSteps, MockCycleSteps, ReviewReport, SimulatedSteps, StepReport, TestReport,
};
