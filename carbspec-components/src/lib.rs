//! Batch engines built on the carbspec equilibrium solver.
//!
//! Every engine owns its solver by value and is a pure function of its arguments, so a
//! workload can be moved onto a worker thread and rerun without shared state.

pub mod ledger;
pub mod parameters;
pub mod sensitivity;
pub mod sweep;
pub mod timeline;

pub use parameters::InputParameter;
pub use sensitivity::{SensitivityEngine, SensitivitySettings, SensitivityTable};
pub use sweep::{SweepCurve, SweepEngine, SweepRange, SweepVariable};
pub use timeline::{CyclePayload, Timeline, TimelineEntry, TimelineIntegrator};
