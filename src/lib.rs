//! Carbonate speciation of sodium reagent solutions.
//!
//! The equilibrium solver and activity models live in [`carbspec_core`]; the batch engines
//! (sensitivity, sweep, timeline) in [`carbspec_components`]. This crate adds background
//! execution through [`SolveScheduler`] and the [`SolveSettings`] document.

pub mod scheduler;
pub mod settings;
pub mod workload;

pub use carbspec_components;
pub use carbspec_core;

pub use scheduler::{Delivery, ScheduleError, SolveScheduler, TaskHandle};
pub use settings::{SettingsError, SolveSettings};
pub use workload::{SolveOutput, Workload};
