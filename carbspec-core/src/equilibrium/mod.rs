//! Charge-balance equilibrium of the Na–CO2–H2O system.

pub mod charge_balance;
pub mod constants;
pub mod quartic;
mod result;
pub mod saturation;
mod solver;

pub use constants::EquilibriumConstants;
pub use result::{DissolutionSummary, InnerPath, SolveDiagnostics, SolveStage, SpeciationResult};
pub use saturation::{SaturationIndex, Solid};
pub use solver::{solve, EquilibriumSolver};
