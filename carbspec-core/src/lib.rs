pub mod activity;
pub mod constants;
pub mod equilibrium;
pub mod errors;
pub mod inputs;
pub mod species;

pub use activity::{ActivityModel, ModelKind, ModelResources};
pub use equilibrium::{EquilibriumSolver, SpeciationResult};
pub use errors::{SolveError, SolveFailure, SolveResult};
pub use inputs::{Dose, Reagent, SolubilityInputs, SolverOptions, SolverSeed, SpeciationMode};
pub use species::{Species, SpeciesValues};
