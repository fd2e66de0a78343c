use super::saturation::{SaturationIndex, Solid};
use crate::activity::ModelKind;
use crate::inputs::SolverSeed;
use crate::species::{Species, SpeciesValues};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Solver stage that failed to converge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStage {
    /// pH solve at fixed ionic strength.
    InnerLoop,
    /// Ionic-strength self-consistency.
    OuterLoop,
    /// Final charge-balance and non-negativity check.
    Acceptance,
}

impl fmt::Display for SolveStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SolveStage::InnerLoop => "inner pH loop",
            SolveStage::OuterLoop => "outer ionic-strength loop",
            SolveStage::Acceptance => "charge-balance acceptance check",
        };
        f.write_str(name)
    }
}

/// Which inner-loop path produced the accepted pH.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InnerPath {
    /// Quartic root, confirmed against the residual criterion.
    ClosedForm,
    /// Bisection over a bracket narrowed around a prior estimate.
    SeededBisection,
    /// Bisection over the full pH domain.
    Bisection,
    /// pH imposed by the caller.
    ForcedPh,
}

/// Convergence diagnostics for one solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveDiagnostics {
    pub model: ModelKind,
    pub outer_iterations: usize,
    /// Inner iterations summed over all outer iterations.
    pub inner_iterations: usize,
    /// Path of the final inner solve.
    pub inner_path: InnerPath,
    /// False only on estimates attached to a failure.
    pub converged: bool,
    /// Closed-form estimate from the final inner solve, when one was computed.
    pub quartic_ph: Option<f64>,
}

/// How much of the dosed reagent went into solution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DissolutionSummary {
    pub dosed_mol: f64,
    pub dissolved_mol: f64,
    pub undissolved_mol: f64,
    pub dissolved_fraction: f64,
}

/// Equilibrium speciation of one solution.
///
/// Concentrations are mol/L. Every result returned as `Ok` is charge balanced within the
/// solver tolerance and has non-negative concentrations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciationResult {
    pub ph: f64,
    pub concentrations: SpeciesValues,
    pub activity_coefficients: SpeciesValues,
    pub ionic_strength: f64,
    /// Whether the activity model evaluated γ at a capped ionic strength.
    pub ionic_strength_capped: bool,
    pub total_carbon_m: f64,
    /// Fractions of total carbon as H2CO3*, HCO3- and CO3-2.
    pub alpha: [f64; 3],
    /// 1000 × ([HCO3-] + 2[CO3-2] + [OH-] − [H+])
    pub alkalinity_meq_per_l: f64,
    /// Net charge left at the accepted pH (mol/L).
    pub charge_balance_residual: f64,
    /// Strong base (positive) or acid (negative) needed to hold a forced pH; zero otherwise.
    pub titrant_m: f64,
    pub saturation_indices: Vec<SaturationIndex>,
    pub dissolution: DissolutionSummary,
    pub warnings: Vec<String>,
    pub diagnostics: SolveDiagnostics,
}

impl SpeciationResult {
    pub fn concentration(&self, species: Species) -> f64 {
        self.concentrations.get(species)
    }

    pub fn activity(&self, species: Species) -> f64 {
        self.concentrations.get(species) * self.activity_coefficients.get(species)
    }

    pub fn activities(&self) -> SpeciesValues {
        self.concentrations.product(&self.activity_coefficients)
    }

    /// Fraction of total carbon held by `species`; zero for non-carbon species.
    pub fn carbon_fraction(&self, species: Species) -> f64 {
        match species {
            Species::CarbonicAcid => self.alpha[0],
            Species::Bicarbonate => self.alpha[1],
            Species::Carbonate => self.alpha[2],
            _ => 0.0,
        }
    }

    /// Concentration of `species` in g/L.
    pub fn mass_concentration(&self, species: Species) -> f64 {
        self.concentration(species) * species.molar_mass()
    }

    pub fn saturation_index(&self, solid: Solid) -> Option<f64> {
        self.saturation_indices
            .iter()
            .find(|si| si.solid == solid)
            .map(|si| si.saturation_index)
    }

    /// Seed for a neighbouring solve.
    pub fn seed(&self) -> SolverSeed {
        SolverSeed {
            ph: self.ph,
            ionic_strength: self.ionic_strength,
        }
    }

    pub fn is_converged(&self) -> bool {
        self.diagnostics.converged
    }
}
