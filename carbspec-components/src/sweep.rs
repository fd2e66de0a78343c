//! Batch solves along one independent variable.

use crate::parameters::InputParameter;
use carbspec_core::{
    EquilibriumSolver, SolubilityInputs, SolveFailure, SolverSeed, SpeciationResult,
};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// The independent variable of a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepVariable {
    /// Imposed pH, held by a strong acid or base titrant.
    ForcedPh,
    Input(InputParameter),
}

/// Sweep values in the order they will be solved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepRange {
    pub values: Vec<f64>,
}

impl SweepRange {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    /// `steps` evenly spaced values from `low` to `high` inclusive.
    ///
    /// A single step yields `low`; zero steps yield an empty range.
    pub fn linear(low: f64, high: f64, steps: usize) -> Self {
        let values = match steps {
            0 => Vec::new(),
            1 => vec![low],
            _ => (0..steps)
                .map(|i| low + (high - low) * i as f64 / (steps - 1) as f64)
                .collect(),
        };
        Self { values }
    }

    /// pH 6.0 to 10.5 in seven steps.
    pub fn default_ph() -> Self {
        Self::linear(6.0, 10.5, 7)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepOutcome {
    Solved(Box<SpeciationResult>),
    Failed(SolveFailure),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepPoint {
    pub value: f64,
    /// Index of the converged point whose result seeded this solve.
    pub seeded_from: Option<usize>,
    pub outcome: SweepOutcome,
}

impl SweepPoint {
    pub fn result(&self) -> Option<&SpeciationResult> {
        match &self.outcome {
            SweepOutcome::Solved(result) => Some(result),
            SweepOutcome::Failed(_) => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, SweepOutcome::Failed(_))
    }
}

/// Sweep points in input order, one per input value, failures included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepCurve {
    pub variable: SweepVariable,
    pub points: Vec<SweepPoint>,
}

impl SweepCurve {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// `(value, pH)` for every solved point.
    pub fn ph_series(&self) -> Vec<(f64, f64)> {
        self.points
            .iter()
            .filter_map(|p| p.result().map(|r| (p.value, r.ph)))
            .collect()
    }

    pub fn failure_count(&self) -> usize {
        self.points.iter().filter(|p| p.is_failed()).count()
    }
}

#[derive(Debug, Clone)]
pub struct SweepEngine {
    solver: EquilibriumSolver,
}

impl SweepEngine {
    pub fn new(solver: EquilibriumSolver) -> Self {
        Self { solver }
    }

    /// Solve once per value, holding every other input fixed.
    ///
    /// Each solve is seeded from the last converged point; the first uses the inputs' own
    /// initial guess. Forced-pH points take only the seed's ionic strength.
    pub fn run(
        &self,
        inputs: &SolubilityInputs,
        variable: SweepVariable,
        range: &SweepRange,
    ) -> SweepCurve {
        let mut seed: Option<(usize, SolverSeed)> = None;
        let mut points = Vec::with_capacity(range.values.len());

        for (index, &value) in range.values.iter().enumerate() {
            let solver_seed = seed.map(|(_, s)| s);
            let solved = match variable {
                SweepVariable::ForcedPh => {
                    self.solver.solve_forced_ph_seeded(inputs, value, solver_seed)
                }
                SweepVariable::Input(parameter) => {
                    let point_inputs = parameter.apply(inputs, value);
                    self.solver.solve_seeded(&point_inputs, solver_seed)
                }
            };

            let seeded_from = seed.map(|(i, _)| i);
            let outcome = match solved {
                Ok(result) => {
                    seed = Some((index, result.seed()));
                    SweepOutcome::Solved(Box::new(result))
                }
                Err(error) => {
                    warn!("Sweep point {index} ({variable:?} = {value}) failed: {error}");
                    SweepOutcome::Failed(error.into())
                }
            };
            points.push(SweepPoint {
                value,
                seeded_from,
                outcome,
            });
        }

        let curve = SweepCurve { variable, points };
        debug!(
            "Sweep over {variable:?}: {} points, {} failed",
            curve.len(),
            curve.failure_count()
        );
        curve
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_range() {
        let range = SweepRange::linear(6.0, 10.5, 7);
        assert_eq!(range.values.len(), 7);
        assert_eq!(range.values[0], 6.0);
        assert!((range.values[6] - 10.5).abs() < 1e-12);
        assert!((range.values[1] - 6.75).abs() < 1e-12);
        assert_eq!(range, SweepRange::default_ph());
    }

    #[test]
    fn test_degenerate_ranges() {
        assert!(SweepRange::linear(1.0, 2.0, 0).values.is_empty());
        assert_eq!(SweepRange::linear(1.0, 2.0, 1).values, vec![1.0]);
    }
}
